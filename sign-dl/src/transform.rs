//! Image transform pipeline.

use crate::common::*;

/// The transform pipeline configuration.
#[derive(Debug, Clone)]
pub struct TransformInit {
    /// Target spatial size as (height, width).
    pub resize: (u32, u32),
    pub mean: [f64; 3],
    pub std: [f64; 3],
}

impl Default for TransformInit {
    fn default() -> Self {
        Self {
            resize: (32, 32),
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

impl TransformInit {
    pub fn build(self) -> Transform {
        let Self { resize, mean, std } = self;
        Transform { resize, mean, std }
    }
}

/// Bilinear resize, tensor conversion and per-channel normalization,
/// applied in that order.
#[derive(Debug, Clone)]
pub struct Transform {
    resize: (u32, u32),
    mean: [f64; 3],
    std: [f64; 3],
}

impl Transform {
    /// Turn an HWC RGB pixel buffer into a normalized CHW float tensor.
    pub fn apply(&self, pixels: &Array3<u8>) -> Result<Tensor> {
        let Self {
            resize: (resize_h, resize_w),
            mean,
            std,
        } = *self;

        let (rows, cols, channels) = pixels.dim();
        ensure!(channels == 3, "expect a 3-channel buffer, got {}", channels);

        let pixels = pixels.as_standard_layout();
        let data = pixels
            .as_slice()
            .ok_or_else(|| format_err!("non-contiguous pixel buffer"))?;
        let image = RgbImage::from_raw(cols as u32, rows as u32, data.to_vec()).ok_or_else(
            || format_err!("pixel buffer does not match {}x{} dimensions", cols, rows),
        )?;
        let resized = image::imageops::resize(&image, resize_w, resize_h, FilterType::Triangle);

        let tensor = Tensor::of_slice(resized.as_raw())
            .view([resize_h as i64, resize_w as i64, 3])
            .permute(&[2, 0, 1])
            .to_kind(Kind::Float)
            / 255.0;
        let mean = Tensor::of_slice(&mean).to_kind(Kind::Float).view([3, 1, 1]);
        let std = Tensor::of_slice(&std).to_kind(Kind::Float).view([3, 1, 1]);

        Ok((tensor - mean) / std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn pipeline_output_shape_and_scale() -> Result<()> {
        // a constant mid-gray buffer
        let pixels = Array3::from_elem((48, 40, 3), 128u8);
        let transform = TransformInit::default().build();

        let output = transform.apply(&pixels)?;
        assert_eq!(output.size(), &[3, 32, 32]);
        assert_eq!(output.kind(), Kind::Float);

        // (128/255 - 0.5) / 0.5
        let expect = (128.0 / 255.0 - 0.5) / 0.5;
        assert_abs_diff_eq!(f64::from(&output.mean(Kind::Float)), expect, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn normalization_bounds() -> Result<()> {
        let transform = TransformInit::default().build();

        let black = Array3::from_elem((10, 10, 3), 0u8);
        let white = Array3::from_elem((10, 10, 3), 255u8);

        assert_abs_diff_eq!(
            f64::from(&transform.apply(&black)?.mean(Kind::Float)),
            -1.0,
            epsilon = 1e-6
        );
        assert_abs_diff_eq!(
            f64::from(&transform.apply(&white)?.mean(Kind::Float)),
            1.0,
            epsilon = 1e-6
        );

        Ok(())
    }

    #[test]
    fn rejects_non_rgb_buffers() {
        let pixels = Array3::from_elem((10, 10, 4), 0u8);
        let transform = TransformInit::default().build();
        assert!(transform.apply(&pixels).is_err());
    }
}
