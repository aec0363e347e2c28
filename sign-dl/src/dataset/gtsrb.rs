use super::{load_index_file, IndexRecord, RandomAccessDataset};
use crate::{common::*, transform::Transform};

/// The label mapping applied after the class id is read from a record.
pub type TargetTransform = Arc<dyn Fn(i64) -> i64 + Send + Sync>;

/// The traffic sign dataset described by a tabular index file.
///
/// Every record names an image file relative to the dataset root, the
/// bounding box of the sign within that image and its class id. Samples
/// are produced on demand and never cached.
pub struct GtsrbDataset {
    root: PathBuf,
    records: Vec<IndexRecord>,
    transform: Option<Transform>,
    target_transform: Option<TargetTransform>,
}

impl Debug for GtsrbDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GtsrbDataset")
            .field("root", &self.root)
            .field("records", &self.records.len())
            .field("transform", &self.transform)
            .finish()
    }
}

impl GtsrbDataset {
    pub fn load(
        root: impl AsRef<Path>,
        index_file: impl AsRef<Path>,
        transform: Option<Transform>,
    ) -> Result<Self> {
        let root = root.as_ref().to_owned();
        let records = load_index_file(index_file)?;

        Ok(Self {
            root,
            records,
            transform,
            target_transform: None,
        })
    }

    pub fn with_target_transform(mut self, target_transform: TargetTransform) -> Self {
        self.target_transform = Some(target_transform);
        self
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }
}

impl RandomAccessDataset for GtsrbDataset {
    fn num_records(&self) -> usize {
        self.records.len()
    }

    fn nth(&self, index: usize) -> Result<(Tensor, i64)> {
        let record = self
            .records
            .get(index)
            .ok_or_else(|| format_err!("record index {} out of range", index))?;
        let image_file = self.root.join(&record.path);

        let pixels = decode_bgr(&image_file)?;
        let cropped = crop_to_box(&pixels, record)
            .with_context(|| format!("malformed record for '{}'", image_file.display()))?;
        let rgb = reverse_channels(&cropped);

        let image = match &self.transform {
            Some(transform) => transform.apply(&rgb)?,
            None => raw_tensor(&rgb)?,
        };

        let target = record.class_id;
        let target = match &self.target_transform {
            Some(target_transform) => target_transform(target),
            None => target,
        };

        Ok((image, target))
    }
}

/// Decode an image file into an HWC pixel buffer in the dataset's
/// on-disk (BGR) channel convention.
pub fn decode_bgr(path: &Path) -> Result<Array3<u8>> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image file '{}'", path.display()))?
        .to_bgr8();
    let (width, height) = image.dimensions();
    let pixels = Array3::from_shape_vec((height as usize, width as usize, 3), image.into_raw())?;
    Ok(pixels)
}

/// Crop an HWC buffer to the bounding box of a record.
pub fn crop_to_box(pixels: &Array3<u8>, record: &IndexRecord) -> Result<Array3<u8>> {
    let (rows, cols, _channels) = pixels.dim();
    let IndexRecord { x1, y1, x2, y2, .. } = *record;
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize, y2 as usize);

    ensure!(
        x1 < x2 && y1 < y2 && y2 <= rows && x2 <= cols,
        "bounding box ({}, {}, {}, {}) exceeds image bounds {}x{}",
        x1,
        y1,
        x2,
        y2,
        cols,
        rows
    );

    Ok(pixels.slice(s![y1..y2, x1..x2, ..]).to_owned())
}

/// Reverse the channel order of an HWC buffer (BGR to RGB).
pub fn reverse_channels(pixels: &Array3<u8>) -> Array3<u8> {
    pixels.slice(s![.., .., ..;-1]).to_owned()
}

/// An untransformed HWC u8 tensor over the pixel buffer.
fn raw_tensor(pixels: &Array3<u8>) -> Result<Tensor> {
    let (rows, cols, channels) = pixels.dim();
    let pixels = pixels.as_standard_layout();
    let data = pixels
        .as_slice()
        .ok_or_else(|| format_err!("non-contiguous pixel buffer"))?;
    Ok(Tensor::of_slice(data).view([rows as i64, cols as i64, channels as i64]))
}
