use crate::common::*;

/// Inverted residual settings: expansion factor, output channels,
/// repeats, first stride.
const BLOCK_SETTINGS: [(i64, i64, i64, i64); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

const HEAD_CHANNELS: i64 = 1280;

/// The MobileNetV2 classifier configuration.
#[derive(Debug, Clone)]
pub struct MobileNetV2Init {
    pub input_channels: usize,
    pub num_classes: usize,
    pub dropout: f64,
}

impl Default for MobileNetV2Init {
    fn default() -> Self {
        Self {
            input_channels: 3,
            num_classes: 1000,
            dropout: 0.2,
        }
    }
}

impl MobileNetV2Init {
    pub fn build<'p, P>(self, path: P) -> MobileNetV2
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            input_channels,
            num_classes,
            dropout,
        } = self;

        let stem = ConvBnInit {
            in_c: input_channels as i64,
            out_c: 32,
            k: 3,
            s: 2,
            g: 1,
            relu6: true,
        }
        .build(path / "stem");

        let mut blocks = vec![];
        let mut in_c = 32;
        for (expand_ratio, out_c, repeats, first_stride) in BLOCK_SETTINGS {
            for repeat in 0..repeats {
                let stride = if repeat == 0 { first_stride } else { 1 };
                let index = blocks.len();
                blocks.push(inverted_residual(
                    path / format!("block_{}", index),
                    in_c,
                    out_c,
                    stride,
                    expand_ratio,
                ));
                in_c = out_c;
            }
        }

        let head = ConvBnInit {
            in_c,
            out_c: HEAD_CHANNELS,
            k: 1,
            s: 1,
            g: 1,
            relu6: true,
        }
        .build(path / "head");

        let classifier = nn::linear(
            path / "classifier",
            HEAD_CHANNELS,
            num_classes as i64,
            Default::default(),
        );

        MobileNetV2 {
            stem,
            blocks,
            head,
            dropout,
            classifier,
        }
    }
}

/// The MobileNetV2 backbone with a classification head.
#[derive(Debug)]
pub struct MobileNetV2 {
    stem: ConvBn,
    blocks: Vec<InvertedResidual>,
    head: ConvBn,
    dropout: f64,
    classifier: nn::Linear,
}

impl nn::ModuleT for MobileNetV2 {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let xs = self.stem.forward_t(xs, train);
        let xs = self
            .blocks
            .iter()
            .fold(xs, |xs, block| block.forward_t(&xs, train));
        self.head
            .forward_t(&xs, train)
            .adaptive_avg_pool2d(&[1, 1])
            .flatten(1, -1)
            .dropout(self.dropout, train)
            .apply(&self.classifier)
    }
}

#[derive(Debug, Clone)]
struct ConvBnInit {
    in_c: i64,
    out_c: i64,
    k: i64,
    s: i64,
    g: i64,
    relu6: bool,
}

impl ConvBnInit {
    fn build<'p, P>(self, path: P) -> ConvBn
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            in_c,
            out_c,
            k,
            s,
            g,
            relu6,
        } = self;

        let conv = nn::conv2d(
            path / "conv",
            in_c,
            out_c,
            k,
            nn::ConvConfig {
                stride: s,
                padding: k / 2,
                groups: g,
                bias: false,
                ..Default::default()
            },
        );
        let bn = nn::batch_norm2d(path / "bn", out_c, Default::default());

        ConvBn { conv, bn, relu6 }
    }
}

#[derive(Debug)]
struct ConvBn {
    conv: nn::Conv2D,
    bn: nn::BatchNorm,
    relu6: bool,
}

impl nn::ModuleT for ConvBn {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let xs = xs.apply(&self.conv).apply_t(&self.bn, train);
        if self.relu6 {
            xs.clamp(0.0, 6.0)
        } else {
            xs
        }
    }
}

#[derive(Debug)]
struct InvertedResidual {
    expand: Option<ConvBn>,
    depthwise: ConvBn,
    project: ConvBn,
    skip: bool,
}

fn inverted_residual<'p, P>(
    path: P,
    in_c: i64,
    out_c: i64,
    stride: i64,
    expand_ratio: i64,
) -> InvertedResidual
where
    P: Borrow<nn::Path<'p>>,
{
    let path = path.borrow();
    let hidden = in_c * expand_ratio;

    let expand = (expand_ratio != 1).then(|| {
        ConvBnInit {
            in_c,
            out_c: hidden,
            k: 1,
            s: 1,
            g: 1,
            relu6: true,
        }
        .build(path / "expand")
    });
    let depthwise = ConvBnInit {
        in_c: hidden,
        out_c: hidden,
        k: 3,
        s: stride,
        g: hidden,
        relu6: true,
    }
    .build(path / "depthwise");
    let project = ConvBnInit {
        in_c: hidden,
        out_c,
        k: 1,
        s: 1,
        g: 1,
        relu6: false,
    }
    .build(path / "project");

    InvertedResidual {
        expand,
        depthwise,
        project,
        skip: stride == 1 && in_c == out_c,
    }
}

impl nn::ModuleT for InvertedResidual {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        let ys = match &self.expand {
            Some(expand) => expand.forward_t(xs, train),
            None => xs.shallow_clone(),
        };
        let ys = self.depthwise.forward_t(&ys, train);
        let ys = self.project.forward_t(&ys, train);

        if self.skip {
            xs + ys
        } else {
            ys
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_shape() {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = MobileNetV2Init {
            num_classes: 43,
            ..Default::default()
        }
        .build(&vs.root());

        let input = Tensor::zeros(&[2, 3, 32, 32], (Kind::Float, Device::Cpu));
        let output = model.forward_t(&input, false);
        assert_eq!(output.size(), &[2, 43]);
    }

    #[test]
    fn eval_mode_is_deterministic() {
        let vs = nn::VarStore::new(Device::Cpu);
        let model = MobileNetV2Init {
            num_classes: 5,
            ..Default::default()
        }
        .build(&vs.root());

        let input = Tensor::rand(&[1, 3, 32, 32], (Kind::Float, Device::Cpu));
        let eval_a = model.forward_t(&input, false);
        let eval_b = model.forward_t(&input, false);
        assert_eq!(eval_a, eval_b);
    }
}
