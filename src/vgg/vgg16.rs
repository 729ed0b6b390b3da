use core::f64::consts::SQRT_2;

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Initializer, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Device, Tensor},
};

use crate::transfer::FeatureStage;

/// VGG16 classifier, used as the weight source for the FCN.
/// Derived from [torchvision.models.vgg.VGG](https://github.com/pytorch/vision/blob/main/torchvision/models/vgg.py)
#[derive(Module, Debug)]
pub struct Vgg16<B: Backend> {
    conv1_1: Conv2d<B>,
    conv1_2: Conv2d<B>,
    conv2_1: Conv2d<B>,
    conv2_2: Conv2d<B>,
    conv3_1: Conv2d<B>,
    conv3_2: Conv2d<B>,
    conv3_3: Conv2d<B>,
    conv4_1: Conv2d<B>,
    conv4_2: Conv2d<B>,
    conv4_3: Conv2d<B>,
    conv5_1: Conv2d<B>,
    conv5_2: Conv2d<B>,
    conv5_3: Conv2d<B>,
    relu: Relu,
    maxpool: MaxPool2d,
    avgpool: AdaptiveAvgPool2d,
    fc6: Linear<B>,
    fc7: Linear<B>,
    fc8: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> Vgg16<B> {
    /// Classification logits of shape `[batch, num_classes]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let h = self.relu.forward(self.conv1_1.forward(x));
        let h = self.relu.forward(self.conv1_2.forward(h));
        let h = self.maxpool.forward(h);

        let h = self.relu.forward(self.conv2_1.forward(h));
        let h = self.relu.forward(self.conv2_2.forward(h));
        let h = self.maxpool.forward(h);

        let h = self.relu.forward(self.conv3_1.forward(h));
        let h = self.relu.forward(self.conv3_2.forward(h));
        let h = self.relu.forward(self.conv3_3.forward(h));
        let h = self.maxpool.forward(h);

        let h = self.relu.forward(self.conv4_1.forward(h));
        let h = self.relu.forward(self.conv4_2.forward(h));
        let h = self.relu.forward(self.conv4_3.forward(h));
        let h = self.maxpool.forward(h);

        let h = self.relu.forward(self.conv5_1.forward(h));
        let h = self.relu.forward(self.conv5_2.forward(h));
        let h = self.relu.forward(self.conv5_3.forward(h));
        let h = self.maxpool.forward(h);

        let h = self.avgpool.forward(h);
        let h: Tensor<B, 2> = h.flatten(1, 3);

        let h = self.relu.forward(self.fc6.forward(h));
        let h = self.dropout.forward(h);
        let h = self.relu.forward(self.fc7.forward(h));
        let h = self.dropout.forward(h);
        self.fc8.forward(h)
    }

    /// The feature stack as an ordered stage sequence.
    ///
    /// Same stage-for-stage pattern as the FCN's, so the two can be walked
    /// in lock-step during the weight transfer.
    pub fn feature_stages(&self) -> Vec<FeatureStage<'_, B>> {
        vec![
            FeatureStage::Conv(&self.conv1_1),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv1_2),
            FeatureStage::Activation,
            FeatureStage::Pool,
            FeatureStage::Conv(&self.conv2_1),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv2_2),
            FeatureStage::Activation,
            FeatureStage::Pool,
            FeatureStage::Conv(&self.conv3_1),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv3_2),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv3_3),
            FeatureStage::Activation,
            FeatureStage::Pool,
            FeatureStage::Conv(&self.conv4_1),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv4_2),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv4_3),
            FeatureStage::Activation,
            FeatureStage::Pool,
            FeatureStage::Conv(&self.conv5_1),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv5_2),
            FeatureStage::Activation,
            FeatureStage::Conv(&self.conv5_3),
            FeatureStage::Activation,
            FeatureStage::Pool,
        ]
    }

    /// First hidden classifier layer, `Linear(512 * 7 * 7, 4096)`.
    pub fn fc6(&self) -> &Linear<B> {
        &self.fc6
    }

    /// Second hidden classifier layer, `Linear(4096, 4096)`.
    pub fn fc7(&self) -> &Linear<B> {
        &self.fc7
    }
}

/// [Vgg16](Vgg16) configuration.
#[derive(Config, Debug)]
pub struct Vgg16Config {
    /// Number of classification classes.
    #[config(default = 1000)]
    pub num_classes: usize,
    /// Dropout probability in the classifier.
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl Vgg16Config {
    /// Initialize a new [Vgg16](Vgg16) module.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Vgg16<B> {
        // Conv initializer
        let initializer = Initializer::KaimingNormal {
            gain: SQRT_2, // recommended value for ReLU
            fan_out_only: true,
        };
        let conv3x3 = |channels: [usize; 2]| {
            Conv2dConfig::new(channels, [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .with_initializer(initializer.clone())
                .init(device)
        };

        Vgg16 {
            conv1_1: conv3x3([3, 64]),
            conv1_2: conv3x3([64, 64]),
            conv2_1: conv3x3([64, 128]),
            conv2_2: conv3x3([128, 128]),
            conv3_1: conv3x3([128, 256]),
            conv3_2: conv3x3([256, 256]),
            conv3_3: conv3x3([256, 256]),
            conv4_1: conv3x3([256, 512]),
            conv4_2: conv3x3([512, 512]),
            conv4_3: conv3x3([512, 512]),
            conv5_1: conv3x3([512, 512]),
            conv5_2: conv3x3([512, 512]),
            conv5_3: conv3x3([512, 512]),
            relu: Relu::new(),
            // 2x2 maxpool, /2 (floor mode, unlike the FCN's ceil pooling)
            maxpool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            // [B, 512, H, W] -> [B, 512, 7, 7]
            avgpool: AdaptiveAvgPool2dConfig::new([7, 7]).init(),
            fc6: LinearConfig::new(512 * 7 * 7, 4096).init(device),
            fc7: LinearConfig::new(4096, 4096).init(device),
            fc8: LinearConfig::new(4096, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    #[test]
    fn forward_produces_classification_logits() {
        let device = Default::default();
        let model = Vgg16Config::new()
            .with_num_classes(10)
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);
        let y = model.forward(x);
        assert_eq!(y.dims(), [2, 10]);
    }

    #[test]
    fn classifier_dimensions_match_the_flattened_features() {
        let device = Default::default();
        let model = Vgg16Config::new().init::<TestBackend>(&device);
        assert_eq!(model.fc6().weight.dims(), [512 * 7 * 7, 4096]);
        assert_eq!(model.fc7().weight.dims(), [4096, 4096]);
    }
}
