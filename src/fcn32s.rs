use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
        Dropout, DropoutConfig, Initializer, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Device, Tensor},
};

use crate::pool::MaxPool2dCeil;
use crate::transfer::{conv_from_linear, copy_feature_params, FeatureStage, FeatureStageMut};
use crate::upsample::bilinear_kernel;
use crate::vgg::Vgg16;

/// Zero padding applied to the very first convolution.
///
/// Gives the network enough margin that the 7x7 `fc6` stage and the 64-wide
/// upsampling kernel stay valid for arbitrarily small inputs; the surplus is
/// cropped away at the end of the forward pass.
pub const CONTEXT_PADDING: usize = 100;

/// Kernel size of the learned upsampling transpose convolution.
pub const UPSCORE_KERNEL: usize = 64;

/// Stride of the upsampling transpose convolution, undoing the five
/// stride-2 pooling stages.
pub const UPSCORE_STRIDE: usize = 32;

/// Crop offset of the valid region in the upsampled output.
///
/// Tracking receptive-field centers through the stack: `conv1_1` shifts the
/// origin by `CONTEXT_PADDING - 1 = 99` input pixels, the five pools compose
/// to `x -> 32x + 15.5`, and `fc6`'s 7-tap window recenters by 3 coarse
/// steps, so feature cell `i` sits at input coordinate `32i + 12.5`. The
/// even 64-wide stride-32 transpose kernel centers output pixel `u` at
/// coarse coordinate `(u - 31.5) / 32`, i.e. input coordinate `u - 19`.
/// Cropping at 19 therefore makes output pixel `u` coincide with input
/// pixel `u`. An off-by-one here shifts the segmentation map without any
/// shape error, which is why the constant is derived rather than tuned.
pub const CROP_OFFSET: usize = 19;

/// VGG16-backed FCN32s for semantic segmentation.
/// Derived from [fcn.berkeleyvision.org](https://github.com/shelhamer/fcn.berkeleyvision.org)
#[derive(Module, Debug)]
pub struct Fcn32s<B: Backend> {
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
    pool: MaxPool2dCeil,
    fc6: Conv2d<B>,
    fc7: Conv2d<B>,
    dropout: Dropout,
    score_fr: Conv2d<B>,
    upscore: ConvTranspose2d<B>,
}

impl<B: Backend> Fcn32s<B> {
    /// Dense per-pixel class scores for a `[batch, 3, height, width]` input.
    ///
    /// The output spatial size always equals the input's: the context
    /// padding and the upsampling surplus are cropped away at
    /// [`CROP_OFFSET`].
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, _, height, width] = x.dims();

        let h = self.relu.forward(self.conv1_1.forward(x));
        let h = self.relu.forward(self.conv1_2.forward(h));
        let h = self.pool.forward(h);

        let h = self.relu.forward(self.conv2_1.forward(h));
        let h = self.relu.forward(self.conv2_2.forward(h));
        let h = self.pool.forward(h);

        let h = self.relu.forward(self.conv3_1.forward(h));
        let h = self.relu.forward(self.conv3_2.forward(h));
        let h = self.relu.forward(self.conv3_3.forward(h));
        let h = self.pool.forward(h);

        let h = self.relu.forward(self.conv4_1.forward(h));
        let h = self.relu.forward(self.conv4_2.forward(h));
        let h = self.relu.forward(self.conv4_3.forward(h));
        let h = self.pool.forward(h);

        let h = self.relu.forward(self.conv5_1.forward(h));
        let h = self.relu.forward(self.conv5_2.forward(h));
        let h = self.relu.forward(self.conv5_3.forward(h));
        let h = self.pool.forward(h);

        let h = self.relu.forward(self.fc6.forward(h));
        let h = self.dropout.forward(h);

        let h = self.relu.forward(self.fc7.forward(h));
        let h = self.dropout.forward(h);

        let h = self.score_fr.forward(h);
        let h = self.upscore.forward(h);

        let [_, classes, _, _] = h.dims();
        h.slice([
            0..batch,
            0..classes,
            CROP_OFFSET..CROP_OFFSET + height,
            CROP_OFFSET..CROP_OFFSET + width,
        ])
    }

    /// Overwrite this network's parameters with a pretrained VGG16's.
    ///
    /// The thirteen feature convolutions are deep-copied pairwise, and the
    /// classifier's two hidden fully-connected layers are reshaped into the
    /// `fc6`/`fc7` kernels. `score_fr` and `upscore` are left untouched.
    /// Calling this again simply overwrites again.
    pub fn copy_params_from_vgg16(mut self, vgg16: &Vgg16<B>) -> Self {
        copy_feature_params(&vgg16.feature_stages(), self.feature_stages_mut());
        self.fc6 = conv_from_linear(vgg16.fc6(), self.fc6);
        self.fc7 = conv_from_linear(vgg16.fc7(), self.fc7);
        self
    }

    /// The feature stack as an ordered stage sequence, mirroring the
    /// classifier's layout stage for stage.
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

    fn feature_stages_mut(&mut self) -> Vec<FeatureStageMut<'_, B>> {
        vec![
            FeatureStageMut::Conv(&mut self.conv1_1),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv1_2),
            FeatureStageMut::Activation,
            FeatureStageMut::Pool,
            FeatureStageMut::Conv(&mut self.conv2_1),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv2_2),
            FeatureStageMut::Activation,
            FeatureStageMut::Pool,
            FeatureStageMut::Conv(&mut self.conv3_1),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv3_2),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv3_3),
            FeatureStageMut::Activation,
            FeatureStageMut::Pool,
            FeatureStageMut::Conv(&mut self.conv4_1),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv4_2),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv4_3),
            FeatureStageMut::Activation,
            FeatureStageMut::Pool,
            FeatureStageMut::Conv(&mut self.conv5_1),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv5_2),
            FeatureStageMut::Activation,
            FeatureStageMut::Conv(&mut self.conv5_3),
            FeatureStageMut::Activation,
            FeatureStageMut::Pool,
        ]
    }

    pub fn score_fr(&self) -> &Conv2d<B> {
        &self.score_fr
    }

    pub fn upscore(&self) -> &ConvTranspose2d<B> {
        &self.upscore
    }

    pub fn fc6(&self) -> &Conv2d<B> {
        &self.fc6
    }

    pub fn fc7(&self) -> &Conv2d<B> {
        &self.fc7
    }
}

/// [Fcn32s](Fcn32s) configuration.
#[derive(Config, Debug)]
pub struct Fcn32sConfig {
    /// Number of segmentation classes.
    #[config(default = 21)]
    pub num_classes: usize,
    /// Dropout probability after `fc6` and `fc7`.
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl Fcn32sConfig {
    /// Initialize a new [Fcn32s](Fcn32s) module.
    ///
    /// Every standard convolution starts with zero weights and biases; the
    /// upsampling transpose convolution starts as a fixed bilinear kernel
    /// and carries no bias.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> Fcn32s<B> {
        let conv3x3 = |channels: [usize; 2], padding: usize| {
            Conv2dConfig::new(channels, [3, 3])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_initializer(Initializer::Zeros)
                .init(device)
        };

        let mut upscore =
            ConvTranspose2dConfig::new([self.num_classes, self.num_classes], [UPSCORE_KERNEL; 2])
                .with_stride([UPSCORE_STRIDE; 2])
                .with_bias(false)
                .init(device);
        let kernel = bilinear_kernel(
            self.num_classes,
            self.num_classes,
            [UPSCORE_KERNEL; 2],
            device,
        );
        upscore.weight = upscore.weight.map(|_| kernel.clone());

        Fcn32s {
            conv1_1: conv3x3([3, 64], CONTEXT_PADDING),
            conv1_2: conv3x3([64, 64], 1),
            conv2_1: conv3x3([64, 128], 1),
            conv2_2: conv3x3([128, 128], 1),
            conv3_1: conv3x3([128, 256], 1),
            conv3_2: conv3x3([256, 256], 1),
            conv3_3: conv3x3([256, 256], 1),
            conv4_1: conv3x3([256, 512], 1),
            conv4_2: conv3x3([512, 512], 1),
            conv4_3: conv3x3([512, 512], 1),
            conv5_1: conv3x3([512, 512], 1),
            conv5_2: conv3x3([512, 512], 1),
            conv5_3: conv3x3([512, 512], 1),
            relu: Relu::new(),
            pool: MaxPool2dCeil::new(),
            fc6: Conv2dConfig::new([512, 4096], [7, 7])
                .with_initializer(Initializer::Zeros)
                .init(device),
            fc7: Conv2dConfig::new([4096, 4096], [1, 1])
                .with_initializer(Initializer::Zeros)
                .init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            score_fr: Conv2dConfig::new([4096, self.num_classes], [1, 1])
                .with_initializer(Initializer::Zeros)
                .init(device),
            upscore,
        }
    }
}

#[cfg(feature = "pretrained")]
impl Fcn32sConfig {
    /// Initialize a new [Fcn32s](Fcn32s) and transplant the parameters of a
    /// VGG16 classifier into it, downloading pretrained weights when the
    /// preset calls for them.
    pub fn init_with_vgg16<B: Backend>(
        &self,
        weights: crate::vgg::Vgg16Weights,
        device: &Device<B>,
    ) -> Result<Fcn32s<B>, burn::record::RecorderError> {
        let vgg16 = weights.load(device)?;
        Ok(self.init(device).copy_params_from_vgg16(&vgg16))
    }
}
