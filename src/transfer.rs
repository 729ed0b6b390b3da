use burn::{
    nn::{conv::Conv2d, Linear},
    tensor::backend::Backend,
};

/// Read-only view of one stage in a feature sequence.
///
/// Both the FCN and the VGG16 source expose their feature stacks as an
/// ordered list of these, so the transfer can walk the two sequences in
/// lock-step and dispatch on the stage kind instead of inspecting layer
/// types.
pub enum FeatureStage<'a, B: Backend> {
    Conv(&'a Conv2d<B>),
    Activation,
    Pool,
}

/// Mutable counterpart of [`FeatureStage`] for the destination network.
pub enum FeatureStageMut<'a, B: Backend> {
    Conv(&'a mut Conv2d<B>),
    Activation,
    Pool,
}

impl<B: Backend> FeatureStage<'_, B> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Conv(_) => "conv",
            Self::Activation => "activation",
            Self::Pool => "pool",
        }
    }
}

/// Copy convolution weights and biases between two matching feature
/// sequences.
///
/// The sequences must have the same length and the same stage-kind pattern,
/// and every aligned convolution pair must have identical weight and bias
/// shapes. Values are deep-copied; the source is never aliased.
pub fn copy_feature_params<B: Backend>(
    src: &[FeatureStage<'_, B>],
    dst: Vec<FeatureStageMut<'_, B>>,
) {
    assert_eq!(
        src.len(),
        dst.len(),
        "Feature sequences differ in length: {} vs {}",
        src.len(),
        dst.len()
    );

    for (position, (from, to)) in src.iter().zip(dst).enumerate() {
        match (from, to) {
            (FeatureStage::Conv(from), FeatureStageMut::Conv(to)) => {
                assert_eq!(
                    from.weight.dims(),
                    to.weight.dims(),
                    "Convolution weight shape mismatch at feature stage {position}"
                );
                to.weight = to.weight.clone().map(|_| from.weight.val());

                match (&from.bias, &mut to.bias) {
                    (Some(from_bias), Some(to_bias)) => {
                        assert_eq!(
                            from_bias.dims(),
                            to_bias.dims(),
                            "Convolution bias shape mismatch at feature stage {position}"
                        );
                        *to_bias = to_bias.clone().map(|_| from_bias.val());
                    }
                    (None, None) => {}
                    _ => panic!("Convolution bias presence mismatch at feature stage {position}"),
                }
            }
            (FeatureStage::Activation, FeatureStageMut::Activation) => {}
            (FeatureStage::Pool, FeatureStageMut::Pool) => {}
            (from, FeatureStageMut::Conv(_)) => {
                panic!(
                    "Feature stage kind mismatch at position {position}: source is {}, destination is conv",
                    from.kind()
                )
            }
            (from, _) => {
                panic!(
                    "Feature stage kind mismatch at position {position}: source is {}",
                    from.kind()
                )
            }
        }
    }
}

/// Reshape a fully-connected layer's parameters into a convolution.
///
/// The flattened weight's trailing dimension must correspond to
/// `in_channels * kernel_h * kernel_w` in row-major order for the reshape to
/// be meaningful. burn stores [`Linear`] weights as `(d_input, d_output)`, so
/// the matrix is transposed back to the row-major `(d_output, d_input)`
/// layout before reshaping into the `(out, in, kh, kw)` kernel.
pub fn conv_from_linear<B: Backend>(linear: &Linear<B>, mut conv: Conv2d<B>) -> Conv2d<B> {
    let [out_channels, in_channels, kernel_h, kernel_w] = conv.weight.dims();
    let [d_input, d_output] = linear.weight.dims();
    assert_eq!(
        d_output, out_channels,
        "Linear output features ({d_output}) do not match convolution output channels ({out_channels})"
    );
    assert_eq!(
        d_input,
        in_channels * kernel_h * kernel_w,
        "Linear input features ({d_input}) do not match the convolution kernel volume ({in_channels}x{kernel_h}x{kernel_w})"
    );

    let kernel = linear
        .weight
        .val()
        .transpose()
        .reshape([out_channels, in_channels, kernel_h, kernel_w]);
    conv.weight = conv.weight.map(|_| kernel.clone());

    match (&linear.bias, &mut conv.bias) {
        (Some(from_bias), Some(to_bias)) => {
            assert_eq!(
                from_bias.dims(),
                to_bias.dims(),
                "Linear bias length does not match convolution output channels"
            );
            *to_bias = to_bias.clone().map(|_| from_bias.val());
        }
        (None, None) => {}
        _ => panic!("Bias presence mismatch between linear and convolution layers"),
    }

    conv
}

#[cfg(test)]
mod tests {
    use burn::{
        nn::{
            conv::Conv2dConfig,
            LinearConfig, PaddingConfig2d,
        },
        tensor::{Data, Shape, Tensor},
    };

    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;
    type Device = <TestBackend as Backend>::Device;

    fn conv(
        channels: [usize; 2],
        kernel: usize,
        device: &Device,
    ) -> Conv2d<TestBackend> {
        Conv2dConfig::new(channels, [kernel, kernel])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device)
    }

    fn filled(conv: Conv2d<TestBackend>, value: f32) -> Conv2d<TestBackend> {
        let mut conv = conv;
        conv.weight = conv.weight.map(|w| w.ones_like() * value);
        conv.bias = conv.bias.map(|b| b.map(|b| b.ones_like() * value));
        conv
    }

    #[test]
    fn lock_step_copy_is_bit_exact() {
        let device = Default::default();
        let src_a = filled(conv([3, 4], 3, &device), 1.5);
        let src_b = filled(conv([4, 4], 3, &device), -2.0);
        let mut dst_a = filled(conv([3, 4], 3, &device), 0.0);
        let mut dst_b = filled(conv([4, 4], 3, &device), 0.0);

        copy_feature_params(
            &[
                FeatureStage::Conv(&src_a),
                FeatureStage::Activation,
                FeatureStage::Conv(&src_b),
                FeatureStage::Activation,
                FeatureStage::Pool,
            ],
            vec![
                FeatureStageMut::Conv(&mut dst_a),
                FeatureStageMut::Activation,
                FeatureStageMut::Conv(&mut dst_b),
                FeatureStageMut::Activation,
                FeatureStageMut::Pool,
            ],
        );

        assert_eq!(src_a.weight.to_data().value, dst_a.weight.to_data().value);
        assert_eq!(src_b.weight.to_data().value, dst_b.weight.to_data().value);
        assert_eq!(
            src_a.bias.as_ref().unwrap().to_data().value,
            dst_a.bias.as_ref().unwrap().to_data().value
        );
        assert_eq!(
            src_b.bias.as_ref().unwrap().to_data().value,
            dst_b.bias.as_ref().unwrap().to_data().value
        );
    }

    #[test]
    #[should_panic(expected = "kind mismatch")]
    fn kind_mismatch_panics() {
        let device = Default::default();
        let src = conv([3, 4], 3, &device);

        copy_feature_params::<TestBackend>(
            &[FeatureStage::Conv(&src)],
            vec![FeatureStageMut::Pool],
        );
    }

    #[test]
    #[should_panic(expected = "weight shape mismatch")]
    fn shape_mismatch_panics() {
        let device = Default::default();
        let src = conv([3, 4], 3, &device);
        let mut dst = conv([3, 8], 3, &device);

        copy_feature_params(
            &[FeatureStage::Conv(&src)],
            vec![FeatureStageMut::Conv(&mut dst)],
        );
    }

    #[test]
    #[should_panic(expected = "differ in length")]
    fn length_mismatch_panics() {
        copy_feature_params::<TestBackend>(&[FeatureStage::Pool], vec![]);
    }

    #[test]
    fn linear_reshape_follows_row_major_order() {
        let device: Device = Default::default();
        // 3 output features, 2x2x2 kernel volume.
        let mut linear = LinearConfig::new(8, 3).init::<TestBackend>(&device);
        let values: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let row_major = Tensor::<TestBackend, 2>::from_data(
            Data::new(values.clone(), Shape::new([3, 8])).convert(),
            &device,
        );
        // burn keeps Linear weights as (d_input, d_output).
        linear.weight = linear.weight.map(|_| row_major.clone().transpose());

        let conv = Conv2dConfig::new([2, 3], [2, 2]).init(&device);
        let conv = conv_from_linear(&linear, conv);

        assert_eq!(conv.weight.dims(), [3, 2, 2, 2]);
        assert_eq!(conv.weight.to_data().value, values);

        // Flattening back in row-major order reproduces the matrix.
        let flattened = conv.weight.val().reshape([3, 8]);
        assert_eq!(flattened.to_data().value, row_major.to_data().value);
    }

    #[test]
    #[should_panic(expected = "output channels")]
    fn linear_output_mismatch_panics() {
        let device: Device = Default::default();
        let linear = LinearConfig::new(8, 5).init::<TestBackend>(&device);
        let conv = Conv2dConfig::new([2, 3], [2, 2]).init(&device);
        conv_from_linear(&linear, conv);
    }

    #[test]
    #[should_panic(expected = "kernel volume")]
    fn linear_input_mismatch_panics() {
        let device: Device = Default::default();
        let linear = LinearConfig::new(10, 3).init::<TestBackend>(&device);
        let conv = Conv2dConfig::new([2, 3], [2, 2]).init(&device);
        conv_from_linear(&linear, conv);
    }
}
