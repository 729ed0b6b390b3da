use burn::tensor::{backend::Backend, Data, Device, Shape, Tensor};

/// Build the weight tensor of a bilinear upsampling transpose convolution.
///
/// The kernel is the outer product of two 1-D triangular profiles centered on
/// the kernel, written into every diagonal (input channel == output channel)
/// slice of the `[channels_in, channels_out, k, k]` weight. Cross-channel
/// slices stay zero, so each output channel is purely an upsampled version of
/// the same-indexed input channel.
///
/// The result is fully determined by the kernel size; there is no random
/// component.
pub fn bilinear_kernel<B: Backend>(
    channels_in: usize,
    channels_out: usize,
    kernel_size: [usize; 2],
    device: &Device<B>,
) -> Tensor<B, 4> {
    let [height, width] = kernel_size;
    assert_eq!(
        height, width,
        "Bilinear upsampling requires a square kernel, got {height}x{width}"
    );
    let k = height;

    let factor = (k + 1) / 2;
    let center = if k % 2 == 1 {
        (factor - 1) as f32
    } else {
        factor as f32 - 0.5
    };
    let profile: Vec<f32> = (0..k)
        .map(|i| 1.0 - (i as f32 - center).abs() / factor as f32)
        .collect();

    let mut weight = vec![0.0f32; channels_in * channels_out * k * k];
    for channel in 0..channels_in.min(channels_out) {
        let base = (channel * channels_out + channel) * k * k;
        for i in 0..k {
            for j in 0..k {
                weight[base + i * k + j] = profile[i] * profile[j];
            }
        }
    }

    let data = Data::new(weight, Shape::new([channels_in, channels_out, k, k]));
    Tensor::from_data(data.convert(), device)
}

#[cfg(test)]
mod tests {
    use burn::nn::conv::ConvTranspose2dConfig;

    use super::*;

    type TestBackend = burn::backend::NdArray<f32>;

    fn kernel_values(channels: usize, k: usize) -> Vec<f32> {
        let device = Default::default();
        bilinear_kernel::<TestBackend>(channels, channels, [k, k], &device)
            .to_data()
            .value
    }

    #[test]
    fn odd_kernel_is_centered_triangle() {
        let values = kernel_values(1, 3);
        let expected = [0.25, 0.5, 0.25, 0.5, 1.0, 0.5, 0.25, 0.5, 0.25];
        for (value, expected) in values.iter().zip(expected) {
            assert!((value - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn even_kernel_centers_between_taps() {
        // factor = 2, center = 1.5 -> profile [0.25, 0.75, 0.75, 0.25]
        let values = kernel_values(1, 4);
        let profile = [0.25f32, 0.75, 0.75, 0.25];
        for i in 0..4 {
            for j in 0..4 {
                assert!((values[i * 4 + j] - profile[i] * profile[j]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn filter_is_separable_and_symmetric() {
        let k = 64;
        let values = kernel_values(1, k);
        let profile: Vec<f32> = (0..k).map(|i| values[i * k + k / 2] / values[(k / 2) * k + k / 2]).collect();
        let peak = values[(k / 2) * k + k / 2];
        for i in 0..k {
            // Symmetric around the center.
            assert!((profile[i] - profile[k - 1 - i]).abs() < 1e-5);
            for j in 0..k {
                // F[i][j] = row[i] * row[j], up to the peak normalization.
                let expected = profile[i] * profile[j] * peak;
                assert!((values[i * k + j] - expected).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn default_kernel_sums_to_squared_factor() {
        // kernel 64 -> factor 32; exact 32x upsampling of a unit impulse
        // distributes a total mass of factor^2.
        let k = 64;
        let sum: f32 = kernel_values(1, k).iter().sum();
        assert!((sum - 1024.0).abs() < 1e-2);
    }

    #[test]
    fn cross_channel_slices_are_zero() {
        let channels = 3;
        let k = 8;
        let values = kernel_values(channels, k);
        for c_in in 0..channels {
            for c_out in 0..channels {
                let slice = &values[(c_in * channels + c_out) * k * k..][..k * k];
                if c_in == c_out {
                    assert!(slice.iter().any(|v| *v != 0.0));
                } else {
                    assert!(slice.iter().all(|v| *v == 0.0));
                }
            }
        }
    }

    #[test]
    fn impulse_upsamples_to_the_kernel() {
        let device = Default::default();
        let mut conv = ConvTranspose2dConfig::new([1, 1], [4, 4])
            .with_stride([2, 2])
            .with_bias(false)
            .init::<TestBackend>(&device);
        let kernel = bilinear_kernel::<TestBackend>(1, 1, [4, 4], &device);
        conv.weight = conv.weight.map(|_| kernel.clone());

        let impulse = Tensor::<TestBackend, 4>::ones([1, 1, 1, 1], &device);
        let output = conv.forward(impulse);

        assert_eq!(output.dims(), [1, 1, 4, 4]);
        assert_eq!(output.to_data().value, kernel.to_data().value);
    }

    #[test]
    #[should_panic(expected = "square kernel")]
    fn non_square_kernel_panics() {
        let device = Default::default();
        bilinear_kernel::<TestBackend>(1, 1, [4, 3], &device);
    }
}
