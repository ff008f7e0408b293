use super::Activation;
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration to create a [frame layer](FrameLayer) using the
/// [init function](FrameLayerConfig::init).
#[derive(Config, Debug)]
pub struct FrameLayerConfig {
    /// The number of input channels.
    pub channels_in: usize,
    /// The number of filters, i.e. output channels.
    pub filters: usize,
    /// The size of the kernel along the time axis.
    pub kernel_size: usize,
    /// The stride along the time axis.
    #[config(default = "1")]
    pub stride: usize,
    /// The activation applied after the convolution.
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
}

/// Causal temporal convolution followed by an activation.
///
/// The time axis is left padded with `kernel_size - 1` zeros, so the output at step `t`
/// only sees input steps `<= t * stride`.
///
/// Should be created with [FrameLayerConfig].
#[derive(Module, Debug)]
pub struct FrameLayer<B: Backend> {
    /// Convolution over `[batch, channels, time]` with valid padding.
    pub conv: Conv1d<B>,
    kernel_size: usize,
    stride: usize,
    activation: Ignored<Activation>,
}

impl FrameLayerConfig {
    /// Initialize a new [frame layer](FrameLayer) module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FrameLayer<B> {
        let conv = Conv1dConfig::new(self.channels_in, self.filters, self.kernel_size)
            .with_stride(self.stride)
            .init(device);

        FrameLayer {
            conv,
            kernel_size: self.kernel_size,
            stride: self.stride,
            activation: Ignored(self.activation.clone()),
        }
    }
}

impl<B: Backend> FrameLayer<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, time, channels_in]`
    /// - output: `[batch_size, ceil(time / stride), filters]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, _time, channels] = input.dims();
        let x = input.swap_dims(1, 2);

        let x = match self.kernel_size {
            1 => x,
            kernel_size => {
                let padding = Tensor::zeros([batch_size, channels, kernel_size - 1], &x.device());
                Tensor::cat(vec![padding, x], 2)
            }
        };

        let x = self.conv.forward(x).swap_dims(1, 2);
        self.activation.forward(x)
    }

    /// Number of output steps produced for an input of `time` steps.
    pub fn output_time_steps(&self, time: usize) -> usize {
        time.div_ceil(self.stride)
    }

    /// The kernel size along the time axis.
    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// The stride along the time axis.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The activation applied after the convolution.
    pub fn activation(&self) -> &Activation {
        &self.activation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestBackend;
    use burn::module::Param;
    use burn::tensor::{Distribution, TensorData, Tolerance};

    #[test]
    fn output_shape_follows_stride() {
        let device = Default::default();
        let layer = FrameLayerConfig::new(4, 6, 3)
            .with_stride(3)
            .init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 3>::ones([2, 10, 4], &device);

        let output = layer.forward(input);

        assert_eq!(output.dims(), [2, 4, 6]);
        assert_eq!(layer.output_time_steps(10), 4);
    }

    #[test]
    fn causal_padding_sums_past_window() {
        let device = Default::default();
        let mut layer = FrameLayerConfig::new(1, 1, 3)
            .with_activation(Activation::Identity)
            .init::<TestBackend>(&device);
        layer.conv.weight = Param::from_tensor(Tensor::ones([1, 1, 3], &device));
        layer.conv.bias = Some(Param::from_tensor(Tensor::zeros([1], &device)));
        let input = Tensor::<TestBackend, 3>::from_floats([[[1.0], [2.0], [3.0], [4.0]]], &device);

        let output = layer.forward(input);

        output
            .into_data()
            .assert_approx_eq(&TensorData::from([[[1.0], [3.0], [6.0], [9.0]]]), Tolerance::<f32>::absolute(1e-5));
    }

    #[test]
    fn future_steps_do_not_leak_into_past_outputs() {
        TestBackend::seed(0);
        let device = Default::default();
        let layer = FrameLayerConfig::new(3, 5, 3)
            .with_stride(2)
            .with_activation(Activation::Identity)
            .init::<TestBackend>(&device);
        let input = Tensor::<TestBackend, 3>::random([1, 8, 3], Distribution::Default, &device);
        let perturbed = input
            .clone()
            .slice_assign([0..1, 5..8, 0..3], Tensor::ones([1, 3, 3], &device) * 10.0);

        let output = layer.forward(input);
        let output_perturbed = layer.forward(perturbed);

        output
            .clone()
            .slice([0..1, 0..3, 0..5])
            .into_data()
            .assert_approx_eq(&output_perturbed.clone().slice([0..1, 0..3, 0..5]).into_data(), Tolerance::<f32>::absolute(1e-5));
        assert_ne!(
            output.slice([0..1, 3..4, 0..5]).into_data(),
            output_perturbed.slice([0..1, 3..4, 0..5]).into_data()
        );
    }

    #[test]
    fn relu_output_is_non_negative() {
        TestBackend::seed(0);
        let device = Default::default();
        let layer = FrameLayerConfig::new(2, 8, 5).init::<TestBackend>(&device);
        let input =
            Tensor::<TestBackend, 3>::random([2, 6, 2], Distribution::Normal(0.0, 1.0), &device);

        let output = layer.forward(input);

        let min = output.min().into_scalar();
        assert!(min >= 0.0);
    }

    #[test]
    fn num_params_matches_filters_and_kernel() {
        let device = Default::default();
        let layer = FrameLayerConfig::new(40, 512, 5).init::<TestBackend>(&device);

        assert_eq!(layer.num_params(), 40 * 512 * 5 + 512);
    }
}
