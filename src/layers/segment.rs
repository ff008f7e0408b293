use super::Activation;
use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Configuration to create a [segment layer](SegmentLayer) using the
/// [init function](SegmentLayerConfig::init).
#[derive(Config, Debug)]
pub struct SegmentLayerConfig {
    /// The size of the input features.
    pub d_input: usize,
    /// The size of the output features.
    pub d_output: usize,
    /// The activation applied after the affine transform.
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
}

/// Dense affine transform applied once the time axis has been pooled away.
///
/// Should be created with [SegmentLayerConfig].
#[derive(Module, Debug)]
pub struct SegmentLayer<B: Backend> {
    /// The affine transform.
    pub linear: Linear<B>,
    activation: Ignored<Activation>,
}

impl SegmentLayerConfig {
    /// Initialize a new [segment layer](SegmentLayer) module.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegmentLayer<B> {
        SegmentLayer {
            linear: LinearConfig::new(self.d_input, self.d_output).init(device),
            activation: Ignored(self.activation.clone()),
        }
    }
}

impl<B: Backend> SegmentLayer<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, d_input]`
    /// - output: `[batch_size, d_output]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.activation.forward(self.linear.forward(input))
    }

    /// The activation applied after the affine transform.
    pub fn activation(&self) -> &Activation {
        &self.activation
    }

    /// Replace the activation in place.
    pub fn set_activation(&mut self, activation: Activation) {
        self.activation = Ignored(activation);
    }
}
