use burn::config::Config;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Non-linearity applied at the end of a frame or segment layer.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum Activation {
    /// Rectified linear unit.
    Relu,
    /// No activation, the raw affine output is returned.
    Identity,
}

impl Activation {
    /// Applies the activation element-wise.
    pub fn forward<B: Backend, const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Relu => relu(input),
            Activation::Identity => input,
        }
    }
}
