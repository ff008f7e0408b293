use burn::config::Config;
use burn::module::{Content, DisplaySettings, Module, ModuleDisplay};
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Configuration to create a [ChannelDropout](ChannelDropout) layer using the
/// [init function](ChannelDropoutConfig::init).
#[derive(Config, Debug)]
pub struct ChannelDropoutConfig {
    /// The probability of zeroing a whole channel during training.
    pub prob: f64,
}

/// Set at random entire channels of a `[batch, time, channels]` tensor to zero during training.
///
/// Unlike element-wise dropout, one mask value is drawn per `(batch, channel)` pair and shared
/// by every time step, since neighbouring frames of a channel are strongly correlated.
///
/// Kept channels are scaled by `1 / (1 - p)`. The layer is the identity when the backend
/// has no autodiff, as with Burn's `Dropout`.
#[derive(Module, Clone, Debug)]
#[module(custom_display)]
pub struct ChannelDropout {
    /// The probability of zeroing a whole channel.
    pub prob: f64,
}

impl ModuleDisplay for ChannelDropout {
    fn custom_settings(&self) -> Option<DisplaySettings> {
        DisplaySettings::new()
            .with_new_line_after_attribute(false)
            .optional()
    }

    fn custom_content(&self, content: Content) -> Option<Content> {
        content.add("prob", &self.prob).optional()
    }
}

impl ChannelDropoutConfig {
    /// Initialize a new [channel dropout](ChannelDropout) module.
    pub fn init(&self) -> ChannelDropout {
        ChannelDropout { prob: self.prob }
    }
}

impl ChannelDropout {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, time, channels]`
    /// - output: `[batch_size, time, channels]`
    pub fn forward<B: Backend>(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        if !B::ad_enabled() || self.prob == 0.0 {
            return input;
        }

        let [batch_size, time, channels] = input.dims();
        let dropped = Tensor::<B, 3>::random(
            [batch_size, 1, channels],
            Distribution::Bernoulli(self.prob),
            &input.device(),
        );
        let keep = dropped.ones_like() - dropped;

        input * keep.expand([batch_size, time, channels]) / (1.0 - self.prob)
    }
}
