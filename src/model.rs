use core::str::FromStr;

use burn::config::Config;
use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::error::XVectorError;
use crate::layers::{
    Activation, ChannelDropout, ChannelDropoutConfig, FrameLayer, FrameLayerConfig, SegmentLayer,
    SegmentLayerConfig,
};
use crate::pooling::{StatsPooling, StatsPoolingConfig};

/// Default model name.
pub const DEFAULT_NAME: &str = "x-vector";

/// Width of both segment layers, hence of the extracted embeddings.
pub const SEGMENT_UNITS: usize = 512;

/// Hyper-parameters of one frame layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    /// Layer identifier.
    pub name: &'static str,
    /// Number of output channels.
    pub filters: usize,
    /// Kernel size along time.
    pub kernel_size: usize,
    /// Stride along time.
    pub stride: usize,
}

/// The frame stack, in application order.
#[rustfmt::skip]
pub const FRAME_LAYERS: [FrameSpec; 5] = [
    FrameSpec { name: "frame1", filters: 512, kernel_size: 5, stride: 1 },
    FrameSpec { name: "frame2", filters: 512, kernel_size: 3, stride: 2 },
    FrameSpec { name: "frame3", filters: 512, kernel_size: 3, stride: 3 },
    FrameSpec { name: "frame4", filters: 512, kernel_size: 1, stride: 1 },
    FrameSpec { name: "frame5", filters: 1500, kernel_size: 1, stride: 1 },
];

const CHANNEL_DROPOUT: &str = "channel_dropout";
const STATS_POOLING: &str = "stats_pooling";
const OUTPUTS: &str = "outputs";

/// Shape of one input sequence, without the batch axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    /// Number of time steps, `None` when dynamic.
    pub time: Option<usize>,
    /// Number of feature channels per time step.
    pub channels: usize,
}

impl InputShape {
    /// Input with a dynamic number of time steps.
    pub fn dynamic(channels: usize) -> Self {
        Self {
            time: None,
            channels,
        }
    }

    /// Input with a fixed number of time steps.
    pub fn fixed(time: usize, channels: usize) -> Self {
        Self {
            time: Some(time),
            channels,
        }
    }
}

/// Typed handle on one of the two segment layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentId {
    /// The first segment layer, right after statistics pooling.
    Segment1,
    /// The second segment layer.
    Segment2,
}

impl SegmentId {
    /// The layer identifier.
    pub fn name(&self) -> &'static str {
        match self {
            SegmentId::Segment1 => "segment1",
            SegmentId::Segment2 => "segment2",
        }
    }
}

impl FromStr for SegmentId {
    type Err = XVectorError;

    fn from_str(name: &str) -> crate::Result<Self> {
        match name {
            "segment1" => Ok(SegmentId::Segment1),
            "segment2" => Ok(SegmentId::Segment2),
            _ => Err(XVectorError::configuration(format!(
                "no segment layer named `{name}`"
            ))),
        }
    }
}

/// Borrowed view on a layer found by name.
#[derive(Debug)]
pub enum LayerRef<'a, B: Backend> {
    /// Channel-wise dropout on the input.
    ChannelDropout(&'a ChannelDropout),
    /// One of the causal frame layers.
    Frame(&'a FrameLayer<B>),
    /// Mean and standard deviation pooling.
    StatsPooling(&'a StatsPooling),
    /// One of the dense segment layers.
    Segment(&'a SegmentLayer<B>),
    /// Output projection, before log-softmax.
    Output(&'a Linear<B>),
}

/// Configuration to create an [x-vector](XVector) model using the
/// [init function](XVectorConfig::init).
#[derive(Config, Debug)]
pub struct XVectorConfig {
    /// Number of feature channels per time step.
    pub input_channels: usize,
    /// Number of output classes.
    pub num_outputs: usize,
    /// Fixed number of time steps, dynamic when unset.
    #[config(default = "None")]
    pub input_time: Option<usize>,
    /// Probability of dropping a whole input channel during training.
    #[config(default = 0.0)]
    pub channel_dropout_rate: f64,
    /// Model name.
    #[config(default = "DEFAULT_NAME.to_string()")]
    pub name: String,
}

/// Speaker classifier producing log-probabilities from `[batch, time, channels]` features.
///
/// The layers are, in order: optional `channel_dropout`, `frame1` to `frame5`,
/// `stats_pooling`, `segment1`, `segment2` and `outputs`, followed by log-softmax.
#[derive(Module, Debug)]
pub struct XVector<B: Backend> {
    channel_dropout: Option<ChannelDropout>,
    frames: Vec<FrameLayer<B>>,
    stats_pooling: StatsPooling,
    segment1: SegmentLayer<B>,
    segment2: SegmentLayer<B>,
    outputs: Linear<B>,
    input_shape: Ignored<InputShape>,
    name: Ignored<String>,
}

/// Builds the x-vector classifier.
///
/// Equivalent to [XVectorConfig::init] with the given settings. A `channel_dropout_rate`
/// of zero disables channel dropout.
pub fn build<B: Backend>(
    input_shape: InputShape,
    num_outputs: usize,
    channel_dropout_rate: f64,
    name: &str,
    device: &B::Device,
) -> crate::Result<XVector<B>> {
    XVectorConfig::new(input_shape.channels, num_outputs)
        .with_input_time(input_shape.time)
        .with_channel_dropout_rate(channel_dropout_rate)
        .with_name(name.to_string())
        .init(device)
}

/// Turns `model` into an embedding extractor ending at `segment1`, pre-activation.
///
/// The activation of `segment1` is replaced by the identity on `model` itself, so the
/// classifier output of `model` changes as well. The returned extractor shares its
/// parameters with `model`.
pub fn as_embedding_extractor<B: Backend>(
    model: &mut XVector<B>,
) -> crate::Result<EmbeddingExtractor<B>> {
    model.embedding_extractor_named(SegmentId::Segment1.name())
}

impl XVectorConfig {
    /// Checks the configuration without allocating any parameter.
    pub fn validate(&self) -> crate::Result<()> {
        if self.input_channels == 0 {
            return Err(XVectorError::configuration(
                "input_channels must be positive",
            ));
        }
        if self.num_outputs == 0 {
            return Err(XVectorError::configuration("num_outputs must be positive"));
        }
        if self.input_time == Some(0) {
            return Err(XVectorError::configuration(
                "a fixed input time must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.channel_dropout_rate) {
            return Err(XVectorError::configuration(format!(
                "channel_dropout_rate must be in [0, 1), got {}",
                self.channel_dropout_rate
            )));
        }

        Ok(())
    }

    /// Initialize a new [x-vector](XVector) model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::Result<XVector<B>> {
        self.validate()?;

        let channel_dropout = (self.channel_dropout_rate > 0.0)
            .then(|| ChannelDropoutConfig::new(self.channel_dropout_rate).init());

        let mut channels_in = self.input_channels;
        let mut frames = Vec::with_capacity(FRAME_LAYERS.len());
        for spec in FRAME_LAYERS.iter() {
            let frame = FrameLayerConfig::new(channels_in, spec.filters, spec.kernel_size)
                .with_stride(spec.stride)
                .init(device);
            frames.push(frame);
            channels_in = spec.filters;
        }

        let model = XVector {
            channel_dropout,
            frames,
            stats_pooling: StatsPoolingConfig::new().init(),
            segment1: SegmentLayerConfig::new(2 * channels_in, SEGMENT_UNITS).init(device),
            segment2: SegmentLayerConfig::new(SEGMENT_UNITS, SEGMENT_UNITS).init(device),
            outputs: LinearConfig::new(SEGMENT_UNITS, self.num_outputs).init(device),
            input_shape: Ignored(InputShape {
                time: self.input_time,
                channels: self.input_channels,
            }),
            name: Ignored(self.name.clone()),
        };

        log::info!(
            "Built {} with {} parameters for {} input channels and {} outputs",
            model.name(),
            model.num_params(),
            self.input_channels,
            self.num_outputs
        );

        Ok(model)
    }

    /// Initialize a new [x-vector](XVector) model and load the given record into it.
    pub fn init_with<B: Backend>(
        &self,
        record: XVectorRecord<B>,
        device: &B::Device,
    ) -> crate::Result<XVector<B>> {
        Ok(self.init(device)?.load_record(record))
    }
}

impl<B: Backend> XVector<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, time, input_channels]`
    /// - output: `[batch_size, num_outputs]`, log-probabilities
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = self.pooled(input);
        let x = self.segment1.forward(x);
        let x = self.segment2.forward(x);
        let x = self.outputs.forward(x);

        log_softmax(x, 1)
    }

    /// Output of the frame stack followed by statistics pooling.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, time, input_channels]`
    /// - output: `[batch_size, 2 * 1500]`
    pub fn pooled(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        pool_frames(
            self.channel_dropout.as_ref(),
            &self.frames,
            &self.stats_pooling,
            input,
        )
    }

    /// Linearizes the given segment layer and returns an extractor ending at it.
    ///
    /// The activation change is applied to this model, so later calls to
    /// [forward](XVector::forward) see the identity activation too. Parameters
    /// of the extractor are shared with this model.
    pub fn embedding_extractor(&mut self, segment: SegmentId) -> EmbeddingExtractor<B> {
        let segments = match segment {
            SegmentId::Segment1 => {
                self.segment1.set_activation(Activation::Identity);
                vec![self.segment1.clone()]
            }
            SegmentId::Segment2 => {
                self.segment2.set_activation(Activation::Identity);
                vec![self.segment1.clone(), self.segment2.clone()]
            }
        };

        log::info!(
            "Removed the activation of {} in {} to extract embeddings",
            segment.name(),
            self.name()
        );

        EmbeddingExtractor {
            channel_dropout: self.channel_dropout.clone(),
            frames: self.frames.clone(),
            stats_pooling: self.stats_pooling.clone(),
            segments,
        }
    }

    /// Same as [embedding_extractor](XVector::embedding_extractor), locating the segment by name.
    pub fn embedding_extractor_named(
        &mut self,
        name: &str,
    ) -> crate::Result<EmbeddingExtractor<B>> {
        let segment = SegmentId::from_str(name)?;
        Ok(self.embedding_extractor(segment))
    }

    /// Layer identifiers in application order.
    pub fn layer_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(FRAME_LAYERS.len() + 5);
        if self.channel_dropout.is_some() {
            names.push(CHANNEL_DROPOUT);
        }
        names.extend(FRAME_LAYERS.iter().map(|spec| spec.name));
        names.extend([
            STATS_POOLING,
            SegmentId::Segment1.name(),
            SegmentId::Segment2.name(),
            OUTPUTS,
        ]);
        names
    }

    /// Finds a layer by its identifier.
    pub fn layer(&self, name: &str) -> crate::Result<LayerRef<'_, B>> {
        if let Some(index) = FRAME_LAYERS.iter().position(|spec| spec.name == name) {
            return Ok(LayerRef::Frame(&self.frames[index]));
        }

        match name {
            CHANNEL_DROPOUT => self
                .channel_dropout
                .as_ref()
                .map(LayerRef::ChannelDropout)
                .ok_or_else(|| {
                    XVectorError::configuration(format!(
                        "{} has no channel dropout layer",
                        self.name()
                    ))
                }),
            STATS_POOLING => Ok(LayerRef::StatsPooling(&self.stats_pooling)),
            OUTPUTS => Ok(LayerRef::Output(&self.outputs)),
            name => Ok(LayerRef::Segment(self.segment(SegmentId::from_str(name)?))),
        }
    }

    /// The requested segment layer.
    pub fn segment(&self, segment: SegmentId) -> &SegmentLayer<B> {
        match segment {
            SegmentId::Segment1 => &self.segment1,
            SegmentId::Segment2 => &self.segment2,
        }
    }

    /// Number of time steps left after the frame stack for an input of `time` steps.
    pub fn output_time_steps(&self, time: usize) -> usize {
        self.frames
            .iter()
            .fold(time, |time, frame| frame.output_time_steps(time))
    }

    /// Shape of one input sequence.
    pub fn input_shape(&self) -> InputShape {
        *self.input_shape
    }

    /// Number of output classes.
    pub fn num_outputs(&self) -> usize {
        let [_d_input, d_output] = self.outputs.weight.dims();
        d_output
    }

    /// Size of the embeddings produced by [embedding extractors](EmbeddingExtractor).
    pub fn embedding_dim(&self) -> usize {
        SEGMENT_UNITS
    }

    /// The model name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Embedding extractor sharing the frame stack, pooling and segment layers of an
/// [x-vector](XVector) model.
///
/// Created with [as_embedding_extractor] or [XVector::embedding_extractor].
#[derive(Module, Debug)]
pub struct EmbeddingExtractor<B: Backend> {
    channel_dropout: Option<ChannelDropout>,
    frames: Vec<FrameLayer<B>>,
    stats_pooling: StatsPooling,
    segments: Vec<SegmentLayer<B>>,
}

impl<B: Backend> EmbeddingExtractor<B> {
    /// Applies the forward pass on the input tensor.
    ///
    /// # Shapes
    ///
    /// - input: `[batch_size, time, input_channels]`
    /// - output: `[batch_size, 512]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let x = pool_frames(
            self.channel_dropout.as_ref(),
            &self.frames,
            &self.stats_pooling,
            input,
        );

        self.segments
            .iter()
            .fold(x, |x, segment| segment.forward(x))
    }
}

fn pool_frames<B: Backend>(
    channel_dropout: Option<&ChannelDropout>,
    frames: &[FrameLayer<B>],
    stats_pooling: &StatsPooling,
    input: Tensor<B, 3>,
) -> Tensor<B, 2> {
    let mut x = match channel_dropout {
        Some(dropout) => dropout.forward(input),
        None => input,
    };

    for frame in frames {
        x = frame.forward(x);
    }
    log::trace!("Pooling frame features of shape {:?}", x.dims());

    stats_pooling.forward(x)
}
