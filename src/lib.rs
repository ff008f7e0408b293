#![warn(missing_docs)]

//! x-vector speaker embedding network built on Burn.
//!
//! The [model](XVector) maps `[batch, time, channels]` acoustic features to class
//! log-probabilities through five causal frame layers, [statistics pooling](StatsPooling)
//! and two dense segment layers. [as_embedding_extractor] exposes the raw output of the
//! first segment layer as a fixed-size utterance embedding.

mod error;

/// Frame, segment and channel dropout layers.
pub mod layers;

/// Logger setup for binaries and demos.
pub mod logger;

/// Network assembly and embedding extraction.
pub mod model;

/// Statistics pooling over the time axis.
pub mod pooling;

pub use error::{Result, XVectorError};
pub use model::{
    as_embedding_extractor, build, EmbeddingExtractor, InputShape, LayerRef, SegmentId, XVector,
    XVectorConfig, XVectorRecord,
};
pub use pooling::{StatsPooling, StatsPoolingConfig, STDDEV_MIN_CLIP};

/// Backend for test cases
#[cfg(test)]
pub type TestBackend = burn::backend::NdArray<f32>;

/// Backend for autodiff test cases
#[cfg(test)]
pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;
