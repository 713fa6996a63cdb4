//! Capability traits for the external collaborators of the sorting core
//!
//! Detection, snippet extraction, dimensionality reduction, density
//! clustering, the waveform classifier, and phase-1 sorting are supplied by
//! the caller; the core only orchestrates them. All traits are synchronous:
//! this is batch numeric code.

use anyhow::Result;
use ndarray::{Array2, Array3};

use crate::config::DetectSign;
use crate::types::EventStream;

/// Random-access view of a multichannel recording
pub trait RecordingSource {
    fn num_samples(&self) -> usize;

    fn num_channels(&self) -> usize;

    fn sampling_frequency(&self) -> f32;

    /// Channel geometry, one (x, y) row per channel
    fn channel_locations(&self) -> Array2<f32>;

    /// Traces for the half-open sample range [start, end), samples x channels
    fn traces(&self, start: usize, end: usize) -> Result<Array2<f32>>;
}

/// Detection request parameters
#[derive(Debug, Clone)]
pub struct DetectOptions {
    pub channel_locations: Array2<f32>,
    /// Minimum spacing between events, in samples
    pub time_radius: usize,
    pub channel_radius: Option<f32>,
    pub detect_threshold: f32,
    pub detect_sign: DetectSign,
    /// No events reported within this many samples of the trace start
    pub margin_left: usize,
    /// No events reported within this many samples of the trace end
    pub margin_right: usize,
}

/// Detected events: trace-local sample times and the channel each peaked on
#[derive(Debug, Clone, Default)]
pub struct DetectedSpikes {
    pub times: Vec<i64>,
    pub channels: Vec<usize>,
}

pub trait SpikeDetector {
    fn detect(&self, traces: &Array2<f32>, opts: &DetectOptions) -> Result<DetectedSpikes>;
}

/// Snippet extraction parameters
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Channel geometry; None disables spatial masking
    pub channel_locations: Option<Array2<f32>>,
    pub mask_radius: Option<f32>,
    /// Samples before the alignment point
    pub pre: usize,
    /// Samples after the alignment point
    pub post: usize,
}

pub trait SnippetExtractor {
    /// One (pre + post) x channels window per event time
    fn extract(
        &self,
        traces: &Array2<f32>,
        times: &[i64],
        channels: Option<&[usize]>,
        opts: &ExtractOptions,
    ) -> Result<Array3<f32>>;
}

pub trait FeatureReducer {
    /// Project row vectors onto the requested number of components
    fn reduce(&self, vectors: &Array2<f32>, num_components: usize) -> Result<Array2<f32>>;
}

pub trait ClusterEngine {
    /// Density clustering over feature rows; labels are 1-based and contiguous
    fn cluster(&self, features: &Array2<f32>) -> Result<Vec<u32>>;
}

/// Trainable waveform classifier.
///
/// Training batches are registered per (unit, offset) pair; `fit` finalizes
/// the model and must be called exactly once before `classify`. Classification
/// returns, per event, the predicted unit label and the sub-sample offset
/// correction to subtract from the event time.
pub trait SnippetClassifier {
    fn add_training_snippets(
        &mut self,
        snippets: &Array3<f32>,
        label: u32,
        offset: i64,
    ) -> Result<()>;

    fn fit(&mut self) -> Result<()>;

    fn classify(&self, snippets: &Array3<f32>) -> Result<(Vec<u32>, Vec<i64>)>;
}

/// Phase-1 sorter: coarse detection plus initial clustering, supplied
/// externally. Returns a time-ascending stream with units numbered from 1.
pub trait InitialSorter {
    fn sort(&self, recording: &dyn RecordingSource) -> Result<EventStream>;
}
