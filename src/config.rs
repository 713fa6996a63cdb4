//! Sorting Configuration and Constants

use serde::{Deserialize, Serialize};

use crate::error::SortError;

// Pairwise merge constants
pub const MERGE_NUM_COMPONENTS: usize = 12;
pub const OFFSET_AGREEMENT_TOLERANCE: i64 = 4;
pub const CROSS_AMPLITUDE_RATIO: f32 = 0.5;

// Chunking constants
pub const CHUNK_PADDING: usize = 1000;
pub const CHUNK_SCALARS_PER_LOAD: usize = 100_000_000;

// Training subsample constants
pub const TRAINING_SEGMENT_MAX_SEC: f64 = 60.0;

/// Detection polarity: which deflection counts as a spike
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectSign {
    /// Negative-going peaks (the usual extracellular convention)
    Negative,
    /// Positive-going peaks
    Positive,
    /// Absolute value, either polarity
    Both,
}

/// How the training portion of the recording is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingSamplingMode {
    /// One contiguous block at the start of the recording
    Initial,
    /// Evenly spaced segments across the whole recording
    Uniform,
}

/// Parameters for the two-phase streaming sort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortingParameters {
    /// Detection threshold in normalized trace units
    pub detect_threshold: f32,
    pub detect_sign: DetectSign,
    /// Minimum spacing between detected events, in milliseconds
    pub detect_time_radius_msec: f32,
    /// Channel neighborhood radius for detection, in channel-location units
    pub detect_channel_radius: Option<f32>,
    /// Spatial mask radius applied during snippet extraction
    pub snippet_mask_radius: Option<f32>,
    /// Samples before the alignment point in each snippet
    pub snippet_pre: usize,
    /// Samples after the alignment point in each snippet
    pub snippet_post: usize,
    /// Cap on snippets registered per training batch
    pub max_num_snippets_per_training_batch: usize,
    /// Train on only this many seconds of the recording (None = all of it)
    pub training_duration_sec: Option<f32>,
    pub training_sampling_mode: TrainingSamplingMode,
    /// Run a pairwise merge pass on the phase-1 units before training
    pub pairwise_merge_phase1: bool,
    /// Chunk core size in samples (None = derived from channel count)
    pub chunk_size: Option<usize>,
    /// Look-around padding on each side of a chunk, in samples
    pub chunk_padding: usize,
}

impl Default for SortingParameters {
    fn default() -> Self {
        Self {
            detect_threshold: 5.5,
            detect_sign: DetectSign::Negative,
            detect_time_radius_msec: 0.5,
            detect_channel_radius: None,
            snippet_mask_radius: None,
            snippet_pre: 20,
            snippet_post: 20,
            max_num_snippets_per_training_batch: 200,
            training_duration_sec: None,
            training_sampling_mode: TrainingSamplingMode::Uniform,
            pairwise_merge_phase1: false,
            chunk_size: None,
            chunk_padding: CHUNK_PADDING,
        }
    }
}

impl SortingParameters {
    /// Snippet window length in samples
    pub fn snippet_len(&self) -> usize {
        self.snippet_pre + self.snippet_post
    }

    /// Detection time radius in samples at the given sampling frequency
    pub fn detect_time_radius(&self, sampling_frequency: f32) -> usize {
        (self.detect_time_radius_msec / 1000.0 * sampling_frequency).ceil() as usize
    }

    /// Validate against the recording geometry before any processing
    pub fn check_valid(
        &self,
        num_channels: usize,
        num_samples: usize,
        sampling_frequency: f32,
    ) -> Result<(), SortError> {
        if num_channels == 0 || num_samples == 0 {
            return Err(SortError::InvalidConfig(format!(
                "empty recording: {} channels, {} samples",
                num_channels, num_samples
            )));
        }
        if sampling_frequency <= 0.0 {
            return Err(SortError::InvalidConfig(format!(
                "sampling frequency must be positive, got {}",
                sampling_frequency
            )));
        }
        if self.detect_threshold <= 0.0 {
            return Err(SortError::InvalidConfig(format!(
                "detect threshold must be positive, got {}",
                self.detect_threshold
            )));
        }
        if self.detect_time_radius_msec <= 0.0 {
            return Err(SortError::InvalidConfig(format!(
                "detect time radius must be positive, got {} msec",
                self.detect_time_radius_msec
            )));
        }
        if self.snippet_pre == 0 || self.snippet_post == 0 {
            return Err(SortError::InvalidConfig(format!(
                "snippet window must extend on both sides of the alignment point, got {} + {}",
                self.snippet_pre, self.snippet_post
            )));
        }
        if self.max_num_snippets_per_training_batch == 0 {
            return Err(SortError::InvalidConfig(
                "training batch cap must be at least 1".to_string(),
            ));
        }
        if self.chunk_padding < self.snippet_len() {
            return Err(SortError::InvalidConfig(format!(
                "chunk padding {} is smaller than the snippet window {}; boundary events would be lost",
                self.chunk_padding,
                self.snippet_len()
            )));
        }
        if let Some(chunk_size) = self.chunk_size {
            if chunk_size == 0 {
                return Err(SortError::InvalidConfig(
                    "chunk size must be at least 1 sample".to_string(),
                ));
            }
        }
        if let Some(duration) = self.training_duration_sec {
            if duration <= 0.0 {
                return Err(SortError::InvalidConfig(format!(
                    "training duration must be positive, got {} sec",
                    duration
                )));
            }
        }
        Ok(())
    }
}
