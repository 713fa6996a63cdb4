// Spikesort - post-detection spike consolidation and two-phase streaming sort
//
// Given labeled events from an initial sort of a training subsample, this
// crate merges units that are one source detected twice under different time
// alignment, trains an injected waveform classifier on the consolidated
// units, and applies it chunk by chunk across the full recording with
// boundary-safe padding and duplicate suppression.
//
// Detection, snippet extraction, dimensionality reduction, density
// clustering, the classifier, and recording access are capability traits in
// `provider`; the crate owns only the consolidation and orchestration logic.

// Configuration and errors
pub mod config;
pub mod error;

// Data model
pub mod provider;
pub mod types;
pub mod waveform;

// Consolidation
pub mod dedup;
pub mod merge;

// Streaming phase
pub mod chunking;
pub mod orchestrator;
pub mod training;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the main types
pub use config::{DetectSign, SortingParameters, TrainingSamplingMode};
pub use error::SortError;
pub use types::{EventStream, REMOVED_LABEL};

pub use chunking::{default_chunk_size, plan_time_chunks, TimeChunk};
pub use dedup::{find_duplicate_times, remove_duplicate_events};
pub use merge::{MergeOutcome, MergeRecord, PairwiseMerger};
pub use orchestrator::StreamingSorter;
pub use training::{train_classifier, TrainingRecording};
