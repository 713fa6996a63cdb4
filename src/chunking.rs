//! Time-chunk planning for the streaming phase
//!
//! Chunk cores tile the recording exactly; padding gives detection enough
//! context to see events near chunk boundaries, and is clipped at the
//! recording edges. Padded samples never contribute output events.

use crate::config::CHUNK_SCALARS_PER_LOAD;

/// One padded chunk on the global sample axis.
///
/// The core region is `[start, end)`; traces are fetched for
/// `[start - padding_left, end + padding_right)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeChunk {
    pub start: usize,
    pub end: usize,
    pub padding_left: usize,
    pub padding_right: usize,
}

impl TimeChunk {
    /// Fetched trace length, padding included
    pub fn total_size(&self) -> usize {
        self.end - self.start + self.padding_left + self.padding_right
    }
}

/// Partition `[0, num_samples)` into chunks of `chunk_size` core samples.
///
/// Core regions tile the range exactly; the last chunk is shorter when
/// `chunk_size` does not divide `num_samples`. Padding is clipped so no
/// chunk reaches past the recording on either side.
pub fn plan_time_chunks(num_samples: usize, chunk_size: usize, padding: usize) -> Vec<TimeChunk> {
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < num_samples {
        let end = (start + chunk_size).min(num_samples);
        chunks.push(TimeChunk {
            start,
            end,
            padding_left: padding.min(start),
            padding_right: padding.min(num_samples - end),
        });
        start = end;
    }
    chunks
}

/// Default chunk core size: bounds one chunk's trace load to roughly
/// `CHUNK_SCALARS_PER_LOAD` scalars across all channels
pub fn default_chunk_size(num_channels: usize) -> usize {
    (CHUNK_SCALARS_PER_LOAD + num_channels - 1) / num_channels
}
