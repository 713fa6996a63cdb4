//! Classifier training from phase-1 units
//!
//! Each unit contributes one training batch per relevant sub-sample
//! alignment: every channel whose rectified template peak clears half the
//! detection threshold names an offset between its peak and the snippet
//! alignment point. Batches are the unit's snippets rolled back by that
//! offset, capped by deterministic subsampling, so the classifier can later
//! report both a unit label and the offset correction per event.

use anyhow::{bail, Result};
use log::{debug, info};
use ndarray::{s, Array2, Array3};

use crate::config::{SortingParameters, TrainingSamplingMode, TRAINING_SEGMENT_MAX_SEC};
use crate::provider::{RecordingSource, SnippetClassifier};
use crate::types::EventStream;
use crate::waveform::{
    median_template, peak_summary, rectify, roll_snippets, snippets_for_unit, subsample_snippets,
};

/// Register one training batch per (unit, offset) with the classifier.
///
/// `snippets` rows are aligned with `events`. Returns the number of batches
/// registered; the caller finalizes the classifier with `fit`.
pub fn train_classifier(
    classifier: &mut dyn SnippetClassifier,
    snippets: &Array3<f32>,
    events: &EventStream,
    params: &SortingParameters,
) -> Result<usize> {
    if snippets.shape()[0] != events.len() {
        bail!(
            "snippet batch has {} rows for {} events",
            snippets.shape()[0],
            events.len()
        );
    }
    let mut num_batches = 0;
    for unit_id in 1..=events.num_units() as u32 {
        let unit_snippets = snippets_for_unit(snippets, &events.labels, unit_id);
        if unit_snippets.shape()[0] == 0 {
            continue;
        }
        let template = median_template(&unit_snippets);
        let rectified = rectify(&template, params.detect_sign);
        let peaks = peak_summary(rectified.view());

        let mut offsets: Vec<i64> = Vec::new();
        for ch in 0..peaks.values.len() {
            if peaks.values[ch] > params.detect_threshold * 0.5 {
                offsets.push(peaks.times[ch] as i64 - params.snippet_pre as i64);
            }
        }
        offsets.sort_unstable();
        offsets.dedup();
        debug!(
            "Unit {}: {} snippets, alignment offsets {:?}",
            unit_id,
            unit_snippets.shape()[0],
            offsets
        );

        for &offset in &offsets {
            let aligned = roll_snippets(&unit_snippets, -offset);
            let batch =
                subsample_snippets(&aligned, params.max_num_snippets_per_training_batch);
            classifier.add_training_snippets(&batch, unit_id, offset)?;
            num_batches += 1;
        }
    }
    info!("Registered {} training batches", num_batches);
    Ok(num_batches)
}

/// Sub-recording view over selected sample ranges of a source recording.
///
/// Used to train on a fraction of a long recording: the view concatenates
/// its ranges into one contiguous time base, and trace fetches stitch across
/// range boundaries. Phase-1 event times live on the view's time base.
pub struct TrainingRecording<'a> {
    source: &'a dyn RecordingSource,
    ranges: Vec<(usize, usize)>,
    num_samples: usize,
}

impl<'a> TrainingRecording<'a> {
    pub fn new(
        source: &'a dyn RecordingSource,
        duration_sec: f32,
        mode: TrainingSamplingMode,
    ) -> Self {
        let n = source.num_samples();
        let fs = source.sampling_frequency() as f64;
        let total = ((duration_sec as f64 * fs).round() as usize).max(1).min(n);

        let ranges = if total == n {
            vec![(0, n)]
        } else {
            match mode {
                TrainingSamplingMode::Initial => vec![(0, total)],
                TrainingSamplingMode::Uniform => {
                    let seg_len = ((TRAINING_SEGMENT_MAX_SEC * fs) as usize).max(1).min(total);
                    let num_segments = (total + seg_len - 1) / seg_len;
                    let stride = n / num_segments;
                    let mut ranges = Vec::with_capacity(num_segments);
                    let mut consumed = 0;
                    for i in 0..num_segments {
                        let start = i * stride;
                        let len = seg_len.min(total - consumed).min(stride);
                        if len == 0 {
                            break;
                        }
                        ranges.push((start, start + len));
                        consumed += len;
                    }
                    ranges
                }
            }
        };
        let num_samples = ranges.iter().map(|(s, e)| e - s).sum();
        info!(
            "Training on {} of {} samples across {} segment(s)",
            num_samples,
            n,
            ranges.len()
        );
        Self {
            source,
            ranges,
            num_samples,
        }
    }

    /// Selected source ranges, ascending and non-overlapping
    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }
}

impl RecordingSource for TrainingRecording<'_> {
    fn num_samples(&self) -> usize {
        self.num_samples
    }

    fn num_channels(&self) -> usize {
        self.source.num_channels()
    }

    fn sampling_frequency(&self) -> f32 {
        self.source.sampling_frequency()
    }

    fn channel_locations(&self) -> Array2<f32> {
        self.source.channel_locations()
    }

    fn traces(&self, start: usize, end: usize) -> Result<Array2<f32>> {
        if start > end || end > self.num_samples {
            bail!(
                "trace range {}..{} outside training view of {} samples",
                start,
                end,
                self.num_samples
            );
        }
        let mut out = Array2::zeros((end - start, self.source.num_channels()));
        let mut range_start_local = 0;
        for &(range_start, range_end) in &self.ranges {
            let range_end_local = range_start_local + (range_end - range_start);
            let lo = start.max(range_start_local);
            let hi = end.min(range_end_local);
            if lo < hi {
                let fetched = self.source.traces(
                    range_start + (lo - range_start_local),
                    range_start + (hi - range_start_local),
                )?;
                out.slice_mut(s![(lo - start)..(hi - start), ..]).assign(&fetched);
            }
            range_start_local = range_end_local;
        }
        Ok(out)
    }
}
