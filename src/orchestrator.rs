//! Two-phase streaming sort orchestration
//!
//! Phase 1 runs externally on a training portion of the recording and yields
//! labeled events. This module consolidates those units (optional pairwise
//! merge pass), trains the injected classifier on them, then streams the full
//! recording in padded time chunks: detect, extract, classify,
//! offset-correct, deduplicate, trim the padding, and accumulate on the
//! global time base. Chunks are processed strictly in ascending order, so the
//! final stream is time-ascending by construction.

use anyhow::{bail, Result};
use log::info;

use crate::chunking::{default_chunk_size, plan_time_chunks};
use crate::config::SortingParameters;
use crate::dedup::remove_duplicate_events;
use crate::merge::PairwiseMerger;
use crate::provider::{
    ClusterEngine, DetectOptions, ExtractOptions, FeatureReducer, InitialSorter, RecordingSource,
    SnippetClassifier, SnippetExtractor, SpikeDetector,
};
use crate::training::{train_classifier, TrainingRecording};
use crate::types::EventStream;
use crate::waveform::unit_templates;

/// Drives the two-phase sort over injected capabilities
pub struct StreamingSorter<'a> {
    params: SortingParameters,
    detector: &'a dyn SpikeDetector,
    extractor: &'a dyn SnippetExtractor,
    reducer: &'a dyn FeatureReducer,
    clusters: &'a dyn ClusterEngine,
    phase1: &'a dyn InitialSorter,
}

impl<'a> StreamingSorter<'a> {
    pub fn new(
        params: SortingParameters,
        detector: &'a dyn SpikeDetector,
        extractor: &'a dyn SnippetExtractor,
        reducer: &'a dyn FeatureReducer,
        clusters: &'a dyn ClusterEngine,
        phase1: &'a dyn InitialSorter,
    ) -> Self {
        Self {
            params,
            detector,
            extractor,
            reducer,
            clusters,
            phase1,
        }
    }

    /// Run the full sort. The classifier arrives untrained and is fitted on
    /// the phase-1 units before the chunk loop begins.
    pub fn run(
        &self,
        recording: &dyn RecordingSource,
        classifier: &mut dyn SnippetClassifier,
    ) -> Result<EventStream> {
        let num_channels = recording.num_channels();
        let num_samples = recording.num_samples();
        let sampling_frequency = recording.sampling_frequency();
        self.params
            .check_valid(num_channels, num_samples, sampling_frequency)?;
        let time_radius = self.params.detect_time_radius(sampling_frequency);

        // phase 1 over the training portion
        let training_view;
        let training: &dyn RecordingSource = match self.params.training_duration_sec {
            Some(duration) => {
                training_view =
                    TrainingRecording::new(recording, duration, self.params.training_sampling_mode);
                &training_view
            }
            None => recording,
        };
        info!(
            "Phase 1: initial sort over {} of {} samples",
            training.num_samples(),
            num_samples
        );
        let mut events = self.phase1.sort(training)?;
        events.sort_by_time();
        if events.is_empty() {
            bail!("phase 1 produced no events; nothing to train on");
        }
        info!(
            "Phase 1 produced {} events in {} units",
            events.len(),
            events.num_units()
        );

        let training_traces = training.traces(0, training.num_samples())?;
        let training_extract = ExtractOptions {
            channel_locations: None,
            mask_radius: None,
            pre: self.params.snippet_pre,
            post: self.params.snippet_post,
        };
        let mut snippets =
            self.extractor
                .extract(&training_traces, &events.times, None, &training_extract)?;

        if self.params.pairwise_merge_phase1 {
            let templates = unit_templates(&snippets, &events.labels, events.num_units());
            let merger = PairwiseMerger::new(
                self.reducer,
                self.clusters,
                self.params.detect_sign,
                time_radius as i64,
            );
            let outcome = merger.merge(&snippets, &templates, &events)?;
            info!(
                "Pairwise merge pass: {} merges, {} duplicates removed",
                outcome.merges.len(),
                outcome.duplicates_removed
            );
            events = outcome.events;
            // merge offsets moved event times; refresh the snippets to match
            snippets =
                self.extractor
                    .extract(&training_traces, &events.times, None, &training_extract)?;
        }

        info!("Training classifier");
        train_classifier(classifier, &snippets, &events, &self.params)?;
        drop(snippets);
        drop(training_traces);
        info!("Fitting classifier model");
        classifier.fit()?;

        // phase 2: classify the whole recording chunk by chunk
        let chunk_size = self
            .params
            .chunk_size
            .unwrap_or_else(|| default_chunk_size(num_channels));
        let chunks = plan_time_chunks(num_samples, chunk_size, self.params.chunk_padding);
        info!("Phase 2: {} chunks of up to {} samples", chunks.len(), chunk_size);

        let channel_locations = recording.channel_locations();
        let detect_opts = DetectOptions {
            channel_locations: channel_locations.clone(),
            time_radius,
            channel_radius: self.params.detect_channel_radius,
            detect_threshold: self.params.detect_threshold,
            detect_sign: self.params.detect_sign,
            margin_left: self.params.snippet_pre,
            margin_right: self.params.snippet_post,
        };
        let chunk_extract = ExtractOptions {
            channel_locations: Some(channel_locations),
            mask_radius: self.params.snippet_mask_radius,
            pre: self.params.snippet_pre,
            post: self.params.snippet_post,
        };

        let mut result = EventStream::new();
        for (index, chunk) in chunks.iter().enumerate() {
            info!("Time chunk {} of {}", index + 1, chunks.len());
            let traces = recording.traces(
                chunk.start - chunk.padding_left,
                chunk.end + chunk.padding_right,
            )?;
            let detected = self.detector.detect(&traces, &detect_opts)?;
            if detected.times.is_empty() {
                continue;
            }
            let chunk_snippets = self.extractor.extract(
                &traces,
                &detected.times,
                Some(&detected.channels),
                &chunk_extract,
            )?;
            let (labels, offsets) = classifier.classify(&chunk_snippets)?;

            let mut chunk_events = EventStream {
                times: detected
                    .times
                    .iter()
                    .zip(&offsets)
                    .map(|(&t, &o)| t - o)
                    .collect(),
                labels,
            };
            // offset corrections can reorder events
            chunk_events.sort_by_time();
            let chunk_events = remove_duplicate_events(&chunk_events, time_radius as i64);

            // only the core region contributes output; padding is context
            let lo = chunk.padding_left as i64;
            let hi = (chunk.total_size() - chunk.padding_right) as i64;
            let to_global = chunk.start as i64 - chunk.padding_left as i64;
            for i in 0..chunk_events.len() {
                let t = chunk_events.times[i];
                if lo <= t && t < hi {
                    result.push(t + to_global, chunk_events.labels[i]);
                }
            }
        }
        debug_assert!(result.is_sorted_by_time());
        info!("Streaming sort complete: {} events", result.len());
        Ok(result)
    }
}
