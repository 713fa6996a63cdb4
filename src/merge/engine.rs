//! Pairwise merge pass over sorted units
//!
//! Candidate pairs come from rectified template peak geometry: the two
//! dominant-channel offset estimates must agree, and each unit must carry a
//! substantial fraction of the other's peak amplitude on the other's dominant
//! channel. Confirmed merges always point a higher unit id at a lower one,
//! and are applied in descending id order so chains collapse transitively.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use log::{debug, info};
use ndarray::{Array3, Axis};

use crate::config::{DetectSign, CROSS_AMPLITUDE_RATIO, OFFSET_AGREEMENT_TOLERANCE};
use crate::dedup::remove_duplicate_events;
use crate::error::SortError;
use crate::merge::tester::test_merge;
use crate::provider::{ClusterEngine, FeatureReducer};
use crate::types::EventStream;
use crate::waveform::{peak_summary, rectify, roll_snippets, snippets_for_unit, PeakSummary};

/// One applied merge: events of `source` were shifted by `offset` samples and
/// relabeled `target`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRecord {
    pub source: u32,
    pub target: u32,
    pub offset: i64,
}

/// Result of a pairwise merge pass
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Corrected, deduplicated, time-ascending events
    pub events: EventStream,
    /// Merges applied, in descending source-id order
    pub merges: Vec<MergeRecord>,
    pub duplicates_removed: usize,
}

/// Pairwise merge engine over one snapshot of events, snippets, and templates
pub struct PairwiseMerger<'a> {
    reducer: &'a dyn FeatureReducer,
    clusters: &'a dyn ClusterEngine,
    detect_sign: DetectSign,
    /// Duplicate tolerance after merging, in samples
    detect_time_radius: i64,
}

impl<'a> PairwiseMerger<'a> {
    pub fn new(
        reducer: &'a dyn FeatureReducer,
        clusters: &'a dyn ClusterEngine,
        detect_sign: DetectSign,
        detect_time_radius: i64,
    ) -> Self {
        Self {
            reducer,
            clusters,
            detect_sign,
            detect_time_radius,
        }
    }

    /// Run one merge pass.
    ///
    /// `snippets` rows are aligned with `events`; `templates` row k holds the
    /// template of unit k + 1. Events must be time-ascending.
    pub fn merge(
        &self,
        snippets: &Array3<f32>,
        templates: &Array3<f32>,
        events: &EventStream,
    ) -> Result<MergeOutcome> {
        let num_units = templates.shape()[0];
        if snippets.shape()[0] != events.len() {
            bail!(
                "snippet batch has {} rows for {} events",
                snippets.shape()[0],
                events.len()
            );
        }
        if events.num_units() > num_units {
            bail!(
                "event stream references unit {} but only {} templates were given",
                events.num_units(),
                num_units
            );
        }

        let rectified = rectify(templates, self.detect_sign);
        let peaks: Vec<PeakSummary> = (0..num_units)
            .map(|i| peak_summary(rectified.index_axis(Axis(0), i)))
            .collect();

        let merges = self.find_merges(snippets, events, &peaks)?;

        let mut new_times = events.times.clone();
        let mut new_labels = events.labels.clone();
        let mut applied = Vec::with_capacity(merges.len());
        // descending order collapses chains: a source relabeled onto its
        // target is carried along when the target itself merges later
        for unit_id in (1..=num_units as u32).rev() {
            if let Some(&record) = merges.get(&unit_id) {
                if record.target >= record.source {
                    return Err(SortError::Consistency(format!(
                        "merge of unit {} targets unit {}, which is not a lower id",
                        record.source, record.target
                    ))
                    .into());
                }
                let inds: Vec<usize> = new_labels
                    .iter()
                    .enumerate()
                    .filter(|(_, &l)| l == record.source)
                    .map(|(i, _)| i)
                    .collect();
                info!(
                    "Merging unit {} ({} events) into unit {} (offset {})",
                    record.source,
                    inds.len(),
                    record.target,
                    record.offset
                );
                for &i in &inds {
                    new_times[i] += record.offset;
                    new_labels[i] = record.target;
                }
                applied.push(record);
            }
        }

        let mut merged = EventStream {
            times: new_times,
            labels: new_labels,
        };
        // offsets can reorder events across units
        merged.sort_by_time();

        let deduped = remove_duplicate_events(&merged, self.detect_time_radius);
        let duplicates_removed = merged.len() - deduped.len();
        if duplicates_removed > 0 {
            debug!("Removed {} duplicate events after merging", duplicates_removed);
        }

        Ok(MergeOutcome {
            events: deduped,
            merges: applied,
            duplicates_removed,
        })
    }

    /// Scan ordered pairs for mergeable units; at most one record per source.
    ///
    /// Each unit is compared only against strictly lower-indexed units, inner
    /// index descending, and the first confirmed candidate for a source wins.
    fn find_merges(
        &self,
        snippets: &Array3<f32>,
        events: &EventStream,
        peaks: &[PeakSummary],
    ) -> Result<BTreeMap<u32, MergeRecord>> {
        let mut merges: BTreeMap<u32, MergeRecord> = BTreeMap::new();
        for i1 in 0..peaks.len() {
            for i2 in (0..i1).rev() {
                let source = (i1 + 1) as u32;
                let target = (i2 + 1) as u32;
                if merges.contains_key(&source) {
                    break;
                }
                // offset estimated on each unit's own dominant channel
                let offset1 = peaks[i2].times[peaks[i1].channel] as i64
                    - peaks[i1].times[peaks[i1].channel] as i64;
                let offset2 = peaks[i2].times[peaks[i2].channel] as i64
                    - peaks[i1].times[peaks[i2].channel] as i64;
                if (offset1 - offset2).abs() > OFFSET_AGREEMENT_TOLERANCE {
                    continue;
                }
                // each unit must be strong on the other's dominant channel
                if peaks[i1].values[peaks[i2].channel]
                    <= CROSS_AMPLITUDE_RATIO * peaks[i2].values[peaks[i2].channel]
                {
                    continue;
                }
                if peaks[i2].values[peaks[i1].channel]
                    <= CROSS_AMPLITUDE_RATIO * peaks[i1].values[peaks[i1].channel]
                {
                    continue;
                }
                debug!(
                    "Pairwise merge: comparing units {} and {} (offset {})",
                    source, target, offset1
                );
                let snippets1 = snippets_for_unit(snippets, &events.labels, source);
                let snippets2 = snippets_for_unit(snippets, &events.labels, target);
                let aligned = roll_snippets(&snippets1, offset1);
                if test_merge(self.reducer, self.clusters, &aligned, &snippets2)? {
                    info!(
                        "Pairwise merge: merging units {} and {} (offset {})",
                        source, target, offset1
                    );
                    merges.insert(
                        source,
                        MergeRecord {
                            source,
                            target,
                            offset: offset1,
                        },
                    );
                }
            }
        }
        Ok(merges)
    }
}
