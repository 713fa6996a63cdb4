//! Joint-cloud merge test
//!
//! Two units are one source if their combined snippet cloud refuses to split
//! under the same density clustering that separated units upstream.

use anyhow::Result;
use log::debug;
use ndarray::{Array3, Axis};

use crate::config::MERGE_NUM_COMPONENTS;
use crate::error::SortError;
use crate::provider::{ClusterEngine, FeatureReducer};
use crate::waveform::flatten_snippets;

/// Test whether two snippet batches of shared T x M shape form one cluster.
///
/// Flattens both batches, concatenates them along the sample axis, projects
/// onto `MERGE_NUM_COMPONENTS` components, and clusters the projection.
/// Batches too small for the projection are reported as not mergeable, as is
/// any pair the reducer itself rejects as degenerate.
pub fn test_merge(
    reducer: &dyn FeatureReducer,
    clusters: &dyn ClusterEngine,
    snippets1: &Array3<f32>,
    snippets2: &Array3<f32>,
) -> Result<bool> {
    let l1 = snippets1.shape()[0];
    let l2 = snippets2.shape()[0];
    if l1 == 0 || l2 == 0 || l1 + l2 <= MERGE_NUM_COMPONENTS {
        return Ok(false);
    }
    let v1 = flatten_snippets(snippets1);
    let v2 = flatten_snippets(snippets2);
    let vall = ndarray::concatenate(Axis(0), &[v1.view(), v2.view()])?;
    let features = match reducer.reduce(&vall, MERGE_NUM_COMPONENTS) {
        Ok(features) => features,
        Err(err) => {
            if let Some(SortError::Degenerate(_)) = err.downcast_ref::<SortError>() {
                debug!("Merge test skipped: {}", err);
                return Ok(false);
            }
            return Err(err);
        }
    };
    let labels = clusters.cluster(&features)?;
    let num_clusters = labels.iter().copied().max().unwrap_or(0);
    Ok(num_clusters == 1)
}
