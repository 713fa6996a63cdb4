//! In-memory provider doubles shared by module tests

use anyhow::{anyhow, Result};
use ndarray::{s, Array2, Array3};

use crate::provider::{
    ClusterEngine, DetectOptions, DetectedSpikes, ExtractOptions, FeatureReducer, InitialSorter,
    RecordingSource, SnippetClassifier, SnippetExtractor, SpikeDetector,
};
use crate::error::SortError;
use crate::types::EventStream;
use crate::waveform::{flatten_snippets, rectify};

/// Quiet logger for tests that exercise the logged pipeline paths
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Dense in-memory recording, samples x channels
pub struct DenseRecording {
    pub data: Array2<f32>,
    pub fs: f32,
}

impl DenseRecording {
    pub fn new(data: Array2<f32>, fs: f32) -> Self {
        Self { data, fs }
    }
}

/// Recording whose value at (t, ch) is t * channels + ch, for stitching tests
pub fn ramp_recording(num_samples: usize, num_channels: usize, fs: f32) -> DenseRecording {
    let mut data = Array2::zeros((num_samples, num_channels));
    for t in 0..num_samples {
        for ch in 0..num_channels {
            data[[t, ch]] = (t * num_channels + ch) as f32;
        }
    }
    DenseRecording::new(data, fs)
}

impl RecordingSource for DenseRecording {
    fn num_samples(&self) -> usize {
        self.data.shape()[0]
    }

    fn num_channels(&self) -> usize {
        self.data.shape()[1]
    }

    fn sampling_frequency(&self) -> f32 {
        self.fs
    }

    fn channel_locations(&self) -> Array2<f32> {
        let m = self.num_channels();
        let mut locs = Array2::zeros((m, 2));
        for ch in 0..m {
            locs[[ch, 0]] = ch as f32;
        }
        locs
    }

    fn traces(&self, start: usize, end: usize) -> Result<Array2<f32>> {
        if start > end || end > self.num_samples() {
            return Err(anyhow!("trace range {}..{} out of bounds", start, end));
        }
        Ok(self.data.slice(s![start..end, ..]).to_owned())
    }
}

/// Threshold detector: rectified cross-channel maximum, local peaks only
pub struct PeakDetector;

impl SpikeDetector for PeakDetector {
    fn detect(&self, traces: &Array2<f32>, opts: &DetectOptions) -> Result<DetectedSpikes> {
        let (n, m) = traces.dim();
        let rectified = rectify(traces, opts.detect_sign);
        let mut detected = DetectedSpikes::default();
        let radius = opts.time_radius as i64;
        for t in opts.margin_left..n.saturating_sub(opts.margin_right) {
            let mut best_ch = 0;
            let mut best = f32::NEG_INFINITY;
            for ch in 0..m {
                if rectified[[t, ch]] > best {
                    best = rectified[[t, ch]];
                    best_ch = ch;
                }
            }
            if best <= opts.detect_threshold {
                continue;
            }
            let lo = (t as i64 - radius).max(0) as usize;
            let hi = ((t as i64 + radius + 1) as usize).min(n);
            let mut is_peak = true;
            'window: for u in lo..hi {
                for ch in 0..m {
                    let v = rectified[[u, ch]];
                    if v > best || (v == best && u < t) {
                        is_peak = false;
                        break 'window;
                    }
                }
            }
            if is_peak {
                detected.times.push(t as i64);
                detected.channels.push(best_ch);
            }
        }
        Ok(detected)
    }
}

/// Extracts plain [t - pre, t + post) windows, zero-padded at trace edges
pub struct WindowExtractor;

impl SnippetExtractor for WindowExtractor {
    fn extract(
        &self,
        traces: &Array2<f32>,
        times: &[i64],
        _channels: Option<&[usize]>,
        opts: &ExtractOptions,
    ) -> Result<Array3<f32>> {
        let (n, m) = traces.dim();
        let window = opts.pre + opts.post;
        let mut out = Array3::zeros((times.len(), window, m));
        for (i, &t) in times.iter().enumerate() {
            for j in 0..window {
                let src = t - opts.pre as i64 + j as i64;
                if src >= 0 && (src as usize) < n {
                    for ch in 0..m {
                        out[[i, j, ch]] = traces[[src as usize, ch]];
                    }
                }
            }
        }
        Ok(out)
    }
}

/// Keeps the first columns of each row; stands in for a projection
pub struct TruncatingReducer;

impl FeatureReducer for TruncatingReducer {
    fn reduce(&self, vectors: &Array2<f32>, num_components: usize) -> Result<Array2<f32>> {
        let (n, d) = vectors.dim();
        if n <= num_components {
            return Err(SortError::Degenerate(format!(
                "only {} rows for {} components",
                n, num_components
            ))
            .into());
        }
        let keep = num_components.min(d);
        Ok(vectors.slice(s![.., 0..keep]).to_owned())
    }
}

/// Reducer double that rejects every input as degenerate
pub struct DegenerateReducer;

impl FeatureReducer for DegenerateReducer {
    fn reduce(&self, _vectors: &Array2<f32>, num_components: usize) -> Result<Array2<f32>> {
        Err(SortError::Degenerate(format!(
            "cannot produce {} components",
            num_components
        ))
        .into())
    }
}

/// Cluster double with a predetermined verdict
pub struct FixedClusterEngine {
    num_clusters: u32,
}

impl FixedClusterEngine {
    /// Every point lands in one cluster
    pub fn single() -> Self {
        Self { num_clusters: 1 }
    }

    /// The cloud always splits in two
    pub fn split() -> Self {
        Self { num_clusters: 2 }
    }
}

impl ClusterEngine for FixedClusterEngine {
    fn cluster(&self, features: &Array2<f32>) -> Result<Vec<u32>> {
        let n = features.shape()[0];
        Ok((0..n).map(|i| 1 + (i as u32 % self.num_clusters)).collect())
    }
}

/// One registered training batch
pub struct TrainingBatch {
    pub snippets: Array3<f32>,
    pub label: u32,
    pub offset: i64,
}

/// Classifier double that records training calls and never classifies
pub struct RecordingClassifier {
    pub batches: Vec<TrainingBatch>,
    pub fitted: bool,
}

impl RecordingClassifier {
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
            fitted: false,
        }
    }
}

impl SnippetClassifier for RecordingClassifier {
    fn add_training_snippets(
        &mut self,
        snippets: &Array3<f32>,
        label: u32,
        offset: i64,
    ) -> Result<()> {
        self.batches.push(TrainingBatch {
            snippets: snippets.clone(),
            label,
            offset,
        });
        Ok(())
    }

    fn fit(&mut self) -> Result<()> {
        self.fitted = true;
        Ok(())
    }

    fn classify(&self, _snippets: &Array3<f32>) -> Result<(Vec<u32>, Vec<i64>)> {
        Err(anyhow!("classify is not available on the recording double"))
    }
}

/// Nearest-mean classifier over flattened training batches
pub struct NearestTemplateClassifier {
    templates: Vec<(u32, i64, Vec<f32>)>,
    fitted: bool,
}

impl NearestTemplateClassifier {
    pub fn new() -> Self {
        Self {
            templates: Vec::new(),
            fitted: false,
        }
    }
}

impl SnippetClassifier for NearestTemplateClassifier {
    fn add_training_snippets(
        &mut self,
        snippets: &Array3<f32>,
        label: u32,
        offset: i64,
    ) -> Result<()> {
        let flat = flatten_snippets(snippets);
        let (n, d) = flat.dim();
        if n == 0 {
            return Err(anyhow!("empty training batch for unit {}", label));
        }
        let mut mean = vec![0.0f32; d];
        for i in 0..n {
            for j in 0..d {
                mean[j] += flat[[i, j]];
            }
        }
        for v in &mut mean {
            *v /= n as f32;
        }
        self.templates.push((label, offset, mean));
        Ok(())
    }

    fn fit(&mut self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(anyhow!("no training batches registered"));
        }
        self.fitted = true;
        Ok(())
    }

    fn classify(&self, snippets: &Array3<f32>) -> Result<(Vec<u32>, Vec<i64>)> {
        if !self.fitted {
            return Err(anyhow!("classifier has not been fitted"));
        }
        let flat = flatten_snippets(snippets);
        let (n, d) = flat.dim();
        let mut labels = Vec::with_capacity(n);
        let mut offsets = Vec::with_capacity(n);
        for i in 0..n {
            let mut best = 0;
            let mut best_dist = f32::INFINITY;
            for (k, (_, _, mean)) in self.templates.iter().enumerate() {
                let mut dist = 0.0f32;
                for j in 0..d.min(mean.len()) {
                    let diff = flat[[i, j]] - mean[j];
                    dist += diff * diff;
                }
                if dist < best_dist {
                    best_dist = dist;
                    best = k;
                }
            }
            labels.push(self.templates[best].0);
            offsets.push(self.templates[best].1);
        }
        Ok((labels, offsets))
    }
}

/// Classifier double returning one fixed (label, offset) for every event
pub struct FixedResponseClassifier {
    pub label: u32,
    pub offset: i64,
}

impl SnippetClassifier for FixedResponseClassifier {
    fn add_training_snippets(
        &mut self,
        _snippets: &Array3<f32>,
        _label: u32,
        _offset: i64,
    ) -> Result<()> {
        Ok(())
    }

    fn fit(&mut self) -> Result<()> {
        Ok(())
    }

    fn classify(&self, snippets: &Array3<f32>) -> Result<(Vec<u32>, Vec<i64>)> {
        let n = snippets.shape()[0];
        Ok((vec![self.label; n], vec![self.offset; n]))
    }
}

/// Phase-1 double returning a canned event stream
pub struct FixedSorter(pub EventStream);

impl InitialSorter for FixedSorter {
    fn sort(&self, _recording: &dyn RecordingSource) -> Result<EventStream> {
        Ok(self.0.clone())
    }
}
