//! Snippet and template numerics shared by merging and training

use ndarray::{Array, Array2, Array3, ArrayView2, Axis, Dimension};

use crate::config::DetectSign;

/// Rectify waveforms by detection polarity so peaks are positive-going
pub fn rectify<D: Dimension>(waveforms: &Array<f32, D>, sign: DetectSign) -> Array<f32, D> {
    match sign {
        DetectSign::Negative => waveforms.mapv(|v| -v),
        DetectSign::Positive => waveforms.clone(),
        DetectSign::Both => waveforms.mapv(f32::abs),
    }
}

/// Per-channel peak summary of a rectified T x M template
#[derive(Debug, Clone)]
pub struct PeakSummary {
    /// Channel with the largest peak
    pub channel: usize,
    /// Peak amplitude per channel
    pub values: Vec<f32>,
    /// Sample index of the peak per channel
    pub times: Vec<usize>,
}

pub fn peak_summary(template: ArrayView2<f32>) -> PeakSummary {
    let (t, m) = template.dim();
    let mut values = vec![f32::NEG_INFINITY; m];
    let mut times = vec![0usize; m];
    for mi in 0..m {
        for ti in 0..t {
            let v = template[[ti, mi]];
            if v > values[mi] {
                values[mi] = v;
                times[mi] = ti;
            }
        }
    }
    let mut channel = 0;
    for mi in 1..m {
        if values[mi] > values[channel] {
            channel = mi;
        }
    }
    PeakSummary {
        channel,
        values,
        times,
    }
}

/// Coordinate-wise median of an L x T x M snippet batch
pub fn median_template(snippets: &Array3<f32>) -> Array2<f32> {
    let (l, t, m) = snippets.dim();
    let mut out = Array2::zeros((t, m));
    if l == 0 {
        return out;
    }
    let mut column = Vec::with_capacity(l);
    for ti in 0..t {
        for mi in 0..m {
            column.clear();
            for li in 0..l {
                column.push(snippets[[li, ti, mi]]);
            }
            column.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            out[[ti, mi]] = if l % 2 == 1 {
                column[l / 2]
            } else {
                0.5 * (column[l / 2 - 1] + column[l / 2])
            };
        }
    }
    out
}

/// Median template per unit; row k holds the template of unit k + 1
pub fn unit_templates(snippets: &Array3<f32>, labels: &[u32], num_units: usize) -> Array3<f32> {
    let (_, t, m) = snippets.dim();
    let mut out = Array3::zeros((num_units, t, m));
    for unit in 1..=num_units {
        let unit_snippets = snippets_for_unit(snippets, labels, unit as u32);
        if unit_snippets.shape()[0] > 0 {
            out.index_axis_mut(Axis(0), unit - 1)
                .assign(&median_template(&unit_snippets));
        }
    }
    out
}

/// Circular shift along the time axis; a positive shift moves samples later
pub fn roll_snippets(snippets: &Array3<f32>, shift: i64) -> Array3<f32> {
    let (l, t, m) = snippets.dim();
    let mut out = Array3::zeros((l, t, m));
    if t == 0 {
        return out;
    }
    let t_len = t as i64;
    for ti in 0..t {
        let src = (((ti as i64 - shift) % t_len) + t_len) % t_len;
        let src = src as usize;
        for li in 0..l {
            for mi in 0..m {
                out[[li, ti, mi]] = snippets[[li, src, mi]];
            }
        }
    }
    out
}

/// Cap a batch at max_num snippets, keeping evenly spaced rows in order
pub fn subsample_snippets(snippets: &Array3<f32>, max_num: usize) -> Array3<f32> {
    let n = snippets.shape()[0];
    if n <= max_num {
        return snippets.clone();
    }
    let inds: Vec<usize> = (0..max_num).map(|i| i * n / max_num).collect();
    snippets.select(Axis(0), &inds)
}

/// Flatten each T x M snippet into one row of length T * M
pub fn flatten_snippets(snippets: &Array3<f32>) -> Array2<f32> {
    let (l, t, m) = snippets.dim();
    let mut out = Array2::zeros((l, t * m));
    for li in 0..l {
        for ti in 0..t {
            for mi in 0..m {
                out[[li, ti * m + mi]] = snippets[[li, ti, mi]];
            }
        }
    }
    out
}

/// Rows of the batch whose events carry the given label, in stream order
pub fn snippets_for_unit(snippets: &Array3<f32>, labels: &[u32], unit_id: u32) -> Array3<f32> {
    let inds: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == unit_id)
        .map(|(i, _)| i)
        .collect();
    snippets.select(Axis(0), &inds)
}
