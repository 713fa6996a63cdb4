//! Event stream types

/// Label reserved for removed events; never present in final output
pub const REMOVED_LABEL: u32 = 0;

/// Labeled spike events as parallel time/label arrays.
///
/// Times are sample indices on whichever time base the stream lives on
/// (chunk-local or global). Live units are numbered from 1; label 0 marks
/// an event as removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStream {
    pub times: Vec<i64>,
    pub labels: Vec<u32>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            times: Vec::with_capacity(capacity),
            labels: Vec::with_capacity(capacity),
        }
    }

    /// Build a stream from per-unit spike trains, sorted by time
    pub fn from_unit_trains(trains: &[(u32, Vec<i64>)]) -> Self {
        let total: usize = trains.iter().map(|(_, t)| t.len()).sum();
        let mut stream = Self::with_capacity(total);
        for (unit_id, times) in trains {
            for &t in times {
                stream.push(t, *unit_id);
            }
        }
        stream.sort_by_time();
        stream
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn push(&mut self, time: i64, label: u32) {
        self.times.push(time);
        self.labels.push(label);
    }

    /// Highest unit label in the stream
    pub fn num_units(&self) -> usize {
        self.labels.iter().copied().max().unwrap_or(0) as usize
    }

    /// Indices of the events carrying the given label, in stream order
    pub fn unit_indices(&self, unit_id: u32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == unit_id)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn is_sorted_by_time(&self) -> bool {
        self.times.windows(2).all(|w| w[0] <= w[1])
    }

    /// Stable re-sort of both arrays by time
    pub fn sort_by_time(&mut self) {
        if self.is_sorted_by_time() {
            return;
        }
        let mut order: Vec<usize> = (0..self.times.len()).collect();
        order.sort_by_key(|&i| self.times[i]);
        self.times = order.iter().map(|&i| self.times[i]).collect();
        self.labels = order.iter().map(|&i| self.labels[i]).collect();
    }

    /// Drop every event carrying the removed-event label
    pub fn drop_removed(&mut self) {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.labels[i] != REMOVED_LABEL)
            .collect();
        if keep.len() == self.len() {
            return;
        }
        self.times = keep.iter().map(|&i| self.times[i]).collect();
        self.labels = keep.iter().map(|&i| self.labels[i]).collect();
    }
}
