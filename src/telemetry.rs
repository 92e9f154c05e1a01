use std::time::Duration;

/// Statistics gathered while materializing one read
#[derive(Debug, Default, Clone)]
pub struct ReadStats {
    pub batches: usize,
    pub rows: u64,
    /// Decoded in-memory size of the Arrow batches (approximation)
    pub bytes_decoded: u64,
    pub batch_durations_us: Vec<u64>,
}

impl ReadStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with one decoded batch
    pub fn record_batch(&mut self, rows: usize, bytes: u64, duration: Duration) {
        self.batches += 1;
        self.rows += rows as u64;
        self.bytes_decoded += bytes;
        self.batch_durations_us.push(duration.as_micros() as u64);
    }

    /// Calculate percentile from batch durations
    pub fn percentile(&self, p: f64) -> Option<u64> {
        if self.batch_durations_us.is_empty() {
            return None;
        }

        let mut sorted = self.batch_durations_us.clone();
        sorted.sort_unstable();

        let index = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
        let index = index.saturating_sub(1).min(sorted.len() - 1);

        Some(sorted[index])
    }

    /// Get p50, p90, p99 percentiles
    pub fn get_percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        (
            self.percentile(50.0),
            self.percentile(90.0),
            self.percentile(99.0),
        )
    }
}
