//! Probe history ring and smoothing primitives.

/// Ring capacity — enough for 10 s of history at the default 10 Hz rate.
pub const HISTORY_LEN: usize = 100;

/// Loss and jitter are computed over the most recent samples.
pub const LOSS_WINDOW: usize = 20;

/// One RTT probe result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSample {
    pub rtt_ms: f64,
    pub success: bool,
    pub timestamp_us: i64,
}

/// Fixed-size probe ring with a monotone write counter.
///
/// The owning probe path is the only writer; readers walk the last K
/// entries newest-first.
#[derive(Debug, Clone)]
pub struct ProbeHistory {
    samples: [ProbeSample; HISTORY_LEN],
    written: u64,
}

impl Default for ProbeHistory {
    fn default() -> Self {
        ProbeHistory {
            samples: [ProbeSample {
                rtt_ms: 0.0,
                success: false,
                timestamp_us: 0,
            }; HISTORY_LEN],
            written: 0,
        }
    }
}

impl ProbeHistory {
    pub fn new() -> ProbeHistory {
        ProbeHistory::default()
    }

    /// Append a sample, overwriting the oldest once wrapped.
    pub fn push(&mut self, sample: ProbeSample) {
        self.samples[(self.written as usize) % HISTORY_LEN] = sample;
        self.written += 1;
    }

    /// Total samples ever written (not capped at the ring size).
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Iterate the last `k` samples, newest first.
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &ProbeSample> {
        let avail = (self.written as usize).min(HISTORY_LEN).min(k);
        (0..avail).map(move |i| {
            let idx = (self.written as usize - 1 - i) % HISTORY_LEN;
            &self.samples[idx]
        })
    }

    /// Mean RTT of the successful samples among the last `k` entries.
    /// `None` when none of them succeeded.
    pub fn recent_success_mean(&self, k: usize) -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for s in self.recent(k) {
            if s.success {
                sum += s.rtt_ms;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// Loss percentage over the last `window` samples (0 when empty).
    pub fn loss_pct(&self, window: usize) -> f64 {
        let mut total = 0usize;
        let mut ok = 0usize;
        for s in self.recent(window) {
            total += 1;
            if s.success {
                ok += 1;
            }
        }
        if total == 0 {
            0.0
        } else {
            100.0 * (total - ok) as f64 / total as f64
        }
    }

    /// Jitter: mean absolute difference between consecutive successful
    /// RTT samples over the last `window` entries.
    pub fn jitter_ms(&self, window: usize) -> f64 {
        let mut prev: Option<f64> = None;
        let mut sum = 0.0;
        let mut count = 0usize;
        for s in self.recent(window) {
            if !s.success {
                continue;
            }
            if let Some(p) = prev {
                sum += (s.rtt_ms - p).abs();
                count += 1;
            }
            prev = Some(s.rtt_ms);
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

// ─── EWMA ───────────────────────────────────────────────────────────────────

/// Exponentially weighted moving average.
///
/// The first sample initialises the value exactly; every later sample moves
/// it by `alpha`. Uninitialised reads return 0.
#[derive(Debug, Clone)]
pub struct Ewma {
    alpha: f64,
    value: f64,
    initialized: bool,
}

impl Ewma {
    pub fn new(alpha: f64) -> Ewma {
        assert!((0.0..=1.0).contains(&alpha), "alpha must be in [0, 1]");
        Ewma {
            alpha,
            value: 0.0,
            initialized: false,
        }
    }

    /// Update with a new sample and return the smoothed value.
    pub fn update(&mut self, sample: f64) -> f64 {
        if !self.initialized {
            self.value = sample;
            self.initialized = true;
        } else {
            self.value = self.alpha * sample + (1.0 - self.alpha) * self.value;
        }
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rtt: f64, success: bool) -> ProbeSample {
        ProbeSample {
            rtt_ms: rtt,
            success,
            timestamp_us: 0,
        }
    }

    // ─── Ring Tests ─────────────────────────────────────────────────────

    #[test]
    fn recent_is_newest_first() {
        let mut h = ProbeHistory::new();
        for i in 0..5 {
            h.push(sample(i as f64, true));
        }
        let rtts: Vec<f64> = h.recent(3).map(|s| s.rtt_ms).collect();
        assert_eq!(rtts, vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn ring_wraps_past_capacity() {
        let mut h = ProbeHistory::new();
        for i in 0..(HISTORY_LEN + 10) {
            h.push(sample(i as f64, true));
        }
        assert_eq!(h.written(), (HISTORY_LEN + 10) as u64);
        let newest = h.recent(1).next().unwrap().rtt_ms;
        assert_eq!(newest, (HISTORY_LEN + 9) as f64);
        // A full window never yields more than the ring holds.
        assert_eq!(h.recent(HISTORY_LEN + 50).count(), HISTORY_LEN);
    }

    #[test]
    fn success_mean_skips_failures() {
        let mut h = ProbeHistory::new();
        h.push(sample(10.0, true));
        h.push(sample(0.0, false));
        h.push(sample(30.0, true));
        // Last 3: [30 ok, fail, 10 ok] -> mean of 30 and 10.
        assert_eq!(h.recent_success_mean(3), Some(20.0));
    }

    #[test]
    fn success_mean_none_when_all_failed() {
        let mut h = ProbeHistory::new();
        h.push(sample(0.0, false));
        h.push(sample(0.0, false));
        assert_eq!(h.recent_success_mean(3), None);
    }

    #[test]
    fn loss_pct_over_window() {
        let mut h = ProbeHistory::new();
        for _ in 0..15 {
            h.push(sample(20.0, true));
        }
        for _ in 0..5 {
            h.push(sample(0.0, false));
        }
        assert!((h.loss_pct(LOSS_WINDOW) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn loss_pct_empty_history_is_zero() {
        let h = ProbeHistory::new();
        assert_eq!(h.loss_pct(LOSS_WINDOW), 0.0);
    }

    #[test]
    fn jitter_from_consecutive_successes() {
        let mut h = ProbeHistory::new();
        h.push(sample(10.0, true));
        h.push(sample(20.0, true));
        h.push(sample(10.0, true));
        // Deltas: |10-20| and |20-10|.
        assert!((h.jitter_ms(LOSS_WINDOW) - 10.0).abs() < 1e-9);
    }

    // ─── EWMA Tests ─────────────────────────────────────────────────────

    #[test]
    fn ewma_first_sample_sets_value() {
        let mut ewma = Ewma::new(0.05);
        ewma.update(30.0);
        assert_eq!(ewma.value(), 30.0);
        assert!(ewma.is_initialized());
    }

    #[test]
    fn ewma_smooths_toward_new_value() {
        let mut ewma = Ewma::new(0.5);
        ewma.update(100.0);
        let v = ewma.update(200.0);
        assert!((v - 150.0).abs() < 0.001);
    }

    #[test]
    fn ewma_slow_alpha_resists_spikes() {
        let mut ewma = Ewma::new(0.05);
        ewma.update(30.0);
        ewma.update(150.0);
        // One spike barely moves a slow baseline.
        assert!(ewma.value() < 40.0);
    }
}
