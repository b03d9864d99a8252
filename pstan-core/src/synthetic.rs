//! Deterministic synthetic bars for smoke runs and benchmarks.
//!
//! A seeded random walk with occasional volume spikes. Every
//! [`PREPOST_EVERY`]th bar has zero volume, standing in for a pre/post-market
//! bar. Multi-series batches derive one sub-seed per series via BLAKE3, so
//! series `i` is the same no matter how many series are generated.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::Bar;

pub const PREPOST_EVERY: usize = 8;

const STEP_PCT: f64 = 0.01;
const SPIKE_PROBABILITY: f64 = 0.03;
const SPIKE_PCT: f64 = 0.06;
const SPIKE_VOLUME: f64 = 12.0;

fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(4, 0, 0))
        .unwrap_or_default()
}

/// Sub-seed for series `index` of a batch generated from `master_seed`.
pub fn series_seed(master_seed: u64, index: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(&index.to_le_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// `n` five-minute bars starting at 100.0.
pub fn random_walk_bars(n: usize, seed: u64) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = start_time();
    let mut prev_close = 100.0_f64;
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        let spike = rng.gen_bool(SPIKE_PROBABILITY);
        let step = if spike {
            SPIKE_PCT
        } else {
            rng.gen_range(-STEP_PCT..STEP_PCT)
        };
        let open = prev_close;
        let close = (open * (1.0 + step)).max(0.01);
        let wick = rng.gen_range(0.0..0.004);
        let high = open.max(close) * (1.0 + wick);
        let low = open.min(close) * (1.0 - wick);

        let volume = if i % PREPOST_EVERY == PREPOST_EVERY - 1 {
            0.0
        } else {
            let base: f64 = rng.gen_range(500.0..1500.0);
            if spike {
                base * SPIKE_VOLUME
            } else {
                base.round()
            }
        };

        bars.push(Bar {
            timestamp: start + Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume,
        });
        prev_close = close;
    }

    bars
}

/// `count` independent series of `n` bars each.
pub fn random_walk_batch(count: usize, n: usize, master_seed: u64) -> Vec<Vec<Bar>> {
    (0..count as u64)
        .map(|i| random_walk_bars(n, series_seed(master_seed, i)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bars() {
        assert_eq!(random_walk_bars(200, 7), random_walk_bars(200, 7));
        assert_ne!(random_walk_bars(200, 7), random_walk_bars(200, 8));
    }

    #[test]
    fn bars_are_sane_and_ordered() {
        let bars = random_walk_bars(500, 42);
        assert_eq!(bars.len(), 500);
        for pair in bars.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
        assert!(bars.iter().all(Bar::is_sane));
    }

    #[test]
    fn prepost_bars_have_zero_volume() {
        let bars = random_walk_bars(32, 1);
        for (i, bar) in bars.iter().enumerate() {
            let expected_void = i % PREPOST_EVERY == PREPOST_EVERY - 1;
            assert_eq!(bar.volume == 0.0, expected_void, "bar {i}");
        }
    }

    #[test]
    fn batch_series_are_order_independent() {
        let batch = random_walk_batch(3, 50, 99);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2], random_walk_bars(50, series_seed(99, 2)));
        assert_ne!(batch[0], batch[1]);
    }
}
