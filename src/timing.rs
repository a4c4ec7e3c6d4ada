//! Fixed-point time domain for sample-accurate playback
//!
//! All passage timing is expressed in ticks at 28,224,000 Hz. That rate is
//! the least common multiple of every supported audio sample rate, so a
//! duration in ticks converts to a whole number of samples at any of them.
//! Floating-point time is never used for positioning.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ticks per second: LCM of all supported sample rates (8 kHz - 192 kHz).
pub const TICK_RATE: i64 = 28_224_000;

/// Ticks per millisecond (TICK_RATE / 1000).
pub const TICKS_PER_MS: i64 = 28_224;

/// End marker for passages of unknown length: long enough for weeks of
/// audio while keeping tick-to-sample arithmetic overflow-free at any
/// supported rate.
pub const MAX_PASSAGE_TICKS: i64 = i64::MAX / 200_000;

/// The supported sample rates, all of which divide `TICK_RATE` evenly.
pub const SUPPORTED_RATES: [u32; 11] = [
    8_000, 11_025, 16_000, 22_050, 32_000, 44_100, 48_000, 88_200, 96_000, 176_400, 192_000,
];

pub fn is_supported_rate(rate: u32) -> bool {
    SUPPORTED_RATES.contains(&rate)
}

/// Convert milliseconds to ticks (exact).
pub fn ms_to_ticks(ms: i64) -> i64 {
    ms * TICKS_PER_MS
}

/// Convert ticks to milliseconds (truncating).
pub fn ticks_to_ms(ticks: i64) -> i64 {
    ticks / TICKS_PER_MS
}

/// Convert ticks to sample frames at the given rate.
///
/// Exact (no remainder) whenever `rate` is a supported rate and `ticks`
/// is a whole number of samples; otherwise truncates.
pub fn ticks_to_samples(ticks: i64, rate: u32) -> i64 {
    ticks * rate as i64 / TICK_RATE
}

/// Convert sample frames at the given rate to ticks.
pub fn samples_to_ticks(samples: i64, rate: u32) -> i64 {
    samples * TICK_RATE / rate as i64
}

/// Ticks spanned by one sample frame at the given rate.
pub fn ticks_per_sample(rate: u32) -> i64 {
    TICK_RATE / rate as i64
}

/// The six timing points that position a passage and its fades, all in
/// ticks relative to the start of the underlying audio source.
///
/// The fade pair (`fade_in_start`, `fade_out_start`) and the lead pair
/// (`lead_in_start`, `lead_out_start`) are independent: fades shape
/// amplitude, leads bound the crossfade overlap window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageTiming {
    /// First audible tick of the passage.
    pub start: i64,
    /// Where the fade-in curve begins (equal to `start` for no fade-in).
    pub fade_in_start: i64,
    /// End of the fade-in region; full volume from here.
    pub lead_in_start: i64,
    /// Last tick at which the previous passage may still overlap.
    pub lead_out_start: i64,
    /// Where the fade-out curve begins (equal to `end` for no fade-out).
    pub fade_out_start: i64,
    /// One past the last audible tick.
    pub end: i64,
}

impl PassageTiming {
    /// Timing for a full-length passage with no fades and no overlap.
    pub fn full(start: i64, end: i64) -> Self {
        Self {
            start,
            fade_in_start: start,
            lead_in_start: start,
            lead_out_start: end,
            fade_out_start: end,
            end,
        }
    }

    /// Duration of the fade-in region in ticks.
    pub fn fade_in_duration(&self) -> i64 {
        self.lead_in_start - self.fade_in_start
    }

    /// Duration of the fade-out region in ticks.
    pub fn fade_out_duration(&self) -> i64 {
        self.end - self.fade_out_start
    }

    /// Validate marker ordering.
    ///
    /// Markers must be non-negative and monotonically ordered:
    /// `start <= fade_in_start <= lead_in_start <= lead_out_start <= end`
    /// and `start <= fade_out_start <= end`.
    pub fn validate(&self) -> Result<()> {
        if self.start < 0 {
            return Err(Error::InvalidTiming(format!(
                "start tick must be non-negative, got {}",
                self.start
            )));
        }
        let ordered = self.start <= self.fade_in_start
            && self.fade_in_start <= self.lead_in_start
            && self.lead_in_start <= self.lead_out_start
            && self.lead_out_start <= self.end;
        if !ordered {
            return Err(Error::InvalidTiming(format!(
                "markers out of order: start={} fade_in={} lead_in={} lead_out={} end={}",
                self.start, self.fade_in_start, self.lead_in_start, self.lead_out_start, self.end
            )));
        }
        if self.fade_out_start < self.start || self.fade_out_start > self.end {
            return Err(Error::InvalidTiming(format!(
                "fade_out_start {} outside [{}, {}]",
                self.fade_out_start, self.start, self.end
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_rate_divisible_by_supported_rates() {
        for rate in SUPPORTED_RATES {
            assert_eq!(TICK_RATE % rate as i64, 0, "{} Hz must divide TICK_RATE", rate);
            assert!(is_supported_rate(rate));
        }
        assert!(!is_supported_rate(44_101));
        assert!(!is_supported_rate(0));
    }

    #[test]
    fn test_ms_ticks_round_trip() {
        assert_eq!(ms_to_ticks(1), 28_224);
        assert_eq!(ms_to_ticks(1000), TICK_RATE);
        assert_eq!(ticks_to_ms(TICK_RATE), 1000);
        // Truncation: 1 tick shy of a millisecond
        assert_eq!(ticks_to_ms(TICKS_PER_MS - 1), 0);
    }

    #[test]
    fn test_ticks_samples_exact_at_supported_rates() {
        // One second in ticks is exactly `rate` frames at any supported rate
        for rate in SUPPORTED_RATES {
            assert_eq!(ticks_to_samples(TICK_RATE, rate), rate as i64);
            assert_eq!(samples_to_ticks(rate as i64, rate), TICK_RATE);
        }
    }

    #[test]
    fn test_ticks_per_sample() {
        assert_eq!(ticks_per_sample(44_100), 640);
        assert_eq!(ticks_per_sample(48_000), 588);
        assert_eq!(ticks_per_sample(8_000), 3_528);
    }

    #[test]
    fn test_passage_timing_full() {
        let t = PassageTiming::full(0, TICK_RATE * 5);
        assert!(t.validate().is_ok());
        assert_eq!(t.fade_in_duration(), 0);
        assert_eq!(t.fade_out_duration(), 0);
    }

    #[test]
    fn test_passage_timing_rejects_disorder() {
        let mut t = PassageTiming::full(0, TICK_RATE);
        t.fade_in_start = TICK_RATE * 2;
        assert!(t.validate().is_err());

        let mut t = PassageTiming::full(TICK_RATE, TICK_RATE * 2);
        t.fade_out_start = 0; // before start
        assert!(t.validate().is_err());

        let t = PassageTiming::full(-1, TICK_RATE);
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_fade_pair_independent_of_lead_pair() {
        // Fade-out begins before lead-out ends: legal, the pairs are independent
        let t = PassageTiming {
            start: 0,
            fade_in_start: 0,
            lead_in_start: TICK_RATE,
            lead_out_start: TICK_RATE * 4,
            fade_out_start: TICK_RATE * 3,
            end: TICK_RATE * 5,
        };
        assert!(t.validate().is_ok());
        assert_eq!(t.fade_out_duration(), TICK_RATE * 2);
    }
}
