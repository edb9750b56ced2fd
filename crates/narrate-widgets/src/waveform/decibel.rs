//! Decibel scale for 16-bit amplitudes
//!
//! `dB = 20 * log10(|value| / reference)` with `reference = 32767 * adjust`.
//! Silence has no finite level and maps to the floor, the level of a single
//! quantization step: `20 * log10(1 / reference)` (about -90.3 dB).

/// Amplitude of full scale for signed 16-bit samples
pub const FULL_SCALE: f64 = i16::MAX as f64;

/// Amplitude (not power) decibels
pub const LOG_FACTOR: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecibelScale {
    reference: f64,
    floor: f64,
}

impl DecibelScale {
    /// Scale with the 0 dB reference at `32767 * adjust_factor`
    ///
    /// A zero or non-finite factor keeps the plain full-scale reference.
    pub fn new(adjust_factor: f64) -> Self {
        let reference = if adjust_factor.is_finite() && adjust_factor > 0.0 {
            FULL_SCALE * adjust_factor
        } else {
            FULL_SCALE
        };
        Self {
            reference,
            floor: LOG_FACTOR * (1.0 / reference).log10(),
        }
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    /// Lowest representable level (silence)
    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Level of a magnitude, never below the floor
    pub fn to_db(&self, magnitude: f64) -> f64 {
        if magnitude <= 0.0 || !magnitude.is_finite() {
            return self.floor;
        }
        (LOG_FACTOR * (magnitude / self.reference).log10()).max(self.floor)
    }

    /// Magnitude of a level
    pub fn from_db(&self, db: f64) -> f64 {
        self.reference * 10f64.powf(db / LOG_FACTOR)
    }
}

impl Default for DecibelScale {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Level interval mapped onto the drawing height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecibelRange {
    pub low: f64,
    pub high: f64,
}

impl DecibelRange {
    /// Position of `db` within the range, 0 at `low` and 1 at `high`
    pub fn fraction(&self, db: f64) -> f64 {
        let span = self.high - self.low;
        if span <= f64::EPSILON {
            return if db >= self.high { 1.0 } else { 0.0 };
        }
        ((db - self.low) / span).max(0.0).min(1.0)
    }
}

/// Running extremes of the levels seen during one reduction pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReachedLevels {
    pub min: f64,
    pub max: f64,
}

impl Default for ReachedLevels {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl ReachedLevels {
    /// Record a level of a non-silent value
    pub fn observe(&mut self, db: f64) {
        self.min = self.min.min(db);
        self.max = self.max.max(db);
    }

    pub fn merge(&mut self, other: &ReachedLevels) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_is_one_quantization_step() {
        let scale = DecibelScale::default();
        assert!((scale.floor() - (-90.3)).abs() < 0.01);
        assert_eq!(scale.to_db(0.0), scale.floor());
        assert!((scale.to_db(FULL_SCALE)).abs() < 1e-12);
    }

    #[test]
    fn test_roundtrip_recovers_magnitude() {
        for factor in [1.0, 0.707, 2.5] {
            let scale = DecibelScale::new(factor);
            for magnitude in [1.0, 3.0, 100.0, 1234.5, 32767.0, 32768.0] {
                let back = scale.from_db(scale.to_db(magnitude));
                assert!(
                    (back - magnitude).abs() < 1e-6 * magnitude.max(1.0),
                    "factor {} magnitude {} came back as {}",
                    factor,
                    magnitude,
                    back
                );
            }
        }
    }

    #[test]
    fn test_below_floor_is_clamped() {
        let scale = DecibelScale::new(4.0);
        assert_eq!(scale.to_db(0.25), scale.floor());
    }

    #[test]
    fn test_degenerate_adjust_factor() {
        assert_eq!(DecibelScale::new(0.0), DecibelScale::default());
        assert_eq!(DecibelScale::new(f64::NAN), DecibelScale::default());
    }

    #[test]
    fn test_range_fraction() {
        let range = DecibelRange { low: -60.0, high: 0.0 };
        assert_eq!(range.fraction(-60.0), 0.0);
        assert_eq!(range.fraction(0.0), 1.0);
        assert!((range.fraction(-30.0) - 0.5).abs() < 1e-12);
        assert_eq!(range.fraction(-100.0), 0.0);

        let flat = DecibelRange { low: -6.0, high: -6.0 };
        assert_eq!(flat.fraction(-6.0), 1.0);
    }
}
