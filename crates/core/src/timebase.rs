//! TimeBase - turns elapsed time into gravity steps and a beat phase
//!
//! Two independent clocks share the same input:
//!
//! - the **gravity clock** accumulates elapsed time and emits one step per
//!   `gravity_interval`, carrying the remainder into the next tick;
//! - the **beat clock** tracks the fractional position inside the current
//!   beat for the configured `bpm`.
//!
//! They are only linked through [`TempoCoupling`], which may derive the
//! effective gravity interval from the beat length.
//!
//! Gravity arithmetic is done on integer nanoseconds so the number of steps
//! after any sequence of ticks is exactly `floor(total / interval)` as long as
//! the catch-up cap is not hit.

use std::time::Duration;

use serde::Deserialize;

use crate::config::{SpeedConfig, MAX_BPM};
use crate::error::{in_range, positive_seconds, ConfigError};

/// Largest accepted beat subdivision
pub const MAX_BEAT_DIVISION: u32 = 64;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// How the tempo influences the gravity interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TempoCoupling {
    /// Gravity runs on its own interval; bpm only drives the beat phase
    #[default]
    Independent,
    /// One gravity step every `1 / division` beat; the configured interval is ignored
    BeatDivision { division: u32 },
    /// The configured interval is rounded to the nearest multiple of `1 / division` beat
    Quantized { division: u32 },
}

impl TempoCoupling {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            TempoCoupling::Independent => Ok(()),
            TempoCoupling::BeatDivision { division } | TempoCoupling::Quantized { division } => {
                in_range(
                    "speed.coupling.division",
                    *division as f64,
                    1.0,
                    MAX_BEAT_DIVISION as f64,
                )
                .map(|_| ())
            }
        }
    }

    /// Same policy with another subdivision. `Independent` is left untouched.
    pub fn with_division(self, division: u32) -> Self {
        match self {
            TempoCoupling::Independent => self,
            TempoCoupling::BeatDivision { .. } => TempoCoupling::BeatDivision { division },
            TempoCoupling::Quantized { .. } => TempoCoupling::Quantized { division },
        }
    }

    /// Effective gravity interval for a base interval and a beat length.
    pub fn gravity_interval(&self, base: Duration, beat: Duration) -> Duration {
        match *self {
            TempoCoupling::Independent => base,
            TempoCoupling::BeatDivision { division } => {
                nanos_to_duration((beat.as_nanos() / division.max(1) as u128).max(1))
            }
            TempoCoupling::Quantized { division } => {
                let unit = (beat.as_nanos() / division.max(1) as u128).max(1);
                let base = base.as_nanos();
                // round to nearest, at least one unit
                let units = ((base + unit / 2) / unit).max(1);
                nanos_to_duration(units * unit)
            }
        }
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    let secs = (nanos / NANOS_PER_SEC).min(u64::MAX as u128) as u64;
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

fn beat_length(bpm: f64) -> Result<Duration, ConfigError> {
    in_range("bpm", bpm, f64::MIN_POSITIVE, MAX_BPM)?;
    positive_seconds("bpm", 60.0 / bpm)
}

#[derive(Debug, Clone)]
pub struct TimeBase {
    /// Interval as configured / last accepted update
    base_interval: Duration,
    /// Interval actually used, after coupling
    gravity_interval: Duration,
    bpm: f64,
    beat: Duration,
    coupling: TempoCoupling,
    max_catch_up: u32,

    accumulator: Duration,
    elapsed: Duration,
    steps: u64,
    dropped_steps: u64,
    /// Set while consecutive ticks keep hitting the catch-up cap
    saturated: bool,
    saturations: u64,

    beat_phase: f64,
    beats: u64,
}

impl TimeBase {
    pub fn new(config: &SpeedConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_interval = positive_seconds("gravity_interval", config.gravity_interval)?;
        let beat = beat_length(config.bpm)?;
        Ok(Self {
            base_interval,
            gravity_interval: config.coupling.gravity_interval(base_interval, beat),
            bpm: config.bpm,
            beat,
            coupling: config.coupling,
            max_catch_up: config.max_catch_up_steps.max(1),
            accumulator: Duration::ZERO,
            elapsed: Duration::ZERO,
            steps: 0,
            dropped_steps: 0,
            saturated: false,
            saturations: 0,
            beat_phase: 0.0,
            beats: 0,
        })
    }

    /// Advance both clocks by `dt` and return the number of gravity steps due.
    ///
    /// At most `max_catch_up_steps` are returned; any further whole intervals
    /// are discarded so a slow frame cannot snowball. The sub-interval
    /// remainder is always carried over.
    pub fn advance(&mut self, dt: Duration) -> u32 {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.advance_beat(dt);

        self.accumulator = self.accumulator.saturating_add(dt);
        let interval = self.gravity_interval.as_nanos();
        let acc = self.accumulator.as_nanos();
        let due = acc / interval;
        self.accumulator = nanos_to_duration(acc % interval);

        let cap = self.max_catch_up as u128;
        let steps = if due > cap {
            let dropped = (due - cap) as u64;
            self.dropped_steps = self.dropped_steps.saturating_add(dropped);
            if self.saturated {
                log::debug!("still behind: {} steps due, dropping {}", due, dropped);
            } else {
                self.saturated = true;
                self.saturations = self.saturations.saturating_add(1);
                log::warn!(
                    "gravity fell behind by {} steps; running {} and dropping {}",
                    due,
                    cap,
                    dropped
                );
            }
            cap as u32
        } else {
            if self.saturated {
                self.saturated = false;
                log::info!(
                    "gravity caught up ({} steps dropped in total)",
                    self.dropped_steps
                );
            }
            due as u32
        };

        self.steps = self.steps.saturating_add(steps as u64);
        steps
    }

    fn advance_beat(&mut self, dt: Duration) {
        self.beat_phase += dt.as_secs_f64() / self.beat.as_secs_f64();
        let whole = self.beat_phase.floor();
        if whole >= 1.0 {
            self.beats = self.beats.saturating_add(whole as u64);
            self.beat_phase -= whole;
        }
        if !(0.0..1.0).contains(&self.beat_phase) {
            self.beat_phase = 0.0;
        }
    }

    /// Fractional position inside the current beat, in `[0, 1)`.
    pub fn current_beat_phase(&self) -> f64 {
        self.beat_phase
    }

    /// Whole beats elapsed since start
    pub fn beat_count(&self) -> u64 {
        self.beats
    }

    /// Gravity steps emitted since start
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Gravity steps discarded by the catch-up cap
    pub fn dropped_steps(&self) -> u64 {
        self.dropped_steps
    }

    /// Runs of consecutive ticks that hit the catch-up cap. Each run logs
    /// one warning.
    pub fn saturations(&self) -> u64 {
        self.saturations
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn gravity_interval(&self) -> Duration {
        self.gravity_interval
    }

    pub fn base_gravity_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beat_duration(&self) -> Duration {
        self.beat
    }

    pub fn coupling(&self) -> TempoCoupling {
        self.coupling
    }

    /// Time left until the next gravity step
    pub fn time_until_next_step(&self) -> Duration {
        self.gravity_interval.saturating_sub(self.accumulator)
    }

    /// Replace the gravity interval. Zero, negative and non-finite values are
    /// rejected and the previous interval stays in effect.
    ///
    /// The accumulated remainder is kept, so no partial step is lost.
    pub fn set_gravity_interval(&mut self, secs: f64) -> Result<Duration, ConfigError> {
        let base = positive_seconds("gravity_interval", secs)?;
        self.base_interval = base;
        self.recouple();
        Ok(self.gravity_interval)
    }

    /// Replace the tempo. The beat phase is preserved across the change.
    pub fn set_bpm(&mut self, bpm: f64) -> Result<(), ConfigError> {
        self.beat = beat_length(bpm)?;
        self.bpm = bpm;
        self.recouple();
        Ok(())
    }

    /// Change the subdivision of the current coupling. Must be a whole number.
    pub fn set_beat_division(&mut self, value: f64) -> Result<(), ConfigError> {
        let division = in_range("beat_division", value, 1.0, MAX_BEAT_DIVISION as f64)?;
        if division.fract() != 0.0 {
            return Err(ConfigError::Invalid {
                param: "beat_division",
                reason: format!("must be a whole number (got {value})"),
            });
        }
        self.coupling = self.coupling.with_division(division as u32);
        self.recouple();
        Ok(())
    }

    pub fn set_coupling(&mut self, coupling: TempoCoupling) -> Result<(), ConfigError> {
        coupling.validate()?;
        self.coupling = coupling;
        self.recouple();
        Ok(())
    }

    fn recouple(&mut self) {
        let next = self.coupling.gravity_interval(self.base_interval, self.beat);
        if next != self.gravity_interval {
            log::debug!(
                "gravity interval {:?} -> {:?} ({:?})",
                self.gravity_interval,
                next,
                self.coupling
            );
        }
        self.gravity_interval = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed(gravity: f64, bpm: f64) -> SpeedConfig {
        SpeedConfig {
            gravity_interval: gravity,
            bpm,
            ..SpeedConfig::default()
        }
    }

    #[test]
    fn remainder_carries_between_ticks() {
        let mut tb = TimeBase::new(&speed(1.0, 120.0)).unwrap();
        assert_eq!(tb.advance(Duration::from_millis(600)), 0);
        assert_eq!(tb.advance(Duration::from_millis(600)), 1);
        assert_eq!(tb.advance(Duration::from_millis(800)), 1);
        assert_eq!(tb.step_count(), 2);
        assert_eq!(tb.time_until_next_step(), Duration::from_secs(1));
    }

    #[test]
    fn catch_up_is_capped_and_debt_dropped() {
        let cfg = SpeedConfig {
            gravity_interval: 0.1,
            max_catch_up_steps: 3,
            ..SpeedConfig::default()
        };
        let mut tb = TimeBase::new(&cfg).unwrap();
        assert_eq!(tb.advance(Duration::from_millis(1050)), 3);
        assert_eq!(tb.dropped_steps(), 7);
        // remainder of 50ms survives
        assert_eq!(tb.advance(Duration::from_millis(50)), 1);
    }

    #[test]
    fn sustained_lag_is_one_saturation_episode() {
        let cfg = SpeedConfig {
            gravity_interval: 0.1,
            max_catch_up_steps: 2,
            ..SpeedConfig::default()
        };
        let mut tb = TimeBase::new(&cfg).unwrap();
        for _ in 0..5 {
            assert_eq!(tb.advance(Duration::from_millis(500)), 2);
        }
        assert!(tb.is_saturated());
        assert_eq!(tb.saturations(), 1);
        assert_eq!(tb.dropped_steps(), 15);

        assert_eq!(tb.advance(Duration::from_millis(100)), 1);
        assert!(!tb.is_saturated());
        assert_eq!(tb.advance(Duration::from_millis(500)), 2);
        assert_eq!(tb.saturations(), 2);
    }

    #[test]
    fn interval_change_keeps_accumulated_time() {
        let mut tb = TimeBase::new(&speed(1.0, 120.0)).unwrap();
        assert_eq!(tb.advance(Duration::from_millis(600)), 0);
        tb.set_gravity_interval(0.5).unwrap();
        assert_eq!(tb.advance(Duration::ZERO), 1);
    }

    #[test]
    fn rejected_interval_keeps_previous() {
        let mut tb = TimeBase::new(&speed(0.25, 120.0)).unwrap();
        assert!(tb.set_gravity_interval(-2.0).is_err());
        assert!(tb.set_gravity_interval(0.0).is_err());
        assert!(tb.set_gravity_interval(f64::NAN).is_err());
        assert_eq!(tb.gravity_interval(), Duration::from_millis(250));
    }

    #[test]
    fn beat_phase_wraps() {
        let mut tb = TimeBase::new(&speed(1.0, 120.0)).unwrap();
        tb.advance(Duration::from_millis(250));
        assert!((tb.current_beat_phase() - 0.5).abs() < 1e-9);
        tb.advance(Duration::from_millis(500));
        assert!((tb.current_beat_phase() - 0.5).abs() < 1e-9);
        assert_eq!(tb.beat_count(), 1);
    }

    #[test]
    fn bpm_change_preserves_phase() {
        let mut tb = TimeBase::new(&speed(1.0, 60.0)).unwrap();
        tb.advance(Duration::from_millis(250));
        tb.set_bpm(120.0).unwrap();
        assert!((tb.current_beat_phase() - 0.25).abs() < 1e-9);
        tb.advance(Duration::from_millis(125));
        assert!((tb.current_beat_phase() - 0.5).abs() < 1e-9);
        assert!(tb.set_bpm(0.0).is_err());
        assert_eq!(tb.bpm(), 120.0);
    }

    #[test]
    fn beat_division_coupling_follows_tempo() {
        let cfg = SpeedConfig {
            coupling: TempoCoupling::BeatDivision { division: 2 },
            ..speed(1.0, 120.0)
        };
        let mut tb = TimeBase::new(&cfg).unwrap();
        assert_eq!(tb.gravity_interval(), Duration::from_millis(250));
        tb.set_bpm(60.0).unwrap();
        assert_eq!(tb.gravity_interval(), Duration::from_millis(500));
        tb.set_beat_division(4.0).unwrap();
        assert_eq!(tb.gravity_interval(), Duration::from_millis(250));
        assert!(tb.set_beat_division(2.5).is_err());
    }

    #[test]
    fn quantized_coupling_rounds_to_subdivision() {
        let beat = Duration::from_millis(500);
        let q = TempoCoupling::Quantized { division: 4 };
        assert_eq!(
            q.gravity_interval(Duration::from_millis(300), beat),
            Duration::from_millis(250)
        );
        assert_eq!(
            q.gravity_interval(Duration::from_millis(10), beat),
            Duration::from_millis(125)
        );
    }

    #[test]
    fn coupling_deserializes_from_tagged_json() {
        let c: TempoCoupling =
            serde_json::from_str(r#"{"mode": "beat_division", "division": 4}"#).unwrap();
        assert_eq!(c, TempoCoupling::BeatDivision { division: 4 });
        let c: TempoCoupling = serde_json::from_str(r#"{"mode": "independent"}"#).unwrap();
        assert_eq!(c, TempoCoupling::Independent);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn steps_equal_floor_of_total_over_interval(
                interval_ms in 1u64..2_000,
                dts in proptest::collection::vec(0u64..500, 0..64),
            ) {
                let cfg = SpeedConfig {
                    gravity_interval: interval_ms as f64 / 1000.0,
                    max_catch_up_steps: 10_000,
                    ..SpeedConfig::default()
                };
                let mut tb = TimeBase::new(&cfg).unwrap();
                let interval = tb.gravity_interval().as_nanos();
                let mut total = 0u128;
                let mut steps = 0u64;
                for dt in dts {
                    let d = Duration::from_millis(dt);
                    total += d.as_nanos();
                    steps += tb.advance(d) as u64;
                }
                prop_assert_eq!(steps as u128, total / interval);
                prop_assert_eq!(tb.step_count(), steps);
            }

            #[test]
            fn beat_phase_stays_in_unit_interval(
                bpm in 1.0f64..600.0,
                dts in proptest::collection::vec(0u64..5_000, 1..32),
            ) {
                let mut tb = TimeBase::new(&speed(1.0, bpm)).unwrap();
                for dt in dts {
                    tb.advance(Duration::from_millis(dt));
                    let phase = tb.current_beat_phase();
                    prop_assert!((0.0..1.0).contains(&phase));
                }
            }
        }
    }
}
