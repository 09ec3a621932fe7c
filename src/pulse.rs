//! Pulse Timing and Edge Detection
//!
//! A restartable one-shot timer used to hold gates high for a given duration,
//! and a Schmitt trigger for detecting rising edges on noisy trigger inputs.

/// Restartable one-shot timer
///
/// Reports "high" from the moment it is triggered until the elapsed time
/// reaches the trigger duration. A retrigger always restarts the pulse, even
/// with a shorter duration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseTimer {
    elapsed: f64,
    trigger_duration: f64,
    finished: bool,
}

impl PulseTimer {
    pub fn new() -> Self {
        Self {
            elapsed: 0.0,
            trigger_duration: 0.0,
            finished: true,
        }
    }

    /// Immediately drop to the low state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Start (or restart) a pulse of the given duration in seconds
    pub fn trigger(&mut self, duration: f64) {
        self.elapsed = 0.0;
        self.finished = false;
        self.trigger_duration = duration;
    }

    /// Advance by `delta_time` seconds. Returns whether the pulse is high.
    pub fn advance(&mut self, delta_time: f64) -> bool {
        self.elapsed += delta_time;
        if !self.finished {
            self.finished = self.elapsed >= self.trigger_duration;
        }
        !self.finished
    }

    /// Change the length of the current pulse without restarting it
    ///
    /// Takes effect on the next [`PulseTimer::advance`]. Has no effect once
    /// the pulse has finished.
    pub fn set_trigger_duration(&mut self, duration: f64) {
        self.trigger_duration = duration;
    }

    pub fn is_high(&self) -> bool {
        !self.finished
    }

    /// Seconds since the last trigger
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn trigger_duration(&self) -> f64 {
        self.trigger_duration
    }
}

impl Default for PulseTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Default low threshold for trigger inputs, in volts
pub const TRIGGER_LOW_THRESHOLD: f64 = 0.1;

/// Default high threshold for trigger inputs, in volts
pub const TRIGGER_HIGH_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum SchmittState {
    Unknown,
    Low,
    High,
}

/// Rising edge detector with hysteresis
///
/// The input has to reach the high threshold to fire and has to fall back to
/// the low threshold before it can fire again. Right after construction or
/// reset the state is unknown, so an input that is already high settles
/// without firing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchmittTrigger {
    state: SchmittState,
    low: f64,
    high: f64,
}

impl SchmittTrigger {
    pub fn new() -> Self {
        Self::with_thresholds(TRIGGER_LOW_THRESHOLD, TRIGGER_HIGH_THRESHOLD)
    }

    pub fn with_thresholds(low: f64, high: f64) -> Self {
        Self {
            state: SchmittState::Unknown,
            low,
            high,
        }
    }

    pub fn reset(&mut self) {
        self.state = SchmittState::Unknown;
    }

    /// Feed one sample. Returns true on a low-to-high transition.
    pub fn process(&mut self, voltage: f64) -> bool {
        match self.state {
            SchmittState::Low => {
                if voltage >= self.high {
                    self.state = SchmittState::High;
                    return true;
                }
            }
            SchmittState::High => {
                if voltage <= self.low {
                    self.state = SchmittState::Low;
                }
            }
            SchmittState::Unknown => {
                if voltage >= self.high {
                    self.state = SchmittState::High;
                } else if voltage <= self.low {
                    self.state = SchmittState::Low;
                }
            }
        }
        false
    }

    pub fn is_high(&self) -> bool {
        self.state == SchmittState::High
    }
}

impl Default for SchmittTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulse_timer_starts_low() {
        let mut timer = PulseTimer::new();
        assert!(!timer.is_high());
        assert!(!timer.advance(0.001));
    }

    #[test]
    fn test_pulse_timer_high_until_duration() {
        let mut timer = PulseTimer::new();
        timer.trigger(0.5);
        assert!(timer.advance(0.25));
        assert!(timer.advance(0.125));
        // 0.5 reached exactly
        assert!(!timer.advance(0.125));
        assert!(!timer.advance(0.125));
    }

    #[test]
    fn test_pulse_timer_single_step_past_duration() {
        let mut timer = PulseTimer::new();
        timer.trigger(0.5);
        assert!(!timer.advance(0.75));
    }

    #[test]
    fn test_pulse_timer_zero_delta_is_noop() {
        let mut timer = PulseTimer::new();
        timer.trigger(1.0);
        assert!(timer.advance(0.0));
        assert_eq!(timer.elapsed(), 0.0);

        timer.reset();
        assert!(!timer.advance(0.0));
    }

    #[test]
    fn test_pulse_timer_retrigger_restarts() {
        let mut timer = PulseTimer::new();
        timer.trigger(1.0);
        timer.advance(0.75);

        // Shorter retrigger takes effect immediately
        timer.trigger(0.25);
        assert_eq!(timer.elapsed(), 0.0);
        assert_eq!(timer.trigger_duration(), 0.25);
        assert!(timer.advance(0.125));
        assert!(!timer.advance(0.125));
    }

    #[test]
    fn test_pulse_timer_reset() {
        let mut timer = PulseTimer::new();
        timer.trigger(1.0);
        timer.advance(0.5);
        timer.reset();

        assert!(!timer.is_high());
        assert_eq!(timer.elapsed(), 0.0);
        assert_eq!(timer.trigger_duration(), 0.0);
    }

    #[test]
    fn test_pulse_timer_finished_ignores_new_duration() {
        let mut timer = PulseTimer::new();
        timer.trigger(0.25);
        assert!(!timer.advance(0.5));

        timer.set_trigger_duration(10.0);
        assert!(!timer.advance(0.001));
    }

    #[test]
    fn test_pulse_timer_elapsed_monotonic() {
        let mut timer = PulseTimer::new();
        timer.trigger(1.0);
        let mut last = timer.elapsed();
        for _ in 0..100 {
            timer.advance(0.02);
            assert!(timer.elapsed() >= last);
            last = timer.elapsed();
        }
    }

    #[test]
    fn test_schmitt_rising_edge() {
        let mut trigger = SchmittTrigger::new();
        assert!(!trigger.process(0.0));
        assert!(trigger.process(5.0));
        // Held high: no repeated edges
        assert!(!trigger.process(5.0));
        assert!(!trigger.process(1.0));
        // Still above the low threshold, cannot rearm
        assert!(!trigger.process(2.5));
        assert!(!trigger.process(0.1));
        assert!(trigger.process(2.0));
    }

    #[test]
    fn test_schmitt_unknown_high_does_not_fire() {
        let mut trigger = SchmittTrigger::new();
        assert!(!trigger.process(10.0));
        assert!(trigger.is_high());
        assert!(!trigger.process(0.0));
        assert!(trigger.process(10.0));
    }

    #[test]
    fn test_schmitt_hysteresis_band_does_not_settle() {
        let mut trigger = SchmittTrigger::new();
        // Inside the band from an unknown state
        assert!(!trigger.process(1.0));
        assert!(!trigger.process(3.0));
        assert!(trigger.is_high());
    }

    #[test]
    fn test_schmitt_reset() {
        let mut trigger = SchmittTrigger::new();
        trigger.process(0.0);
        trigger.process(5.0);
        trigger.reset();
        assert!(!trigger.is_high());
        assert!(!trigger.process(5.0));
    }
}
