//! Ramp and Gate Generator
//!
//! On every rising edge at the trigger input, outputs a gate held high for a
//! knob/CV controlled duration together with a ramp rising from 0V to 10V
//! over the same interval.

use crate::mapping::{map_duration, DurationMapping, DurationMode, MAX_DURATION};
use crate::port::{GraphModule, ParamDef, ParamId, PortDef, PortSpec, PortValues, SignalKind};
use crate::pulse::{PulseTimer, SchmittTrigger};

/// Gate output level while a ramp is running
pub const GATE_HIGH: f64 = 10.0;

/// Ramp output level at the end of a ramp
pub const RAMP_MAX: f64 = 10.0;

/// Live parameters of the ramp generator
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampParams {
    /// Duration knob, 0–10
    pub length: f64,

    /// CV attenuverter, -1–1
    pub cv_amount: f64,

    pub mode: DurationMode,
}

impl Default for RampParams {
    fn default() -> Self {
        Self {
            length: 5.0,
            cv_amount: 0.0,
            mode: DurationMode::Logarithmic,
        }
    }
}

/// Output voltages for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampFrame {
    pub ramp: f64,
    pub gate: f64,
}

/// Ramp/gate state machine
///
/// Idle while the pulse timer is low (both outputs at 0V), active while it is
/// high. Parameters are live: the duration is re-evaluated every tick and
/// also applied to a pulse already in flight, so turning the knob during a
/// ramp stretches or shortens it.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampGateEngine {
    params: RampParams,
    edge: SchmittTrigger,
    timer: PulseTimer,
    ramp_duration: f64,
    cv_scale: f64,
}

impl RampGateEngine {
    pub fn new(params: RampParams) -> Self {
        Self {
            params,
            edge: SchmittTrigger::new(),
            timer: PulseTimer::new(),
            ramp_duration: 0.5,
            cv_scale: 0.0,
        }
    }

    pub fn params(&self) -> &RampParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut RampParams {
        &mut self.params
    }

    /// Duration in seconds computed on the last tick
    pub fn ramp_duration(&self) -> f64 {
        self.ramp_duration
    }

    /// Seconds per volt of CV computed on the last tick
    pub fn cv_scale(&self) -> f64 {
        self.cv_scale
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_high()
    }

    pub fn reset(&mut self) {
        self.edge.reset();
        self.timer.reset();
    }

    /// Advance one tick of `delta_time` seconds
    pub fn process(&mut self, delta_time: f64, trigger: f64, cv: f64) -> RampFrame {
        let triggered = self.edge.process(trigger);

        let DurationMapping { duration, cv_scale } =
            map_duration(self.params.length, self.params.cv_amount, cv, self.params.mode);
        debug_assert!((0.0..=MAX_DURATION).contains(&duration));
        self.ramp_duration = duration;
        self.cv_scale = cv_scale;

        // A zero length pulse would never go high, so it is not started
        if triggered && duration > 0.0 {
            self.timer.trigger(duration);
        }
        self.timer.set_trigger_duration(duration);

        if self.timer.advance(delta_time) {
            let progress = self.timer.elapsed() / self.timer.trigger_duration();
            RampFrame {
                ramp: (progress * RAMP_MAX).clamp(0.0, RAMP_MAX),
                gate: GATE_HIGH,
            }
        } else {
            RampFrame::default()
        }
    }
}

impl Default for RampGateEngine {
    fn default() -> Self {
        Self::new(RampParams::default())
    }
}

const PARAM_LENGTH: ParamId = 0;
const PARAM_CV_AMOUNT: ParamId = 1;
const PARAM_MODE: ParamId = 2;

/// MiniRamp: triggered ramp and gate generator
///
/// Inputs: `trig` (rising edge starts a ramp), `length_cv`.
/// Outputs: `ramp` (0–10V), `gate` (0/10V).
pub struct MiniRamp {
    engine: RampGateEngine,
    sample_rate: f64,
    spec: PortSpec,
    param_defs: Vec<ParamDef>,
}

impl MiniRamp {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, RampParams::default())
    }

    pub fn with_params(sample_rate: f64, params: RampParams) -> Self {
        let defaults = RampParams::default();
        Self {
            engine: RampGateEngine::new(params),
            sample_rate,
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(0, "trig", SignalKind::Trigger),
                    PortDef::new(1, "length_cv", SignalKind::Cv),
                ],
                outputs: vec![
                    PortDef::new(10, "ramp", SignalKind::CvUnipolar),
                    PortDef::new(11, "gate", SignalKind::Gate),
                ],
            },
            param_defs: vec![
                ParamDef::new(PARAM_LENGTH, "length", 0.0, 10.0, defaults.length),
                ParamDef::new(PARAM_CV_AMOUNT, "cv_amount", -1.0, 1.0, defaults.cv_amount),
                ParamDef::toggle(PARAM_MODE, "log_mode", true),
            ],
        }
    }

    pub fn engine(&self) -> &RampGateEngine {
        &self.engine
    }

    /// Duration in seconds shown by the panel display
    pub fn ramp_duration(&self) -> f64 {
        self.engine.ramp_duration()
    }

    pub fn cv_scale(&self) -> f64 {
        self.engine.cv_scale()
    }
}

impl Default for MiniRamp {
    fn default() -> Self {
        Self::new(44100.0)
    }
}

impl GraphModule for MiniRamp {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        let trigger = inputs.get_or(0, 0.0);
        let cv = inputs.get_or(1, 0.0);

        let frame = self.engine.process(1.0 / self.sample_rate, trigger, cv);

        outputs.set(10, frame.ramp);
        outputs.set(11, frame.gate);
    }

    fn reset(&mut self) {
        self.engine.reset();
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn params(&self) -> &[ParamDef] {
        &self.param_defs
    }

    fn get_param(&self, id: ParamId) -> Option<f64> {
        let params = self.engine.params();
        match id {
            PARAM_LENGTH => Some(params.length),
            PARAM_CV_AMOUNT => Some(params.cv_amount),
            PARAM_MODE => Some(params.mode.as_param()),
            _ => None,
        }
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        let Some(def) = self.param_defs.iter().find(|d| d.id == id) else {
            return;
        };
        let value = def.clamp(value);
        let params = self.engine.params_mut();
        match id {
            PARAM_LENGTH => params.length = value,
            PARAM_CV_AMOUNT => params.cv_amount = value,
            PARAM_MODE => params.mode = DurationMode::from_param(value),
            _ => {}
        }
    }

    fn type_id(&self) -> &'static str {
        "mini_ramp"
    }
}
