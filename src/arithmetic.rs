//! Arithmetic
//!
//! Sum, difference, product and quotient of two voltages, with optional
//! clipping to ±10V. An unpatched input acts as the identity for
//! multiplication and division, so a single patched input passes through
//! those outputs unchanged.

use crate::port::{
    param_is_on, GraphModule, ParamDef, ParamId, PortDef, PortInput, PortSpec, PortValues,
    SignalKind,
};

/// Clipping limit, in volts
pub const CLIP_LIMIT: f64 = 10.0;

/// Output voltages for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArithmeticFrame {
    pub sum: f64,
    pub difference: f64,
    pub product: f64,
    pub quotient: f64,
}

impl ArithmeticFrame {
    fn clipped(self) -> Self {
        Self {
            sum: clip(self.sum),
            difference: clip(self.difference),
            product: clip(self.product),
            quotient: clip(self.quotient),
        }
    }
}

fn clip(value: f64) -> f64 {
    value.clamp(-CLIP_LIMIT, CLIP_LIMIT)
}

/// Arithmetic unit
///
/// Stateless apart from the last finite quotient, which is held and output
/// whenever the divisor is patched but the live quotient is not finite
/// (division by zero, infinite or NaN inputs).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArithmeticEngine {
    last_valid_quotient: f64,
}

impl ArithmeticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quotient held for substitution; always finite
    pub fn last_valid_quotient(&self) -> f64 {
        self.last_valid_quotient
    }

    pub fn reset(&mut self) {
        self.last_valid_quotient = 0.0;
    }

    /// Compute all four outputs for one tick
    pub fn process(&mut self, x: PortInput, y: PortInput, clip: bool) -> ArithmeticFrame {
        let numerator = x.value_or(1.0);

        let quotient = if y.active {
            let raw = numerator / y.value;
            if raw.is_finite() {
                self.last_valid_quotient = raw;
            }
            self.last_valid_quotient
        } else {
            x.value
        };

        let frame = ArithmeticFrame {
            sum: x.value + y.value,
            difference: x.value - y.value,
            product: numerator * y.value_or(1.0),
            quotient,
        };

        if clip {
            frame.clipped()
        } else {
            frame
        }
    }
}

const PARAM_CLIP: ParamId = 0;

/// Arithmetic module
///
/// Inputs: `x`, `y`. Outputs: `add`, `sub`, `mul`, `div`.
pub struct Arithmetic {
    engine: ArithmeticEngine,
    clip: bool,
    spec: PortSpec,
    param_defs: Vec<ParamDef>,
}

impl Arithmetic {
    pub fn new() -> Self {
        Self {
            engine: ArithmeticEngine::new(),
            clip: false,
            spec: PortSpec {
                inputs: vec![
                    PortDef::new(0, "x", SignalKind::Cv),
                    PortDef::new(1, "y", SignalKind::Cv),
                ],
                outputs: vec![
                    PortDef::new(10, "add", SignalKind::Cv),
                    PortDef::new(11, "sub", SignalKind::Cv),
                    PortDef::new(12, "mul", SignalKind::Cv),
                    PortDef::new(13, "div", SignalKind::Cv),
                ],
            },
            param_defs: vec![ParamDef::toggle(PARAM_CLIP, "clip", false)],
        }
    }

    pub fn with_clip(mut self, clip: bool) -> Self {
        self.clip = clip;
        self
    }

    pub fn clip_enabled(&self) -> bool {
        self.clip
    }

    pub fn engine(&self) -> &ArithmeticEngine {
        &self.engine
    }
}

impl Default for Arithmetic {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphModule for Arithmetic {
    fn port_spec(&self) -> &PortSpec {
        &self.spec
    }

    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues) {
        let frame = self
            .engine
            .process(inputs.input(0), inputs.input(1), self.clip);

        outputs.set(10, frame.sum);
        outputs.set(11, frame.difference);
        outputs.set(12, frame.product);
        outputs.set(13, frame.quotient);
    }

    fn reset(&mut self) {
        self.engine.reset();
    }

    fn set_sample_rate(&mut self, _: f64) {}

    fn params(&self) -> &[ParamDef] {
        &self.param_defs
    }

    fn get_param(&self, id: ParamId) -> Option<f64> {
        match id {
            PARAM_CLIP => Some(if self.clip { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    fn set_param(&mut self, id: ParamId, value: f64) {
        if id == PARAM_CLIP {
            self.clip = param_is_on(value);
        }
    }

    fn type_id(&self) -> &'static str {
        "arithmetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn on(value: f64) -> PortInput {
        PortInput::active(value)
    }

    fn off() -> PortInput {
        PortInput::inactive()
    }

    #[test]
    fn test_sum_and_difference() {
        let mut engine = ArithmeticEngine::new();
        for &(x, y) in &[(1.5, 2.0), (-7.25, 3.0), (12.0, 9.0), (0.0, -0.5)] {
            let frame = engine.process(on(x), on(y), false);
            assert_eq!(frame.sum, x + y);
            assert_eq!(frame.difference, x - y);
        }
    }

    #[test]
    fn test_unpatched_input_reads_zero_for_sum() {
        let mut engine = ArithmeticEngine::new();
        let frame = engine.process(on(3.0), off(), false);
        assert_eq!(frame.sum, 3.0);
        assert_eq!(frame.difference, 3.0);

        let frame = engine.process(off(), on(3.0), false);
        assert_eq!(frame.sum, 3.0);
        assert_eq!(frame.difference, -3.0);
    }

    #[test]
    fn test_multiply_identity() {
        let mut engine = ArithmeticEngine::new();
        for &x in &[-10.0, -0.3, 0.0, 4.2, 25.0] {
            assert_eq!(engine.process(on(x), off(), false).product, x);
            assert_eq!(engine.process(off(), on(x), false).product, x);
        }
        assert_eq!(engine.process(off(), off(), false).product, 1.0);
        assert_eq!(engine.process(on(2.0), on(-3.0), false).product, -6.0);
    }

    #[test]
    fn test_divide_live() {
        let mut engine = ArithmeticEngine::new();
        assert_relative_eq!(engine.process(on(6.0), on(4.0), false).quotient, 1.5);

        // Unpatched numerator acts as 1: reciprocal
        assert_relative_eq!(engine.process(off(), on(4.0), false).quotient, 0.25);
    }

    #[test]
    fn test_divide_by_zero_holds_last_value() {
        let mut engine = ArithmeticEngine::new();
        assert_relative_eq!(engine.process(on(5.0), on(2.0), false).quotient, 2.5);

        for _ in 0..3 {
            let frame = engine.process(on(5.0), on(0.0), false);
            assert_relative_eq!(frame.quotient, 2.5);
        }
        assert_relative_eq!(engine.last_valid_quotient(), 2.5);

        assert_relative_eq!(engine.process(on(5.0), on(5.0), false).quotient, 1.0);
    }

    #[test]
    fn test_divide_non_finite_inputs_hold() {
        let mut engine = ArithmeticEngine::new();
        engine.process(on(1.0), on(4.0), false);

        assert_eq!(engine.process(on(f64::NAN), on(1.0), false).quotient, 0.25);
        assert_eq!(engine.process(on(1.0), on(f64::NAN), false).quotient, 0.25);
        assert_eq!(engine.process(on(f64::INFINITY), on(1.0), false).quotient, 0.25);
        assert_eq!(engine.process(on(0.0), on(0.0), false).quotient, 0.25);
        assert!(engine.last_valid_quotient().is_finite());
    }

    #[test]
    fn test_divide_before_any_valid_value_is_zero() {
        let mut engine = ArithmeticEngine::new();
        assert_eq!(engine.process(on(3.0), on(0.0), false).quotient, 0.0);
    }

    #[test]
    fn test_unpatched_divisor_passes_x() {
        let mut engine = ArithmeticEngine::new();
        engine.process(on(1.0), on(4.0), false);

        assert_eq!(engine.process(on(7.0), off(), false).quotient, 7.0);
        // Independent of (and not touching) the held value
        assert_eq!(engine.last_valid_quotient(), 0.25);
        assert_eq!(engine.process(on(7.0), on(0.0), false).quotient, 0.25);
    }

    #[test]
    fn test_clip_limits_each_output() {
        let mut engine = ArithmeticEngine::new();
        let frame = engine.process(on(8.0), on(6.0), true);
        assert_eq!(frame.sum, 10.0);
        assert_eq!(frame.difference, 2.0);
        assert_eq!(frame.product, 10.0);
        assert_relative_eq!(frame.quotient, 8.0 / 6.0);

        let frame = engine.process(on(-8.0), on(0.5), true);
        assert_eq!(frame.sum, -7.5);
        assert_eq!(frame.product, -4.0);
        assert_eq!(frame.quotient, -10.0);

        let frame = engine.process(on(-30.0), off(), true);
        assert_eq!(frame.quotient, -10.0);
        assert_eq!(frame.product, -10.0);
    }

    #[test]
    fn test_clip_disabled_passes_large_values() {
        let mut engine = ArithmeticEngine::new();
        let frame = engine.process(on(8.0), on(6.0), false);
        assert_eq!(frame.sum, 14.0);
        assert_eq!(frame.product, 48.0);
    }

    #[test]
    fn test_held_quotient_is_stored_unclipped() {
        let mut engine = ArithmeticEngine::new();
        assert_eq!(engine.process(on(10.0), on(0.5), true).quotient, 10.0);
        assert_eq!(engine.last_valid_quotient(), 20.0);

        assert_eq!(engine.process(on(10.0), on(0.0), false).quotient, 20.0);
    }

    #[test]
    fn test_full_scale_divide_by_zero_with_clip() {
        let mut engine = ArithmeticEngine::new();
        engine.process(on(9.0), on(-0.3), true);
        let held = engine.last_valid_quotient();

        let frame = engine.process(on(10.0), on(0.0), true);
        assert_eq!(frame.sum, 10.0);
        assert_eq!(frame.difference, 10.0);
        assert_eq!(frame.product, 0.0);
        assert_eq!(frame.quotient, held.clamp(-10.0, 10.0));
        assert_eq!(frame.quotient, -10.0);
    }

    #[test]
    fn test_engine_reset() {
        let mut engine = ArithmeticEngine::new();
        engine.process(on(1.0), on(2.0), false);
        engine.reset();
        assert_eq!(engine.last_valid_quotient(), 0.0);
    }

    #[test]
    fn test_arithmetic_module() {
        let mut arith = Arithmetic::new();
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        inputs.set(0, 6.0);
        inputs.set(1, 3.0);
        arith.tick(&inputs, &mut outputs);

        assert_eq!(outputs.get(10), Some(9.0));
        assert_eq!(outputs.get(11), Some(3.0));
        assert_eq!(outputs.get(12), Some(18.0));
        assert_eq!(outputs.get(13), Some(2.0));

        arith.set_param(PARAM_CLIP, 1.0);
        assert!(arith.clip_enabled());
        arith.tick(&inputs, &mut outputs);
        assert_eq!(outputs.get(12), Some(10.0));
    }

    #[test]
    fn test_arithmetic_module_single_input() {
        let mut arith = Arithmetic::new();
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        inputs.set(0, -4.0);
        arith.tick(&inputs, &mut outputs);

        assert_eq!(outputs.get(10), Some(-4.0));
        assert_eq!(outputs.get(12), Some(-4.0));
        assert_eq!(outputs.get(13), Some(-4.0));
    }

    #[test]
    fn test_arithmetic_module_patched_zero_divisor() {
        let mut arith = Arithmetic::new().with_clip(true);
        let mut inputs = PortValues::new();
        let mut outputs = PortValues::new();

        inputs.set(0, 10.0);
        inputs.set(1, 0.0);
        arith.tick(&inputs, &mut outputs);

        assert_eq!(outputs.get(13), Some(0.0));
        assert_eq!(arith.get_param(PARAM_CLIP), Some(1.0));
        assert_eq!(arith.type_id(), "arithmetic");
    }
}
