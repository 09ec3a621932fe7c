//! Signal Conventions and Port System
//!
//! This module defines the signal types, port definitions, and the type-erased
//! module interface that the host drives once per sample.

use std::collections::HashMap;

/// Unique identifier for a port within a module
pub type PortId = u32;

/// Unique identifier for a parameter within a module
pub type ParamId = u32;

/// Semantic signal classification following hardware modular conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalKind {
    /// Bipolar control voltage, ±10V
    Cv,

    /// Unipolar control voltage, 0–10V (ramps, envelopes)
    CvUnipolar,

    /// Gate signal, binary state: 0V (low) or +10V (high)
    Gate,

    /// Trigger signal, edge detected with hysteresis
    Trigger,
}

impl SignalKind {
    /// Returns the nominal voltage range (min, max) for this signal type
    pub fn voltage_range(&self) -> (f64, f64) {
        match self {
            SignalKind::Cv => (-10.0, 10.0),
            SignalKind::CvUnipolar => (0.0, 10.0),
            SignalKind::Gate => (0.0, 10.0),
            SignalKind::Trigger => (0.0, 10.0),
        }
    }
}

/// Definition of a single port (input or output)
#[derive(Debug, Clone)]
pub struct PortDef {
    /// Unique identifier within the module
    pub id: PortId,

    /// Human-readable name (e.g., "x", "trig", "out1")
    pub name: String,

    /// Signal type for validation and UI hints
    pub kind: SignalKind,
}

impl PortDef {
    pub fn new(id: PortId, name: impl Into<String>, kind: SignalKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

/// Specification of all ports for a module
#[derive(Debug, Clone, Default)]
pub struct PortSpec {
    pub inputs: Vec<PortDef>,
    pub outputs: Vec<PortDef>,
}

impl PortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_by_name(&self, name: &str) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output_by_name(&self, name: &str) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn input_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output_by_id(&self, id: PortId) -> Option<&PortDef> {
        self.outputs.iter().find(|p| p.id == id)
    }
}

/// A single input as seen by a module during one tick
///
/// An unpatched input reads 0V and is reported inactive. Several modules
/// behave differently on an inactive input than on one patched to 0V.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortInput {
    pub value: f64,
    pub active: bool,
}

impl PortInput {
    /// A patched input carrying `value`
    pub fn active(value: f64) -> Self {
        Self {
            value,
            active: true,
        }
    }

    /// An unpatched input
    pub fn inactive() -> Self {
        Self::default()
    }

    /// The value, or `fallback` when the port is unpatched
    pub fn value_or(&self, fallback: f64) -> f64 {
        if self.active {
            self.value
        } else {
            fallback
        }
    }
}

/// Runtime port values container
///
/// For inputs, only patched ports are present: absence means inactive.
#[derive(Debug, Clone, Default)]
pub struct PortValues {
    pub values: HashMap<PortId, f64>,
}

impl PortValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PortId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    pub fn get_or(&self, id: PortId, default: f64) -> f64 {
        self.values.get(&id).copied().unwrap_or(default)
    }

    /// Read a port together with its activity flag
    pub fn input(&self, id: PortId) -> PortInput {
        match self.get(id) {
            Some(value) => PortInput::active(value),
            None => PortInput::inactive(),
        }
    }

    pub fn set(&mut self, id: PortId, value: f64) {
        self.values.insert(id, value);
    }

    /// Accumulate (sum) a value into a port (for input mixing)
    pub fn accumulate(&mut self, id: PortId, value: f64) {
        *self.values.entry(id).or_insert(0.0) += value;
    }

    /// Mark a port unpatched
    pub fn unset(&mut self, id: PortId) {
        self.values.remove(&id);
    }

    pub fn has(&self, id: PortId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Parameter definition for UI binding
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub id: ParamId,
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl ParamDef {
    pub fn new(id: ParamId, name: impl Into<String>, min: f64, max: f64, default: f64) -> Self {
        Self {
            id,
            name: name.into(),
            min,
            max,
            default,
        }
    }

    /// Toggle parameter stored as 0.0 / 1.0
    pub fn toggle(id: ParamId, name: impl Into<String>, default: bool) -> Self {
        Self::new(id, name, 0.0, 1.0, if default { 1.0 } else { 0.0 })
    }

    /// Clamp a value into this parameter's range
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Interpret a toggle parameter value
pub fn param_is_on(value: f64) -> bool {
    value > 0.5
}

/// Type-erased module interface for graph-based patching
///
/// The host calls [`GraphModule::tick`] once per sample. The sample period is
/// supplied ahead of time through [`GraphModule::set_sample_rate`] and may
/// change between ticks.
pub trait GraphModule: Send + Sync {
    /// Returns the module's port specification
    fn port_spec(&self) -> &PortSpec;

    /// Process one sample given port values
    fn tick(&mut self, inputs: &PortValues, outputs: &mut PortValues);

    /// Reset internal state
    fn reset(&mut self);

    /// Set sample rate
    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Get parameter definitions for UI binding
    fn params(&self) -> &[ParamDef] {
        &[]
    }

    /// Get a parameter value
    fn get_param(&self, _id: ParamId) -> Option<f64> {
        None
    }

    /// Set a parameter value
    fn set_param(&mut self, _id: ParamId, _value: f64) {}

    /// Get module type identifier
    fn type_id(&self) -> &'static str {
        "unknown"
    }
}
