//! # rack-utils: Utility Modules for Modular Synthesis
//!
//! `rack_utils` provides a handful of small utility modules for a modular
//! synthesizer host, each driven once per sample:
//!
//! - **Arithmetic** - sum, difference, product and quotient of two voltages,
//!   with optional ±10V clipping and a held value for division by zero
//! - **MiniRamp** - a triggered gate plus a 0–10V ramp whose duration is set
//!   by a knob and CV, in linear or logarithmic (1ms–10s) mode
//! - **Teleport** - labelled send/receive pairs that carry up to eight
//!   signals between modules without a cable
//!
//! The per-sample engines ([`ArithmeticEngine`], [`RampGateEngine`],
//! [`PulseTimer`]) are plain structs that can be used on their own. The
//! modules wrap them behind the [`GraphModule`] trait so that a host such as
//! the bundled [`Patch`] can schedule them.
//!
//! ## Quick Start
//!
//! ```rust
//! use rack_utils::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), PatchError> {
//! let registry = Arc::new(SignalRegistry::new());
//! let mut patch = Patch::new(44100.0);
//!
//! // A ramp generator whose gate is teleported to an arithmetic module
//! let ramp = patch.add("ramp", MiniRamp::new(44100.0));
//! let send = patch.add("send", TeleportIn::with_label(Arc::clone(&registry), "gate"));
//! let recv = patch.add("recv", TeleportOut::new(Arc::clone(&registry)));
//! let arith = patch.add("arith", Arithmetic::new().with_clip(true));
//!
//! patch.connect(ramp.out("gate")?, send.in_("in1")?)?;
//! patch.connect(recv.out("out1")?, arith.in_("x")?)?;
//!
//! patch.compile()?;
//! patch.tick()?;
//! let sum = patch.output(arith.out("add")?);
//! # assert_eq!(sum, Some(0.0));
//! # Ok(())
//! # }
//! ```

pub mod arithmetic;
pub mod config;
pub mod graph;
pub mod mapping;
pub mod port;
pub mod pulse;
pub mod ramp;
pub mod teleport;

/// Prelude module for convenient imports
pub mod prelude {
    // Port system
    pub use crate::port::{
        GraphModule, ParamDef, ParamId, PortDef, PortId, PortInput, PortSpec, PortValues,
        SignalKind,
    };

    // Patch graph
    pub use crate::graph::{Cable, CableId, NodeHandle, NodeId, Patch, PatchError, PortRef};

    // Engines
    pub use crate::arithmetic::{ArithmeticEngine, ArithmeticFrame};
    pub use crate::mapping::{map_duration, DurationMapping, DurationMode};
    pub use crate::pulse::{PulseTimer, SchmittTrigger};
    pub use crate::ramp::{RampFrame, RampGateEngine, RampParams};
    pub use crate::teleport::{SignalRegistry, TeleportSource};

    // Modules
    pub use crate::arithmetic::Arithmetic;
    pub use crate::ramp::MiniRamp;
    pub use crate::teleport::{TeleportIn, TeleportOut};

    // Configuration
    pub use crate::config::{ConfigError, ModuleConfig};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
