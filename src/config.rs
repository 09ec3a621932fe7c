//! Module Configuration
//!
//! Serializable construction settings for every module in the crate. A
//! configuration describes how a module starts out (initial knob positions,
//! labels); it is not a snapshot of running state.

use crate::arithmetic::Arithmetic;
use crate::mapping::DurationMode;
use crate::port::GraphModule;
use crate::ramp::{MiniRamp, RampParams};
use crate::teleport::{SignalRegistry, TeleportIn, TeleportOut};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Error types for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// The document is not valid JSON for a module configuration
    Parse(serde_json::Error),

    /// A numeric setting lies outside its allowed range
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "Invalid module config: {}", err),
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{} = {} is outside [{}, {}]", field, value, min, max),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            ConfigError::OutOfRange { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    // NaN fails both comparisons, so it is rejected here too
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArithmeticConfig {
    pub clip: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniRampConfig {
    /// Duration knob, 0–10
    pub length: f64,

    /// CV attenuverter, -1–1
    pub cv_amount: f64,

    pub mode: DurationMode,
}

impl Default for MiniRampConfig {
    fn default() -> Self {
        let params = RampParams::default();
        Self {
            length: params.length,
            cv_amount: params.cv_amount,
            mode: params.mode,
        }
    }
}

impl MiniRampConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("length", self.length, 0.0, 10.0)?;
        check_range("cv_amount", self.cv_amount, -1.0, 1.0)
    }

    pub fn params(&self) -> RampParams {
        RampParams {
            length: self.length,
            cv_amount: self.cv_amount,
            mode: self.mode,
        }
    }
}

/// Producer settings. Without a label a unique one is generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleportInConfig {
    pub label: Option<String>,
}

/// Consumer settings. Without a label the most recently registered one is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleportOutConfig {
    pub label: Option<String>,
}

/// Configuration of any module, tagged by module type
///
/// The tag matches [`GraphModule::type_id`] of the module it builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleConfig {
    Arithmetic(ArithmeticConfig),
    MiniRamp(MiniRampConfig),
    TeleportIn(TeleportInConfig),
    TeleportOut(TeleportOutConfig),
}

impl ModuleConfig {
    /// Deserialize and validate from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            ModuleConfig::MiniRamp(config) => config.validate(),
            _ => Ok(()),
        }
    }

    /// Module type identifier this configuration builds
    pub fn type_id(&self) -> &'static str {
        match self {
            ModuleConfig::Arithmetic(_) => "arithmetic",
            ModuleConfig::MiniRamp(_) => "mini_ramp",
            ModuleConfig::TeleportIn(_) => "teleport_in",
            ModuleConfig::TeleportOut(_) => "teleport_out",
        }
    }

    /// Instantiate the configured module
    ///
    /// Teleport modules are bound to `registry`; the others ignore it.
    pub fn build(
        &self,
        sample_rate: f64,
        registry: &Arc<SignalRegistry>,
    ) -> Result<Box<dyn GraphModule>, ConfigError> {
        self.validate()?;

        let module: Box<dyn GraphModule> = match self {
            ModuleConfig::Arithmetic(config) => Box::new(Arithmetic::new().with_clip(config.clip)),
            ModuleConfig::MiniRamp(config) => {
                Box::new(MiniRamp::with_params(sample_rate, config.params()))
            }
            ModuleConfig::TeleportIn(config) => match &config.label {
                Some(label) => Box::new(TeleportIn::with_label(Arc::clone(registry), label.as_str())),
                None => Box::new(TeleportIn::new(Arc::clone(registry))),
            },
            ModuleConfig::TeleportOut(config) => match &config.label {
                Some(label) => {
                    Box::new(TeleportOut::with_label(Arc::clone(registry), label.as_str()))
                }
                None => Box::new(TeleportOut::new(Arc::clone(registry))),
            },
        };

        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arithmetic() {
        let config = ModuleConfig::from_json(r#"{"type": "arithmetic", "clip": true}"#).unwrap();
        assert_eq!(
            config,
            ModuleConfig::Arithmetic(ArithmeticConfig { clip: true })
        );
    }

    #[test]
    fn test_mini_ramp_defaults() {
        let config = ModuleConfig::from_json(r#"{"type": "mini_ramp"}"#).unwrap();
        let ModuleConfig::MiniRamp(ramp) = config else {
            panic!("expected mini_ramp config");
        };
        assert_eq!(ramp.length, 5.0);
        assert_eq!(ramp.cv_amount, 0.0);
        assert_eq!(ramp.mode, DurationMode::Logarithmic);
    }

    #[test]
    fn test_mini_ramp_mode() {
        let config =
            ModuleConfig::from_json(r#"{"type": "mini_ramp", "mode": "linear", "length": 2.5}"#)
                .unwrap();
        let ModuleConfig::MiniRamp(ramp) = config else {
            panic!("expected mini_ramp config");
        };
        assert_eq!(ramp.mode, DurationMode::Linear);
        assert_eq!(ramp.params().length, 2.5);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let err = ModuleConfig::from_json(r#"{"type": "mini_ramp", "cv_amount": 1.5}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "cv_amount",
                ..
            }
        ));
        assert!(err.to_string().contains("cv_amount"));

        let nan = ModuleConfig::MiniRamp(MiniRampConfig {
            length: f64::NAN,
            ..Default::default()
        });
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ModuleConfig::from_json(r#"{"type": "oscillator"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ModuleConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ModuleConfig::TeleportIn(TeleportInConfig {
            label: Some("bus".into()),
        });
        let json = config.to_json().unwrap();
        assert!(json.contains("teleport_in"));
        assert_eq!(ModuleConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_build_matches_type_id() {
        let registry = Arc::new(SignalRegistry::new());
        let configs = [
            ModuleConfig::Arithmetic(ArithmeticConfig::default()),
            ModuleConfig::MiniRamp(MiniRampConfig::default()),
            ModuleConfig::TeleportIn(TeleportInConfig::default()),
            ModuleConfig::TeleportOut(TeleportOutConfig::default()),
        ];

        for config in &configs {
            let module = config.build(48000.0, &registry).unwrap();
            assert_eq!(module.type_id(), config.type_id());
        }
    }

    #[test]
    fn test_build_applies_settings() {
        let registry = Arc::new(SignalRegistry::new());

        let arith = ModuleConfig::Arithmetic(ArithmeticConfig { clip: true })
            .build(48000.0, &registry)
            .unwrap();
        assert_eq!(arith.get_param(0), Some(1.0));

        let ramp = ModuleConfig::MiniRamp(MiniRampConfig {
            length: 1.0,
            cv_amount: -0.5,
            mode: DurationMode::Linear,
        })
        .build(48000.0, &registry)
        .unwrap();
        assert_eq!(ramp.get_param(0), Some(1.0));
        assert_eq!(ramp.get_param(1), Some(-0.5));
        assert_eq!(ramp.get_param(2), Some(0.0));

        let producer = ModuleConfig::TeleportIn(TeleportInConfig {
            label: Some("bus".into()),
        })
        .build(48000.0, &registry)
        .unwrap();
        assert!(registry.exists("bus"));
        drop(producer);
        assert!(!registry.exists("bus"));
    }

    #[test]
    fn test_build_rejects_invalid() {
        let registry = Arc::new(SignalRegistry::new());
        let config = ModuleConfig::MiniRamp(MiniRampConfig {
            length: 11.0,
            ..Default::default()
        });
        assert!(config.build(48000.0, &registry).is_err());
    }
}
