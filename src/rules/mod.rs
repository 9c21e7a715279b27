//! Link visibility rules
//!
//! Each rule attached to a link is a predicate over the visitor context. A link
//! is shown only when every one of its rules passes; a link without rules is
//! always shown. Rule types the evaluator does not understand (`location`, or
//! anything added later by a client) pass, so an unknown rule never hides a link.

pub mod device;

pub use device::DeviceType;

use serde::Deserialize;
use serde_json::Value;

/// What is known about the visitor when the public page is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitorContext {
    /// Hour of day, 0..=23
    pub current_hour: u32,
    pub device: DeviceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayRule {
    /// Visible from `start_hour` (inclusive) to `end_hour` (exclusive).
    /// A missing bound does not restrict its side of the window.
    ///
    /// Overnight windows (`start_hour > end_hour`) never match.
    Time {
        start_hour: Option<u32>,
        end_hour: Option<u32>,
    },
    /// Visible on the listed devices; an empty list means any device.
    Device { devices: Vec<String> },
    /// Rule type without evaluator support, or an unparseable configuration
    Unrestricted { rule_type: String },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeConfig {
    #[serde(default)]
    start_hour: Option<u32>,
    #[serde(default)]
    end_hour: Option<u32>,
}

#[derive(Deserialize)]
struct DeviceConfig {
    #[serde(default)]
    devices: Option<Vec<String>>,
}

impl DisplayRule {
    /// Build a rule from its stored type tag and JSON configuration
    pub fn parse(rule_type: &str, config: &Value) -> Self {
        let unrestricted = || DisplayRule::Unrestricted {
            rule_type: rule_type.to_string(),
        };

        match rule_type {
            "time" => match TimeConfig::deserialize(config) {
                Ok(c) => DisplayRule::Time {
                    start_hour: c.start_hour,
                    end_hour: c.end_hour,
                },
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed time rule config");
                    unrestricted()
                }
            },
            "device" => match DeviceConfig::deserialize(config) {
                Ok(c) => DisplayRule::Device {
                    devices: c.devices.unwrap_or_default(),
                },
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed device rule config");
                    unrestricted()
                }
            },
            _ => unrestricted(),
        }
    }

    pub fn passes(&self, ctx: &VisitorContext) -> bool {
        match self {
            DisplayRule::Time {
                start_hour,
                end_hour,
            } => {
                start_hour.map_or(true, |start| start <= ctx.current_hour)
                    && end_hour.map_or(true, |end| ctx.current_hour < end)
            }
            DisplayRule::Device { devices } => {
                devices.is_empty() || devices.iter().any(|d| d == ctx.device.as_str())
            }
            DisplayRule::Unrestricted { .. } => true,
        }
    }
}

/// Decide whether a link with the given rules is visible in `ctx`
pub fn should_show(rules: &[DisplayRule], ctx: &VisitorContext) -> bool {
    rules.iter().all(|rule| rule.passes(ctx))
}
