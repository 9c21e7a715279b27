//! Visitor device classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Widest viewport still considered a phone
pub const MOBILE_MAX_WIDTH: u32 = 768;

/// Widest viewport still considered a tablet
pub const TABLET_MAX_WIDTH: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    #[default]
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    /// Classify a raw viewport width in CSS pixels
    pub fn from_width(width: u32) -> Self {
        if width <= MOBILE_MAX_WIDTH {
            DeviceType::Mobile
        } else if width <= TABLET_MAX_WIDTH {
            DeviceType::Tablet
        } else {
            DeviceType::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown device type '{0}'")]
pub struct UnknownDeviceType(pub String);

impl FromStr for DeviceType {
    type Err = UnknownDeviceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(DeviceType::Desktop),
            "mobile" => Ok(DeviceType::Mobile),
            "tablet" => Ok(DeviceType::Tablet),
            _ => Err(UnknownDeviceType(s.to_string())),
        }
    }
}
