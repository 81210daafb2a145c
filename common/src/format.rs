use crate::error::{NetworkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Group family every discovery channel belongs to.
pub const DISCOVERY_FAMILY: &str = "pupil-mobile";

/// Protocol version advertised by this implementation.
pub const PROTOCOL_VERSION: &str = "4";

/// Wire-format revision. Each revision has its own discovery group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    V3,
    V4,
}

impl DataFormat {
    pub fn version(&self) -> &'static str {
        match self {
            DataFormat::V3 => "3",
            DataFormat::V4 => "4",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version())
    }
}

impl FromStr for DataFormat {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let version = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        supported_formats()
            .iter()
            .copied()
            .find(|format| format.version() == version)
            .ok_or_else(|| NetworkError::UnsupportedFormat(s.to_string()))
    }
}

/// Every format this build can speak, oldest first.
pub fn supported_formats() -> &'static [DataFormat] {
    &[DataFormat::V3, DataFormat::V4]
}

pub fn group_name_from_format(format: DataFormat) -> &'static str {
    match format {
        DataFormat::V3 => "pupil-mobile-v3",
        DataFormat::V4 => "pupil-mobile-v4",
    }
}

/// Resolves a bare version token (`"4"`, `"v4"`) to its discovery group.
pub fn group_name_for_version(version: &str) -> Result<&'static str> {
    version.parse::<DataFormat>().map(group_name_from_format)
}
