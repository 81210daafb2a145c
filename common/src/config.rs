use crate::error::{NetworkError, Result};
use crate::format::{supported_formats, DataFormat};

pub const ENV_NAME: &str = "SENSOR_NET_NAME";
pub const ENV_HEADERS: &str = "SENSOR_NET_HEADERS";
pub const ENV_FORMATS: &str = "SENSOR_NET_FORMATS";

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Requested node name; the transport picks one when absent.
    pub name: Option<String>,
    /// Headers set on every transport session before it starts.
    pub headers: Vec<(String, String)>,
    /// Wire formats to open a discovery channel for.
    pub formats: Vec<DataFormat>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: None,
            headers: Vec::new(),
            formats: supported_formats().to_vec(),
        }
    }
}

impl NetworkConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(name) = lookup(ENV_NAME).filter(|n| !n.trim().is_empty()) {
            config.name = Some(name.trim().to_string());
        }
        if let Some(headers) = lookup(ENV_HEADERS) {
            config.headers = parse_headers(&headers)?;
        }
        if let Some(formats) = lookup(ENV_FORMATS) {
            config.formats = parse_formats(&formats)?;
        }
        Ok(config)
    }

    /// Configured formats, deduplicated and in supported order.
    pub fn resolved_formats(&self) -> Vec<DataFormat> {
        supported_formats()
            .iter()
            .copied()
            .filter(|format| self.formats.contains(format))
            .collect()
    }
}

pub fn parse_headers(value: &str) -> Result<Vec<(String, String)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
                .filter(|(key, _)| !key.is_empty())
                .ok_or_else(|| NetworkError::Config(format!("invalid header entry: {}", entry)))
        })
        .collect()
}

pub fn parse_formats(value: &str) -> Result<Vec<DataFormat>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}
