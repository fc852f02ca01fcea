//! Settings kept in MKRIOT_HOME

use std::path::{Path, PathBuf};

use mkriot_proto::{ALARM_CLOCK, Profile, SENSOR_CARRIER};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.json";

/// Which firmware the board is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    #[default]
    Sensor,
    Alarm,
}

impl ProfileName {
    pub fn profile(self) -> &'static Profile {
        match self {
            ProfileName::Sensor => &SENSOR_CARRIER,
            ProfileName::Alarm => &ALARM_CLOCK,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub profile: ProfileName,
    /// Name or address substring of the board to use
    pub device: Option<String>,
    pub scan_secs: u64,
    /// Log filter used when RUST_LOG is not set
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: ProfileName::Sensor,
            device: None,
            scan_secs: 5,
            log: "warn".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine the home directory, set MKRIOT_HOME")]
    NoHome,
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// MKRIOT_HOME, or ~/.mkriot
pub fn mkriot_home() -> Result<PathBuf, ConfigError> {
    match std::env::var_os("MKRIOT_HOME") {
        Some(home) => Ok(PathBuf::from(home)),
        None => dirs::home_dir()
            .map(|home| home.join(".mkriot"))
            .ok_or(ConfigError::NoHome),
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&mkriot_home()?.join(CONFIG_FILE))
    }

    /// Missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Command line flags win over the file
    pub fn override_with(
        mut self,
        profile: Option<ProfileName>,
        device: Option<String>,
        scan_secs: Option<u64>,
    ) -> Self {
        if let Some(profile) = profile {
            self.profile = profile;
        }
        if device.is_some() {
            self.device = device;
        }
        if let Some(secs) = scan_secs {
            self.scan_secs = secs;
        }
        self
    }
}
