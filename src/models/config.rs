use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// User configuration from `Edi Settings.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdiConfig {
    #[serde(rename = "Edi_Settings", default)]
    pub edi_settings: EdiSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdiSettings {
    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Log Directory", default = "default_log_directory")]
    pub log_directory: String,

    /// Seconds; 0 disables the limit
    #[serde(rename = "Command Timeout", default)]
    pub command_timeout: u64,

    /// Provider id forced instead of detection; empty means detect
    #[serde(rename = "Build Provider", default)]
    pub build_provider: String,

    #[serde(rename = "Meson Build Dir", default = "default_meson_build_dir")]
    pub meson_build_dir: String,

    #[serde(rename = "Compile Commands", default)]
    pub compile_commands: bool,

    #[serde(rename = "Build Environment", default)]
    pub build_environment: IndexMap<String, String>,

    #[serde(rename = "Notify Capacity", default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

impl Default for EdiSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            log_directory: default_log_directory(),
            command_timeout: 0,
            build_provider: String::new(),
            meson_build_dir: default_meson_build_dir(),
            compile_commands: false,
            build_environment: IndexMap::new(),
            notify_capacity: default_notify_capacity(),
        }
    }
}

impl EdiSettings {
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout > 0).then(|| Duration::from_secs(self.command_timeout))
    }

    pub fn build_provider_override(&self) -> Option<&str> {
        let id = self.build_provider.trim();
        (!id.is_empty()).then_some(id)
    }
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_meson_build_dir() -> String {
    "build".to_string()
}

fn default_notify_capacity() -> usize {
    16
}
