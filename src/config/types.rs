//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::TimingConfig;
use crate::control::DEFAULT_PROMPT;
use crate::process::DEFAULT_BUFFER_CAPACITY;

/// Config path that means "let the emulator find its own rc file".
pub const DEFAULT_CONFIG_SENTINEL: &str = "~/.dosemurc";

/// How to launch the emulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// Emulator executable used when none is given on the command line.
    #[serde(default = "default_primary_path")]
    pub path: PathBuf,
    /// Config path treated the same as an empty one: no `-f` is passed.
    #[serde(default = "default_config_sentinel")]
    pub default_config: String,
    /// Appended after the config arguments, e.g. `-c` or `-V`.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_primary_path() -> PathBuf {
    PathBuf::from("/usr/bin/dosemu")
}

fn default_config_sentinel() -> String {
    DEFAULT_CONFIG_SENTINEL.to_string()
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            path: default_primary_path(),
            default_config: default_config_sentinel(),
            extra_args: Vec::new(),
        }
    }
}

impl PrimaryConfig {
    /// Build the emulator argument list for `config_path`.
    ///
    /// An empty path, or one equal to [`Self::default_config`], adds no
    /// config arguments; anything else becomes `-f <config_path>`.
    #[must_use]
    pub fn build_args(&self, config_path: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(2 + self.extra_args.len());
        if !self.uses_default_config(config_path) {
            args.push("-f".to_string());
            args.push(config_path.to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Whether `config_path` selects the emulator's own default config.
    #[must_use]
    pub fn uses_default_config(&self, config_path: &str) -> bool {
        config_path.is_empty() || config_path == self.default_config
    }
}

/// How to reach the dosdebug companion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionConfig {
    /// Well-known location of the companion executable.
    #[serde(default = "default_companion_path")]
    pub path: PathBuf,
    /// Substring that ends a drain early when seen.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Size of the per-exchange read buffer in bytes.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

fn default_companion_path() -> PathBuf {
    PathBuf::from("/usr/bin/dosdebug")
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            path: default_companion_path(),
            prompt: default_prompt(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

/// Configuration for the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}
