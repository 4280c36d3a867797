//! Configuration loading: nested section structs, `#[serde(default = "fn")]`
//! per field, a `Default` impl per section, and a dotfile path under the
//! target repository.
//!
//! Precedence: CLI flag > environment variable > configuration file >
//! built-in default. Implemented by layering three all-`Option` partials and
//! folding first-non-`None`-wins, left to right -- not a dynamic
//! named-parameter map.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn default_runner() -> String {
    "claude".to_string()
}
fn default_model() -> String {
    "default".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_implement() -> u64 {
    1800
}
fn default_timeout_test() -> u64 {
    600
}
fn default_timeout_review() -> u64 {
    600
}
fn default_log_dir() -> String {
    ".arborist/logs".to_string()
}
fn default_report_dir() -> String {
    ".arborist/reports".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    #[serde(default = "default_timeout_implement")]
    pub implement: u64,
    #[serde(default = "default_timeout_test")]
    pub test: u64,
    #[serde(default = "default_timeout_review")]
    pub review: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            implement: default_timeout_implement(),
            test: default_timeout_test(),
            review: default_timeout_review(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde(default = "default_runner")]
    pub runner: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Tokens prepended to every runner and test invocation (sandboxing
    /// hook), e.g. `["devcontainer", "exec", "--workspace-folder", "."]`.
    #[serde(default)]
    pub command_prefix: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
}

impl ArtifactsConfig {
    fn defaults() -> Self {
        Self {
            log_dir: default_log_dir(),
            report_dir: default_report_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArboristConfig {
    #[serde(flatten)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(flatten)]
    pub retry: RetryConfig,
    /// Shell command for the test step; `None` auto-detects the target
    /// repository's conventional test entry point.
    #[serde(default)]
    pub test_command: Option<String>,
    #[serde(flatten)]
    pub artifacts: ArtifactsConfig,
}

impl Default for ArboristConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            timeouts: TimeoutsConfig::default(),
            retry: RetryConfig::default(),
            test_command: None,
            artifacts: ArtifactsConfig::defaults(),
        }
    }
}

/// All-`Option` overlay used for CLI-flag and environment-variable layers,
/// so "not specified" is distinguishable from "set to the default value."
#[derive(Debug, Clone, Default)]
pub struct ConfigOverlay {
    pub runner: Option<String>,
    pub model: Option<String>,
    pub max_retries: Option<u32>,
    pub timeout_implement: Option<u64>,
    pub timeout_test: Option<u64>,
    pub timeout_review: Option<u64>,
    pub test_command: Option<String>,
    pub log_dir: Option<String>,
    pub report_dir: Option<String>,
    pub command_prefix: Option<Vec<String>>,
}

impl ConfigOverlay {
    /// Build the env-var layer. Recognized variables, per spec §6.
    pub fn from_env() -> Self {
        Self {
            runner: std::env::var("ARBORIST_RUNNER").ok(),
            model: std::env::var("ARBORIST_MODEL").ok(),
            max_retries: std::env::var("ARBORIST_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok()),
            timeout_implement: std::env::var("ARBORIST_TIMEOUT_IMPLEMENT")
                .ok()
                .and_then(|v| v.parse().ok()),
            timeout_test: std::env::var("ARBORIST_TIMEOUT_TEST")
                .ok()
                .and_then(|v| v.parse().ok()),
            timeout_review: std::env::var("ARBORIST_TIMEOUT_REVIEW")
                .ok()
                .and_then(|v| v.parse().ok()),
            test_command: std::env::var("ARBORIST_TEST_COMMAND").ok(),
            log_dir: std::env::var("ARBORIST_LOG_DIR").ok(),
            report_dir: std::env::var("ARBORIST_REPORT_DIR").ok(),
            command_prefix: None,
        }
    }
}

/// Conventional test entry points, checked in order, used when
/// `test_command` is left unset (spec §6: "if null, auto-detect (prefer the
/// target repository's conventional test entry point)").
const TEST_COMMAND_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo test"),
    ("package.json", "npm test"),
    ("go.mod", "go test ./..."),
    ("pyproject.toml", "pytest"),
    ("setup.py", "pytest"),
    ("Gemfile", "bundle exec rspec"),
];

/// Probe `repo_root` for the first marker file in [`TEST_COMMAND_MARKERS`]
/// and return its associated command. `None` if no marker is present --
/// callers surface that as a configuration error rather than guessing.
pub fn detect_test_command(repo_root: &Path) -> Option<String> {
    TEST_COMMAND_MARKERS
        .iter()
        .find(|(marker, _)| repo_root.join(marker).is_file())
        .map(|(_, command)| command.to_string())
}

impl ArboristConfig {
    /// Default path: `<target-repo>/.arborist/config.toml`.
    pub fn default_path(target_repo: &Path) -> PathBuf {
        target_repo.join(".arborist").join("config.toml")
    }

    /// Load from the default path if present, falling back to built-in
    /// defaults if the file does not exist.
    pub fn load(target_repo: &Path) -> ConfigResult<Self> {
        let path = Self::default_path(target_repo);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self).expect("serializable config"))
    }

    /// Fold CLI-flag overlay, then env-var overlay, then this file-layer
    /// config, taking first-non-`None`-wins in that order (CLI wins,
    /// file/default loses).
    pub fn resolve(file_config: ArboristConfig, env: ConfigOverlay, cli: ConfigOverlay) -> Self {
        let mut resolved = file_config;
        for overlay in [env, cli] {
            if let Some(v) = overlay.runner {
                resolved.runner.runner = v;
            }
            if let Some(v) = overlay.model {
                resolved.runner.model = v;
            }
            if let Some(v) = overlay.max_retries {
                resolved.retry.max_retries = v;
            }
            if let Some(v) = overlay.timeout_implement {
                resolved.timeouts.implement = v;
            }
            if let Some(v) = overlay.timeout_test {
                resolved.timeouts.test = v;
            }
            if let Some(v) = overlay.timeout_review {
                resolved.timeouts.review = v;
            }
            if let Some(v) = overlay.test_command {
                resolved.test_command = Some(v);
            }
            if let Some(v) = overlay.log_dir {
                resolved.artifacts.log_dir = v;
            }
            if let Some(v) = overlay.report_dir {
                resolved.artifacts.report_dir = v;
            }
            if let Some(v) = overlay.command_prefix {
                resolved.runner.command_prefix = v;
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let cfg = ArboristConfig::default();
        assert_eq!(cfg.runner.runner, "claude");
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.timeouts.implement, 1800);
        assert!(cfg.test_command.is_none());
    }

    #[test]
    fn precedence_cli_beats_env_beats_file() {
        let mut file_config = ArboristConfig::default();
        file_config.runner.runner = "gemini".to_string();

        let env = ConfigOverlay {
            runner: Some("opencode".to_string()),
            ..Default::default()
        };
        let cli = ConfigOverlay {
            max_retries: Some(9),
            ..Default::default()
        };

        let resolved = ArboristConfig::resolve(file_config, env, cli);
        assert_eq!(resolved.runner.runner, "opencode");
        assert_eq!(resolved.retry.max_retries, 9);
    }

    #[test]
    fn load_from_missing_path_is_error() {
        let path = Path::new("/nonexistent/arborist-config-test.toml");
        assert!(ArboristConfig::load_from(path).is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = ArboristConfig::default();
        let text = cfg.to_toml().unwrap();
        let parsed: ArboristConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.runner.runner, cfg.runner.runner);
    }

    #[test]
    fn detects_cargo_test_command() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();
        assert_eq!(detect_test_command(dir.path()), Some("cargo test".to_string()));
    }

    #[test]
    fn detect_test_command_none_when_no_marker_present() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(detect_test_command(dir.path()), None);
    }
}
