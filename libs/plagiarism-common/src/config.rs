// Analyzer tool configuration
// Built once at startup and passed into the pipeline, never mutated afterwards

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_DIR: &str = "/opt/jplag";
pub const DEFAULT_DOCKER_IMAGE: &str = "jplag";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_CONTAINER_MOUNT: &str = "/data";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} ({path}) must live under the base directory {base}")]
    OutsideBaseDir {
        name: &'static str,
        path: String,
        base: String,
    },

    #[error("container mount point must be an absolute path, got '{0}'")]
    RelativeMount(String),
}

/// Where the analyzer reads submissions and writes results, and how it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Host directory bind-mounted into the analyzer container
    pub base_dir: PathBuf,
    pub submissions_dir: PathBuf,
    pub results_dir: PathBuf,
    pub docker_image: String,
    pub timeout_seconds: u64,
    /// Path at which `base_dir` appears inside the container
    pub container_mount: PathBuf,
}

impl ToolConfig {
    /// Configuration rooted at `base_dir` with the conventional
    /// `submissions/` and `results/` subdirectories
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            submissions_dir: base_dir.join("submissions"),
            results_dir: base_dir.join("results"),
            base_dir,
            docker_image: DEFAULT_DOCKER_IMAGE.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            container_mount: PathBuf::from(DEFAULT_CONTAINER_MOUNT),
        }
    }

    /// Load from JPLAG_* environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_dir = PathBuf::from(get("JPLAG_BASE_DIR").unwrap_or_else(|| DEFAULT_BASE_DIR.to_string()));
        let mut config = Self::with_base_dir(base_dir);

        if let Some(dir) = get("JPLAG_SUBMISSIONS_DIR") {
            config.submissions_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("JPLAG_RESULTS_DIR") {
            config.results_dir = PathBuf::from(dir);
        }
        if let Some(image) = get("JPLAG_DOCKER_IMAGE") {
            config.docker_image = image;
        }
        if let Some(mount) = get("JPLAG_CONTAINER_MOUNT") {
            config.container_mount = PathBuf::from(mount);
        }
        if let Some(raw) = get("JPLAG_TIMEOUT_SECONDS") {
            config.timeout_seconds = match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        name: "JPLAG_TIMEOUT_SECONDS",
                        value: raw,
                    })
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Staging roots must sit under the shared base so that host and
    /// container paths can be translated into each other
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("JPLAG_SUBMISSIONS_DIR", &self.submissions_dir),
            ("JPLAG_RESULTS_DIR", &self.results_dir),
        ] {
            if !path.starts_with(&self.base_dir) {
                return Err(ConfigError::OutsideBaseDir {
                    name,
                    path: path.display().to_string(),
                    base: self.base_dir.display().to_string(),
                });
            }
        }
        if !self.container_mount.is_absolute() {
            return Err(ConfigError::RelativeMount(
                self.container_mount.display().to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Translate a host path under `base_dir` into the path the container sees.
    /// Returns None for paths outside the shared base.
    pub fn container_path(&self, host_path: &Path) -> Option<PathBuf> {
        host_path
            .strip_prefix(&self.base_dir)
            .ok()
            .map(|relative| self.container_mount.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ToolConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/opt/jplag"));
        assert_eq!(config.submissions_dir, PathBuf::from("/opt/jplag/submissions"));
        assert_eq!(config.results_dir, PathBuf::from("/opt/jplag/results"));
        assert_eq!(config.docker_image, "jplag");
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_env_overrides() {
        let config = ToolConfig::from_lookup(lookup_from(&[
            ("JPLAG_BASE_DIR", "/srv/shared"),
            ("JPLAG_RESULTS_DIR", "/srv/shared/out"),
            ("JPLAG_DOCKER_IMAGE", "ghcr.io/jplag/jplag:6"),
            ("JPLAG_TIMEOUT_SECONDS", "120"),
        ]))
        .unwrap();
        assert_eq!(config.submissions_dir, PathBuf::from("/srv/shared/submissions"));
        assert_eq!(config.results_dir, PathBuf::from("/srv/shared/out"));
        assert_eq!(config.docker_image, "ghcr.io/jplag/jplag:6");
        assert_eq!(config.timeout_seconds, 120);
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let err = ToolConfig::from_lookup(lookup_from(&[("JPLAG_TIMEOUT_SECONDS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = ToolConfig::from_lookup(lookup_from(&[("JPLAG_TIMEOUT_SECONDS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));
    }

    #[test]
    fn test_rejects_staging_outside_base() {
        let err = ToolConfig::from_lookup(lookup_from(&[
            ("JPLAG_BASE_DIR", "/opt/jplag"),
            ("JPLAG_SUBMISSIONS_DIR", "/tmp/elsewhere"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::OutsideBaseDir { name: "JPLAG_SUBMISSIONS_DIR", .. }));
    }

    #[test]
    fn test_container_path_translation() {
        let config = ToolConfig::with_base_dir("/opt/jplag");
        assert_eq!(
            config.container_path(Path::new("/opt/jplag/submissions/run_abc")),
            Some(PathBuf::from("/data/submissions/run_abc"))
        );
        assert_eq!(config.container_path(Path::new("/var/tmp/run_abc")), None);
    }
}
