use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatError;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_OPEN_TIMEOUT_SECS: u64 = 8;
const LOCAL_CONFIG_FILE: &str = "urlcat.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub open_timeout_secs: Option<u64>,
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub s3: Option<S3Config>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct S3Config {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub concurrency: Option<usize>,
    pub open_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub concurrency: usize,
    pub open_timeout: Duration,
    pub read_timeout: Option<Duration>,
    pub user_agent: String,
    pub s3_endpoint: Option<String>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            open_timeout: Duration::from_secs(DEFAULT_OPEN_TIMEOUT_SECS),
            read_timeout: None,
            user_agent: default_user_agent(),
            s3_endpoint: None,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path` if given, otherwise the first config file found by
    /// [`ConfigLoader::discover`], otherwise the defaults.
    pub fn resolve(
        path: Option<&str>,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, CatError> {
        let config_path = match path {
            Some(path) => Some(Utf8PathBuf::from(path)),
            None => Self::discover(),
        };

        let config = match config_path {
            Some(config_path) => {
                debug!(path = %config_path, "loading config");
                let content = fs::read_to_string(config_path.as_std_path())
                    .map_err(|_| CatError::ConfigRead(config_path.clone()))?;
                serde_json::from_str(&content)
                    .map_err(|err| CatError::ConfigParse(err.to_string()))?
            }
            None => Config::default(),
        };

        Self::resolve_config(config, overrides)
    }

    pub fn discover() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "urlcat")
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.config_dir().join("config.json")).ok())
            .filter(|path| path.exists())
    }

    pub fn resolve_config(
        config: Config,
        overrides: &ConfigOverrides,
    ) -> Result<ResolvedConfig, CatError> {
        let concurrency = overrides
            .concurrency
            .or(config.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(CatError::InvalidConcurrency(concurrency));
        }

        let open_timeout_secs = overrides
            .open_timeout_secs
            .or(config.open_timeout_secs)
            .unwrap_or(DEFAULT_OPEN_TIMEOUT_SECS);
        if open_timeout_secs == 0 {
            return Err(CatError::InvalidConfig(
                "open timeout must be at least 1 second".to_string(),
            ));
        }

        let read_timeout = match config.read_timeout_secs {
            Some(0) => {
                return Err(CatError::InvalidConfig(
                    "read timeout must be at least 1 second".to_string(),
                ));
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let s3_endpoint = config.s3.and_then(|s3| s3.endpoint);
        if let Some(endpoint) = &s3_endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(CatError::InvalidConfig(format!(
                    "s3 endpoint must be an http(s) url: {endpoint}"
                )));
            }
        }

        Ok(ResolvedConfig {
            concurrency,
            open_timeout: Duration::from_secs(open_timeout_secs),
            read_timeout,
            user_agent: config.user_agent.unwrap_or_else(default_user_agent),
            s3_endpoint,
        })
    }
}

pub fn default_user_agent() -> String {
    format!("urlcat/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved =
            ConfigLoader::resolve_config(Config::default(), &ConfigOverrides::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.concurrency, 8);
        assert_eq!(resolved.open_timeout, Duration::from_secs(8));
    }

    #[test]
    fn overrides_win_over_file() {
        let config = Config {
            concurrency: Some(2),
            open_timeout_secs: Some(30),
            ..Config::default()
        };
        let overrides = ConfigOverrides {
            concurrency: Some(16),
            open_timeout_secs: None,
        };
        let resolved = ConfigLoader::resolve_config(config, &overrides).unwrap();
        assert_eq!(resolved.concurrency, 16);
        assert_eq!(resolved.open_timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let overrides = ConfigOverrides {
            concurrency: Some(0),
            open_timeout_secs: None,
        };
        let err = ConfigLoader::resolve_config(Config::default(), &overrides).unwrap_err();
        assert_matches!(err, CatError::InvalidConcurrency(0));
    }

    #[test]
    fn endpoint_requires_http_scheme() {
        let config = Config {
            s3: Some(S3Config {
                endpoint: Some("minio.local:9000".to_string()),
            }),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config, &ConfigOverrides::default()).unwrap_err();
        assert_matches!(err, CatError::InvalidConfig(_));
    }
}
