//! Gateway configuration loaded from a YAML file with environment overrides.
//!
//! # Configuration Hierarchy
//!
//! Sources are merged in priority order (lowest to highest):
//!
//! 1. Struct defaults
//! 2. The YAML file selected with `-c` (default `/etc/mptcpkit/config.yml`)
//! 3. `MPTCPKIT_*` environment variables listed in [`ENV_OVERRIDES`]
//!
//! The file itself is mandatory: a missing or unreadable file is a fatal
//! startup error, like any invalid value.
//!
//! # Example
//!
//! ```yaml
//! api:
//!   script_dir: /etc/mptcpkit/endpoints
//!   key_file: /etc/mptcpkit/keys.yml
//!   dry: false
//! server:
//!   host: 0.0.0.0
//!   port: 8080
//!   https: true
//!   tls_cert: /etc/mptcpkit/tls/cert.pem
//!   tls_key: /etc/mptcpkit/tls/key.pem
//! ```

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::prelude::{deserialize_bool_from_anything, deserialize_vec_from_string_or_vec};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/mptcpkit/config.yml";

/// An environment variable that overrides one configuration key.
#[derive(Debug, Clone, Copy)]
pub struct EnvOverride {
    /// Environment variable name.
    pub var: &'static str,
    /// Dotted configuration key the variable maps onto.
    pub key: &'static str,
    /// Human-readable description for `--help`.
    pub description: &'static str,
    /// Default value shown in `--help`.
    pub default: &'static str,
}

/// Every supported environment override.
pub const ENV_OVERRIDES: &[EnvOverride] = &[
    EnvOverride {
        var: "MPTCPKIT_SCRIPT_DIR",
        key: "api.script_dir",
        description: "location of scripts for endpoint actions",
        default: "/etc/mptcpkit/endpoints",
    },
    EnvOverride {
        var: "MPTCPKIT_DRYRUN",
        key: "api.dry",
        description: "tell endpoint scripts not to perform side effects",
        default: "false",
    },
    EnvOverride {
        var: "MPTCPKIT_KEYFILE",
        key: "api.key_file",
        description: "YAML file holding the API and service keys",
        default: "/etc/mptcpkit/keys.yml",
    },
    EnvOverride {
        var: "MPTCPKIT_SCRIPT_TIMEOUT",
        key: "api.script_timeout_secs",
        description: "seconds an endpoint script may run before it is killed",
        default: "60",
    },
    EnvOverride {
        var: "MPTCPKIT_MAX_BODY_SIZE",
        key: "api.max_request_body_size",
        description: "maximum request body size in bytes",
        default: "65536",
    },
    EnvOverride {
        var: "MPTCPKIT_HOST",
        key: "server.host",
        description: "address to bind",
        default: "0.0.0.0",
    },
    EnvOverride {
        var: "MPTCPKIT_PORT",
        key: "server.port",
        description: "port to bind",
        default: "8080",
    },
    EnvOverride {
        var: "MPTCPKIT_HTTPS",
        key: "server.https",
        description: "serve over TLS",
        default: "true",
    },
    EnvOverride {
        var: "MPTCPKIT_TLS_CERT",
        key: "server.tls_cert",
        description: "TLS certificate (PEM) location",
        default: "",
    },
    EnvOverride {
        var: "MPTCPKIT_TLS_KEY",
        key: "server.tls_key",
        description: "TLS private key (PEM) location",
        default: "",
    },
    EnvOverride {
        var: "MPTCPKIT_TRUST_PROXY_HEADERS",
        key: "server.trust_proxy_headers",
        description: "resolve client addresses from X-Forwarded-For / X-Real-IP",
        default: "true",
    },
    EnvOverride {
        var: "MPTCPKIT_METRICS_PORT",
        key: "server.metrics_port",
        description: "Prometheus exporter port, 0 disables it",
        default: "0",
    },
    EnvOverride {
        var: "MPTCPKIT_ALLOWED_HOSTS",
        key: "security.allowed_hosts",
        description: "comma-separated Host values to accept, empty accepts any",
        default: "",
    },
    EnvOverride {
        var: "MPTCPKIT_SSL_REDIRECT",
        key: "security.ssl_redirect",
        description: "redirect plain HTTP requests to HTTPS",
        default: "false",
    },
    EnvOverride {
        var: "MPTCPKIT_SSL_HOST",
        key: "security.ssl_host",
        description: "host used in HTTPS redirects instead of the request Host",
        default: "",
    },
    EnvOverride {
        var: "MPTCPKIT_HSTS_MAX_AGE",
        key: "security.hsts_max_age",
        description: "Strict-Transport-Security max-age in seconds, 0 disables it",
        default: "31536000",
    },
    EnvOverride {
        var: "MPTCPKIT_LOG_LEVEL",
        key: "logging.level",
        description: "log filter (RUST_LOG takes precedence)",
        default: "info",
    },
    EnvOverride {
        var: "MPTCPKIT_LOG_FORMAT",
        key: "logging.format",
        description: "log output format: text or json",
        default: "text",
    },
];

/// Complete gateway configuration.
///
/// Immutable after [`Config::load`]; shared read-only through `Arc<Config>`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Endpoint action settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Directory holding the endpoint scripts (`wan-update`, ...).
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    /// Passed to scripts as `MPTCPKIT_DRYRUN=1`; the scripts still run.
    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    pub dry: bool,

    /// YAML file with `keys.api` and `keys.shadowsocks`.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,

    /// Deadline for a single script invocation.
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: usize,
}

impl ApiConfig {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve over TLS using `tls_cert` / `tls_key`.
    #[serde(default = "default_true", deserialize_with = "deserialize_bool_from_anything")]
    pub https: bool,

    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    #[serde(default)]
    pub tls_key: Option<PathBuf>,

    /// Trust `X-Forwarded-For` / `X-Real-IP` when resolving client addresses.
    /// Only safe behind a reverse proxy that overwrites these headers.
    #[serde(default = "default_true", deserialize_with = "deserialize_bool_from_anything")]
    pub trust_proxy_headers: bool,

    /// Prometheus exporter port (0 = disabled).
    #[serde(default)]
    pub metrics_port: u16,
}

/// Security header policy.
///
/// Defaults: no HTTPS redirect, any Host accepted, HSTS for one year without
/// subdomains (only sent on TLS requests), `X-Frame-Options: DENY`,
/// `Content-Security-Policy: default-src 'none'`, `Referrer-Policy: no-referrer`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Accepted `Host` header values. Empty accepts any host.
    #[serde(default, deserialize_with = "deserialize_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Redirect non-TLS requests to HTTPS.
    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    pub ssl_redirect: bool,

    /// Use 307 instead of 301 for HTTPS redirects.
    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    pub ssl_temporary_redirect: bool,

    /// Host used in HTTPS redirects (defaults to the request Host).
    #[serde(default)]
    pub ssl_host: Option<String>,

    /// `Strict-Transport-Security` max-age in seconds (0 = header disabled).
    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age: u64,

    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    pub hsts_include_subdomains: bool,

    #[serde(default = "default_frame_options")]
    pub frame_options: String,

    #[serde(default = "default_csp")]
    pub content_security_policy: String,

    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Deserialize hosts from a comma-separated string or array, dropping empty values.
fn deserialize_hosts<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let hosts: Vec<String> = deserialize_vec_from_string_or_vec(deserializer)?;
    Ok(hosts
        .into_iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect())
}

fn default_script_dir() -> PathBuf {
    PathBuf::from("/etc/mptcpkit/endpoints")
}

fn default_key_file() -> PathBuf {
    PathBuf::from("/etc/mptcpkit/keys.yml")
}

fn default_script_timeout_secs() -> u64 {
    60
}

fn default_max_request_body_size() -> usize {
    64 * 1024
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_hsts_max_age() -> u64 {
    31_536_000 // 1 year
}

fn default_frame_options() -> String {
    "DENY".to_string()
}

fn default_csp() -> String {
    "default-src 'none'".to_string()
}

fn default_referrer_policy() -> String {
    "no-referrer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            script_dir: default_script_dir(),
            dry: false,
            key_file: default_key_file(),
            script_timeout_secs: default_script_timeout_secs(),
            max_request_body_size: default_max_request_body_size(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            https: true,
            tls_cert: None,
            tls_key: None,
            trust_proxy_headers: true,
            metrics_port: 0,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: Vec::new(),
            ssl_redirect: false,
            ssl_temporary_redirect: false,
            ssl_host: None,
            hsts_max_age: default_hsts_max_age(),
            hsts_include_subdomains: false,
            frame_options: default_frame_options(),
            content_security_policy: default_csp(),
            referrer_policy: default_referrer_policy(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl Config {
    /// Load configuration from the YAML file at `path` plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value has the wrong type,
    /// or validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    /// Build configuration from YAML text plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a value has the wrong type or validation fails.
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::string(contents))
            .merge(env_overrides())
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.script_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "api.script_dir must not be empty (MPTCPKIT_SCRIPT_DIR)".into(),
            ));
        }

        if self.api.key_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "api.key_file must not be empty (MPTCPKIT_KEYFILE)".into(),
            ));
        }

        if self.api.script_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "api.script_timeout_secs must be greater than 0 (MPTCPKIT_SCRIPT_TIMEOUT)".into(),
            ));
        }

        if self.api.max_request_body_size == 0 {
            return Err(ConfigError::Validation(
                "api.max_request_body_size must be greater than 0 (MPTCPKIT_MAX_BODY_SIZE)".into(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be greater than 0 (MPTCPKIT_PORT)".into(),
            ));
        }

        // An empty path (e.g. `MPTCPKIT_TLS_CERT=""`) counts as unset
        let is_unset =
            |path: &Option<PathBuf>| path.as_ref().is_none_or(|p| p.as_os_str().is_empty());
        if self.server.https && (is_unset(&self.server.tls_cert) || is_unset(&self.server.tls_key))
        {
            return Err(ConfigError::Validation(
                "server.tls_cert and server.tls_key are required when server.https is enabled \
                 (MPTCPKIT_TLS_CERT, MPTCPKIT_TLS_KEY)"
                    .into(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        (self.server.metrics_port > 0)
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.server.metrics_port)))
    }
}

/// Environment provider restricted to [`ENV_OVERRIDES`], mapped onto nested keys.
fn env_overrides() -> Env {
    Env::raw().filter_map(|name| {
        ENV_OVERRIDES
            .iter()
            .find(|o| name.as_str().eq_ignore_ascii_case(o.var))
            .map(|o| o.key.into())
    })
}

/// Render the environment override table shown after `--help`.
pub fn env_help() -> String {
    let width = ENV_OVERRIDES.iter().map(|o| o.var.len()).max().unwrap_or(0);
    let mut help = String::from("Environment variables:\n");
    for o in ENV_OVERRIDES {
        let default = if o.default.is_empty() {
            "<none>"
        } else {
            o.default
        };
        let _ = writeln!(
            help,
            "  {:<width$}  {} (default: {default})",
            o.var, o.description
        );
    }
    help
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use figment::Jail;

    const MINIMAL_YAML: &str = r"
server:
  https: false
";

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.server.https);
        assert_eq!(config.api.script_dir, PathBuf::from("/etc/mptcpkit/endpoints"));
        assert!(!config.api.dry);
        assert_eq!(config.api.script_timeout_secs, 60);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_server_addr_format() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9443;

        assert_eq!(config.server_addr(), "127.0.0.1:9443");
    }

    #[test]
    fn test_metrics_addr_disabled_by_default() {
        assert!(Config::default().metrics_addr().is_none());
    }

    #[test]
    fn test_yaml_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.yml",
                r"
api:
  script_dir: /opt/endpoints
  dry: true
  key_file: /opt/keys.yml
server:
  host: 127.0.0.1
  port: 9000
  https: false
",
            )?;

            let config = Config::load(Path::new("config.yml")).map_err(|e| e.to_string())?;
            assert_eq!(config.api.script_dir, PathBuf::from("/opt/endpoints"));
            assert!(config.api.dry);
            assert_eq!(config.api.key_file, PathBuf::from("/opt/keys.yml"));
            assert_eq!(config.server_addr(), "127.0.0.1:9000");
            assert!(!config.server.https);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yml", MINIMAL_YAML)?;
            jail.set_env("MPTCPKIT_SCRIPT_DIR", "/srv/scripts");
            jail.set_env("MPTCPKIT_PORT", "8443");
            jail.set_env("MPTCPKIT_DRYRUN", "1");
            jail.set_env("MPTCPKIT_ALLOWED_HOSTS", "gw.example.net, gw.local");

            let config = Config::load(Path::new("config.yml")).map_err(|e| e.to_string())?;
            assert_eq!(config.api.script_dir, PathBuf::from("/srv/scripts"));
            assert_eq!(config.server.port, 8443);
            assert!(config.api.dry);
            assert_eq!(
                config.security.allowed_hosts,
                vec!["gw.example.net".to_string(), "gw.local".to_string()]
            );
            Ok(())
        });
    }

    #[test]
    fn test_unrelated_env_is_ignored() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yml", MINIMAL_YAML)?;
            jail.set_env("MPTCPKIT_UNKNOWN", "whatever");
            jail.set_env("PORT", "1");

            let config = Config::load(Path::new("config.yml")).map_err(|e| e.to_string())?;
            assert_eq!(config.server.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = Config::load(Path::new("/nonexistent/mptcpkit/config.yml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_https_requires_tls_paths() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tls_cert"));

        let mut config = Config::default();
        config.server.tls_cert = Some(PathBuf::from("/etc/mptcpkit/cert.pem"));
        config.server.tls_key = Some(PathBuf::from("/etc/mptcpkit/key.pem"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_https_rejects_empty_tls_path() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yml", "server:\n  https: true\n")?;
            jail.set_env("MPTCPKIT_TLS_CERT", "");
            jail.set_env("MPTCPKIT_TLS_KEY", "/etc/mptcpkit/key.pem");

            let err = Config::load(Path::new("config.yml")).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            assert!(err.to_string().contains("tls_cert"));
            Ok(())
        });
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.server.https = false;
        config.api.script_timeout_secs = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("script_timeout_secs"));
    }

    #[test]
    fn test_env_help_lists_every_override() {
        let help = env_help();
        for o in ENV_OVERRIDES {
            assert!(help.contains(o.var), "missing {}", o.var);
        }
        assert!(help.contains("default: /etc/mptcpkit/endpoints"));
    }
}
