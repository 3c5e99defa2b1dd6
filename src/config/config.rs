//! Configuration loading
//!
//! TOML file (`sap-odata.toml`, or the path in `SAP_ODATA_CONFIG`) validated
//! into a [`RuntimeConfig`].

use crate::auth::{ClientCredentialsAuth, CredentialProvider, StaticToken};
use crate::metadata::ODataVersion;
use crate::odata::{ODataClient, ODataError, ReqwestTransport, DEFAULT_MAX_PAGES};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "sap-odata.toml";
pub const CONFIG_PATH_ENV: &str = "SAP_ODATA_CONFIG";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Environment variable {0} is not set")]
    MissingEnv(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub paging: PagingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Scheme and host, e.g. `https://my-system.s4hana.ondemand.com`
    pub base_url: String,
    /// e.g. `/sap/opu/odata/sap/API_TRAVEL_SRV`
    #[serde(default)]
    pub service_path: String,
    #[serde(default)]
    pub version: ODataVersion,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub token_url: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Read the client secret from this variable instead of the file
    pub client_secret_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

/// Resolved credentials
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Bearer(String),
    ClientCredentials {
        token_url: String,
        client_id: String,
        client_secret: String,
    },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::Bearer(_) => f.write_str("Bearer(***)"),
            AuthMethod::ClientCredentials {
                token_url,
                client_id,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub service_root: String,
    pub version: ODataVersion,
    pub auth: AuthMethod,
    pub timeout: Duration,
    pub max_pages: usize,
}

impl Config {
    /// Load from `SAP_ODATA_CONFIG`, falling back to `./sap-odata.toml`
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Validate and resolve secrets
    pub fn to_runtime(&self) -> Result<RuntimeConfig, ConfigError> {
        let base_url = self.service.base_url.trim_end_matches('/');
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "service.base_url must be an http(s) URL, got '{}'",
                self.service.base_url
            )));
        }

        let service_path = self.service.service_path.trim_matches('/');
        let service_root = if service_path.is_empty() {
            base_url.to_string()
        } else {
            format!("{}/{}", base_url, service_path)
        };

        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(RuntimeConfig {
            service_root,
            version: self.service.version,
            auth: self.auth.resolve()?,
            timeout: Duration::from_secs(self.http.timeout_secs),
            max_pages: self.paging.max_pages,
        })
    }
}

impl AuthConfig {
    fn resolve(&self) -> Result<AuthMethod, ConfigError> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(AuthMethod::Bearer(token.to_string()));
        }

        let (Some(token_url), Some(client_id)) = (&self.token_url, &self.client_id) else {
            return Err(ConfigError::Invalid(
                "auth needs either token, or token_url and client_id".to_string(),
            ));
        };

        let client_secret = match (&self.client_secret, &self.client_secret_env) {
            (Some(secret), _) if !secret.is_empty() => secret.clone(),
            (_, Some(var)) => {
                std::env::var(var).map_err(|_| ConfigError::MissingEnv(var.clone()))?
            }
            _ => {
                return Err(ConfigError::Invalid(
                    "auth needs client_secret or client_secret_env".to_string(),
                ))
            }
        };

        Ok(AuthMethod::ClientCredentials {
            token_url: token_url.clone(),
            client_id: client_id.clone(),
            client_secret,
        })
    }
}

impl RuntimeConfig {
    pub fn credentials(&self) -> Arc<dyn CredentialProvider> {
        match &self.auth {
            AuthMethod::Bearer(token) => Arc::new(StaticToken::new(token.clone())),
            AuthMethod::ClientCredentials {
                token_url,
                client_id,
                client_secret,
            } => Arc::new(ClientCredentialsAuth::new(
                token_url.clone(),
                client_id.clone(),
                client_secret.clone(),
            )),
        }
    }

    /// Client over a `reqwest` transport with the configured timeout
    pub fn client(&self) -> Result<ODataClient, ODataError> {
        let transport = Arc::new(ReqwestTransport::new(self.timeout)?);
        Ok(ODataClient::new(transport, self.credentials(), &self.service_root)?
            .with_version(self.version)
            .with_max_pages(self.max_pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[service]
base_url = "https://my-system.s4hana.ondemand.com/"
service_path = "/sap/opu/odata4/sap/zui_travel/srvd/sap/travel/0001/"
version = "v4"

[auth]
token_url = "https://sub.authentication.eu10.hana.ondemand.com/oauth/token"
client_id = "sb-travel"
client_secret = "s3cret"

[http]
timeout_secs = 30

[paging]
max_pages = 5
"#;

    #[test]
    fn test_full_config() {
        let runtime = Config::from_toml(FULL).unwrap().to_runtime().unwrap();
        assert_eq!(
            runtime.service_root,
            "https://my-system.s4hana.ondemand.com/sap/opu/odata4/sap/zui_travel/srvd/sap/travel/0001"
        );
        assert_eq!(runtime.version, ODataVersion::V4);
        assert_eq!(runtime.timeout, Duration::from_secs(30));
        assert_eq!(runtime.max_pages, 5);
        assert!(matches!(runtime.auth, AuthMethod::ClientCredentials { ref client_secret, .. } if client_secret == "s3cret"));
        assert!(!format!("{:?}", runtime).contains("s3cret"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml(
            r#"
[service]
base_url = "https://host"
service_path = "sap/opu/odata/sap/API_TRAVEL_SRV"
[auth]
token = "abc"
"#,
        )
        .unwrap();
        let runtime = config.to_runtime().unwrap();
        assert_eq!(runtime.version, ODataVersion::V2);
        assert_eq!(runtime.timeout, Duration::from_secs(120));
        assert_eq!(runtime.max_pages, DEFAULT_MAX_PAGES);
        assert_eq!(runtime.auth, AuthMethod::Bearer("abc".into()));
        assert_eq!(runtime.service_root, "https://host/sap/opu/odata/sap/API_TRAVEL_SRV");
        assert!(runtime.client().is_ok());
    }

    #[test]
    fn test_secret_from_environment() {
        std::env::set_var("SAP_ODATA_TEST_SECRET_1", "from-env");
        let config = Config::from_toml(
            r#"
[service]
base_url = "https://host"
[auth]
token_url = "https://uaa/oauth/token"
client_id = "c"
client_secret_env = "SAP_ODATA_TEST_SECRET_1"
"#,
        )
        .unwrap();
        let runtime = config.to_runtime().unwrap();
        assert!(matches!(runtime.auth, AuthMethod::ClientCredentials { ref client_secret, .. } if client_secret == "from-env"));

        let mut missing = config.clone();
        missing.auth.client_secret_env = Some("SAP_ODATA_TEST_SECRET_UNSET".into());
        assert!(matches!(missing.to_runtime(), Err(ConfigError::MissingEnv(_))));
    }

    #[test]
    fn test_invalid_configs() {
        let no_auth = Config::from_toml("[service]\nbase_url = \"https://host\"\n").unwrap();
        assert!(matches!(no_auth.to_runtime(), Err(ConfigError::Invalid(_))));

        let bad_url = Config::from_toml("[service]\nbase_url = \"host\"\n[auth]\ntoken = \"x\"\n").unwrap();
        assert!(matches!(bad_url.to_runtime(), Err(ConfigError::Invalid(_))));

        assert!(matches!(
            Config::from_toml("[service]\nbase_url = \"https://h\"\nversion = \"v3\"\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::load(Path::new("/nonexistent/sap-odata.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
