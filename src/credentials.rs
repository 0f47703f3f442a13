//! Shared-secret key file.
//!
//! The key file is a small YAML document:
//!
//! ```yaml
//! keys:
//!   api: <static API key checked by the auth gate>
//!   shadowsocks: <service key handed out by GET /ss/key>
//! ```
//!
//! It is loaded once at startup for the authentication gate. `GET /ss/key`
//! re-reads it on every call so that rotating the service key does not need a
//! restart.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Format, Yaml};
use serde::Deserialize;
use serde_aux::prelude::deserialize_string_from_number;

#[derive(Debug, Deserialize)]
struct KeyFile {
    keys: Keys,
}

#[derive(Debug, Deserialize)]
struct Keys {
    // Unquoted numeric keys are valid YAML scalars
    #[serde(default, deserialize_with = "deserialize_string_from_number")]
    shadowsocks: String,
    #[serde(default, deserialize_with = "deserialize_string_from_number")]
    api: String,
}

/// Key file loading and parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed key file: {0}")]
    Malformed(#[from] Box<figment::Error>),

    #[error("Key file has an empty keys.api entry")]
    MissingApiKey,

    #[error("Key file has an empty keys.shadowsocks entry")]
    MissingServiceKey,
}

impl From<figment::Error> for CredentialError {
    fn from(err: figment::Error) -> Self {
        Self::Malformed(Box::new(err))
    }
}

/// The API key checked by the authentication gate.
///
/// The service key is not kept; `GET /ss/key` reads it with
/// [`CredentialSet::read_service_key`].
#[derive(Clone)]
pub struct CredentialSet {
    api_key: String,
}

// Never print secrets, even at debug level.
impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSet")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl CredentialSet {
    /// Read the key file and keep its API key, which must be non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, or `keys.api`
    /// is empty.
    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        let credentials = Self::parse(&read_key_file(path).await?)?;

        if credentials.api_key.is_empty() {
            return Err(CredentialError::MissingApiKey);
        }
        Ok(credentials)
    }

    /// Parse key file contents, keeping only the API key.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::Malformed` if the YAML lacks a `keys` mapping
    /// or holds values of the wrong type.
    pub fn parse(contents: &str) -> Result<Self, CredentialError> {
        Ok(Self {
            api_key: parse_keys(contents)?.api,
        })
    }

    /// Re-read the key file and return only the service key.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable, malformed, or the service
    /// key is empty.
    pub async fn read_service_key(path: &Path) -> Result<String, CredentialError> {
        let keys = parse_keys(&read_key_file(path).await?)?;
        if keys.shadowsocks.is_empty() {
            return Err(CredentialError::MissingServiceKey);
        }
        Ok(keys.shadowsocks)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

async fn read_key_file(path: &Path) -> Result<String, CredentialError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_keys(contents: &str) -> Result<Keys, CredentialError> {
    let file: KeyFile = Figment::from(Yaml::string(contents)).extract()?;
    Ok(file.keys)
}
