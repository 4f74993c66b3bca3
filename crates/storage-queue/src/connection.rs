//! Storage account connection strings.
//!
//! Supported forms:
//! - `DefaultEndpointsProtocol=https;AccountName=..;AccountKey=..;EndpointSuffix=core.windows.net`
//! - any of the above with an explicit `QueueEndpoint=..`
//! - `SharedAccessSignature=..` in place of `AccountKey`
//! - `UseDevelopmentStorage=true` for the local storage emulator

use crate::error::ConfigurationError;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;

const CONNECTION_STRING_KEY: &str = "connection_string";

const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVELOPMENT_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Decoded storage account key, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccountKey(Vec<u8>);

impl AccountKey {
    /// Decode a base64 account key
    pub fn from_base64(encoded: &str) -> Result<Self, ConfigurationError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| invalid(format!("AccountKey is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(invalid("AccountKey is empty"));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountKey(<redacted>)")
    }
}

/// How requests to the account are authorized
#[derive(Clone)]
pub enum StorageCredentials {
    /// Shared Key signing with the account key
    SharedKey {
        account_name: String,
        key: AccountKey,
    },
    /// Pre-signed shared access signature appended to every request
    SharedAccessSignature(String),
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey { account_name, .. } => f
                .debug_struct("SharedKey")
                .field("account_name", account_name)
                .field("key", &"<redacted>")
                .finish(),
            Self::SharedAccessSignature(_) => f
                .debug_tuple("SharedAccessSignature")
                .field(&"<redacted>")
                .finish(),
        }
    }
}

/// Parsed connection string
#[derive(Debug, Clone)]
pub struct StorageConnectionString {
    queue_endpoint: Url,
    credentials: StorageCredentials,
}

impl StorageConnectionString {
    /// Parse a connection string
    pub fn parse(connection_string: &str) -> Result<Self, ConfigurationError> {
        if connection_string.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: CONNECTION_STRING_KEY.to_string(),
            });
        }

        let settings = split_settings(connection_string)?;

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development_storage();
        }

        let account_name = settings.get("accountname").cloned();

        let queue_endpoint = match settings.get("queueendpoint") {
            Some(endpoint) => parse_endpoint(endpoint)?,
            None => {
                let account = account_name.as_deref().ok_or_else(|| {
                    invalid("AccountName or QueueEndpoint must be specified")
                })?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                if protocol != "https" && protocol != "http" {
                    return Err(invalid(format!(
                        "DefaultEndpointsProtocol '{}' is not supported",
                        protocol
                    )));
                }
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                parse_endpoint(&format!("{}://{}.queue.{}", protocol, account, suffix))?
            }
        };

        let credentials = if let Some(key) = settings.get("accountkey") {
            let account_name =
                account_name.ok_or_else(|| invalid("AccountKey requires AccountName"))?;
            StorageCredentials::SharedKey {
                account_name,
                key: AccountKey::from_base64(key)?,
            }
        } else if let Some(sas) = settings.get("sharedaccesssignature") {
            StorageCredentials::SharedAccessSignature(sas.trim_start_matches('?').to_string())
        } else {
            return Err(invalid(
                "either AccountKey or SharedAccessSignature must be specified",
            ));
        };

        Ok(Self {
            queue_endpoint,
            credentials,
        })
    }

    /// Connection to the local storage emulator
    pub fn development_storage() -> Result<Self, ConfigurationError> {
        Ok(Self {
            queue_endpoint: parse_endpoint(DEVELOPMENT_QUEUE_ENDPOINT)?,
            credentials: StorageCredentials::SharedKey {
                account_name: DEVELOPMENT_ACCOUNT_NAME.to_string(),
                key: AccountKey::from_base64(DEVELOPMENT_ACCOUNT_KEY)?,
            },
        })
    }

    /// Base URL of the queue service, without a trailing slash
    pub fn queue_endpoint(&self) -> &Url {
        &self.queue_endpoint
    }

    pub fn credentials(&self) -> &StorageCredentials {
        &self.credentials
    }
}

impl FromStr for StorageConnectionString {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Split `Key=Value;Key=Value` into a map with lower-cased keys
fn split_settings(connection_string: &str) -> Result<HashMap<String, String>, ConfigurationError> {
    let mut settings = HashMap::new();

    for segment in connection_string.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| invalid(format!("segment '{}' is not of the form Key=Value", segment)))?;

        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(invalid("segment with an empty key"));
        }
        settings.insert(key, value.trim().to_string());
    }

    Ok(settings)
}

fn parse_endpoint(endpoint: &str) -> Result<Url, ConfigurationError> {
    let trimmed = endpoint.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| invalid(format!("queue endpoint '{}' is not a valid URL: {}", trimmed, e)))?;
    if url.cannot_be_a_base() {
        return Err(invalid(format!(
            "queue endpoint '{}' cannot be used as a base URL",
            trimmed
        )));
    }
    Ok(url)
}

fn invalid(message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::Invalid {
        key: CONNECTION_STRING_KEY.to_string(),
        message: message.into(),
    }
}
