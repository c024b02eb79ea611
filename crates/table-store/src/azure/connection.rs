//! Storage account connection strings.

use crate::error::StoreError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Account name used by the Azurite emulator.
pub const DEVELOPMENT_ACCOUNT: &str = "devstoreaccount1";
/// Well-known Azurite account key.
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVELOPMENT_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// How requests are authorized.
#[derive(Clone)]
pub enum Credentials {
    /// Shared Key Lite signing with the decoded account key.
    SharedKey { account: String, key: Vec<u8> },
    /// Shared access signature appended to every request's query string.
    SharedAccessSignature(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Credentials::SharedAccessSignature(_) => f
                .debug_tuple("SharedAccessSignature")
                .field(&"<redacted>")
                .finish(),
        }
    }
}

/// Parsed `Key=Value;Key=Value` connection string.
#[derive(Debug, Clone)]
pub struct ConnectionString {
    pub table_endpoint: Url,
    pub credentials: Credentials,
}

impl ConnectionString {
    /// Connection to a local Azurite instance.
    pub fn development() -> Result<Self, StoreError> {
        Ok(Self {
            table_endpoint: parse_endpoint(DEVELOPMENT_TABLE_ENDPOINT)?,
            credentials: Credentials::SharedKey {
                account: DEVELOPMENT_ACCOUNT.to_string(),
                key: decode_key(DEVELOPMENT_ACCOUNT_KEY)?,
            },
        })
    }
}

impl FromStr for ConnectionString {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut settings: HashMap<String, String> = HashMap::new();
        for segment in s.split(';').map(str::trim).filter(|seg| !seg.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                StoreError::InvalidConnectionString(format!(
                    "segment '{segment}' is not a Key=Value pair"
                ))
            })?;
            settings.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        if settings
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let account = settings.get("accountname").cloned();
        let table_endpoint = match settings.get("tableendpoint") {
            Some(endpoint) => parse_endpoint(endpoint)?,
            None => {
                let account = account.as_deref().ok_or_else(|| {
                    StoreError::InvalidConnectionString(
                        "either AccountName or TableEndpoint is required".into(),
                    )
                })?;
                let protocol = settings
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = settings
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                parse_endpoint(&format!("{protocol}://{account}.table.{suffix}"))?
            }
        };

        let credentials = if let Some(sas) = settings.get("sharedaccesssignature") {
            Credentials::SharedAccessSignature(sas.trim_start_matches('?').to_string())
        } else if let Some(key) = settings.get("accountkey") {
            let account = account.ok_or_else(|| {
                StoreError::InvalidConnectionString("AccountKey requires AccountName".into())
            })?;
            Credentials::SharedKey {
                account,
                key: decode_key(key)?,
            }
        } else {
            return Err(StoreError::InvalidConnectionString(
                "either AccountKey or SharedAccessSignature is required".into(),
            ));
        };

        Ok(Self {
            table_endpoint,
            credentials,
        })
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url, StoreError> {
    let url = Url::parse(endpoint).map_err(|e| {
        StoreError::InvalidConnectionString(format!("bad table endpoint '{endpoint}': {e}"))
    })?;
    if url.cannot_be_a_base() {
        return Err(StoreError::InvalidConnectionString(format!(
            "table endpoint '{endpoint}' is not a base URL"
        )));
    }
    Ok(url)
}

fn decode_key(key: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(key)
        .map_err(|e| StoreError::InvalidConnectionString(format!("AccountKey is not base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_storage() {
        let conn: ConnectionString = "UseDevelopmentStorage=true".parse().unwrap();
        assert_eq!(
            conn.table_endpoint.as_str(),
            "http://127.0.0.1:10002/devstoreaccount1"
        );
        match conn.credentials {
            Credentials::SharedKey { account, key } => {
                assert_eq!(account, DEVELOPMENT_ACCOUNT);
                assert_eq!(key.len(), 64);
            }
            other => panic!("unexpected credentials {other:?}"),
        }
    }

    #[test]
    fn test_account_key_builds_endpoint() {
        let conn: ConnectionString = "DefaultEndpointsProtocol=https;AccountName=carlot;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net"
            .parse()
            .unwrap();
        assert_eq!(
            conn.table_endpoint.as_str(),
            "https://carlot.table.core.windows.net/"
        );
        assert!(matches!(
            conn.credentials,
            Credentials::SharedKey { ref key, .. } if key == b"secret"
        ));
    }

    #[test]
    fn test_explicit_endpoint_with_sas() {
        let conn: ConnectionString =
            "TableEndpoint=https://carlot.table.core.windows.net/;SharedAccessSignature=?sv=2019-02-02&sig=abc%3D"
                .parse()
                .unwrap();
        match conn.credentials {
            Credentials::SharedAccessSignature(sas) => assert_eq!(sas, "sv=2019-02-02&sig=abc%3D"),
            other => panic!("unexpected credentials {other:?}"),
        }
    }

    #[test]
    fn test_placeholder_rejected() {
        let err = "DefaultEndpointsProtocol".parse::<ConnectionString>().unwrap_err();
        assert!(matches!(err, StoreError::InvalidConnectionString(_)));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = "AccountName=carlot".parse::<ConnectionString>().unwrap_err();
        assert!(err.to_string().contains("AccountKey or SharedAccessSignature"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let conn = ConnectionString::development().unwrap();
        let printed = format!("{conn:?}");
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(DEVELOPMENT_ACCOUNT_KEY));
    }
}
