//! Shared Key Lite request signing for the Table service.

use crate::error::StoreError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date as expected in `x-ms-date`.
pub(crate) fn rfc1123(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `date \n /account/path[?comp=..]`
pub(crate) fn string_to_sign(date: &str, account: &str, url: &Url) -> String {
    let mut resource = format!("/{account}{}", url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(key, _)| key == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }
    format!("{date}\n{resource}")
}

/// Value of the `Authorization` header for a request to `url`.
pub(crate) fn authorization(
    account: &str,
    key: &[u8],
    date: &str,
    url: &Url,
) -> Result<String, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::InvalidConnectionString(format!("unusable account key: {e}")))?;
    mac.update(string_to_sign(date, account, url).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("SharedKeyLite {account}:{signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::connection::{DEVELOPMENT_ACCOUNT, DEVELOPMENT_ACCOUNT_KEY};
    use chrono::TimeZone;

    const DATE: &str = "Mon, 04 Mar 2024 10:00:00 GMT";

    fn dev_key() -> Vec<u8> {
        STANDARD.decode(DEVELOPMENT_ACCOUNT_KEY).unwrap()
    }

    #[test]
    fn test_rfc1123() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap();
        assert_eq!(rfc1123(now), DATE);
    }

    #[test]
    fn test_string_to_sign_path_style() {
        let url = Url::parse("http://127.0.0.1:10002/devstoreaccount1/Cars()?$filter=x").unwrap();
        assert_eq!(
            string_to_sign(DATE, DEVELOPMENT_ACCOUNT, &url),
            format!("{DATE}\n/devstoreaccount1/devstoreaccount1/Cars()")
        );
    }

    #[test]
    fn test_string_to_sign_keeps_comp() {
        let url = Url::parse("https://carlot.table.core.windows.net/Cars?comp=acl").unwrap();
        assert_eq!(
            string_to_sign(DATE, "carlot", &url),
            format!("{DATE}\n/carlot/Cars?comp=acl")
        );
    }

    #[test]
    fn test_authorization_matches_reference_signature() {
        let key = dev_key();

        let query = Url::parse("http://127.0.0.1:10002/devstoreaccount1/Cars()").unwrap();
        assert_eq!(
            authorization(DEVELOPMENT_ACCOUNT, &key, DATE, &query).unwrap(),
            "SharedKeyLite devstoreaccount1:SACox+xHigDrIfCU11u7rspmtSeCCtfdJdu2gUoz9kg="
        );

        let tables = Url::parse("http://127.0.0.1:10002/devstoreaccount1/Tables").unwrap();
        assert_eq!(
            authorization(DEVELOPMENT_ACCOUNT, &key, DATE, &tables).unwrap(),
            "SharedKeyLite devstoreaccount1:6RJ3YnfxJ6x8sPnJCiCi/XHYogdq2o3gsGKLiqoh80U="
        );
    }
}
