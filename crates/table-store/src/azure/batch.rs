//! Entity group transactions (`$batch`) in the OData multipart format.

use crate::batch::DeleteBatch;
use crate::error::StoreError;
use reqwest::Url;
use serde_json::Value;

const CRLF: &str = "\r\n";

/// A ready-to-send multipart body and its outer boundary.
pub(crate) struct MultipartBatch {
    pub boundary: String,
    pub body: String,
}

impl MultipartBatch {
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }
}

/// Build one changeset holding a DELETE per row of the batch.
///
/// `entity_url` maps a row key to the absolute URL of that entity.
pub(crate) fn build_delete_changeset<F>(
    batch: &DeleteBatch,
    batch_id: &str,
    changeset_id: &str,
    entity_url: F,
) -> Result<MultipartBatch, StoreError>
where
    F: Fn(&str) -> Result<Url, StoreError>,
{
    let boundary = format!("batch_{batch_id}");
    let changeset = format!("changeset_{changeset_id}");

    let mut body = String::new();
    body.push_str(&format!("--{boundary}{CRLF}"));
    body.push_str(&format!(
        "Content-Type: multipart/mixed; boundary={changeset}{CRLF}{CRLF}"
    ));

    for (content_id, row) in batch.rows().iter().enumerate() {
        let url = entity_url(&row.row_key)?;
        body.push_str(&format!("--{changeset}{CRLF}"));
        body.push_str(&format!("Content-Type: application/http{CRLF}"));
        body.push_str(&format!("Content-Transfer-Encoding: binary{CRLF}{CRLF}"));
        body.push_str(&format!("DELETE {url} HTTP/1.1{CRLF}"));
        body.push_str(&format!(
            "Accept: application/json;odata=minimalmetadata{CRLF}"
        ));
        body.push_str(&format!("DataServiceVersion: 3.0;{CRLF}"));
        body.push_str(&format!("Content-ID: {}{CRLF}", content_id + 1));
        body.push_str(&format!("If-Match: {}{CRLF}{CRLF}", row.if_match()));
    }

    body.push_str(&format!("--{changeset}--{CRLF}"));
    body.push_str(&format!("--{boundary}--{CRLF}"));

    Ok(MultipartBatch { boundary, body })
}

/// Inspect the per-operation responses of an accepted batch.
///
/// The service answers `202 Accepted` for the envelope and reports the
/// outcome inside: either one success per operation, or a single failed
/// response for the operation that rolled the changeset back.
pub(crate) fn check_batch_response(body: &str) -> Result<(), (u16, String)> {
    let mut saw_status = false;
    let mut lines = body.lines();
    while let Some(line) = lines.next() {
        let Some(rest) = line.trim().strip_prefix("HTTP/1.1 ") else {
            continue;
        };
        saw_status = true;
        let mut parts = rest.splitn(2, ' ');
        let status: u16 = parts
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| (502, format!("unparseable status line '{line}'")))?;
        if status >= 300 {
            let reason = parts.next().unwrap_or("").trim().to_string();
            let message = lines
                .by_ref()
                .map(str::trim)
                .find(|l| l.starts_with('{'))
                .and_then(odata_error_message)
                .unwrap_or(reason);
            return Err((status, message));
        }
    }
    if saw_status {
        Ok(())
    } else {
        Err((502, "batch response contained no operation results".to_string()))
    }
}

/// `code: message` from an `odata.error` JSON payload.
pub(crate) fn odata_error_message(json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(json).ok()?;
    let error = value.get("odata.error")?;
    let code = error.get("code").and_then(Value::as_str).unwrap_or("Error");
    let message = error
        .get("message")
        .and_then(|m| m.get("value").or(Some(m)))
        .and_then(Value::as_str)
        .unwrap_or("");
    Some(format!("{code}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchRow, MAX_BATCH_SIZE};

    fn entity_url(row_key: &str) -> Result<Url, StoreError> {
        Url::parse(&format!(
            "https://carlot.table.core.windows.net/Cars(PartitionKey='Asia',RowKey='{row_key}')"
        ))
        .map_err(|e| StoreError::MalformedResponse(e.to_string()))
    }

    #[test]
    fn test_build_delete_changeset() {
        let batch = DeleteBatch::new(
            "Asia",
            vec![
                BatchRow::new("1", None),
                BatchRow::new("2", Some("W/\"7\"".to_string())),
            ],
            MAX_BATCH_SIZE,
        )
        .unwrap();

        let multipart = build_delete_changeset(&batch, "b1", "c1", entity_url).unwrap();

        assert_eq!(multipart.content_type(), "multipart/mixed; boundary=batch_b1");
        let body = &multipart.body;
        assert!(body.starts_with("--batch_b1\r\nContent-Type: multipart/mixed; boundary=changeset_c1\r\n\r\n"));
        assert!(body.ends_with("--changeset_c1--\r\n--batch_b1--\r\n"));
        assert_eq!(body.matches("DELETE https://").count(), 2);
        assert!(body.contains("RowKey='1') HTTP/1.1\r\n"));
        assert!(body.contains("If-Match: *\r\n"));
        assert!(body.contains("If-Match: W/\"7\"\r\n"));
        assert!(body.contains("Content-ID: 2\r\n"));
    }

    #[test]
    fn test_check_batch_response_success() {
        let body = "--batchresponse_x\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_y\r\n\r\n\
--changesetresponse_y\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\r\n\
HTTP/1.1 204 No Content\r\n\
Content-ID: 1\r\n\r\n\
--changesetresponse_y\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\r\n\
HTTP/1.1 204 No Content\r\n\
Content-ID: 2\r\n\r\n\
--changesetresponse_y--\r\n\
--batchresponse_x--\r\n";
        assert!(check_batch_response(body).is_ok());
    }

    #[test]
    fn test_check_batch_response_failure() {
        let body = "--batchresponse_x\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_y\r\n\r\n\
--changesetresponse_y\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\r\n\
HTTP/1.1 404 Not Found\r\n\
Content-ID: 2\r\n\
Content-Type: application/json;odata=minimalmetadata;charset=utf-8\r\n\r\n\
{\"odata.error\":{\"code\":\"ResourceNotFound\",\"message\":{\"lang\":\"en-US\",\"value\":\"1:The specified resource does not exist.\"}}}\r\n\
--changesetresponse_y--\r\n\
--batchresponse_x--\r\n";
        let (status, message) = check_batch_response(body).unwrap_err();
        assert_eq!(status, 404);
        assert_eq!(
            message,
            "ResourceNotFound: 1:The specified resource does not exist."
        );
    }

    #[test]
    fn test_check_batch_response_empty() {
        assert_eq!(check_batch_response("").unwrap_err().0, 502);
    }

    #[test]
    fn test_odata_error_message_plain_string() {
        let json = r#"{"odata.error":{"code":"TableNotFound","message":"The table specified does not exist."}}"#;
        assert_eq!(
            odata_error_message(json).unwrap(),
            "TableNotFound: The table specified does not exist."
        );
        assert!(odata_error_message("not json").is_none());
    }
}
