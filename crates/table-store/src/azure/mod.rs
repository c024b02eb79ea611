//! Azure Table storage backend speaking the Table service REST API.
//!
//! Works against a storage account or a local Azurite instance
//! (`UseDevelopmentStorage=true`).

mod auth;
mod batch;
pub mod connection;

pub use connection::{ConnectionString, Credentials};

use crate::batch::DeleteBatch;
use crate::entity::Entity;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::store::{ContinuationToken, Segment, TableStore};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;

const API_VERSION: &str = "2019-02-02";
const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
/// Largest `$top` the service honours.
pub const MAX_PAGE_SIZE: usize = 1000;
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const NEXT_PARTITION_KEY_HEADER: &str = "x-ms-continuation-nextpartitionkey";
const NEXT_ROW_KEY_HEADER: &str = "x-ms-continuation-nextrowkey";

/// Table store backed by the Azure Table service.
pub struct AzureTableStore {
    client: Client,
    endpoint: Url,
    credentials: Credentials,
    table: String,
    page_size: Option<usize>,
}

impl AzureTableStore {
    /// Create a handle for `table` using an already parsed connection string.
    pub fn new(
        connection: ConnectionString,
        table: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: connection.table_endpoint,
            credentials: connection.credentials,
            table: table.into(),
            page_size: None,
        })
    }

    /// Parse `connection_string` and create a handle for `table`.
    pub fn from_connection_string(
        connection_string: &str,
        table: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Self::new(connection_string.parse()?, table, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Ask for at most `page_size` entities per query page (`$top`).
    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size.map(|n| n.clamp(1, MAX_PAGE_SIZE));
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Absolute URL of `resource` (one path segment below the endpoint).
    fn resource_url(&self, resource: &str) -> Result<Url, StoreError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::InvalidConnectionString(format!(
                    "table endpoint '{}' is not a base URL",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .push(resource);
        Ok(url)
    }

    fn entity_url(&self, partition_key: &str, row_key: &str) -> Result<Url, StoreError> {
        self.resource_url(&format!(
            "{}(PartitionKey='{}',RowKey='{}')",
            self.table,
            escape_key(partition_key),
            escape_key(row_key)
        ))
    }

    /// Start a request carrying the protocol headers and authorization.
    fn request(&self, method: Method, mut url: Url) -> Result<RequestBuilder, StoreError> {
        let date = auth::rfc1123(chrono::Utc::now());
        let authorization = match &self.credentials {
            Credentials::SharedKey { account, key } => {
                Some(auth::authorization(account, key, &date, &url)?)
            }
            Credentials::SharedAccessSignature(sas) => {
                append_sas(&mut url, sas);
                None
            }
        };

        let mut builder = self
            .client
            .request(method, url)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header(ACCEPT, ACCEPT_JSON)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        Ok(builder)
    }
}

fn escape_key(key: &str) -> String {
    key.replace('\'', "''")
}

fn append_sas(url: &mut Url, sas: &str) {
    let pairs: Vec<(String, String)> = reqwest::Url::parse(&format!("http://sas.invalid/?{sas}"))
        .map(|parsed| parsed.query_pairs().into_owned().collect())
        .unwrap_or_default();
    url.query_pairs_mut().extend_pairs(pairs);
}

/// Read the body of a failed response and turn it into a message.
async fn failure_message(response: Response) -> (u16, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = batch::odata_error_message(&text).unwrap_or_else(|| {
        let reason = status.canonical_reason().unwrap_or("unknown");
        if text.trim().is_empty() {
            reason.to_string()
        } else {
            format!("{reason}: {}", text.trim())
        }
    });
    (status.as_u16(), message)
}

fn continuation_from_headers(headers: &HeaderMap) -> Option<ContinuationToken> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    header(NEXT_PARTITION_KEY_HEADER).map(|next_partition_key| ContinuationToken {
        next_partition_key,
        next_row_key: header(NEXT_ROW_KEY_HEADER),
    })
}

fn parse_entities(body: &str) -> Result<Vec<Entity>, StoreError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|e| StoreError::MalformedResponse(format!("query response is not JSON: {e}")))?;
    payload
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| StoreError::MalformedResponse("query response has no 'value' array".into()))?
        .iter()
        .map(Entity::from_json)
        .collect()
}

#[async_trait]
impl TableStore for AzureTableStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    async fn create_table_if_not_exists(&self) -> Result<bool, StoreError> {
        let url = self.resource_url("Tables")?;
        let response = self
            .request(Method::POST, url)?
            .header("Prefer", "return-no-content")
            .json(&json!({ "TableName": self.table }))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            _ => {
                let (status, message) = failure_message(response).await;
                Err(StoreError::TableSetup {
                    table: self.table.clone(),
                    status,
                    message,
                })
            }
        }
    }

    async fn upsert(&self, entity: &Entity) -> Result<(), StoreError> {
        let url = self.entity_url(&entity.partition_key, &entity.row_key)?;
        // PUT without If-Match is Insert Or Replace.
        let response = self
            .request(Method::PUT, url)?
            .header(CONTENT_TYPE, "application/json")
            .json(&entity.to_json())
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        let (status, message) = failure_message(response).await;
        Err(StoreError::Write {
            target: format!("{}/{}", entity.partition_key, entity.row_key),
            status,
            message,
        })
    }

    async fn query_segment(
        &self,
        filter: Option<&Filter>,
        token: Option<&ContinuationToken>,
    ) -> Result<Segment, StoreError> {
        let mut url = self.resource_url(&format!("{}()", self.table))?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(filter) = filter.filter(|f| !f.is_empty()) {
                query.append_pair("$filter", &filter.to_odata());
            }
            if let Some(top) = self.page_size {
                query.append_pair("$top", &top.to_string());
            }
            if let Some(token) = token {
                query.append_pair("NextPartitionKey", &token.next_partition_key);
                if let Some(row_key) = &token.next_row_key {
                    query.append_pair("NextRowKey", row_key);
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self.request(Method::GET, url)?.send().await?;
        if !response.status().is_success() {
            let (status, message) = failure_message(response).await;
            return Err(StoreError::Query { status, message });
        }

        let continuation = continuation_from_headers(response.headers());
        let body = response.text().await?;
        let results = parse_entities(&body)?;

        Ok(Segment {
            results,
            continuation,
        })
    }

    async fn execute_batch(&self, batch: &DeleteBatch) -> Result<(), StoreError> {
        batch.ensure_within(self.max_batch_size())?;
        let target = format!("batch {} ({} rows)", batch.partition_key(), batch.len());

        let multipart = batch::build_delete_changeset(
            batch,
            &uuid::Uuid::new_v4().to_string(),
            &uuid::Uuid::new_v4().to_string(),
            |row_key| self.entity_url(batch.partition_key(), row_key),
        )?;

        let url = self.resource_url("$batch")?;
        let response = self
            .request(Method::POST, url)?
            .header(CONTENT_TYPE, multipart.content_type())
            .body(multipart.body)
            .send()
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            let (status, message) = failure_message(response).await;
            return Err(StoreError::Write {
                target,
                status,
                message,
            });
        }

        let body = response.text().await?;
        batch::check_batch_response(&body).map_err(|(status, message)| StoreError::Write {
            target,
            status,
            message,
        })
    }
}
