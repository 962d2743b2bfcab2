//! HTTP interface to the primary sync server.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sync::incoming::IncomingRecord;
use crate::sync::outgoing::OutgoingRecord;

const AUTH_ENDPOINT: &str = "/sync/v3/site";
const QUEUED_RECORDS_ENDPOINT: &str = "/sync/v3/queued_records";
const QUEUED_RECORDS_COUNT_ENDPOINT: &str = "/sync/v3/queued_records/count";
const ACKNOWLEDGED_RECORDS_ENDPOINT: &str = "/sync/v3/acknowledged_records";
const INITIAL_DUMP_ENDPOINT: &str = "/sync/v3/initial_dump";

const SITE_UUID_HEADER: &str = "msupply-site-uuid";

/// Everything needed to talk to the server as this site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConnection {
    pub server_url: String,
    pub site_id: String,
    pub server_id: String,
    pub site_name: String,
    pub password_hash: String,
    pub site_uuid: String,
}

/// Site registration details returned by a successful authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteDetails {
    pub site_id: String,
    pub server_id: String,
    pub store_id: String,
}

impl<'de> Deserialize<'de> for SiteDetails {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // The server sends ids as numbers or strings depending on version.
        let value = Value::deserialize(deserializer)?;
        Ok(Self {
            site_id: scalar_string(value.get("SiteID")),
            server_id: scalar_string(value.get("ServerID")),
            store_id: scalar_string(value.get("StoreID")),
        })
    }
}

fn scalar_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// The operations sync needs from the server. Separated from the transport
/// so the orchestrator can be exercised against a scripted server.
#[allow(async_fn_in_trait)]
pub trait SyncServer {
    /// Validate the site's credentials, returning its registration details.
    async fn authenticate(&self, connection: &SyncConnection) -> Result<SiteDetails>;

    /// The number of records queued on the server for this site.
    async fn queued_record_count(&self, connection: &SyncConnection) -> Result<u64>;

    /// Fetch up to `limit` queued records.
    async fn queued_records(
        &self,
        connection: &SyncConnection,
        limit: usize,
    ) -> Result<Vec<IncomingRecord>>;

    /// Push a batch of outgoing records.
    async fn push_records(
        &self,
        connection: &SyncConnection,
        records: &[OutgoingRecord],
    ) -> Result<()>;

    /// Tell the server the identified queued records have been consumed.
    async fn acknowledge_records(
        &self,
        connection: &SyncConnection,
        sync_ids: &[String],
    ) -> Result<()>;

    /// Ask the server to queue a full dump of this site's records.
    async fn request_initial_dump(&self, connection: &SyncConnection) -> Result<()>;
}

impl<S: SyncServer> SyncServer for std::sync::Arc<S> {
    async fn authenticate(&self, connection: &SyncConnection) -> Result<SiteDetails> {
        (**self).authenticate(connection).await
    }

    async fn queued_record_count(&self, connection: &SyncConnection) -> Result<u64> {
        (**self).queued_record_count(connection).await
    }

    async fn queued_records(
        &self,
        connection: &SyncConnection,
        limit: usize,
    ) -> Result<Vec<IncomingRecord>> {
        (**self).queued_records(connection, limit).await
    }

    async fn push_records(
        &self,
        connection: &SyncConnection,
        records: &[OutgoingRecord],
    ) -> Result<()> {
        (**self).push_records(connection, records).await
    }

    async fn acknowledge_records(
        &self,
        connection: &SyncConnection,
        sync_ids: &[String],
    ) -> Result<()> {
        (**self).acknowledge_records(connection, sync_ids).await
    }

    async fn request_initial_dump(&self, connection: &SyncConnection) -> Result<()> {
        (**self).request_initial_dump(connection).await
    }
}

/// [`SyncServer`] over HTTP.
pub struct HttpSyncServer {
    client: reqwest::Client,
}

impl HttpSyncServer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn request(
        &self,
        connection: &SyncConnection,
        method: reqwest::Method,
        endpoint: &str,
    ) -> reqwest::RequestBuilder {
        let url = format!(
            "{}{endpoint}",
            connection.server_url.trim_end_matches('/')
        );
        self.client
            .request(method, url)
            .basic_auth(&connection.site_name, Some(&connection.password_hash))
            .header(SITE_UUID_HEADER, &connection.site_uuid)
            .query(&[
                ("from_site", connection.site_id.as_str()),
                ("to_site", connection.server_id.as_str()),
            ])
    }
}

impl Default for HttpSyncServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncServer for HttpSyncServer {
    async fn authenticate(&self, connection: &SyncConnection) -> Result<SiteDetails> {
        let url = format!(
            "{}{AUTH_ENDPOINT}",
            connection.server_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(url)
            .basic_auth(&connection.site_name, Some(&connection.password_hash))
            .header(SITE_UUID_HEADER, &connection.site_uuid)
            .send()
            .await?;
        let value = parse_response(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn queued_record_count(&self, connection: &SyncConnection) -> Result<u64> {
        let response = self
            .request(connection, reqwest::Method::GET, QUEUED_RECORDS_COUNT_ENDPOINT)
            .send()
            .await?;
        let value = parse_response(response).await?;
        value
            .get("NumRecords")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                Error::UnexpectedResponse("queued record count was not a number".to_string())
            })
    }

    async fn queued_records(
        &self,
        connection: &SyncConnection,
        limit: usize,
    ) -> Result<Vec<IncomingRecord>> {
        let response = self
            .request(connection, reqwest::Method::GET, QUEUED_RECORDS_ENDPOINT)
            .query(&[("limit", limit.to_string())])
            .send()
            .await?;
        let value = parse_response(response).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn push_records(
        &self,
        connection: &SyncConnection,
        records: &[OutgoingRecord],
    ) -> Result<()> {
        let response = self
            .request(connection, reqwest::Method::POST, QUEUED_RECORDS_ENDPOINT)
            .json(records)
            .send()
            .await?;
        parse_response(response).await?;
        Ok(())
    }

    async fn acknowledge_records(
        &self,
        connection: &SyncConnection,
        sync_ids: &[String],
    ) -> Result<()> {
        let body = serde_json::json!({ "SyncRecordIDs": sync_ids });
        let response = self
            .request(connection, reqwest::Method::POST, ACKNOWLEDGED_RECORDS_ENDPOINT)
            .json(&body)
            .send()
            .await?;
        parse_response(response).await?;
        Ok(())
    }

    async fn request_initial_dump(&self, connection: &SyncConnection) -> Result<()> {
        let response = self
            .request(connection, reqwest::Method::GET, INITIAL_DUMP_ENDPOINT)
            .send()
            .await?;
        parse_response(response).await?;
        Ok(())
    }
}

/// Map a response onto the error taxonomy and extract its JSON body.
///
/// The server reports application errors as a non-empty `error` field in an
/// otherwise successful response.
async fn parse_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::InvalidCredentials(
            "site name or password rejected by the server".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(Error::ConnectionFailure(format!(
            "sync server returned status {status}"
        )));
    }
    let value: Value = response
        .json()
        .await
        .map_err(|_| Error::UnexpectedResponse("response body was not valid JSON".to_string()))?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        if !error.is_empty() {
            return Err(Error::ServerRejected(error.to_string()));
        }
    }
    Ok(value)
}
