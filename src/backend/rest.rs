//! Hosted backend REST client
//!
//! HTTP client for the hosted database (PostgREST dialect under `/rest/v1`)
//! and object storage (under `/storage/v1`). Every request carries the
//! anonymous API key; there is no retry logic.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use super::{
    BackendError, BackendResult, Bucket, DataStore, Filter, ObjectStore, ObjectUpload, Select,
};
use crate::config::BackendConfig;

/// Connection settings for [`RestClient`]
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL (e.g., "https://abc.supabase.co")
    pub base_url: String,
    /// Anonymous public key
    pub anon_key: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl From<&BackendConfig> for RestConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            request_timeout_secs: config.request_timeout_secs,
        }
    }
}

/// REST client implementing both [`DataStore`] and [`ObjectStore`]
pub struct RestClient {
    client: Client,
    config: RestConfig,
}

impl RestClient {
    pub fn new(config: RestConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, table)
    }

    fn storage_url(&self, suffix: &str) -> String {
        format!("{}/storage/v1/{}", self.config.base_url, suffix)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(BackendError::from_transport)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status,
            message: error_message(&text),
        })
    }

    async fn send_rows(&self, request: RequestBuilder) -> BackendResult<Vec<Value>> {
        let response = self.send(request).await?;
        let rows: Vec<Value> = response.json().await.map_err(BackendError::from_transport)?;
        Ok(rows)
    }
}

#[async_trait]
impl DataStore for RestClient {
    async fn select(&self, table: &str, query: &Select) -> BackendResult<Vec<Value>> {
        tracing::debug!(table, ?query, "select");
        let request = self
            .client
            .get(self.table_url(table))
            .query(&select_params(query));

        self.send_rows(request).await
    }

    async fn insert(&self, table: &str, row: Value) -> BackendResult<Value> {
        tracing::debug!(table, "insert");
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&vec![row]);

        self.send_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::EmptyResult(table.to_string()))
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> BackendResult<Vec<Value>> {
        tracing::debug!(table, ?filters, "update");
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);

        self.send_rows(request).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> BackendResult<usize> {
        tracing::debug!(table, ?filters, "delete");
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation");

        Ok(self.send_rows(request).await?.len())
    }
}

#[async_trait]
impl ObjectStore for RestClient {
    async fn list_buckets(&self) -> BackendResult<Vec<Bucket>> {
        let response = self.send(self.client.get(self.storage_url("bucket"))).await?;
        let buckets: Vec<Bucket> = response.json().await.map_err(BackendError::from_transport)?;
        Ok(buckets)
    }

    async fn put_object(
        &self,
        bucket: &str,
        path: &str,
        upload: ObjectUpload,
    ) -> BackendResult<()> {
        let url = self.storage_url(&format!("object/{}/{}", bucket, encode_path(path)));
        tracing::debug!(bucket, path, content_type = %upload.content_type, "put object");

        let request = self
            .client
            .post(url)
            .header("content-type", upload.content_type)
            .header(
                "cache-control",
                format!("max-age={}", upload.cache_control_secs),
            )
            .header("x-upsert", upload.upsert.to_string())
            .body(upload.bytes);

        match self.send(request).await {
            Ok(_) => Ok(()),
            Err(BackendError::Api { status: 409, .. }) => {
                Err(BackendError::Conflict(path.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.storage_url(&format!("object/public/{}/{}", bucket, encode_path(path)))
    }
}

/// Query-string pairs for a select
fn select_params(query: &Select) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));

    if let Some(order) = &query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| {
            let value = match filter {
                Filter::Eq(_, v) => format!("eq.{}", v),
                Filter::NotNull(_) => "not.is.null".to_string(),
            };
            (filter.column().to_string(), value)
        })
        .collect()
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Pull `message` out of a JSON error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> RestClient {
        let config = BackendConfig {
            url: "https://project.example.co/".to_string(),
            anon_key: "anon".to_string(),
            request_timeout_secs: 5,
        };
        RestClient::new(RestConfig::from(&config)).unwrap()
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let client = client();
        assert_eq!(client.config().base_url, "https://project.example.co");
        assert_eq!(
            client.table_url("posts"),
            "https://project.example.co/rest/v1/posts"
        );
    }

    #[test]
    fn test_select_params() {
        let query = Select::all()
            .not_null("answer")
            .eq("slug", "hello-world-abcdefgh")
            .order_by("created_at", false)
            .limit(1);

        let params = select_params(&query);
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("answer".to_string(), "not.is.null".to_string()),
                ("slug".to_string(), "eq.hello-world-abcdefgh".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let client = client();
        assert_eq!(
            client.public_url("media", "images/my photo.png"),
            "https://project.example.co/storage/v1/object/public/media/images/my%20photo.png"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message":"duplicate key","code":"23505"}"#),
            "duplicate key"
        );
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    fn client_for(server: &MockServer) -> RestClient {
        RestClient::new(RestConfig {
            base_url: server.uri(),
            anon_key: "anon".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_select_sends_key_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer anon"))
            .and(query_param("select", "*"))
            .and(query_param("answer", "not.is.null"))
            .and(query_param("order", "created_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let query = Select::all().not_null("answer").order_by("created_at", false);
        let rows = client_for(&server).select("posts", &query).await.unwrap();
        assert_eq!(rows, vec![json!({"id": "p1"})]);
    }

    #[tokio::test]
    async fn test_insert_unwraps_single_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/comments"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!([{"post_id": "p1", "comment": "hi"}])))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!([{"id": "c1", "post_id": "p1", "comment": "hi"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let row = client_for(&server)
            .insert("comments", json!({"post_id": "p1", "comment": "hi"}))
            .await
            .unwrap();
        assert_eq!(row["id"], "c1");
    }

    #[tokio::test]
    async fn test_insert_with_no_row_back_is_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/likes"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .insert("likes", json!({"post_id": "p1", "nickname": "a"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::EmptyResult(table) if table == "likes"));
    }

    #[tokio::test]
    async fn test_update_filters_and_returns_rows() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/posts"))
            .and(query_param("id", "eq.p1"))
            .and(header("Prefer", "return=representation"))
            .and(body_json(json!({"slug": "q-p1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let rows = client_for(&server)
            .update("posts", &[Filter::eq("id", "p1")], json!({"slug": "q-p1"}))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_delete_counts_returned_rows() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/likes"))
            .and(query_param("post_id", "eq.p1"))
            .and(query_param("nickname", "eq.Asha"))
            .and(header("Prefer", "return=representation"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"id": "l1"}, {"id": "l2"}])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let filters = [Filter::eq("post_id", "p1"), Filter::eq("nickname", "Asha")];
        let removed = client_for(&server).delete("likes", &filters).await.unwrap();
        assert_eq!(removed, 2);
    }

    #[tokio::test]
    async fn test_api_error_carries_status_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/posts"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid API key"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .select("posts", &Select::all())
            .await
            .unwrap_err();
        match err {
            BackendError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_object_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/media/images/1_abc.png"))
            .and(header("content-type", "image/png"))
            .and(header("cache-control", "max-age=3600"))
            .and(header("x-upsert", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Key": "media/images/1_abc.png"})))
            .expect(1)
            .mount(&server)
            .await;

        let upload = ObjectUpload {
            bytes: b"png".to_vec(),
            content_type: "image/png".to_string(),
            cache_control_secs: 3600,
            upsert: false,
        };
        client_for(&server)
            .put_object("media", "images/1_abc.png", upload)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_object_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/v1/object/media/audio/taken.webm"))
            .respond_with(
                ResponseTemplate::new(409).set_body_json(json!({"message": "The resource already exists"})),
            )
            .mount(&server)
            .await;

        let upload = ObjectUpload {
            bytes: vec![1, 2, 3],
            content_type: "audio/webm".to_string(),
            cache_control_secs: 3600,
            upsert: false,
        };
        let err = client_for(&server)
            .put_object("media", "audio/taken.webm", upload)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Conflict(p) if p == "audio/taken.webm"));
    }

    #[tokio::test]
    async fn test_list_buckets() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/v1/bucket"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "media", "name": "media", "public": true}
            ])))
            .mount(&server)
            .await;

        let buckets = client_for(&server).list_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].name, "media");
        assert!(buckets[0].public);
    }
}
