//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cert::CertificateValidation,
    http::{
        headers::{HeaderMap, HeaderValue, CONTENT_TYPE},
        transport::{SingleNodeConnectionPool, TransportBuilder},
        Method,
    },
    indices::{IndicesCreateParts, IndicesExistsParts},
    OpenSearch,
};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::index_settings_body;
use crate::types::BulkResponse;
use es_indexer_shared::{EsConfig, IndexSettings};

/// Path of the bulk endpoint, relative to the configured base URL.
const BULK_PATH: &str = "/_bulk";

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchClient::new(&config.es)?;
/// if !client.index_exists("products").await? {
///     client.create_index("products", &settings).await?;
/// }
/// let response = client.bulk(&payload).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client from the `es` configuration section.
    ///
    /// The request timeout applies to every call made through the client.
    /// Basic-auth credentials are attached when both user and password are
    /// configured.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If the endpoint is malformed or transport setup fails
    pub fn new(config: &EsConfig) -> Result<Self, SearchIndexError> {
        let parsed_url = Url::parse(&config.endpoint).map_err(|e| {
            SearchIndexError::configuration(format!(
                "invalid es endpoint {}: {}",
                config.endpoint, e
            ))
        })?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(Duration::from_secs(config.timeout));

        if let Some((user, password)) = config.credentials() {
            builder = builder.auth(Credentials::Basic(user.to_string(), password.to_string()));
        }

        // Local endpoints reached through an SSH tunnel present certificates
        // for the remote host name.
        if !config.verify_certificates {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        let transport = builder
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        info!(
            url = %config.endpoint,
            timeout_secs = config.timeout,
            authenticated = config.credentials().is_some(),
            "Created OpenSearch client"
        );

        Ok(Self {
            client: OpenSearch::new(transport),
        })
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    #[instrument(skip(self))]
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                error!(status = status, body = %body, "Index existence check failed");
                Err(SearchIndexError::http(status, body))
            }
        }
    }

    #[instrument(skip(self))]
    async fn create_index(
        &self,
        index: &str,
        settings: &IndexSettings,
    ) -> Result<(), SearchIndexError> {
        let body = index_settings_body(settings);

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body.clone())
            .send()
            .await?;

        let status = response.status_code().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "creating index {} failed with status {}\n\nRequest:\n{}\n\nResponse:\n{}",
                index, status, body, error_body
            )));
        }

        info!(index = %index, "Created search index");
        Ok(())
    }

    async fn bulk(&self, payload: &[u8]) -> Result<BulkResponse, SearchIndexError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );

        let response = self
            .client
            .send(
                Method::Put,
                BULK_PATH,
                headers,
                Option::<&()>::None,
                Some(payload.to_vec()),
                None,
            )
            .await?;

        let status = response.status_code().as_u16();
        let body = response.text().await?;

        debug!(status = status, bytes = payload.len(), "Bulk request completed");
        Ok(BulkResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn es_config(endpoint: &str) -> EsConfig {
        EsConfig {
            endpoint: endpoint.to_string(),
            timeout: 3,
            retry: 1,
            retry_wait_sec: 1,
            user: Some("elastic".to_string()),
            password: Some("changeme".to_string()),
            verify_certificates: false,
        }
    }

    #[test]
    fn test_new_accepts_valid_endpoint() {
        assert!(OpenSearchClient::new(&es_config("https://127.0.0.1:9200")).is_ok());
    }

    #[test]
    fn test_new_rejects_malformed_endpoint() {
        let result = OpenSearchClient::new(&es_config("not a url"));
        assert!(matches!(
            result,
            Err(SearchIndexError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let client = OpenSearchClient::new(&es_config("http://127.0.0.1:1")).unwrap();

        let result = client.bulk(b"{}\n").await;

        assert!(matches!(result, Err(SearchIndexError::ConnectionError(_))));
    }
}
