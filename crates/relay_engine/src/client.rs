use std::time::Duration;

use futures_util::StreamExt;
use relay_core::{Contract, StoredWebhookMessage, WebhookMessage};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::filename::{content_disposition_filename, sanitize_filename};
use crate::types::ChatRequest;
use crate::{
    ChatReply, ClientError, DownloadedDocument, EnvelopeDocuments, EnvelopeListing, FailureKind,
};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

fn build_client(settings: &ClientSettings) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .build()
        .map_err(|err| ClientError::new(FailureKind::Network, err.to_string()))
}

fn parse_base(base_url: &str) -> Result<Url, ClientError> {
    let url = Url::parse(base_url)
        .map_err(|err| ClientError::new(FailureKind::InvalidUrl, err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::new(
            FailureKind::InvalidUrl,
            format!("{base_url} cannot be used as a base url"),
        ));
    }
    Ok(url)
}

/// Appends percent-encoded path segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::new(FailureKind::InvalidUrl, base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(FailureKind::Timeout, err.to_string());
    }
    ClientError::new(FailureKind::Network, err.to_string())
}

fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::new(FailureKind::Unauthorized, status.to_string()));
    }
    if !status.is_success() {
        return Err(ClientError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    Ok(response)
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))
}

/// HTTP client for the webhook relay routes.
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RelayClient {
    pub fn new(base_url: &str, settings: &ClientSettings) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: parse_base(base_url)?,
        })
    }

    /// Callback address the pipeline should post to for `account_id`.
    pub fn webhook_url(&self, account_id: &str) -> Result<Url, ClientError> {
        endpoint(&self.base_url, &["webhook", account_id])
    }

    pub async fn list(&self, account_id: &str) -> Result<Vec<StoredWebhookMessage>, ClientError> {
        let response = self
            .client
            .get(self.webhook_url(account_id)?)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode_json(check_status(response)?).await
    }

    pub async fn clear(&self, account_id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.webhook_url(account_id)?)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response)?;
        Ok(())
    }

    pub async fn post(&self, account_id: &str, message: &WebhookMessage) -> Result<(), ClientError> {
        let body = serde_json::to_vec(message)
            .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))?;
        let response = self
            .client
            .post(self.webhook_url(account_id)?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response)?;
        Ok(())
    }
}

/// Bearer-authenticated client for the contracts backend.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
    max_download_bytes: u64,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"***REDACTED***")
            .finish()
    }
}

impl BackendClient {
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        settings: &ClientSettings,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: build_client(settings)?,
            base_url: parse_base(base_url)?,
            token: token.into(),
            max_download_bytes: settings.max_download_bytes,
        })
    }

    async fn get(&self, url: Url) -> Result<Response, ClientError> {
        self.send(self.client.get(url)).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_status(response)
    }

    /// Lists signed envelopes and registers `webhook_url` for processing callbacks.
    pub async fn list_envelopes(&self, webhook_url: &str) -> Result<EnvelopeListing, ClientError> {
        let mut url = endpoint(&self.base_url, &["envelopes"])?;
        url.query_pairs_mut().append_pair("webhook_url", webhook_url);
        decode_json(self.get(url).await?).await
    }

    pub async fn list_documents(&self, envelope_id: &str) -> Result<EnvelopeDocuments, ClientError> {
        let url = endpoint(&self.base_url, &["envelopes", envelope_id, "documents"])?;
        decode_json(self.get(url).await?).await
    }

    /// Streams one document; the server-provided filename wins over `fallback_name`.
    pub async fn download_document(
        &self,
        envelope_id: &str,
        document_id: &str,
        fallback_name: &str,
    ) -> Result<DownloadedDocument, ClientError> {
        let url = endpoint(
            &self.base_url,
            &["envelopes", envelope_id, "documents", document_id, "download"],
        )?;
        let response = self.get(url).await?;

        if let Some(content_len) = response.content_length() {
            if content_len > self.max_download_bytes {
                return Err(ClientError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_download_bytes,
                        actual: Some(content_len),
                    },
                    "document too large",
                ));
            }
        }

        let header_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let file_name = sanitize_filename(header_name.as_deref().unwrap_or(fallback_name));

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.max_download_bytes {
                return Err(ClientError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.max_download_bytes,
                        actual: Some(next_len),
                    },
                    "document too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(DownloadedDocument {
            file_name,
            content_type,
            bytes,
        })
    }

    /// Asks the contract assistant a question; history is kept per account by the backend.
    pub async fn chat(&self, message: &str) -> Result<ChatReply, ClientError> {
        let url = endpoint(&self.base_url, &["chat", ""])?;
        let body = serde_json::to_vec(&ChatRequest { message })
            .map_err(|err| ClientError::new(FailureKind::Decode, err.to_string()))?;
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        decode_json(self.send(request).await?).await
    }

    pub async fn clear_chat_history(&self) -> Result<(), ClientError> {
        let url = endpoint(&self.base_url, &["chat", "history"])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    /// Finalized analysis results, available once processing completed.
    pub async fn fetch_results(&self) -> Result<Vec<Contract>, ClientError> {
        let url = endpoint(&self.base_url, &["envelopes", "json_files"])?;
        decode_json(self.get(url).await?).await
    }
}
