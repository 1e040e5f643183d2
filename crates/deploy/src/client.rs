//! HTTP client for the deployment API.
//!
//! Async client using `reqwest` with Bearer token authentication.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use stagehand_protocol::constants::{
    DEPLOYMENTS_PATH, DIGEST_HEADER, FILES_PATH, LENGTH_HEADER, MISSING_FILES_PATH,
    TEAM_QUERY_PARAM,
};
use stagehand_protocol::{
    ApiErrorBody, CreateDeploymentRequest, DeploymentRecord, MissingFilesRequest,
    MissingFilesResponse,
};

use crate::api::{ApiFuture, DeployApi};
use crate::config::ClientConfig;

/// Characters escaped in a path segment: everything but RFC 3986 unreserved.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Errors from the deployment API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid token")]
    InvalidToken,
}

impl ApiError {
    /// Whether the request may succeed if sent again.
    ///
    /// Transport failures, 5xx and 429 are retryable; everything else is a
    /// definitive answer from the remote.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(e) => !(e.is_builder() || e.is_decode() || e.is_redirect()),
            ApiError::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            ApiError::Json(_) | ApiError::InvalidToken => false,
        }
    }

    /// Error code reported by the remote, if any.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            ApiError::Status { code, .. } if !code.is_empty() => Some(code),
            _ => None,
        }
    }
}

/// Deployment API client bound to one token and optional team.
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    team_id: Option<String>,
}

impl HttpClient {
    /// Creates a new client with the given token and team scope.
    pub fn new(
        token: &str,
        team_id: Option<String>,
        config: &ClientConfig,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ApiError::InvalidToken)?,
        );
        if let Ok(agent) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, agent);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            team_id: team_id.filter(|t| !t.is_empty()),
        })
    }

    /// Builds a request for `path`, adding the team scope when configured.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, &url);
        match &self.team_id {
            Some(team) => builder.query(&[(TEAM_QUERY_PARAM, team.as_str())]),
            None => builder,
        }
    }

    /// Sends a request and returns the raw body of a 2xx response.
    async fn send(&self, builder: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let resp = builder.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }

        Ok(resp.bytes().await?.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(builder).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Decodes `{"error":{"code","message"}}`, falling back to the raw body.
fn error_from_body(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => ApiError::Status {
            status: status.as_u16(),
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => ApiError::Status {
            status: status.as_u16(),
            code: String::new(),
            message: body.to_string(),
        },
    }
}

impl DeployApi for HttpClient {
    fn missing_digests<'a>(&'a self, digests: &'a [String]) -> ApiFuture<'a, Vec<String>> {
        Box::pin(async move {
            let req = MissingFilesRequest {
                shas: digests.to_vec(),
            };
            let resp: MissingFilesResponse = self
                .send_json(self.request(Method::POST, MISSING_FILES_PATH).json(&req))
                .await?;
            Ok(resp.missing)
        })
    }

    fn upload_file<'a>(&'a self, digest: &'a str, data: &'a [u8]) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .request(Method::POST, FILES_PATH)
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(DIGEST_HEADER, digest)
                .header(LENGTH_HEADER, data.len().to_string())
                .body(data.to_vec());
            self.send(builder).await?;
            Ok(())
        })
    }

    fn create_deployment<'a>(
        &'a self,
        request: &'a CreateDeploymentRequest,
    ) -> ApiFuture<'a, DeploymentRecord> {
        Box::pin(async move {
            self.send_json(self.request(Method::POST, DEPLOYMENTS_PATH).json(request))
                .await
        })
    }

    fn deployment_status<'a>(&'a self, id: &'a str) -> ApiFuture<'a, DeploymentRecord> {
        Box::pin(async move {
            let encoded = utf8_percent_encode(id, PATH_SEGMENT).to_string();
            let path = format!("{DEPLOYMENTS_PATH}/{encoded}");
            self.send_json(self.request(Method::GET, &path)).await
        })
    }
}
