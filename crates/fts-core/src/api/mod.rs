//! Remote questionnaire API client.
//!
//! The backend owns the wire protocol; this module only models the shapes
//! the sync core consumes: create/update/finalize for questionnaires and a
//! lightweight "who am I" session probe.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::util::{compact_text, is_http_url, normalize_text_option};

#[cfg(test)]
pub(crate) mod mock;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authentication rejected: {0}")]
    Auth(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Invalid response payload: {0}")]
    InvalidPayload(String),
}

impl ApiError {
    /// True when the remote rejected the session itself, as opposed to a
    /// connectivity or server-side failure
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Response to a successful questionnaire creation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedQuestionnaire {
    pub id: String,
    #[serde(default)]
    pub case_number: String,
    #[serde(default)]
    pub version: i64,
}

/// Session info returned by the "who am I" probe
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Remote operations the sync core replays.
///
/// `create` must be called at most once per logical draft; that guarantee
/// is the caller's responsibility (see the sync engine's identity
/// resolution), not the server's.
#[allow(async_fn_in_trait)]
pub trait QuestionnaireApi {
    /// Create a new server-side questionnaire from the given payload
    async fn create(&self, data: &Value) -> ApiResult<CreatedQuestionnaire>;

    /// Idempotent upsert of an existing record's content
    async fn update(&self, id: &str, data: &Value) -> ApiResult<()>;

    /// Lock the record as submitted. Must only be called after the latest
    /// `update` for this id has been accepted.
    async fn finalize(&self, id: &str) -> ApiResult<String>;

    /// Lightweight session-validity probe
    async fn who_am_i(&self) -> ApiResult<SessionInfo>;
}

/// reqwest implementation of [`QuestionnaireApi`] against the FTS backend
#[derive(Clone)]
pub struct HttpQuestionnaireApi {
    base_url: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl HttpQuestionnaireApi {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            client: reqwest::Client::builder().build()?,
            bearer_token: None,
        })
    }

    /// Attach a session token sent as a bearer header on every request
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("Accept", "application/json");
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }
}

impl QuestionnaireApi for HttpQuestionnaireApi {
    async fn create(&self, data: &Value) -> ApiResult<CreatedQuestionnaire> {
        let response = self
            .request(reqwest::Method::POST, "/questionnaires")
            .json(&json!({ "data": data }))
            .send()
            .await?;
        let response = check_status(response).await?;
        parse_created(&response.text().await?)
    }

    async fn update(&self, id: &str, data: &Value) -> ApiResult<()> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/questionnaires/{id}"))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn finalize(&self, id: &str) -> ApiResult<String> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/questionnaires/{id}/finalize"),
            )
            .send()
            .await?;
        let response = check_status(response).await?;
        let ack: FinalizeAck = decode_payload(&response.text().await?)?;
        Ok(ack.id)
    }

    async fn who_am_i(&self) -> ApiResult<SessionInfo> {
        let response = self.request(reqwest::Method::GET, "/auth/me").send().await?;
        let response = check_status(response).await?;
        decode_payload(&response.text().await?)
    }
}

#[derive(Debug, Deserialize)]
struct FinalizeAck {
    id: String,
}

async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = parse_api_error(status, &body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiError::Auth(message));
    }
    Err(ApiError::Api(message))
}

/// Decode a success-response body, surfacing malformed bodies as
/// [`ApiError::InvalidPayload`] rather than a transport error
fn decode_payload<T: serde::de::DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str(body)
        .map_err(|error| ApiError::InvalidPayload(format!("{error}: {}", compact_text(body))))
}

fn parse_created(body: &str) -> ApiResult<CreatedQuestionnaire> {
    let created: CreatedQuestionnaire = decode_payload(body)?;
    if created.id.trim().is_empty() {
        return Err(ApiError::InvalidPayload(
            "create response did not include a questionnaire id".to_string(),
        ));
    }
    Ok(created)
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
    /// FastAPI-style error payload
    detail: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.detail.or(payload.message).or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", compact_text(trimmed), status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> ApiResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        ApiError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(ApiError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}
