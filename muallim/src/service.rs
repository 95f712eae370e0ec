//! The tutoring backend: answer requests and answer reviews.
//!
//! `AnswerService` and `ReviewService` are the seams the controller and the
//! front-end talk through; `HttpTutorClient` is the production
//! implementation over HTTP. Failures are classified into a closed set of
//! variants, each carrying the copy shown to the learner.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::messages;

// ── Wire types ─────────────────────────────────────────────────────

/// Successful reply to an answer request.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub context_used: Option<bool>,
}

/// Image bytes ready to be sent alongside a question.
#[derive(Clone, Debug)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub file_name: String,
}

/// A rating for one answered question.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewRequest {
    pub session_id: String,
    pub question: String,
    pub answer: String,
    /// 1 through 5.
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_used: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Aggregate review figures reported by the backend.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReviewStats {
    #[serde(default)]
    pub total_reviews: u64,
    #[serde(default)]
    pub average_rating: f64,
    /// Rating value (as a string key) to count.
    #[serde(default)]
    pub rating_distribution: HashMap<String, u64>,
}

/// Error payload shape shared by the backend's failure responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
}

// ── Failure classification ─────────────────────────────────────────

/// Why an answer request failed. Every variant maps to fixed user copy via
/// [`AnswerError::user_message`]; variants carrying `detail` prefer the
/// server's own wording when it sent any.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("bad request")]
    BadRequest { detail: Option<String> },
    #[error("payload too large")]
    PayloadTooLarge { detail: Option<String> },
    #[error("unprocessable input")]
    Unprocessable { detail: Option<String> },
    #[error("rate limited")]
    RateLimited { detail: Option<String> },
    #[error("server error")]
    ServerError { detail: Option<String> },
    #[error("bad gateway")]
    BadGateway,
    #[error("service unavailable")]
    Unavailable,
    #[error("gateway timeout")]
    GatewayTimeout,
    #[error("no response from server")]
    Network,
    #[error("request could not be built")]
    RequestSetup,
    #[error("unexpected status {status}")]
    UnknownStatus { status: u16, detail: Option<String> },
}

impl AnswerError {
    /// Classify an HTTP failure status. The gateway-layer statuses discard
    /// `detail`; their copy is fixed.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        match status {
            400 => AnswerError::BadRequest { detail },
            413 => AnswerError::PayloadTooLarge { detail },
            422 => AnswerError::Unprocessable { detail },
            429 => AnswerError::RateLimited { detail },
            500 => AnswerError::ServerError { detail },
            502 => AnswerError::BadGateway,
            503 => AnswerError::Unavailable,
            504 => AnswerError::GatewayTimeout,
            _ => AnswerError::UnknownStatus { status, detail },
        }
    }

    /// Classify a transport failure, i.e. anything that produced no usable
    /// HTTP response.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            AnswerError::RequestSetup
        } else {
            AnswerError::Network
        }
    }

    /// The sentence shown to the learner for this failure.
    pub fn user_message(&self) -> String {
        match self {
            AnswerError::BadRequest { detail } => with_fallback(detail, messages::ERR_BAD_REQUEST),
            AnswerError::PayloadTooLarge { detail } => {
                with_fallback(detail, messages::ERR_PAYLOAD_TOO_LARGE)
            }
            AnswerError::Unprocessable { detail } => {
                with_fallback(detail, messages::ERR_UNPROCESSABLE)
            }
            AnswerError::RateLimited { detail } => {
                with_fallback(detail, messages::ERR_RATE_LIMITED)
            }
            AnswerError::ServerError { detail } => with_fallback(detail, messages::ERR_SERVER),
            AnswerError::BadGateway => messages::ERR_BAD_GATEWAY.to_string(),
            AnswerError::Unavailable => messages::ERR_UNAVAILABLE.to_string(),
            AnswerError::GatewayTimeout => messages::ERR_GATEWAY_TIMEOUT.to_string(),
            AnswerError::Network => messages::ERR_NETWORK.to_string(),
            AnswerError::RequestSetup => messages::ERR_REQUEST_SETUP.to_string(),
            AnswerError::UnknownStatus { status, detail } => detail
                .clone()
                .unwrap_or_else(|| messages::err_unknown_status(*status)),
        }
    }
}

fn with_fallback(detail: &Option<String>, fallback: &str) -> String {
    detail.clone().unwrap_or_else(|| fallback.to_string())
}

/// Why a review call failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ReviewError {
    /// The backend refused the call with an error status.
    #[error("review rejected")]
    Rejected { detail: Option<String> },
    /// No usable response at all.
    #[error("no response from server")]
    Transport,
}

impl ReviewError {
    /// Copy for a failed review submission.
    pub fn submit_message(&self) -> String {
        match self {
            ReviewError::Rejected {
                detail: Some(detail),
            } => detail.clone(),
            _ => messages::REVIEW_SEND_FAILED.to_string(),
        }
    }

    /// Copy for a failed statistics fetch. Always fixed.
    pub fn stats_message(&self) -> String {
        messages::REVIEW_STATS_FAILED.to_string()
    }
}

// ── Service traits ─────────────────────────────────────────────────

#[async_trait::async_trait]
pub trait AnswerService: Send + Sync + 'static {
    /// Ask one question, optionally with an attached image.
    async fn ask(
        &self,
        question: &str,
        image: Option<ImagePayload>,
    ) -> Result<Answer, AnswerError>;
}

#[async_trait::async_trait]
pub trait ReviewService: Send + Sync + 'static {
    async fn submit_review(&self, review: &ReviewRequest) -> Result<(), ReviewError>;

    async fn review_stats(&self) -> Result<ReviewStats, ReviewError>;
}

// ── HTTP client ────────────────────────────────────────────────────

/// HTTP implementation of both service traits against the tutoring
/// backend.
pub struct HttpTutorClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTutorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Pull the `detail` field out of a failure body, if the body parses.
async fn read_detail(resp: reqwest::Response) -> Option<String> {
    resp.json::<ErrorBody>().await.ok().and_then(|body| body.detail)
}

#[async_trait::async_trait]
impl AnswerService for HttpTutorClient {
    async fn ask(
        &self,
        question: &str,
        image: Option<ImagePayload>,
    ) -> Result<Answer, AnswerError> {
        let mut form = reqwest::multipart::Form::new().text("question", question.to_string());
        if let Some(image) = image {
            debug!(
                media_type = %image.media_type,
                bytes = image.bytes.len(),
                "attaching image to answer request"
            );
            let part = reqwest::multipart::Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.media_type)
                .map_err(|_| AnswerError::RequestSetup)?;
            form = form.part("image", part);
        }

        let resp = self
            .client
            .post(self.endpoint("/chat"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "answer request did not reach the backend");
                AnswerError::from_transport(&err)
            })?;

        let status = resp.status();
        if status.is_success() {
            resp.json::<Answer>()
                .await
                .map_err(|err| AnswerError::from_transport(&err))
        } else {
            let detail = read_detail(resp).await;
            warn!(status = status.as_u16(), ?detail, "answer request failed");
            Err(AnswerError::from_status(status.as_u16(), detail))
        }
    }
}

#[async_trait::async_trait]
impl ReviewService for HttpTutorClient {
    async fn submit_review(&self, review: &ReviewRequest) -> Result<(), ReviewError> {
        let resp = self
            .client
            .post(self.endpoint("/reviews"))
            .json(review)
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "review submission did not reach the backend");
                ReviewError::Transport
            })?;

        let status = resp.status();
        if status.is_success() {
            debug!(rating = review.rating, "review accepted");
            Ok(())
        } else {
            let detail = read_detail(resp).await;
            warn!(status = status.as_u16(), ?detail, "review rejected");
            Err(ReviewError::Rejected { detail })
        }
    }

    async fn review_stats(&self) -> Result<ReviewStats, ReviewError> {
        let resp = self
            .client
            .get(self.endpoint("/reviews/stats"))
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "stats request did not reach the backend");
                ReviewError::Transport
            })?;

        let status = resp.status();
        if status.is_success() {
            resp.json::<ReviewStats>()
                .await
                .map_err(|_| ReviewError::Transport)
        } else {
            let detail = read_detail(resp).await;
            warn!(status = status.as_u16(), ?detail, "stats request failed");
            Err(ReviewError::Rejected { detail })
        }
    }
}
