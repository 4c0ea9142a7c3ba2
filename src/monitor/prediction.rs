//! Risk prediction: the HTTP client for the external scoring service and
//! the synchronizer that folds its answers into engine state.
//!
//! Requests are tagged with a generation number. Only a response for the
//! most recently issued generation is applied; anything older is dropped,
//! so a slow answer for an outdated snapshot can never overwrite a fresher
//! one. Failures leave the last applied prediction and the trend untouched.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PredictionConfig;

use super::trend::TrendBuffer;
use super::types::{PredictionResult, RiskStatus, TrendPoint, VitalSnapshot};

/// Positional feature vector, in `VitalKind::ALL` order.
pub type FeatureVector = [f64; 8];

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Scoring service is not reachable at {0}")]
    Connection(String),

    #[error("Scoring request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Scoring service returned error (status {status}): {body}")]
    ServiceError { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Risk score {0} is outside 0-100")]
    RiskScoreOutOfRange(f64),

    #[error("Risk score {0} is not a whole number")]
    RiskScoreNotInteger(f64),

    #[error("Unknown risk status: {0:?}")]
    UnknownStatus(String),
}

// ═══════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════

/// Scoring service abstraction (allows mocking).
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, features: FeatureVector) -> Result<PredictionResult, PredictionError>;
}

/// Request body for `POST /predict`.
#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    vitals: &'a [f64],
}

/// Response body from `POST /predict`, before validation.
#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(rename = "riskScore")]
    risk_score: f64,
    status: String,
}

/// reqwest-backed client for the scoring service.
pub struct HttpPredictionClient {
    url: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpPredictionClient {
    pub fn new(config: &PredictionConfig) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PredictionError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: config.predict_url.clone(),
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    /// Client configured from `RECOVERY_ASSISTANT_*` environment settings.
    pub fn from_env() -> Result<Self, PredictionError> {
        Self::new(&PredictionConfig::from_env())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_send_error(&self, e: reqwest::Error) -> PredictionError {
        if e.is_timeout() {
            PredictionError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            PredictionError::Connection(self.url.clone())
        } else {
            PredictionError::HttpClient(e.to_string())
        }
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, features: FeatureVector) -> Result<PredictionResult, PredictionError> {
        let body = PredictRequest { vitals: &features };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(PredictionError::ServiceError {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_prediction(&text)
    }
}

/// Parse and validate a scoring response body.
///
/// The service is untrusted: the score must be a whole number in 0..=100
/// and the status exactly `Stable` or `High`.
pub fn parse_prediction(body: &str) -> Result<PredictionResult, PredictionError> {
    let raw: PredictResponse = serde_json::from_str(body)
        .map_err(|e| PredictionError::ResponseParsing(e.to_string()))?;

    if !(0.0..=100.0).contains(&raw.risk_score) {
        return Err(PredictionError::RiskScoreOutOfRange(raw.risk_score));
    }
    if raw.risk_score.fract() != 0.0 {
        return Err(PredictionError::RiskScoreNotInteger(raw.risk_score));
    }
    let status = raw
        .status
        .parse::<RiskStatus>()
        .map_err(PredictionError::UnknownStatus)?;

    Ok(PredictionResult {
        risk_score: raw.risk_score as u8,
        status,
    })
}

/// Re-check a result from any client before it reaches engine state.
pub fn check_result(result: PredictionResult) -> Result<PredictionResult, PredictionError> {
    if result.risk_score > PredictionResult::MAX_RISK_SCORE {
        return Err(PredictionError::RiskScoreOutOfRange(f64::from(result.risk_score)));
    }
    Ok(result)
}

// ═══════════════════════════════════════════════════════════
// Synchronizer
// ═══════════════════════════════════════════════════════════

/// A request about to be sent, tagged with its generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionTicket {
    pub generation: u64,
    pub features: FeatureVector,
}

/// The prediction currently shown, and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedPrediction {
    pub result: PredictionResult,
    pub generation: u64,
    pub received_at: NaiveDateTime,
}

/// What happened to a completed request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SyncOutcome {
    /// Fresh result applied and a trend point appended.
    Applied {
        result: PredictionResult,
        point: TrendPoint,
    },
    /// A newer request was issued before this one completed.
    Stale { generation: u64, latest: u64 },
    /// Transport or validation failure; prior state kept.
    Failed,
}

/// Owns the generation counter, the last applied prediction and the trend.
#[derive(Debug, Default)]
pub struct PredictionSynchronizer {
    latest_issued: u64,
    current: Option<AppliedPrediction>,
    trend: TrendBuffer,
}

impl PredictionSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation for `vitals`. Earlier tickets become stale.
    pub fn issue(&mut self, vitals: &VitalSnapshot) -> PredictionTicket {
        self.latest_issued += 1;
        PredictionTicket {
            generation: self.latest_issued,
            features: vitals.feature_vector(),
        }
    }

    /// Fold a completed request into state.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: Result<PredictionResult, PredictionError>,
    ) -> SyncOutcome {
        let result = match outcome.and_then(check_result) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(generation, error = %e, "Prediction failed, keeping last known score");
                return SyncOutcome::Failed;
            }
        };

        if generation != self.latest_issued {
            tracing::debug!(
                generation,
                latest = self.latest_issued,
                "Discarding out-of-order prediction"
            );
            return SyncOutcome::Stale {
                generation,
                latest: self.latest_issued,
            };
        }

        let point = self.trend.push(result.recovery_score());
        self.current = Some(AppliedPrediction {
            result,
            generation,
            received_at: chrono::Local::now().naive_local(),
        });

        tracing::info!(
            generation,
            risk_score = result.risk_score,
            status = result.status.as_str(),
            trend_len = self.trend.len(),
            "Prediction applied"
        );

        SyncOutcome::Applied { result, point }
    }

    pub fn latest_generation(&self) -> u64 {
        self.latest_issued
    }

    pub fn current(&self) -> Option<&AppliedPrediction> {
        self.current.as_ref()
    }

    /// Last applied score, 0 before any prediction arrives.
    pub fn risk_score(&self) -> u8 {
        self.current.map(|p| p.result.risk_score).unwrap_or(0)
    }

    /// Last applied status, `Stable` before any prediction arrives.
    pub fn status(&self) -> RiskStatus {
        self.current.map(|p| p.result.status).unwrap_or_default()
    }

    pub fn trend(&self) -> &TrendBuffer {
        &self.trend
    }
}

// ═══════════════════════════════════════════════════════════
// Test doubles
// ═══════════════════════════════════════════════════════════
