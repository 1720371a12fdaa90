//! API request/response types and the response envelope.

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use funnel_core::error::DispatchError;
use funnel_core::types::{Campaign, DeliveryOutcome, DeliveryStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Success envelope: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error envelope: `{"success": false, "error": {"kind", "message"}}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Map engine errors onto HTTP statuses. Callers never see raw errors, only
/// the structured taxonomy.
pub fn error_response(err: DispatchError) -> (StatusCode, Json<ApiError>) {
    let (status, kind) = match &err {
        DispatchError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        DispatchError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DispatchError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
        DispatchError::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (status, Json(ApiError::new(kind, err.to_string())))
}

/// Campaign plus its ledger counts, as returned by `GET /campaigns/{id}`.
#[derive(Debug, Serialize)]
pub struct CampaignWithCounts {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub counts: HashMap<String, u64>,
}

impl CampaignWithCounts {
    pub fn new(campaign: Campaign, counts: HashMap<DeliveryStatus, u64>) -> Self {
        Self {
            campaign,
            counts: counts
                .into_iter()
                .map(|(status, count)| (status.as_str().to_string(), count))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_logs_limit")]
    pub limit: usize,
}

fn default_logs_limit() -> usize {
    50
}

/// Outcome report posted by the browser extension after it attempts one
/// queued WhatsApp send.
#[derive(Debug, Deserialize)]
pub struct OutcomeReport {
    pub recipient_identity: String,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub permanent: bool,
}

impl OutcomeReport {
    pub fn into_outcome(self) -> DeliveryOutcome {
        DeliveryOutcome {
            status: self.status,
            error_detail: self.error_detail,
            permanent: self.permanent,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtensionStatus {
    pub connected: bool,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}
