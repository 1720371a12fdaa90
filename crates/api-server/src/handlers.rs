//! Axum REST handlers over the dispatch engine.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use uuid::Uuid;

use funnel_channels::WhatsAppBridge;
use funnel_core::error::DispatchError;
use funnel_core::types::{Campaign, DeliveryRecord};
use funnel_ledger::DeliveryLedger;
use funnel_scheduler::{CampaignStore, NewCampaign, UpdateCampaign};

use crate::auth::OwnerId;
use crate::models::{
    error_response, ApiError, ApiSuccess, CampaignWithCounts, ExtensionStatus, LogsQuery,
    OutcomeReport,
};

/// Shared API state.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<CampaignStore>,
    pub ledger: Arc<DeliveryLedger>,
    pub bridge: Arc<WhatsAppBridge>,
}

type ApiResult<T> = Result<Json<ApiSuccess<T>>, (StatusCode, Json<ApiError>)>;

fn not_found(id: Uuid) -> (StatusCode, Json<ApiError>) {
    error_response(DispatchError::not_found(format!(
        "campaign {} not found",
        id
    )))
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn create_campaign(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Json(req): Json<NewCampaign>,
) -> Result<(StatusCode, Json<ApiSuccess<Campaign>>), (StatusCode, Json<ApiError>)> {
    let campaign = state.store.create(&owner.0, req).map_err(error_response)?;
    metrics::counter!("api.campaigns.created").increment(1);
    Ok((
        StatusCode::CREATED,
        Json(ApiSuccess {
            success: true,
            data: campaign,
        }),
    ))
}

pub async fn list_campaigns(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
) -> ApiResult<Vec<Campaign>> {
    Ok(ApiSuccess::new(state.store.list(&owner.0)))
}

pub async fn get_campaign(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> ApiResult<CampaignWithCounts> {
    let campaign = state.store.get(id, &owner.0).ok_or_else(|| not_found(id))?;
    let counts = state.ledger.counts_by_status(id);
    Ok(ApiSuccess::new(CampaignWithCounts::new(campaign, counts)))
}

pub async fn update_campaign(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCampaign>,
) -> ApiResult<Campaign> {
    let campaign = state
        .store
        .update(id, &owner.0, req)
        .map_err(error_response)?;
    Ok(ApiSuccess::new(campaign))
}

pub async fn toggle_campaign(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> ApiResult<Campaign> {
    let campaign = state
        .store
        .toggle(id, &owner.0)
        .map_err(error_response)?;
    metrics::counter!("api.campaigns.toggled").increment(1);
    Ok(ApiSuccess::new(campaign))
}

pub async fn campaign_logs(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Vec<DeliveryRecord>> {
    if state.store.get(id, &owner.0).is_none() {
        return Err(not_found(id));
    }
    Ok(ApiSuccess::new(state.ledger.list(id, query.limit)))
}

// ─── Extension bridge ──────────────────────────────────────────────────────

pub async fn pending_sends(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<funnel_channels::PendingSend>> {
    if state.store.get(id, &owner.0).is_none() {
        return Err(not_found(id));
    }
    Ok(ApiSuccess::new(state.bridge.pending_sends(id)))
}

pub async fn report_outcome(
    State(state): State<ApiState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<Uuid>,
    Json(report): Json<OutcomeReport>,
) -> ApiResult<DeliveryRecord> {
    if state.store.get(id, &owner.0).is_none() {
        return Err(not_found(id));
    }
    let identity = report.recipient_identity.clone();
    let record = state
        .ledger
        .complete_pending(id, &identity, &report.into_outcome())
        .map_err(error_response)?;
    state.bridge.resolve(id, &identity);
    metrics::counter!("api.extension.outcomes").increment(1);
    Ok(ApiSuccess::new(record))
}

pub async fn extension_heartbeat(State(state): State<ApiState>) -> ApiResult<ExtensionStatus> {
    state.bridge.heartbeat();
    Ok(ApiSuccess::new(ExtensionStatus {
        connected: state.bridge.is_connected(),
        last_heartbeat_at: state.bridge.last_heartbeat(),
    }))
}

pub async fn extension_status(State(state): State<ApiState>) -> ApiResult<ExtensionStatus> {
    Ok(ApiSuccess::new(ExtensionStatus {
        connected: state.bridge.is_connected(),
        last_heartbeat_at: state.bridge.last_heartbeat(),
    }))
}

// ─── Operational ───────────────────────────────────────────────────────────

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
