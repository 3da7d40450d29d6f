//! # Grant Introspection API
//!
//! `POST /v1/grants/introspect` lets a service check the bearer token it
//! received at issuance. Unknown or malformed tokens are reported as
//! inactive rather than as errors so the endpoint cannot be used to tell
//! the two apart.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vaultgate_access::{status_at, GrantStatus};

use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_json;
use crate::state::AppState;

/// Build the grants router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/grants/introspect", post(introspect))
}

/// Token to introspect.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IntrospectBody {
    pub token: String,
}

/// Introspection result. Only `active` is present for unknown tokens.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Introspection {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Recipient address placed on the allow-lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    /// Exclusive deadline, epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub resource_ids: Vec<String>,
}

fn status_name(status: GrantStatus) -> &'static str {
    match status {
        GrantStatus::Active => "ACTIVE",
        GrantStatus::Expired => "EXPIRED",
        GrantStatus::Revoked => "REVOKED",
    }
}

/// POST /v1/grants/introspect: Report whether a bearer token is live.
#[utoipa::path(
    post,
    path = "/v1/grants/introspect",
    request_body = IntrospectBody,
    responses(
        (status = 200, description = "Token state", body = Introspection),
        (status = 400, description = "Malformed body", body = ErrorBody),
    ),
    tag = "grants"
)]
pub(crate) async fn introspect(
    State(state): State<AppState>,
    body: Result<Json<IntrospectBody>, JsonRejection>,
) -> Result<Json<Introspection>, AppError> {
    let body = extract_json(body)?;
    let Some(grant) = state.grants.find_grant_by_token(&body.token).await? else {
        return Ok(Json(Introspection::default()));
    };
    let now = state
        .ledger
        .now()
        .await
        .map_err(vaultgate_access::AccessError::from)?;
    let status = status_at(&grant, now);

    Ok(Json(Introspection {
        active: status == GrantStatus::Active,
        status: Some(status_name(status).to_string()),
        grant_id: Some(grant.id.to_string()),
        client_id: Some(grant.client_id.clone()),
        recipient: Some(grant.owner_address.to_string()),
        expires_at: Some(grant.expires_at.as_millis()),
        resource_ids: grant.resource_ids.iter().map(ToString::to_string).collect(),
    }))
}
