//! # Decryption API
//!
//! `POST /v1/decrypt` and `POST /v1/decrypt/batch`. The caller presents the
//! access token exported from a signed session credential; the gate decides
//! and, only on allow, fetches and decrypts. Transient failures are retried
//! with the oracle reset between attempts.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use vaultgate_core::{ItemId, VaultId};
use vaultgate_gate::{with_retry, DecryptRequest, Decrypted, GateError, SessionCredential, Signed};

use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_json;
use crate::state::AppState;

/// Build the decryption router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/decrypt", post(decrypt))
        .route("/v1/decrypt/batch", post(decrypt_batch))
}

// -- DTOs ---------------------------------------------------------------------

/// Decrypt one item.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecryptBody {
    /// Access token exported from a signed session credential.
    pub access_token: String,
    /// Vault the item is expected in.
    pub vault_id: String,
    /// Item to decrypt.
    pub item_id: String,
}

/// Decrypt several items under one credential.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchDecryptBody {
    pub access_token: String,
    pub items: Vec<BatchItem>,
}

/// One entry of a batch request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub vault_id: String,
    pub item_id: String,
}

/// Decrypted payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedData {
    pub item_id: String,
    /// Standard base64 of the plaintext.
    pub decrypted_data: String,
    /// Plaintext length in bytes.
    pub size: usize,
}

/// Per-item outcome of a batch.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub item_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DecryptedData>,
    /// Failure code when this item was not released.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch response, in request order.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchDecryptResponse {
    pub results: Vec<BatchOutcome>,
}

impl From<Decrypted> for DecryptedData {
    fn from(d: Decrypted) -> Self {
        Self {
            item_id: d.item_id.to_string(),
            size: d.plaintext.len(),
            decrypted_data: STANDARD.encode(&d.plaintext),
        }
    }
}

fn parse_request(vault_id: &str, item_id: &str) -> Result<DecryptRequest, GateError> {
    let vault_id = VaultId::parse(vault_id).map_err(|e| GateError::Validation(e.to_string()))?;
    let item_id = ItemId::parse(item_id).map_err(|e| GateError::Validation(e.to_string()))?;
    Ok(DecryptRequest { vault_id, item_id })
}

fn credential(token: &str) -> Result<SessionCredential<Signed>, AppError> {
    Ok(SessionCredential::<Signed>::from_access_token(token)?)
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/decrypt: Decrypt one item.
#[utoipa::path(
    post,
    path = "/v1/decrypt",
    request_body = DecryptBody,
    responses(
        (status = 200, description = "Plaintext released", body = DecryptedData),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Access token invalid, expired or for another domain", body = ErrorBody),
        (status = 403, description = "No matching allow-list entry", body = ErrorBody),
        (status = 422, description = "Malformed identifiers or vault mismatch", body = ErrorBody),
        (status = 503, description = "Blob store or key servers unavailable", body = ErrorBody),
        (status = 504, description = "External call timed out", body = ErrorBody),
    ),
    tag = "decrypt"
)]
pub(crate) async fn decrypt(
    State(state): State<AppState>,
    body: Result<Json<DecryptBody>, JsonRejection>,
) -> Result<Json<DecryptedData>, AppError> {
    let body = extract_json(body)?;
    let credential = credential(&body.access_token)?;
    let request = parse_request(&body.vault_id, &body.item_id)?;

    let gate = &state.gate;
    let decrypted = with_retry(
        &state.retry,
        || gate.reset_oracle(),
        || gate.decrypt(&credential, request),
    )
    .await?;

    Ok(Json(decrypted.into()))
}

/// POST /v1/decrypt/batch: Decrypt several items; failures are per item.
#[utoipa::path(
    post,
    path = "/v1/decrypt/batch",
    request_body = BatchDecryptBody,
    responses(
        (status = 200, description = "Per-item outcomes in request order", body = BatchDecryptResponse),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 401, description = "Access token malformed", body = ErrorBody),
    ),
    tag = "decrypt"
)]
pub(crate) async fn decrypt_batch(
    State(state): State<AppState>,
    body: Result<Json<BatchDecryptBody>, JsonRejection>,
) -> Result<Json<BatchDecryptResponse>, AppError> {
    let body = extract_json(body)?;
    let credential = credential(&body.access_token)?;

    let mut results: Vec<Option<BatchOutcome>> = Vec::with_capacity(body.items.len());
    let mut requests = Vec::new();
    let mut slots = Vec::new();
    for (slot, item) in body.items.iter().enumerate() {
        match parse_request(&item.vault_id, &item.item_id) {
            Ok(request) => {
                requests.push(request);
                slots.push(slot);
                results.push(None);
            }
            Err(e) => results.push(Some(BatchOutcome {
                item_id: item.item_id.clone(),
                data: None,
                error: Some(e.kind().code().to_string()),
            })),
        }
    }

    let outcomes = state.gate.decrypt_batch(&credential, &requests).await;
    for ((slot, request), outcome) in slots.into_iter().zip(&requests).zip(outcomes) {
        results[slot] = Some(match outcome {
            Ok(decrypted) => BatchOutcome {
                item_id: request.item_id.to_string(),
                data: Some(decrypted.into()),
                error: None,
            },
            Err(e) => BatchOutcome {
                item_id: request.item_id.to_string(),
                data: None,
                error: Some(e.kind().code().to_string()),
            },
        });
    }

    Ok(Json(BatchDecryptResponse {
        results: results.into_iter().flatten().collect(),
    }))
}
