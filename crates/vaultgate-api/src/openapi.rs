//! # OpenAPI Document
//!
//! Served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// OpenAPI document for the HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "vaultgate",
        description = "Delegated access to encrypted vault items: decryption gate and grant introspection."
    ),
    paths(
        crate::routes::decrypt::decrypt,
        crate::routes::decrypt::decrypt_batch,
        crate::routes::grants::introspect,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::decrypt::DecryptBody,
        crate::routes::decrypt::BatchDecryptBody,
        crate::routes::decrypt::BatchItem,
        crate::routes::decrypt::DecryptedData,
        crate::routes::decrypt::BatchOutcome,
        crate::routes::decrypt::BatchDecryptResponse,
        crate::routes::grants::IntrospectBody,
        crate::routes::grants::Introspection,
    )),
    tags(
        (name = "decrypt", description = "Decryption gate"),
        (name = "grants", description = "OAuth grant introspection"),
    )
)]
pub struct ApiDoc;

/// Router serving the document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
