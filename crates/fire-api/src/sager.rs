//! Handlers for `/sager` and `/infotyper` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/infotyper` | The attribute taxonomy |
//! | `POST` | `/sager` | Body: [`NewSag`]; returns 201 + stored sag |
//! | `GET`  | `/sager/{id}` | 404 if not found |
//! | `GET`  | `/sager/{id}/sagsevents` | Oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use fire_core::{
  punktinfo::PunktInformationType,
  sag::{NewSag, Sag, Sagsevent},
  store::PunktStore,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `GET /infotyper`
pub async fn infotyper<S: PunktStore>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<PunktInformationType>>, ApiError> {
  let infotyper = store.list_infotyper().await.map_err(ApiError::store)?;
  Ok(Json(infotyper))
}

/// `POST /sager`, body: `{"navn":"...","behandler":"..."}`
pub async fn create<S: PunktStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewSag>,
) -> Result<impl IntoResponse, ApiError> {
  if body.navn.trim().is_empty() {
    return Err(ApiError::BadRequest("navn must not be blank".into()));
  }
  let sag = store.create_sag(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(sag)))
}

/// `GET /sager/{id}`
pub async fn get_one<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Sag>, ApiError> {
  let sag = store
    .get_sag(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("sag {id} not found")))?;
  Ok(Json(sag))
}

/// `GET /sager/{id}/sagsevents`
pub async fn sagsevents<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Sagsevent>>, ApiError> {
  if store.get_sag(id).await.map_err(ApiError::store)?.is_none() {
    return Err(ApiError::NotFound(format!("sag {id} not found")));
  }
  let events = store.list_sagsevents(id).await.map_err(ApiError::store)?;
  Ok(Json(events))
}
