//! Handlers for `/punkter` endpoints.
//!
//! A punkt is addressed by its ident: its UUID, or the text of any of its
//! open `IDENT:*` facts (landsnummer, GNSS ident, ...).
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/punkter` | Body: a `PUNKT_OPRETTET` [`SagseventBody`]; returns 201 |
//! | `GET`  | `/punkter/{ident}` | Materialised [`PunktView`] |
//! | `GET`  | `/punkter/{ident}/punktinformationer` | Optional `?include_closed=true` |
//! | `GET`  | `/punkter/{ident}/historik/{infotype}` | Every version, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use fire_core::{
  punkt::Punkt,
  punktinfo::PunktInformation,
  sag::Sagsevent,
  store::{PunktStore, PunktView},
};
use serde::Deserialize;

use crate::{error::ApiError, sagsevents::SagseventBody};

async fn resolve<S: PunktStore>(store: &S, ident: String) -> Result<Punkt, ApiError> {
  store
    .find_punkt(ident.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("punkt {ident} not found")))
}

/// `POST /punkter`
pub async fn create<S: PunktStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<SagseventBody>,
) -> Result<impl IntoResponse, ApiError> {
  let punkt = store
    .create_punkt(Sagsevent::from(body))
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(punkt)))
}

/// `GET /punkter/{ident}`
pub async fn get_one<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(ident): Path<String>,
) -> Result<Json<PunktView>, ApiError> {
  let punkt = resolve(&*store, ident).await?;
  let view = store
    .materialize(punkt.id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("punkt {} not found", punkt.id)))?;
  Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// If `true`, also return closed facts. Default `false`.
  #[serde(default)]
  pub include_closed: bool,
}

/// `GET /punkter/{ident}/punktinformationer[?include_closed=true]`
pub async fn punktinformationer<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(ident): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<PunktInformation>>, ApiError> {
  let punkt = resolve(&*store, ident).await?;
  let facts = store
    .punktinformationer(punkt.id, params.include_closed)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(facts))
}

/// `GET /punkter/{ident}/historik/{infotype}`
pub async fn historik<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path((ident, infotype)): Path<(String, String)>,
) -> Result<Json<Vec<PunktInformation>>, ApiError> {
  let punkt = resolve(&*store, ident).await?;
  if store
    .get_infotype(infotype.clone())
    .await
    .map_err(ApiError::store)?
    .is_none()
  {
    return Err(ApiError::NotFound(format!("infotype {infotype} not found")));
  }
  let versions = store
    .historik(punkt.id, infotype)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(versions))
}
