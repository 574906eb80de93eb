//! Handlers for `/punktinformationer` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/punktinformationer/{objektid}` | Single fact, open or closed |
//! | `POST` | `/punktinformationer/{objektid}/luk` | Body: a `PUNKTINFO_FJERNET` [`SagseventBody`] |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use fire_core::{punktinfo::PunktInformation, sag::Sagsevent, store::PunktStore};

use crate::{error::ApiError, sagsevents::SagseventBody};

/// `GET /punktinformationer/{objektid}`
pub async fn get_one<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(objektid): Path<i64>,
) -> Result<Json<PunktInformation>, ApiError> {
  let fact = store
    .get_punktinfo(objektid)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("punktinformation {objektid} not found"))
    })?;
  Ok(Json(fact))
}

/// `POST /punktinformationer/{objektid}/luk`: returns the closed row.
pub async fn close_one<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(objektid): Path<i64>,
  Json(body): Json<SagseventBody>,
) -> Result<Json<PunktInformation>, ApiError> {
  let fact = store
    .close_punktinfo(objektid, Sagsevent::from(body))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(fact))
}
