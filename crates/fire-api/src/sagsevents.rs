//! Handlers for `/sagsevents` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/sagsevents` | Body: [`CommitBody`]; returns 201 + [`CommitResponse`] |
//! | `GET`  | `/sagsevents/{id}` | Single sagsevent |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use fire_core::{
  punktinfo::{NewPunktInformation, PunktInformation},
  sag::{EventType, Sagsevent},
  store::PunktStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Body ────────────────────────────────────────────────────────────────────

/// A sagsevent as submitted by a client.
///
/// `id` and `registrering_fra` may be supplied by the case authority; when
/// absent the server assigns a fresh id and the current time.
#[derive(Debug, Deserialize)]
pub struct SagseventBody {
  pub id:               Option<Uuid>,
  pub sag_id:           Uuid,
  pub eventtype:        EventType,
  pub registrering_fra: Option<DateTime<Utc>>,
  pub beskrivelse:      String,
}

impl From<SagseventBody> for Sagsevent {
  fn from(b: SagseventBody) -> Self {
    let mut sagsevent = Sagsevent::new(b.sag_id, b.eventtype, b.beskrivelse);
    if let Some(id) = b.id {
      sagsevent.id = id;
    }
    match b.registrering_fra {
      Some(at) => sagsevent.at(at),
      None => sagsevent,
    }
  }
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /sagsevents`.
#[derive(Debug, Deserialize)]
pub struct CommitBody {
  pub sagsevent:          SagseventBody,
  #[serde(default)]
  pub punktinformationer: Vec<NewPunktInformation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommitResponse {
  pub sagsevent:          Sagsevent,
  /// The rows this sagsevent opened.
  pub punktinformationer: Vec<PunktInformation>,
}

/// `POST /sagsevents`: commit a sagsevent and the facts it carries.
pub async fn commit<S: PunktStore>(
  State(store): State<Arc<S>>,
  Json(body): Json<CommitBody>,
) -> Result<impl IntoResponse, ApiError> {
  let sagsevent = Sagsevent::from(body.sagsevent);
  let punktinformationer = store
    .commit_sagsevent(sagsevent.clone(), body.punktinformationer)
    .await
    .map_err(ApiError::store)?;
  Ok((
    StatusCode::CREATED,
    Json(CommitResponse { sagsevent, punktinformationer }),
  ))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /sagsevents/{id}`
pub async fn get_one<S: PunktStore>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Sagsevent>, ApiError> {
  let sagsevent = store
    .get_sagsevent(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("sagsevent {id} not found")))?;
  Ok(Json(sagsevent))
}
