//! The `PunktStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `fire-store-sqlite`).
//! Higher layers (`fire-api`, `fire-report`, `fire-cli`) depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::Classify,
  punkt::{Punkt, landsnummer},
  punktinfo::{
    NewPunktInformation, NewPunktInformationType, PunktInformation,
    PunktInformationType,
  },
  sag::{NewSag, Sag, Sagsevent},
};

// ─── Materialised view ───────────────────────────────────────────────────────

/// The current state of a punkt. Never stored, always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PunktView {
  pub punkt:              Punkt,
  pub landsnummer:        String,
  /// The moment the view was materialised.
  pub as_of:              chrono::DateTime<Utc>,
  /// Open facts in insertion order.
  pub punktinformationer: Vec<PunktInformation>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a point register backend.
///
/// Point information is append-only. Every write goes through a
/// [`Sagsevent`] and is applied atomically: either every row the sagsevent
/// opens or closes is written, or none is.
pub trait PunktStore: Send + Sync {
  type Error: std::error::Error
    + Classify
    + From<crate::Error>
    + Send
    + Sync
    + 'static;

  // ── Infotypes ─────────────────────────────────────────────────────────

  fn list_infotyper(
    &self,
  ) -> impl Future<Output = Result<Vec<PunktInformationType>, Self::Error>> + Send + '_;

  /// Look up an infotype by name. Returns `None` if unknown.
  fn get_infotype(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<PunktInformationType>, Self::Error>>
  + Send
  + '_;

  /// Register a new infotype. Names are unique.
  fn add_infotype(
    &self,
    input: NewPunktInformationType,
  ) -> impl Future<Output = Result<PunktInformationType, Self::Error>> + Send + '_;

  // ── Sager ─────────────────────────────────────────────────────────────

  /// Create a sag. Fails if the name is taken.
  fn create_sag(
    &self,
    input: NewSag,
  ) -> impl Future<Output = Result<Sag, Self::Error>> + Send + '_;

  fn get_sag(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Sag>, Self::Error>> + Send + '_;

  /// Look up a sag by its project name.
  fn find_sag(
    &self,
    navn: String,
  ) -> impl Future<Output = Result<Option<Sag>, Self::Error>> + Send + '_;

  fn get_sagsevent(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Sagsevent>, Self::Error>> + Send + '_;

  /// All sagsevents of a sag, oldest first.
  fn list_sagsevents(
    &self,
    sag_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Sagsevent>, Self::Error>> + Send + '_;

  // ── Punkter ───────────────────────────────────────────────────────────

  /// Create a punkt through a `PUNKT_OPRETTET` sagsevent.
  fn create_punkt(
    &self,
    sagsevent: Sagsevent,
  ) -> impl Future<Output = Result<Punkt, Self::Error>> + Send + '_;

  fn get_punkt(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Punkt>, Self::Error>> + Send + '_;

  /// Resolve an ident: a punkt UUID, or the text of any open `IDENT:*` fact.
  fn find_punkt(
    &self,
    ident: String,
  ) -> impl Future<Output = Result<Option<Punkt>, Self::Error>> + Send + '_;

  // ── Point information ─────────────────────────────────────────────────

  /// Commit a sagsevent together with the facts it introduces.
  ///
  /// Every fact replacing an open fact of the same `(punkt, infotype)` closes
  /// its predecessor with this same sagsevent. Returns the opened rows.
  fn commit_sagsevent(
    &self,
    sagsevent: Sagsevent,
    punktinformationer: Vec<NewPunktInformation>,
  ) -> impl Future<Output = Result<Vec<PunktInformation>, Self::Error>> + Send + '_;

  /// Retire an open fact through a `PUNKTINFO_FJERNET` sagsevent. Returns
  /// the closed row.
  fn close_punktinfo(
    &self,
    objektid: i64,
    sagsevent: Sagsevent,
  ) -> impl Future<Output = Result<PunktInformation, Self::Error>> + Send + '_;

  fn get_punktinfo(
    &self,
    objektid: i64,
  ) -> impl Future<Output = Result<Option<PunktInformation>, Self::Error>> + Send + '_;

  /// Facts of a punkt in insertion order; open ones only unless
  /// `include_closed`.
  fn punktinformationer(
    &self,
    punkt_id: Uuid,
    include_closed: bool,
  ) -> impl Future<Output = Result<Vec<PunktInformation>, Self::Error>> + Send + '_;

  /// Every version of one attribute of a punkt, oldest first.
  fn historik(
    &self,
    punkt_id: Uuid,
    infotype: String,
  ) -> impl Future<Output = Result<Vec<PunktInformation>, Self::Error>> + Send + '_;

  // ── Provided ──────────────────────────────────────────────────────────

  /// Resolve several idents, preserving order.
  ///
  /// Unknown idents fail the whole lookup unless `ignore_unknown` is set, in
  /// which case they are skipped.
  fn find_punkter(
    &self,
    idents: Vec<String>,
    ignore_unknown: bool,
  ) -> impl Future<Output = Result<Vec<Punkt>, Self::Error>> + Send + '_ {
    async move {
      let mut punkter = Vec::with_capacity(idents.len());
      for ident in idents {
        match self.find_punkt(ident.clone()).await? {
          Some(punkt) => punkter.push(punkt),
          None if ignore_unknown => {}
          None => return Err(crate::Error::UnknownIdent(ident).into()),
        }
      }
      Ok(punkter)
    }
  }

  /// Materialise a [`PunktView`]. Returns `None` if the punkt does not exist.
  fn materialize(
    &self,
    punkt_id: Uuid,
  ) -> impl Future<Output = Result<Option<PunktView>, Self::Error>> + Send + '_ {
    async move {
      let Some(punkt) = self.get_punkt(punkt_id).await? else {
        return Ok(None);
      };
      let punktinformationer = self.punktinformationer(punkt_id, false).await?;
      Ok(Some(PunktView {
        landsnummer: landsnummer(punkt_id, &punktinformationer),
        punkt,
        as_of: Utc::now(),
        punktinformationer,
      }))
    }
  }
}
