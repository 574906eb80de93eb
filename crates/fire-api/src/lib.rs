//! JSON REST API for the FIRE point register.
//!
//! Exposes an axum [`Router`] backed by any [`fire_core::store::PunktStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", fire_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod punkter;
pub mod punktinformationer;
pub mod sager;
pub mod sagsevents;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use fire_core::store::PunktStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: PunktStore + 'static,
{
  Router::new()
    // Taxonomy and sager
    .route("/infotyper", get(sager::infotyper::<S>))
    .route("/sager", post(sager::create::<S>))
    .route("/sager/{id}", get(sager::get_one::<S>))
    .route("/sager/{id}/sagsevents", get(sager::sagsevents::<S>))
    // Punkter
    .route("/punkter", post(punkter::create::<S>))
    .route("/punkter/{ident}", get(punkter::get_one::<S>))
    .route(
      "/punkter/{ident}/punktinformationer",
      get(punkter::punktinformationer::<S>),
    )
    .route(
      "/punkter/{ident}/historik/{infotype}",
      get(punkter::historik::<S>),
    )
    // Sagsevents and facts
    .route("/sagsevents", post(sagsevents::commit::<S>))
    .route("/sagsevents/{id}", get(sagsevents::get_one::<S>))
    .route(
      "/punktinformationer/{objektid}",
      get(punktinformationer::get_one::<S>),
    )
    .route(
      "/punktinformationer/{objektid}/luk",
      post(punktinformationer::close_one::<S>),
    )
    .with_state(store)
}
