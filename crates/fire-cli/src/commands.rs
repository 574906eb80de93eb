//! One function per subcommand. Each opens no resources of its own; the
//! store and configuration come from `main`.

use std::sync::Arc;

use anyhow::{Context as _, bail};
use chrono::SecondsFormat;
use fire_core::{
  punkt::Punkt,
  punktinfo::{LANDSNR, NewPunktInformation, PunktInformation},
  sag::{EventType, NewSag, Sag, Sagsevent},
  store::PunktStore,
};
use fire_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::FireConfig;

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn require_sag(store: &SqliteStore, navn: &str) -> anyhow::Result<Sag> {
  match store.find_sag(navn.to_owned()).await? {
    Some(sag) => Ok(sag),
    None => bail!("sag {navn:?} not found; create it with `fire sag opret`"),
  }
}

async fn require_punkt(store: &SqliteStore, ident: &str) -> anyhow::Result<Punkt> {
  match store.find_punkt(ident.to_owned()).await? {
    Some(punkt) => Ok(punkt),
    None => bail!("punkt {ident:?} not found"),
  }
}

/// The value of a fact as shown in listings.
fn value_of(pi: &PunktInformation) -> String {
  match (&pi.tekst, pi.tal) {
    (Some(tekst), _) => tekst.trim().to_owned(),
    (None, Some(tal)) => tal.to_string(),
    (None, None) => "(flag)".to_owned(),
  }
}

fn interval_of(pi: &PunktInformation) -> String {
  let fra = pi.registrering_fra.to_rfc3339_opts(SecondsFormat::Secs, true);
  match pi.registrering_til {
    Some(til) => format!("{fra} .. {}", til.to_rfc3339_opts(SecondsFormat::Secs, true)),
    None => format!("{fra} .."),
  }
}

fn print_fact(pi: &PunktInformation) {
  println!(
    "  [{:>6}] {:<28} {:<32} {}",
    pi.objektid,
    pi.infotype,
    value_of(pi),
    interval_of(pi)
  );
}

// ─── Commands ────────────────────────────────────────────────────────────────

pub async fn serve(store: SqliteStore, cfg: &FireConfig) -> anyhow::Result<()> {
  let app = axum::Router::new()
    .nest("/api", fire_api::api_router(Arc::new(store)))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", cfg.host, cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

pub async fn infotyper(store: &SqliteStore) -> anyhow::Result<()> {
  for it in store.list_infotyper().await? {
    println!("{:<28} {:<6} {}", it.name, it.anvendelse.as_str(), it.beskrivelse);
  }
  Ok(())
}

pub async fn sag_opret(
  store: &SqliteStore,
  navn: String,
  behandler: String,
  beskrivelse: String,
) -> anyhow::Result<()> {
  let sag = store
    .create_sag(NewSag { navn, behandler, beskrivelse })
    .await
    .context("failed to create sag")?;
  println!("Sag {:?} oprettet ({})", sag.navn, sag.id);
  Ok(())
}

pub async fn sag_vis(store: &SqliteStore, navn: String) -> anyhow::Result<()> {
  let sag = require_sag(store, &navn).await?;
  println!("Sag {:?} ({})", sag.navn, sag.id);
  println!("  behandler: {}", sag.behandler);
  if !sag.beskrivelse.is_empty() {
    println!("  {}", sag.beskrivelse);
  }
  for ev in store.list_sagsevents(sag.id).await? {
    println!(
      "  {} {:<20} {}",
      ev.registrering_fra.to_rfc3339_opts(SecondsFormat::Secs, true),
      ev.eventtype.as_str(),
      ev.beskrivelse
    );
  }
  Ok(())
}

pub async fn punkt_opret(
  store: &SqliteStore,
  sag: String,
  landsnr: Option<String>,
  beskrivelse: String,
) -> anyhow::Result<()> {
  let landsnr = landsnr.map(|l| l.trim().to_owned());
  if landsnr.as_deref().is_some_and(str::is_empty) {
    bail!("landsnr must not be blank");
  }

  let sag = require_sag(store, &sag).await?;
  let punkt = store
    .create_punkt(Sagsevent::new(sag.id, EventType::PunktOprettet, beskrivelse))
    .await
    .context("failed to create punkt")?;

  if let Some(landsnr) = landsnr {
    let ev = Sagsevent::new(
      sag.id,
      EventType::PunktinfoTilfoejet,
      format!("Landsnummer {landsnr} tildelt"),
    );
    store
      .commit_sagsevent(ev, vec![NewPunktInformation::tekst(
        punkt.id, LANDSNR, landsnr,
      )])
      .await
      .with_context(|| {
        format!(
          "punkt {} was created without a landsnummer; assign it with \
           `fire info tilfoej --sag {:?} {} {LANDSNR} --tekst ...`",
          punkt.id, sag.navn, punkt.id
        )
      })?;
  }

  println!("Punkt {} oprettet", punkt.id);
  Ok(())
}

pub async fn punkt_vis(store: &SqliteStore, ident: String) -> anyhow::Result<()> {
  let punkt = require_punkt(store, &ident).await?;
  let Some(view) = store.materialize(punkt.id).await? else {
    bail!("punkt {ident:?} not found");
  };
  println!("Punkt {} ({})", view.landsnummer, view.punkt.id);
  for pi in &view.punktinformationer {
    print_fact(pi);
  }
  Ok(())
}

pub async fn info_tilfoej(
  store: &SqliteStore,
  sag: String,
  ident: String,
  infotype: String,
  tekst: Option<String>,
  tal: Option<f64>,
  beskrivelse: String,
) -> anyhow::Result<()> {
  let sag = require_sag(store, &sag).await?;
  let punkt = require_punkt(store, &ident).await?;

  let ev = Sagsevent::new(sag.id, EventType::PunktinfoTilfoejet, beskrivelse);
  let opened = store
    .commit_sagsevent(ev, vec![NewPunktInformation {
      punkt_id: punkt.id,
      infotype,
      tekst,
      tal,
    }])
    .await
    .context("failed to add punktinformation")?;

  for pi in &opened {
    print_fact(pi);
  }
  Ok(())
}

pub async fn info_luk(
  store: &SqliteStore,
  sag: String,
  objektid: i64,
  beskrivelse: String,
) -> anyhow::Result<()> {
  let sag = require_sag(store, &sag).await?;
  let ev = Sagsevent::new(sag.id, EventType::PunktinfoFjernet, beskrivelse);
  let closed = store
    .close_punktinfo(objektid, ev)
    .await
    .with_context(|| format!("failed to close punktinformation {objektid}"))?;
  print_fact(&closed);
  Ok(())
}

pub async fn info_historik(
  store: &SqliteStore,
  ident: String,
  infotype: String,
) -> anyhow::Result<()> {
  let punkt = require_punkt(store, &ident).await?;
  if store.get_infotype(infotype.clone()).await?.is_none() {
    bail!("unknown infotype {infotype:?}");
  }
  for pi in store.historik(punkt.id, infotype).await? {
    print_fact(&pi);
  }
  Ok(())
}

pub async fn kommentar(
  store: &SqliteStore,
  sag: String,
  beskrivelse: String,
) -> anyhow::Result<()> {
  let sag = require_sag(store, &sag).await?;
  let ev = Sagsevent::new(sag.id, EventType::Kommentar, beskrivelse);
  store
    .commit_sagsevent(ev, Vec::new())
    .await
    .context("failed to record kommentar")?;
  Ok(())
}

pub async fn udtraek_revision(
  store: &SqliteStore,
  cfg: &FireConfig,
  projektnavn: String,
  idents: Vec<String>,
) -> anyhow::Result<()> {
  let rows = fire_report::extract_revision(store, &projektnavn, idents)
    .await
    .context("failed to extract revision")?;
  let path = fire_report::write_revision(&rows, &cfg.output_dir, &projektnavn)
    .context("failed to write revision")?;
  println!("Revision skrevet til {}", path.display());
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone as _, Utc};
  use uuid::Uuid;

  use super::*;

  fn fact(tekst: Option<&str>, tal: Option<f64>) -> PunktInformation {
    PunktInformation {
      objektid: 7,
      punkt_id: Uuid::nil(),
      infotype: "ATTR:test".into(),
      tekst: tekst.map(str::to_owned),
      tal,
      registrering_fra: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
      registrering_til: None,
      sagsevent_fra_id: Uuid::nil(),
      sagsevent_til_id: None,
    }
  }

  async fn store_with_sag(navn: &str) -> (SqliteStore, Sag) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let sag = store
      .create_sag(NewSag {
        navn:        navn.into(),
        behandler:   "tester".into(),
        beskrivelse: String::new(),
      })
      .await
      .unwrap();
    (store, sag)
  }

  #[tokio::test]
  async fn punkt_opret_assigns_trimmed_landsnr() {
    let (store, _) = store_with_sag("S").await;
    punkt_opret(&store, "S".into(), Some(" K-12-1231 ".into()), "Ny".into())
      .await
      .unwrap();
    assert!(store.find_punkt("K-12-1231".into()).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn blank_landsnr_creates_nothing() {
    let (store, sag) = store_with_sag("S").await;
    let err = punkt_opret(&store, "S".into(), Some("  ".into()), "Ny".into())
      .await
      .unwrap_err();
    assert!(err.to_string().contains("landsnr"));
    assert!(store.list_sagsevents(sag.id).await.unwrap().is_empty());
  }

  #[test]
  fn values_are_rendered_by_kind() {
    assert_eq!(value_of(&fact(Some(" K-1 "), None)), "K-1");
    assert_eq!(value_of(&fact(None, Some(0.25))), "0.25");
    assert_eq!(value_of(&fact(None, None)), "(flag)");
  }

  #[test]
  fn open_interval_has_no_upper_bound() {
    let mut pi = fact(None, None);
    assert_eq!(interval_of(&pi), "2024-01-02T03:04:05Z ..");
    pi.registrering_til = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    assert_eq!(
      interval_of(&pi),
      "2024-01-02T03:04:05Z .. 2024-02-01T00:00:00Z"
    );
  }
}
