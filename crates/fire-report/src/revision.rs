//! The revision sheet: the current attributes of a set of punkter, laid out
//! for a field crew to review and annotate.
//!
//! Each punkt gets a header row carrying its landsnummer, then one row per
//! open fact, then five blank rows. `ATTR:muligt_datumstabil` always comes
//! first (as a suggestion row with `Sluk = x` if the punkt lacks it), followed
//! by `ATTR:beskrivelse`, followed by everything else in insertion order.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
};

use fire_core::{
  punktinfo::{LANDSNR, PunktInformation},
  store::{PunktStore, PunktView},
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{Error, Result};

pub const DATUMSTABIL: &str = "ATTR:muligt_datumstabil";
pub const BESKRIVELSE: &str = "ATTR:beskrivelse";

/// Attributes that are never part of a revision.
pub const IGNORED: &[&str] = &[
  "REGION:DK",
  "IDENT:refgeo_id",
  "IDENT:station",
  "NET:10KM",
  "SKITSE:master_md5",
  "SKITSE:master_sti",
  "SKITSE:png_md5",
  "SKITSE:png_sti",
  "ATTR:fundamentalpunkt",
  "ATTR:tinglysningsnr",
];

/// Blank rows written after each punkt.
const SEPARATOR_ROWS: usize = 5;

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One line of the revision sheet. Serialises to the sheet's column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RevisionRow {
  #[serde(rename = "Punkt")]
  pub punkt:       String,
  /// `x` marks a row the crew should switch off (i.e. close).
  #[serde(rename = "Sluk")]
  pub sluk:        String,
  #[serde(rename = "Attribut")]
  pub attribut:    String,
  #[serde(rename = "Talværdi")]
  pub talvaerdi:   Option<f64>,
  #[serde(rename = "Tekstværdi")]
  pub tekstvaerdi: Option<String>,
  /// The `objektid` of the listed fact.
  pub id:          Option<i64>,
}

impl RevisionRow {
  fn header(landsnummer: &str) -> Self {
    Self { punkt: landsnummer.to_owned(), ..Self::default() }
  }

  fn suggestion(attribut: &str) -> Self {
    Self {
      sluk: "x".into(),
      attribut: attribut.to_owned(),
      ..Self::default()
    }
  }

  fn fact(pi: &PunktInformation) -> Self {
    Self {
      attribut: pi.infotype.clone(),
      talvaerdi: pi.tal,
      tekstvaerdi: pi.tekst.as_deref().map(|t| t.trim().to_owned()),
      id: Some(pi.objektid),
      ..Self::default()
    }
  }

  pub fn is_blank(&self) -> bool { *self == Self::default() }
}

/// Build the rows for one punkt from its open facts (insertion order).
pub fn revision_rows(landsnummer: &str, open: &[PunktInformation]) -> Vec<RevisionRow> {
  let open: Vec<&PunktInformation> = open.iter().filter(|pi| pi.is_open()).collect();
  let find = |infotype: &str| open.iter().position(|pi| pi.infotype == infotype);

  let mut rows = vec![RevisionRow::header(landsnummer)];
  let mut order = Vec::with_capacity(open.len());

  match find(DATUMSTABIL) {
    Some(i) => order.push(i),
    None => rows.push(RevisionRow::suggestion(DATUMSTABIL)),
  }
  if let Some(i) = find(BESKRIVELSE) {
    order.push(i);
  }
  let leading: HashSet<usize> = order.iter().copied().collect();
  order.extend((0..open.len()).filter(|i| !leading.contains(i)));

  for pi in order.into_iter().map(|i| open[i]) {
    if IGNORED.contains(&pi.infotype.as_str()) {
      continue;
    }
    // The landsnummer is already in the header.
    if pi.infotype == LANDSNR
      && pi.tekst.as_deref().map(str::trim) == Some(landsnummer)
    {
      continue;
    }
    rows.push(RevisionRow::fact(pi));
  }

  rows.extend(std::iter::repeat_n(RevisionRow::default(), SEPARATOR_ROWS));
  rows
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Build the revision sheet of project `projektnavn` for the punkter named by
/// `idents`.
///
/// The sag must exist and every ident must resolve. Punkter are listed in
/// landsnummer order; a punkt named twice is listed once.
pub async fn extract_revision<S: PunktStore>(
  store: &S,
  projektnavn: &str,
  idents: Vec<String>,
) -> Result<Vec<RevisionRow>> {
  if store
    .find_sag(projektnavn.to_owned())
    .await
    .map_err(Error::store)?
    .is_none()
  {
    return Err(fire_core::Error::SagNotFound(projektnavn.to_owned()).into());
  }

  let punkter = store
    .find_punkter(idents, false)
    .await
    .map_err(Error::store)?;

  let mut seen = HashSet::new();
  let mut views: Vec<PunktView> = Vec::with_capacity(punkter.len());
  for punkt in punkter {
    if !seen.insert(punkt.id) {
      continue;
    }
    let view = store
      .materialize(punkt.id)
      .await
      .map_err(Error::store)?
      .ok_or(fire_core::Error::PunktNotFound(punkt.id))?;
    views.push(view);
  }
  views.sort_by(|a, b| a.landsnummer.cmp(&b.landsnummer));

  let mut rows = Vec::new();
  for view in &views {
    debug!(punkt = %view.landsnummer, facts = view.punktinformationer.len(), "revision");
    rows.extend(revision_rows(&view.landsnummer, &view.punktinformationer));
  }

  info!(projekt = projektnavn, punkter = views.len(), "revision extracted");
  Ok(rows)
}

/// Write `rows` to `<dir>/<projektnavn>-revision.csv` and return the path.
pub fn write_revision(
  rows: &[RevisionRow],
  dir: &Path,
  projektnavn: &str,
) -> Result<PathBuf> {
  std::fs::create_dir_all(dir)?;
  let path = dir.join(format!("{projektnavn}-revision.csv"));

  let mut writer = csv::Writer::from_path(&path)?;
  for row in rows {
    writer.serialize(row)?;
  }
  writer.flush()?;

  info!(path = %path.display(), rows = rows.len(), "revision written");
  Ok(path)
}
