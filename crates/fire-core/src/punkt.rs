//! Punkt: the surveyed location every fact hangs off.
//!
//! A punkt row carries only identity and its own validity interval. Its names
//! (landsnummer, GNSS ident, ...) are `IDENT:*` point information facts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::punktinfo::{IDENT_PREFIX, LANDSNR, PunktInformation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punkt {
  pub id:               Uuid,
  pub registrering_fra: DateTime<Utc>,
  pub registrering_til: Option<DateTime<Utc>>,
  pub sagsevent_fra_id: Uuid,
  pub sagsevent_til_id: Option<Uuid>,
}

impl Punkt {
  pub fn is_open(&self) -> bool { self.registrering_til.is_none() }
}

/// The primary ident of a punkt, given its open facts: the `IDENT:landsnr`
/// text if there is one, else the first other `IDENT:*` text, else the punkt
/// id itself.
pub fn landsnummer(punkt_id: Uuid, open: &[PunktInformation]) -> String {
  let ident_text = |pred: &dyn Fn(&str) -> bool| {
    open
      .iter()
      .filter(|pi| pi.is_open() && pred(&pi.infotype))
      .find_map(|pi| pi.tekst.as_deref().map(str::trim))
      .filter(|t| !t.is_empty())
      .map(str::to_owned)
  };

  ident_text(&|it| it == LANDSNR)
    .or_else(|| ident_text(&|it| it.starts_with(IDENT_PREFIX)))
    .unwrap_or_else(|| punkt_id.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ident(punkt_id: Uuid, objektid: i64, infotype: &str, tekst: &str) -> PunktInformation {
    PunktInformation {
      objektid,
      punkt_id,
      infotype: infotype.into(),
      tekst: Some(tekst.into()),
      tal: None,
      registrering_fra: Utc::now(),
      registrering_til: None,
      sagsevent_fra_id: Uuid::new_v4(),
      sagsevent_til_id: None,
    }
  }

  #[test]
  fn landsnr_wins_over_other_idents() {
    let id = Uuid::new_v4();
    let facts = vec![
      ident(id, 1, "IDENT:GNSS", "SKEJ"),
      ident(id, 2, LANDSNR, "K-63-09446"),
    ];
    assert_eq!(landsnummer(id, &facts), "K-63-09446");
  }

  #[test]
  fn falls_back_to_other_ident_then_uuid() {
    let id = Uuid::new_v4();
    assert_eq!(
      landsnummer(id, &[ident(id, 1, "IDENT:GNSS", "SKEJ")]),
      "SKEJ"
    );
    assert_eq!(landsnummer(id, &[]), id.to_string());
  }

  #[test]
  fn closed_idents_are_ignored() {
    let id = Uuid::new_v4();
    let mut old = ident(id, 1, LANDSNR, "K-12-1231");
    old.registrering_til = Some(Utc::now());
    old.sagsevent_til_id = Some(Uuid::new_v4());
    assert_eq!(landsnummer(id, &[old]), id.to_string());
  }
}
