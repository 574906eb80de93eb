//! Point information: time-sliced attribute facts about a punkt.
//!
//! A [`PunktInformation`] row asserts that a punkt has attribute `infotype`
//! with an optional text and/or numeric value for the interval
//! `[registrering_fra, registrering_til)`. Rows are never deleted; a row is
//! retired by stamping its upper bound with the sagsevent that closed it.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Infotype name of the national point number.
pub const LANDSNR: &str = "IDENT:landsnr";

/// Infotype name prefix shared by all identifiers.
pub const IDENT_PREFIX: &str = "IDENT:";

// ─── Infotype ────────────────────────────────────────────────────────────────

/// Which value slot a fact of a given infotype uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Anvendelse {
  /// Presence alone carries the meaning; no value.
  Flag,
  Tal,
  Tekst,
}

impl Anvendelse {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Flag => "FLAG",
      Self::Tal => "TAL",
      Self::Tekst => "TEKST",
    }
  }

  /// Whether a value pair is acceptable for this anvendelse.
  pub fn accepts(self, tekst: Option<&str>, tal: Option<f64>) -> bool {
    match self {
      Self::Flag => tekst.is_none() && tal.is_none(),
      Self::Tal => tal.is_some() && tekst.is_none(),
      Self::Tekst => tekst.is_some() && tal.is_none(),
    }
  }
}

impl fmt::Display for Anvendelse {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Anvendelse {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "FLAG" => Ok(Self::Flag),
      "TAL" => Ok(Self::Tal),
      "TEKST" => Ok(Self::Tekst),
      other => Err(Error::UnknownAnvendelse(other.to_owned())),
    }
  }
}

/// An entry in the attribute taxonomy, e.g. `ATTR:beskrivelse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunktInformationType {
  pub infotypeid:  i64,
  pub name:        String,
  pub anvendelse:  Anvendelse,
  pub beskrivelse: String,
}

impl PunktInformationType {
  /// Reject a fact whose values do not fit this infotype.
  pub fn check_value(&self, tekst: Option<&str>, tal: Option<f64>) -> Result<()> {
    if self.anvendelse.accepts(tekst, tal) {
      Ok(())
    } else {
      Err(Error::ValueMismatch {
        infotype:   self.name.clone(),
        anvendelse: self.anvendelse.as_str(),
      })
    }
  }
}

/// Input to [`crate::store::PunktStore::add_infotype`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewPunktInformationType {
  pub name:        String,
  pub anvendelse:  Anvendelse,
  #[serde(default)]
  pub beskrivelse: String,
}

// ─── PunktInformation ────────────────────────────────────────────────────────

/// One persisted version of an attribute fact.
///
/// `registrering_til` and `sagsevent_til_id` are `None` together while the
/// fact is open, and set together, once, when it is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PunktInformation {
  /// Surrogate key; increases with insertion order.
  pub objektid:         i64,
  pub punkt_id:         Uuid,
  pub infotype:         String,
  pub tekst:            Option<String>,
  pub tal:              Option<f64>,
  pub registrering_fra: DateTime<Utc>,
  pub registrering_til: Option<DateTime<Utc>>,
  pub sagsevent_fra_id: Uuid,
  pub sagsevent_til_id: Option<Uuid>,
}

impl PunktInformation {
  pub fn is_open(&self) -> bool {
    self.registrering_til.is_none() && self.sagsevent_til_id.is_none()
  }
}

/// Input to [`crate::store::PunktStore::commit_sagsevent`]. Timestamps and
/// sagsevent references come from the committing sagsevent, never from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPunktInformation {
  pub punkt_id: Uuid,
  pub infotype: String,
  #[serde(default)]
  pub tekst:    Option<String>,
  #[serde(default)]
  pub tal:      Option<f64>,
}

impl NewPunktInformation {
  /// A value-less fact, for `FLAG` infotypes.
  pub fn flag(punkt_id: Uuid, infotype: impl Into<String>) -> Self {
    Self { punkt_id, infotype: infotype.into(), tekst: None, tal: None }
  }

  pub fn tekst(
    punkt_id: Uuid,
    infotype: impl Into<String>,
    tekst: impl Into<String>,
  ) -> Self {
    Self {
      punkt_id,
      infotype: infotype.into(),
      tekst: Some(tekst.into()),
      tal: None,
    }
  }

  pub fn tal(punkt_id: Uuid, infotype: impl Into<String>, tal: f64) -> Self {
    Self { punkt_id, infotype: infotype.into(), tekst: None, tal: Some(tal) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn infotype(anvendelse: Anvendelse) -> PunktInformationType {
    PunktInformationType {
      infotypeid: 1,
      name: "ATTR:test".into(),
      anvendelse,
      beskrivelse: String::new(),
    }
  }

  #[test]
  fn flag_takes_no_value() {
    let it = infotype(Anvendelse::Flag);
    assert!(it.check_value(None, None).is_ok());
    assert!(matches!(
      it.check_value(Some("x"), None),
      Err(Error::ValueMismatch { anvendelse: "FLAG", .. })
    ));
  }

  #[test]
  fn tal_and_tekst_take_their_own_slot() {
    let tal = infotype(Anvendelse::Tal);
    assert!(tal.check_value(None, Some(1.5)).is_ok());
    assert!(tal.check_value(None, None).is_err());
    assert!(tal.check_value(Some("1.5"), Some(1.5)).is_err());

    let tekst = infotype(Anvendelse::Tekst);
    assert!(tekst.check_value(Some("Bolt i mur"), None).is_ok());
    assert!(tekst.check_value(None, Some(2.0)).is_err());
  }

  #[test]
  fn anvendelse_parses_stored_form() {
    assert_eq!("TEKST".parse::<Anvendelse>().unwrap(), Anvendelse::Tekst);
    assert!(matches!(
      "tekst".parse::<Anvendelse>(),
      Err(Error::UnknownAnvendelse(_))
    ));
  }
}
