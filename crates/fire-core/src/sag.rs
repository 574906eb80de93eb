//! Sager and sagsevents, the administrative side of every change.
//!
//! A [`Sag`] is a project. Every mutation of the point register happens
//! through a [`Sagsevent`] belonging to a sag; the sagsevent supplies the
//! identifier and timestamp stamped onto the rows it opens or closes.

use std::{fmt, str::FromStr};

use chrono::{DateTime, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Sag ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sag {
  pub id:               Uuid,
  /// Project name; unique across the register.
  pub navn:             String,
  pub behandler:        String,
  pub beskrivelse:      String,
  pub registrering_fra: DateTime<Utc>,
}

/// Input to [`crate::store::PunktStore::create_sag`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewSag {
  pub navn:        String,
  pub behandler:   String,
  #[serde(default)]
  pub beskrivelse: String,
}

// ─── EventType ───────────────────────────────────────────────────────────────

/// What a sagsevent does. Stored as the upper-case discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
  PunktOprettet,
  PunktinfoTilfoejet,
  PunktinfoFjernet,
  Kommentar,
}

impl EventType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::PunktOprettet => "PUNKT_OPRETTET",
      Self::PunktinfoTilfoejet => "PUNKTINFO_TILFOEJET",
      Self::PunktinfoFjernet => "PUNKTINFO_FJERNET",
      Self::Kommentar => "KOMMENTAR",
    }
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EventType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "PUNKT_OPRETTET" => Ok(Self::PunktOprettet),
      "PUNKTINFO_TILFOEJET" => Ok(Self::PunktinfoTilfoejet),
      "PUNKTINFO_FJERNET" => Ok(Self::PunktinfoFjernet),
      "KOMMENTAR" => Ok(Self::Kommentar),
      other => Err(Error::UnknownEventType(other.to_owned())),
    }
  }
}

// ─── Sagsevent ───────────────────────────────────────────────────────────────

/// One transaction against the register. The identifier and timestamp are
/// decided by whoever builds the sagsevent; the store records them as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sagsevent {
  pub id:               Uuid,
  pub sag_id:           Uuid,
  pub eventtype:        EventType,
  pub registrering_fra: DateTime<Utc>,
  /// The reason for the change. Must not be blank.
  pub beskrivelse:      String,
}

impl Sagsevent {
  /// A sagsevent stamped with a fresh id and the current time.
  ///
  /// The timestamp is truncated to microseconds, the resolution timestamps
  /// are persisted with, so values read back compare equal.
  pub fn new(
    sag_id: Uuid,
    eventtype: EventType,
    beskrivelse: impl Into<String>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      sag_id,
      eventtype,
      registrering_fra: Utc::now().trunc_subsecs(6),
      beskrivelse: beskrivelse.into(),
    }
  }

  /// Override the timestamp, e.g. when replaying a historical case.
  pub fn at(mut self, registrering_fra: DateTime<Utc>) -> Self {
    self.registrering_fra = registrering_fra.trunc_subsecs(6);
    self
  }

  /// Check that this sagsevent is fit to perform an `expected` mutation.
  pub fn expect_type(&self, expected: EventType) -> Result<()> {
    if self.beskrivelse.trim().is_empty() {
      return Err(Error::EmptyReason(self.id));
    }
    if self.eventtype != expected {
      return Err(Error::EventTypeMismatch {
        expected,
        found: self.eventtype,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_type_round_trips_through_its_discriminant() {
    for et in [
      EventType::PunktOprettet,
      EventType::PunktinfoTilfoejet,
      EventType::PunktinfoFjernet,
      EventType::Kommentar,
    ] {
      assert_eq!(et.as_str().parse::<EventType>().unwrap(), et);
      let json = serde_json::to_string(&et).unwrap();
      assert_eq!(json, format!("\"{}\"", et.as_str()));
    }
    assert!(matches!(
      "PUNKT_SLETTET".parse::<EventType>(),
      Err(Error::UnknownEventType(_))
    ));
  }

  #[test]
  fn expect_type_rejects_blank_reason_and_wrong_type() {
    let sag_id = Uuid::new_v4();

    let blank = Sagsevent::new(sag_id, EventType::PunktinfoFjernet, "  ");
    assert!(matches!(
      blank.expect_type(EventType::PunktinfoFjernet),
      Err(Error::EmptyReason(_))
    ));

    let added = Sagsevent::new(sag_id, EventType::PunktinfoTilfoejet, "ny");
    assert!(matches!(
      added.expect_type(EventType::PunktinfoFjernet),
      Err(Error::EventTypeMismatch {
        expected: EventType::PunktinfoFjernet,
        found:    EventType::PunktinfoTilfoejet,
      })
    ));
    assert!(added.expect_type(EventType::PunktinfoTilfoejet).is_ok());
  }

  #[test]
  fn new_truncates_to_microseconds() {
    let ev = Sagsevent::new(Uuid::new_v4(), EventType::Kommentar, "x");
    assert_eq!(ev.registrering_fra.timestamp_subsec_nanos() % 1_000, 0);
  }
}
