//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision. UUIDs are stored as hyphenated lowercase strings. Enums are
//! stored as their upper-case discriminants.

use chrono::{DateTime, SecondsFormat, Utc};
use fire_core::{
  punkt::Punkt,
  punktinfo::{Anvendelse, PunktInformation, PunktInformationType},
  sag::{EventType, Sag, Sagsevent},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

fn decode_eventtype(s: &str) -> Result<EventType> {
  s.parse()
    .map_err(|e: fire_core::Error| Error::Decode(e.to_string()))
}

fn decode_anvendelse(s: &str) -> Result<Anvendelse> {
  s.parse()
    .map_err(|e: fire_core::Error| Error::Decode(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawPunktInformation::from_row`]. Expects `punktinfo`
/// aliased as `pi` joined with `punktinfotype` aliased as `t`.
pub const PUNKTINFO_COLUMNS: &str = "pi.objektid, pi.punktid, t.infotype, \
                                     pi.tekst, pi.tal, pi.registreringfra, \
                                     pi.registreringtil, pi.sagseventfraid, \
                                     pi.sagseventtilid";

/// Raw values read directly from a `punktinfo` row joined with its infotype.
pub struct RawPunktInformation {
  pub objektid:        i64,
  pub punktid:         String,
  pub infotype:        String,
  pub tekst:           Option<String>,
  pub tal:             Option<f64>,
  pub registreringfra: String,
  pub registreringtil: Option<String>,
  pub sagseventfraid:  String,
  pub sagseventtilid:  Option<String>,
}

impl RawPunktInformation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      objektid:        row.get(0)?,
      punktid:         row.get(1)?,
      infotype:        row.get(2)?,
      tekst:           row.get(3)?,
      tal:             row.get(4)?,
      registreringfra: row.get(5)?,
      registreringtil: row.get(6)?,
      sagseventfraid:  row.get(7)?,
      sagseventtilid:  row.get(8)?,
    })
  }

  pub fn into_punktinformation(self) -> Result<PunktInformation> {
    Ok(PunktInformation {
      objektid:         self.objektid,
      punkt_id:         decode_uuid(&self.punktid)?,
      infotype:         self.infotype,
      tekst:            self.tekst,
      tal:              self.tal,
      registrering_fra: decode_dt(&self.registreringfra)?,
      registrering_til: decode_opt_dt(self.registreringtil)?,
      sagsevent_fra_id: decode_uuid(&self.sagseventfraid)?,
      sagsevent_til_id: decode_opt_uuid(self.sagseventtilid)?,
    })
  }
}

pub const PUNKT_COLUMNS: &str =
  "p.id, p.registreringfra, p.registreringtil, p.sagseventfraid, p.sagseventtilid";

/// Raw strings read directly from a `punkt` row.
pub struct RawPunkt {
  pub id:              String,
  pub registreringfra: String,
  pub registreringtil: Option<String>,
  pub sagseventfraid:  String,
  pub sagseventtilid:  Option<String>,
}

impl RawPunkt {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      registreringfra: row.get(1)?,
      registreringtil: row.get(2)?,
      sagseventfraid:  row.get(3)?,
      sagseventtilid:  row.get(4)?,
    })
  }

  pub fn into_punkt(self) -> Result<Punkt> {
    Ok(Punkt {
      id:               decode_uuid(&self.id)?,
      registrering_fra: decode_dt(&self.registreringfra)?,
      registrering_til: decode_opt_dt(self.registreringtil)?,
      sagsevent_fra_id: decode_uuid(&self.sagseventfraid)?,
      sagsevent_til_id: decode_opt_uuid(self.sagseventtilid)?,
    })
  }
}

pub const SAG_COLUMNS: &str = "id, navn, behandler, beskrivelse, registreringfra";

/// Raw strings read directly from a `sag` row.
pub struct RawSag {
  pub id:              String,
  pub navn:            String,
  pub behandler:       String,
  pub beskrivelse:     String,
  pub registreringfra: String,
}

impl RawSag {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      navn:            row.get(1)?,
      behandler:       row.get(2)?,
      beskrivelse:     row.get(3)?,
      registreringfra: row.get(4)?,
    })
  }

  pub fn into_sag(self) -> Result<Sag> {
    Ok(Sag {
      id:               decode_uuid(&self.id)?,
      navn:             self.navn,
      behandler:        self.behandler,
      beskrivelse:      self.beskrivelse,
      registrering_fra: decode_dt(&self.registreringfra)?,
    })
  }
}

pub const SAGSEVENT_COLUMNS: &str =
  "id, sagid, eventtype, registreringfra, beskrivelse";

/// Raw strings read directly from a `sagsevent` row.
pub struct RawSagsevent {
  pub id:              String,
  pub sagid:           String,
  pub eventtype:       String,
  pub registreringfra: String,
  pub beskrivelse:     String,
}

impl RawSagsevent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      sagid:           row.get(1)?,
      eventtype:       row.get(2)?,
      registreringfra: row.get(3)?,
      beskrivelse:     row.get(4)?,
    })
  }

  pub fn into_sagsevent(self) -> Result<Sagsevent> {
    Ok(Sagsevent {
      id:               decode_uuid(&self.id)?,
      sag_id:           decode_uuid(&self.sagid)?,
      eventtype:        decode_eventtype(&self.eventtype)?,
      registrering_fra: decode_dt(&self.registreringfra)?,
      beskrivelse:      self.beskrivelse,
    })
  }
}

pub const INFOTYPE_COLUMNS: &str = "infotypeid, infotype, anvendelse, beskrivelse";

/// Raw values read directly from a `punktinfotype` row.
pub struct RawInfotype {
  pub infotypeid:  i64,
  pub infotype:    String,
  pub anvendelse:  String,
  pub beskrivelse: String,
}

impl RawInfotype {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      infotypeid:  row.get(0)?,
      infotype:    row.get(1)?,
      anvendelse:  row.get(2)?,
      beskrivelse: row.get(3)?,
    })
  }

  pub fn into_infotype(self) -> Result<PunktInformationType> {
    Ok(PunktInformationType {
      infotypeid:  self.infotypeid,
      name:        self.infotype,
      anvendelse:  decode_anvendelse(&self.anvendelse)?,
      beskrivelse: self.beskrivelse,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_sort_as_text() {
    let early = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let late = early + chrono::Duration::microseconds(1);
    let (a, b) = (encode_dt(early), encode_dt(late));
    assert_eq!(a.len(), b.len());
    assert!(a < b);
    assert_eq!(decode_dt(&b).unwrap(), late);
  }
}
