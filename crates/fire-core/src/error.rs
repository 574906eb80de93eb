//! Error types for `fire-core`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::sag::EventType;

#[derive(Debug, Error)]
pub enum Error {
  // ── Invariant violations ────────────────────────────────────────────────
  #[error("punkt {punkt_id} already has an open {infotype} fact")]
  AlreadyOpen { punkt_id: Uuid, infotype: String },

  #[error("punktinformation {0} is already closed")]
  AlreadyClosed(i64),

  /// `from` is the latest bound already recorded for the fact: its
  /// registreringfra while open, its registreringtil once closed.
  #[error("sagsevent at {at} precedes {from} on punktinformation {objektid}")]
  TimelineRegression {
    objektid: i64,
    from:     DateTime<Utc>,
    at:       DateTime<Utc>,
  },

  #[error("sagsevent at {at} precedes the creation of punkt {punkt_id} at {from}")]
  PunktRegression {
    punkt_id: Uuid,
    from:     DateTime<Utc>,
    at:       DateTime<Utc>,
  },

  #[error("timeline broken at punktinformation {objektid}: {reason}")]
  BrokenTimeline {
    objektid: i64,
    reason:   &'static str,
  },

  #[error("punkt {0} is closed")]
  PunktClosed(Uuid),

  #[error("sagsevent {0} is already recorded")]
  DuplicateSagsevent(Uuid),

  #[error("a sag named {0:?} already exists")]
  DuplicateSag(String),

  #[error("infotype {0:?} already exists")]
  DuplicateInfotype(String),

  // ── Unknown references ──────────────────────────────────────────────────
  #[error("punkt not found: {0}")]
  PunktNotFound(Uuid),

  #[error("punktinformation not found: {0}")]
  PunktInformationNotFound(i64),

  #[error("unknown infotype: {0:?}")]
  InfotypeNotFound(String),

  #[error("sag not found: {0}")]
  SagNotFound(String),

  #[error("no punkt with ident {0:?}")]
  UnknownIdent(String),

  // ── Invalid input ───────────────────────────────────────────────────────
  #[error("sagsevent {0} has no beskrivelse")]
  EmptyReason(Uuid),

  #[error("expected a {expected} sagsevent, got {found}")]
  EventTypeMismatch {
    expected: EventType,
    found:    EventType,
  },

  #[error("{0} sagsevent carries no punktinformation")]
  NoPunktInformation(EventType),

  #[error("value does not match anvendelse {anvendelse} of infotype {infotype:?}")]
  ValueMismatch {
    infotype:   String,
    anvendelse: &'static str,
  },

  #[error("unknown event type: {0:?}")]
  UnknownEventType(String),

  #[error("unknown anvendelse: {0:?}")]
  UnknownAnvendelse(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Classification ──────────────────────────────────────────────────────────

/// Coarse error categories, used by outer layers (HTTP status mapping, CLI
/// exit messages) that should not depend on a particular backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// The operation would break the temporal record protocol.
  InvariantViolation,
  /// The operation referenced a point, fact, infotype or case that does not
  /// exist. Nothing was mutated.
  UnknownReference,
  /// The request itself is malformed.
  InvalidInput,
  /// The backend failed (I/O, decoding, SQL).
  Storage,
}

/// Implemented by every error type a [`crate::store::PunktStore`] may return.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::AlreadyOpen { .. }
      | Self::AlreadyClosed(_)
      | Self::TimelineRegression { .. }
      | Self::PunktRegression { .. }
      | Self::BrokenTimeline { .. }
      | Self::PunktClosed(_)
      | Self::DuplicateSagsevent(_)
      | Self::DuplicateSag(_)
      | Self::DuplicateInfotype(_) => ErrorKind::InvariantViolation,

      Self::PunktNotFound(_)
      | Self::PunktInformationNotFound(_)
      | Self::InfotypeNotFound(_)
      | Self::SagNotFound(_)
      | Self::UnknownIdent(_) => ErrorKind::UnknownReference,

      Self::EmptyReason(_)
      | Self::EventTypeMismatch { .. }
      | Self::NoPunktInformation(_)
      | Self::ValueMismatch { .. }
      | Self::UnknownEventType(_)
      | Self::UnknownAnvendelse(_) => ErrorKind::InvalidInput,
    }
  }
}
