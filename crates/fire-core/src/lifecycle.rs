//! The open/close/supersede protocol for point information.
//!
//! Everything here is pure: given the sagsevent, the incoming facts and the
//! latest stored rows, it decides which rows to close and which to open.
//! Storage backends execute the resulting [`CommitPlan`] inside a single
//! transaction, so a plan is applied entirely or not at all.
//!
//! Retiring a fact and superseding it are the same primitive, a [`Closure`];
//! the sagsevent's event type is what tells them apart.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  punktinfo::{NewPunktInformation, PunktInformation},
  sag::{EventType, Sagsevent},
};

// ─── Closure ─────────────────────────────────────────────────────────────────

/// The upper bound stamped onto an open row when it is retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closure {
  pub objektid:         i64,
  pub registrering_til: DateTime<Utc>,
  pub sagsevent_til_id: Uuid,
}

impl Closure {
  /// Stamp this closure onto the in-memory copy of the row it was built for.
  pub fn apply(&self, fact: &mut PunktInformation) {
    debug_assert_eq!(fact.objektid, self.objektid);
    fact.registrering_til = Some(self.registrering_til);
    fact.sagsevent_til_id = Some(self.sagsevent_til_id);
  }
}

/// Decide how `sagsevent` closes `fact`.
///
/// Fails if the fact is already closed, or if the sagsevent is older than the
/// fact itself (the resulting interval would have negative length).
pub fn close(sagsevent: &Sagsevent, fact: &PunktInformation) -> Result<Closure> {
  if !fact.is_open() {
    return Err(Error::AlreadyClosed(fact.objektid));
  }
  if sagsevent.registrering_fra < fact.registrering_fra {
    return Err(Error::TimelineRegression {
      objektid: fact.objektid,
      from:     fact.registrering_fra,
      at:       sagsevent.registrering_fra,
    });
  }
  Ok(Closure {
    objektid:         fact.objektid,
    registrering_til: sagsevent.registrering_fra,
    sagsevent_til_id: sagsevent.id,
  })
}

// ─── Opening ─────────────────────────────────────────────────────────────────

/// A row to be inserted, already stamped with its lower bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Opening {
  pub punkt_id:         Uuid,
  pub infotype:         String,
  pub tekst:            Option<String>,
  pub tal:              Option<f64>,
  pub registrering_fra: DateTime<Utc>,
  pub sagsevent_fra_id: Uuid,
}

impl Opening {
  fn new(sagsevent: &Sagsevent, input: &NewPunktInformation) -> Self {
    Self {
      punkt_id:         input.punkt_id,
      infotype:         input.infotype.clone(),
      tekst:            input.tekst.clone(),
      tal:              input.tal,
      registrering_fra: sagsevent.registrering_fra,
      sagsevent_fra_id: sagsevent.id,
    }
  }

  /// The persisted row, once the backend has assigned its `objektid`.
  pub fn into_punktinformation(self, objektid: i64) -> PunktInformation {
    PunktInformation {
      objektid,
      punkt_id: self.punkt_id,
      infotype: self.infotype,
      tekst: self.tekst,
      tal: self.tal,
      registrering_fra: self.registrering_fra,
      registrering_til: None,
      sagsevent_fra_id: self.sagsevent_fra_id,
      sagsevent_til_id: None,
    }
  }
}

// ─── CommitPlan ──────────────────────────────────────────────────────────────

/// The row-level effect of committing one sagsevent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
  /// Predecessors to close. Always applied before `openings`.
  pub closures: Vec<Closure>,
  pub openings: Vec<Opening>,
}

/// Plan the commit of `sagsevent` carrying `incoming` facts.
///
/// `latest` must contain, for each `(punkt, infotype)` pair named in
/// `incoming`, its open row, or its most recently closed row when none is
/// open; rows for other pairs are ignored. Each pair that already has an open
/// row gets that row closed by this same sagsevent, so the successor's lower
/// bound equals the predecessor's upper bound. A pair whose last row was
/// retired may only be given again from that row's upper bound onwards.
///
/// A `KOMMENTAR` sagsevent is accepted with no facts and produces an empty
/// plan.
pub fn plan_commit(
  sagsevent: &Sagsevent,
  incoming: &[NewPunktInformation],
  latest: &[PunktInformation],
) -> Result<CommitPlan> {
  if sagsevent.eventtype == EventType::Kommentar {
    sagsevent.expect_type(EventType::Kommentar)?;
    if !incoming.is_empty() {
      return Err(Error::EventTypeMismatch {
        expected: EventType::PunktinfoTilfoejet,
        found:    EventType::Kommentar,
      });
    }
    return Ok(CommitPlan::default());
  }

  sagsevent.expect_type(EventType::PunktinfoTilfoejet)?;
  if incoming.is_empty() {
    return Err(Error::NoPunktInformation(sagsevent.eventtype));
  }

  let mut plan = CommitPlan::default();
  let mut seen: HashSet<(Uuid, &str)> = HashSet::new();

  for input in incoming {
    if !seen.insert((input.punkt_id, input.infotype.as_str())) {
      return Err(Error::AlreadyOpen {
        punkt_id: input.punkt_id,
        infotype: input.infotype.clone(),
      });
    }

    let rows = latest
      .iter()
      .filter(|pi| pi.punkt_id == input.punkt_id && pi.infotype == input.infotype);
    let mut predecessors = rows.clone().filter(|pi| pi.is_open());

    if let Some(predecessor) = predecessors.next() {
      if predecessors.next().is_some() {
        // The store already holds two open rows for this pair.
        return Err(Error::AlreadyOpen {
          punkt_id: input.punkt_id,
          infotype: input.infotype.clone(),
        });
      }
      plan.closures.push(close(sagsevent, predecessor)?);
    } else if let Some((retired, til)) = rows
      .filter_map(|pi| pi.registrering_til.map(|til| (pi, til)))
      .max_by_key(|(_, til)| *til)
      && sagsevent.registrering_fra < til
    {
      return Err(Error::TimelineRegression {
        objektid: retired.objektid,
        from:     til,
        at:       sagsevent.registrering_fra,
      });
    }

    plan.openings.push(Opening::new(sagsevent, input));
  }

  Ok(plan)
}

// ─── Timeline verification ───────────────────────────────────────────────────

/// Check the history of a single `(punkt, infotype)` pair, ordered by
/// `registrering_fra` and then `objektid`.
///
/// * upper bound and closing sagsevent are set together;
/// * no interval has negative length;
/// * intervals do not overlap, so only the last row may be open;
/// * a row closed by the sagsevent that opened its successor ends exactly
///   where the successor begins.
///
/// Gaps are allowed: they appear when a fact was retired outright and the
/// attribute was later given again.
pub fn verify_timeline(history: &[PunktInformation]) -> Result<()> {
  for pi in history {
    if pi.registrering_til.is_some() != pi.sagsevent_til_id.is_some() {
      return Err(Error::BrokenTimeline {
        objektid: pi.objektid,
        reason:   "registreringtil and sagseventtilid disagree",
      });
    }
    if let Some(til) = pi.registrering_til
      && til < pi.registrering_fra
    {
      return Err(Error::BrokenTimeline {
        objektid: pi.objektid,
        reason:   "closed before it was opened",
      });
    }
  }

  for pair in history.windows(2) {
    let (prev, next) = (&pair[0], &pair[1]);
    let Some(til) = prev.registrering_til else {
      return Err(Error::AlreadyOpen {
        punkt_id: prev.punkt_id,
        infotype: prev.infotype.clone(),
      });
    };
    if next.registrering_fra < til {
      return Err(Error::BrokenTimeline {
        objektid: next.objektid,
        reason:   "overlaps its predecessor",
      });
    }
    if prev.sagsevent_til_id == Some(next.sagsevent_fra_id)
      && til != next.registrering_fra
    {
      return Err(Error::BrokenTimeline {
        objektid: next.objektid,
        reason:   "superseded with a gap",
      });
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone as _};

  use super::*;
  use crate::punktinfo::LANDSNR;

  fn ts(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap()
  }

  fn event(eventtype: EventType, h: u32) -> Sagsevent {
    Sagsevent::new(Uuid::new_v4(), eventtype, "test").at(ts(h))
  }

  fn open_row(objektid: i64, punkt_id: Uuid, infotype: &str, h: u32) -> PunktInformation {
    Opening {
      punkt_id,
      infotype: infotype.into(),
      tekst: Some("v".into()),
      tal: None,
      registrering_fra: ts(h),
      sagsevent_fra_id: Uuid::new_v4(),
    }
    .into_punktinformation(objektid)
  }

  #[test]
  fn first_fact_is_simply_opened() {
    let punkt = Uuid::new_v4();
    let ev = event(EventType::PunktinfoTilfoejet, 1);
    let plan = plan_commit(
      &ev,
      &[NewPunktInformation::tekst(punkt, LANDSNR, "K-12-1231")],
      &[],
    )
    .unwrap();

    assert!(plan.closures.is_empty());
    assert_eq!(plan.openings.len(), 1);
    assert_eq!(plan.openings[0].registrering_fra, ev.registrering_fra);
    assert_eq!(plan.openings[0].sagsevent_fra_id, ev.id);
  }

  #[test]
  fn supersession_closes_predecessor_with_the_same_sagsevent() {
    let punkt = Uuid::new_v4();
    let mut old = open_row(7, punkt, LANDSNR, 1);
    let ev = event(EventType::PunktinfoTilfoejet, 2);

    let plan = plan_commit(
      &ev,
      &[NewPunktInformation::tekst(punkt, LANDSNR, "K-22-2231")],
      std::slice::from_ref(&old),
    )
    .unwrap();

    assert_eq!(plan.closures, vec![Closure {
      objektid:         7,
      registrering_til: ev.registrering_fra,
      sagsevent_til_id: ev.id,
    }]);

    plan.closures[0].apply(&mut old);
    let new = plan.openings[0].clone().into_punktinformation(8);
    assert_eq!(old.registrering_til, Some(new.registrering_fra));
    assert_eq!(old.sagsevent_til_id, Some(new.sagsevent_fra_id));
    verify_timeline(&[old, new]).unwrap();
  }

  #[test]
  fn other_infotypes_are_left_open() {
    let punkt = Uuid::new_v4();
    let beskrivelse = open_row(1, punkt, "ATTR:beskrivelse", 1);
    let plan = plan_commit(
      &event(EventType::PunktinfoTilfoejet, 2),
      &[NewPunktInformation::tekst(punkt, LANDSNR, "K-22-2231")],
      &[beskrivelse],
    )
    .unwrap();
    assert!(plan.closures.is_empty());
  }

  #[test]
  fn double_open_in_one_sagsevent_is_rejected() {
    let punkt = Uuid::new_v4();
    let err = plan_commit(
      &event(EventType::PunktinfoTilfoejet, 1),
      &[
        NewPunktInformation::tekst(punkt, LANDSNR, "a"),
        NewPunktInformation::tekst(punkt, LANDSNR, "b"),
      ],
      &[],
    )
    .unwrap_err();
    assert!(matches!(err, Error::AlreadyOpen { .. }));
  }

  #[test]
  fn two_open_predecessors_are_rejected() {
    let punkt = Uuid::new_v4();
    let err = plan_commit(
      &event(EventType::PunktinfoTilfoejet, 3),
      &[NewPunktInformation::tekst(punkt, LANDSNR, "c")],
      &[open_row(1, punkt, LANDSNR, 1), open_row(2, punkt, LANDSNR, 2)],
    )
    .unwrap_err();
    assert!(matches!(err, Error::AlreadyOpen { .. }));
  }

  #[test]
  fn reentry_before_retirement_is_rejected() {
    let punkt = Uuid::new_v4();
    let mut retired = open_row(1, punkt, "ATTR:bemærkning", 1);
    close(&event(EventType::PunktinfoFjernet, 5), &retired)
      .unwrap()
      .apply(&mut retired);
    let input = [NewPunktInformation::tekst(punkt, "ATTR:bemærkning", "igen")];

    let err = plan_commit(
      &event(EventType::PunktinfoTilfoejet, 3),
      &input,
      std::slice::from_ref(&retired),
    )
    .unwrap_err();
    assert!(matches!(
      err,
      Error::TimelineRegression { objektid: 1, from, .. } if from == ts(5)
    ));

    // From the retirement onwards the attribute may be given again, with
    // nothing left to close.
    let plan = plan_commit(
      &event(EventType::PunktinfoTilfoejet, 5),
      &input,
      std::slice::from_ref(&retired),
    )
    .unwrap();
    assert!(plan.closures.is_empty());
    assert_eq!(plan.openings.len(), 1);
  }

  #[test]
  fn close_twice_is_rejected() {
    let mut fact = open_row(1, Uuid::new_v4(), "ATTR:beskrivelse", 1);
    let ev = event(EventType::PunktinfoFjernet, 2);

    close(&ev, &fact).unwrap().apply(&mut fact);
    assert!(!fact.is_open());

    let again = event(EventType::PunktinfoFjernet, 3);
    assert!(matches!(close(&again, &fact), Err(Error::AlreadyClosed(1))));
  }

  #[test]
  fn closing_before_opening_is_rejected() {
    let fact = open_row(1, Uuid::new_v4(), "ATTR:beskrivelse", 5);
    let err = close(&event(EventType::PunktinfoFjernet, 4), &fact).unwrap_err();
    assert!(matches!(err, Error::TimelineRegression { objektid: 1, .. }));
  }

  #[test]
  fn closing_at_the_same_instant_is_allowed() {
    let fact = open_row(1, Uuid::new_v4(), "ATTR:beskrivelse", 5);
    let closure = close(&event(EventType::PunktinfoFjernet, 5), &fact).unwrap();
    assert_eq!(closure.registrering_til, fact.registrering_fra);
  }

  #[test]
  fn sagsevent_must_match_the_mutation() {
    let punkt = Uuid::new_v4();
    let input = [NewPunktInformation::flag(punkt, "ATTR:tabtgået")];

    let removed = event(EventType::PunktinfoFjernet, 1);
    assert!(matches!(
      plan_commit(&removed, &input, &[]),
      Err(Error::EventTypeMismatch { .. })
    ));

    let added = event(EventType::PunktinfoTilfoejet, 1);
    assert!(matches!(
      plan_commit(&added, &[], &[]),
      Err(Error::NoPunktInformation(EventType::PunktinfoTilfoejet))
    ));

    let comment = event(EventType::Kommentar, 1);
    assert_eq!(plan_commit(&comment, &[], &[]).unwrap(), CommitPlan::default());
    assert!(plan_commit(&comment, &input, &[]).is_err());
  }

  #[test]
  fn timeline_with_retirement_gap_verifies() {
    let punkt = Uuid::new_v4();
    let mut first = open_row(1, punkt, LANDSNR, 1);
    close(&event(EventType::PunktinfoFjernet, 2), &first)
      .unwrap()
      .apply(&mut first);
    let second = open_row(2, punkt, LANDSNR, 4);
    verify_timeline(&[first, second]).unwrap();
  }

  #[test]
  fn timeline_rejects_overlap_and_double_open() {
    let punkt = Uuid::new_v4();
    let a = open_row(1, punkt, LANDSNR, 1);
    let b = open_row(2, punkt, LANDSNR, 2);
    assert!(matches!(
      verify_timeline(&[a.clone(), b.clone()]),
      Err(Error::AlreadyOpen { .. })
    ));

    let mut closed_late = a;
    closed_late.registrering_til = Some(ts(3));
    closed_late.sagsevent_til_id = Some(Uuid::new_v4());
    assert!(matches!(
      verify_timeline(&[closed_late, b]),
      Err(Error::BrokenTimeline { objektid: 2, .. })
    ));
  }

  #[test]
  fn timeline_rejects_half_closed_rows() {
    let mut row = open_row(1, Uuid::new_v4(), LANDSNR, 1);
    row.registrering_til = Some(ts(1) + Duration::hours(1));
    assert!(matches!(
      verify_timeline(&[row]),
      Err(Error::BrokenTimeline { objektid: 1, .. })
    ));
  }
}
