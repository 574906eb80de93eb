//! [`SqliteStore`]: the SQLite implementation of [`PunktStore`].

use std::{collections::HashSet, path::Path};

use chrono::{SubsecRound as _, Utc};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use fire_core::{
  lifecycle::{self, Closure, Opening},
  punkt::Punkt,
  punktinfo::{
    IDENT_PREFIX, NewPunktInformation, NewPunktInformationType,
    PunktInformation, PunktInformationType,
  },
  sag::{EventType, NewSag, Sag, Sagsevent},
  store::PunktStore,
};

use crate::{
  Result,
  encode::{
    INFOTYPE_COLUMNS, PUNKT_COLUMNS, PUNKTINFO_COLUMNS, RawInfotype, RawPunkt,
    RawPunktInformation, RawSag, RawSagsevent, SAG_COLUMNS, SAGSEVENT_COLUMNS,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A FIRE point register backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All
/// statements run on the connection's own thread, one call at a time; every
/// write runs in an `IMMEDIATE` transaction that is committed only if the
/// whole operation succeeds.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` against the connection outside any explicit transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside an `IMMEDIATE` transaction. The transaction is committed
  /// if `f` returns `Ok` and rolled back otherwise.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = f(&tx);
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await?
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn load_sag(conn: &Connection, id: Uuid) -> Result<Option<Sag>> {
  let raw = conn
    .query_row(
      &format!("SELECT {SAG_COLUMNS} FROM sag WHERE id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawSag::from_row,
    )
    .optional()?;
  raw.map(RawSag::into_sag).transpose()
}

fn load_sagsevent(conn: &Connection, id: Uuid) -> Result<Option<Sagsevent>> {
  let raw = conn
    .query_row(
      &format!("SELECT {SAGSEVENT_COLUMNS} FROM sagsevent WHERE id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawSagsevent::from_row,
    )
    .optional()?;
  raw.map(RawSagsevent::into_sagsevent).transpose()
}

fn load_punkt(conn: &Connection, id: Uuid) -> Result<Option<Punkt>> {
  let raw = conn
    .query_row(
      &format!("SELECT {PUNKT_COLUMNS} FROM punkt p WHERE p.id = ?1"),
      rusqlite::params![encode_uuid(id)],
      RawPunkt::from_row,
    )
    .optional()?;
  raw.map(RawPunkt::into_punkt).transpose()
}

fn load_infotype(conn: &Connection, name: &str) -> Result<Option<PunktInformationType>> {
  let raw = conn
    .query_row(
      &format!("SELECT {INFOTYPE_COLUMNS} FROM punktinfotype WHERE infotype = ?1"),
      rusqlite::params![name],
      RawInfotype::from_row,
    )
    .optional()?;
  raw.map(RawInfotype::into_infotype).transpose()
}

fn load_punktinfo(conn: &Connection, objektid: i64) -> Result<Option<PunktInformation>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {PUNKTINFO_COLUMNS}
         FROM punktinfo pi
         JOIN punktinfotype t ON t.infotypeid = pi.infotypeid
         WHERE pi.objektid = ?1"
      ),
      rusqlite::params![objektid],
      RawPunktInformation::from_row,
    )
    .optional()?;
  raw.map(RawPunktInformation::into_punktinformation).transpose()
}

/// Query point information rows; `filter` is appended after the join.
fn query_punktinfo(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> Result<Vec<PunktInformation>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {PUNKTINFO_COLUMNS}
     FROM punktinfo pi
     JOIN punktinfotype t ON t.infotypeid = pi.infotypeid
     {filter}"
  ))?;
  let raws = stmt
    .query_map(params, RawPunktInformation::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(RawPunktInformation::into_punktinformation)
    .collect()
}

/// The open rows of a `(punkt, infotype)` pair or, if none is open, its most
/// recently closed row.
fn load_latest(
  conn: &Connection,
  punkt_id: Uuid,
  infotypeid: i64,
) -> Result<Vec<PunktInformation>> {
  let punkt_id = encode_uuid(punkt_id);
  let open = query_punktinfo(
    conn,
    "WHERE pi.punktid = ?1 AND pi.infotypeid = ?2 AND pi.registreringtil IS NULL",
    rusqlite::params![punkt_id, infotypeid],
  )?;
  if !open.is_empty() {
    return Ok(open);
  }
  // Fixed-width RFC 3339 text sorts chronologically.
  query_punktinfo(
    conn,
    "WHERE pi.punktid = ?1 AND pi.infotypeid = ?2
     ORDER BY pi.registreringtil DESC, pi.objektid DESC
     LIMIT 1",
    rusqlite::params![punkt_id, infotypeid],
  )
}

/// Reject a sagsevent whose sag is unknown or which is already recorded.
fn check_sagsevent(conn: &Connection, sagsevent: &Sagsevent) -> Result<()> {
  if load_sag(conn, sagsevent.sag_id)?.is_none() {
    return Err(fire_core::Error::SagNotFound(sagsevent.sag_id.to_string()).into());
  }
  if load_sagsevent(conn, sagsevent.id)?.is_some() {
    return Err(fire_core::Error::DuplicateSagsevent(sagsevent.id).into());
  }
  Ok(())
}

fn insert_sagsevent(conn: &Connection, sagsevent: &Sagsevent) -> Result<()> {
  conn.execute(
    "INSERT INTO sagsevent (id, sagid, eventtype, registreringfra, beskrivelse)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![
      encode_uuid(sagsevent.id),
      encode_uuid(sagsevent.sag_id),
      sagsevent.eventtype.as_str(),
      encode_dt(sagsevent.registrering_fra),
      sagsevent.beskrivelse,
    ],
  )?;
  Ok(())
}

/// Stamp a closure onto its row. The `registreringtil IS NULL` guard makes a
/// concurrent double close fail here rather than silently overwrite.
fn apply_closure(conn: &Connection, closure: &Closure) -> Result<()> {
  let changed = conn.execute(
    "UPDATE punktinfo
     SET registreringtil = ?1, sagseventtilid = ?2
     WHERE objektid = ?3 AND registreringtil IS NULL",
    rusqlite::params![
      encode_dt(closure.registrering_til),
      encode_uuid(closure.sagsevent_til_id),
      closure.objektid,
    ],
  )?;
  if changed != 1 {
    return Err(fire_core::Error::AlreadyClosed(closure.objektid).into());
  }
  Ok(())
}

fn insert_opening(conn: &Connection, opening: &Opening, infotypeid: i64) -> Result<i64> {
  conn.execute(
    "INSERT INTO punktinfo (
       punktid, infotypeid, tekst, tal, registreringfra, sagseventfraid
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(opening.punkt_id),
      infotypeid,
      opening.tekst,
      opening.tal,
      encode_dt(opening.registrering_fra),
      encode_uuid(opening.sagsevent_fra_id),
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

// ─── Transactions ────────────────────────────────────────────────────────────

/// Truncate the timestamp to the microseconds it is stored with, so the rows
/// a mutation returns equal what is later read back.
fn at_persisted_precision(sagsevent: Sagsevent) -> Sagsevent {
  let registrering_fra = sagsevent.registrering_fra;
  sagsevent.at(registrering_fra)
}

/// Validate every reference, plan the commit, then write it.
///
/// Returns the opened rows and the number of closed predecessors.
fn commit_in(
  conn: &Connection,
  sagsevent: &Sagsevent,
  incoming: &[NewPunktInformation],
) -> Result<(Vec<PunktInformation>, usize)> {
  check_sagsevent(conn, sagsevent)?;

  let mut infotypeids = Vec::with_capacity(incoming.len());
  let mut loaded: HashSet<(Uuid, i64)> = HashSet::new();
  let mut latest = Vec::new();

  for input in incoming {
    let punkt = load_punkt(conn, input.punkt_id)?
      .ok_or(fire_core::Error::PunktNotFound(input.punkt_id))?;
    if !punkt.is_open() {
      return Err(fire_core::Error::PunktClosed(punkt.id).into());
    }
    if sagsevent.registrering_fra < punkt.registrering_fra {
      return Err(
        fire_core::Error::PunktRegression {
          punkt_id: punkt.id,
          from:     punkt.registrering_fra,
          at:       sagsevent.registrering_fra,
        }
        .into(),
      );
    }

    let infotype = load_infotype(conn, &input.infotype)?
      .ok_or_else(|| fire_core::Error::InfotypeNotFound(input.infotype.clone()))?;
    infotype.check_value(input.tekst.as_deref(), input.tal)?;

    if loaded.insert((punkt.id, infotype.infotypeid)) {
      latest.extend(load_latest(conn, punkt.id, infotype.infotypeid)?);
    }
    infotypeids.push(infotype.infotypeid);
  }

  let plan = lifecycle::plan_commit(sagsevent, incoming, &latest)?;

  insert_sagsevent(conn, sagsevent)?;
  for closure in &plan.closures {
    apply_closure(conn, closure)?;
  }

  // `plan_commit` yields one opening per input, in input order.
  let mut opened = Vec::with_capacity(plan.openings.len());
  for (opening, infotypeid) in plan.openings.into_iter().zip(infotypeids) {
    let objektid = insert_opening(conn, &opening, infotypeid)?;
    opened.push(opening.into_punktinformation(objektid));
  }

  Ok((opened, plan.closures.len()))
}

fn close_in(
  conn: &Connection,
  objektid: i64,
  sagsevent: &Sagsevent,
) -> Result<PunktInformation> {
  sagsevent.expect_type(EventType::PunktinfoFjernet)?;
  check_sagsevent(conn, sagsevent)?;

  let mut fact = load_punktinfo(conn, objektid)?
    .ok_or(fire_core::Error::PunktInformationNotFound(objektid))?;
  let closure = lifecycle::close(sagsevent, &fact)?;

  insert_sagsevent(conn, sagsevent)?;
  apply_closure(conn, &closure)?;
  closure.apply(&mut fact);
  Ok(fact)
}

fn create_punkt_in(conn: &Connection, sagsevent: &Sagsevent) -> Result<Punkt> {
  sagsevent.expect_type(EventType::PunktOprettet)?;
  check_sagsevent(conn, sagsevent)?;
  insert_sagsevent(conn, sagsevent)?;

  let punkt = Punkt {
    id:               Uuid::new_v4(),
    registrering_fra: sagsevent.registrering_fra,
    registrering_til: None,
    sagsevent_fra_id: sagsevent.id,
    sagsevent_til_id: None,
  };
  conn.execute(
    "INSERT INTO punkt (id, registreringfra, sagseventfraid) VALUES (?1, ?2, ?3)",
    rusqlite::params![
      encode_uuid(punkt.id),
      encode_dt(punkt.registrering_fra),
      encode_uuid(punkt.sagsevent_fra_id),
    ],
  )?;
  Ok(punkt)
}

// ─── PunktStore impl ─────────────────────────────────────────────────────────

impl PunktStore for SqliteStore {
  type Error = crate::Error;

  // ── Infotypes ─────────────────────────────────────────────────────────────

  async fn list_infotyper(&self) -> Result<Vec<PunktInformationType>> {
    self
      .read(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {INFOTYPE_COLUMNS} FROM punktinfotype ORDER BY infotype"
        ))?;
        let raws = stmt
          .query_map([], RawInfotype::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawInfotype::into_infotype).collect()
      })
      .await
  }

  async fn get_infotype(&self, name: String) -> Result<Option<PunktInformationType>> {
    self.read(move |conn| load_infotype(conn, &name)).await
  }

  async fn add_infotype(
    &self,
    input: NewPunktInformationType,
  ) -> Result<PunktInformationType> {
    let infotype = self
      .write(move |conn| {
        if load_infotype(conn, &input.name)?.is_some() {
          return Err(fire_core::Error::DuplicateInfotype(input.name).into());
        }
        conn.execute(
          "INSERT INTO punktinfotype (infotype, anvendelse, beskrivelse)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![input.name, input.anvendelse.as_str(), input.beskrivelse],
        )?;
        Ok(PunktInformationType {
          infotypeid:  conn.last_insert_rowid(),
          name:        input.name,
          anvendelse:  input.anvendelse,
          beskrivelse: input.beskrivelse,
        })
      })
      .await?;

    info!(infotype = %infotype.name, anvendelse = %infotype.anvendelse, "infotype added");
    Ok(infotype)
  }

  // ── Sager ─────────────────────────────────────────────────────────────────

  async fn create_sag(&self, input: NewSag) -> Result<Sag> {
    let sag = Sag {
      id:               Uuid::new_v4(),
      navn:             input.navn,
      behandler:        input.behandler,
      beskrivelse:      input.beskrivelse,
      registrering_fra: Utc::now().trunc_subsecs(6),
    };

    let row = sag.clone();
    self
      .write(move |conn| {
        let taken: Option<i64> = conn
          .query_row(
            "SELECT 1 FROM sag WHERE navn = ?1",
            rusqlite::params![row.navn],
            |r| r.get(0),
          )
          .optional()?;
        if taken.is_some() {
          return Err(fire_core::Error::DuplicateSag(row.navn).into());
        }
        conn.execute(
          "INSERT INTO sag (id, navn, behandler, beskrivelse, registreringfra)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(row.id),
            row.navn,
            row.behandler,
            row.beskrivelse,
            encode_dt(row.registrering_fra),
          ],
        )?;
        Ok(())
      })
      .await?;

    info!(sag = %sag.id, navn = %sag.navn, "sag created");
    Ok(sag)
  }

  async fn get_sag(&self, id: Uuid) -> Result<Option<Sag>> {
    self.read(move |conn| load_sag(conn, id)).await
  }

  async fn find_sag(&self, navn: String) -> Result<Option<Sag>> {
    self
      .read(move |conn| {
        let raw = conn
          .query_row(
            &format!("SELECT {SAG_COLUMNS} FROM sag WHERE navn = ?1"),
            rusqlite::params![navn],
            RawSag::from_row,
          )
          .optional()?;
        raw.map(RawSag::into_sag).transpose()
      })
      .await
  }

  async fn get_sagsevent(&self, id: Uuid) -> Result<Option<Sagsevent>> {
    self.read(move |conn| load_sagsevent(conn, id)).await
  }

  async fn list_sagsevents(&self, sag_id: Uuid) -> Result<Vec<Sagsevent>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SAGSEVENT_COLUMNS} FROM sagsevent
           WHERE sagid = ?1
           ORDER BY registreringfra, rowid"
        ))?;
        let raws = stmt
          .query_map(rusqlite::params![encode_uuid(sag_id)], RawSagsevent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawSagsevent::into_sagsevent).collect()
      })
      .await
  }

  // ── Punkter ───────────────────────────────────────────────────────────────

  async fn create_punkt(&self, sagsevent: Sagsevent) -> Result<Punkt> {
    let sagsevent = at_persisted_precision(sagsevent);
    let sagsevent_id = sagsevent.id;
    let punkt = self
      .write(move |conn| create_punkt_in(conn, &sagsevent))
      .await?;
    info!(punkt = %punkt.id, sagsevent = %sagsevent_id, "punkt created");
    Ok(punkt)
  }

  async fn get_punkt(&self, id: Uuid) -> Result<Option<Punkt>> {
    self.read(move |conn| load_punkt(conn, id)).await
  }

  async fn find_punkt(&self, ident: String) -> Result<Option<Punkt>> {
    let ident = ident.trim().to_owned();
    if let Ok(id) = Uuid::parse_str(&ident) {
      return self.get_punkt(id).await;
    }

    self
      .read(move |conn| {
        let raw = conn
          .query_row(
            &format!(
              "SELECT {PUNKT_COLUMNS}
               FROM punkt p
               JOIN punktinfo     pi ON pi.punktid   = p.id
               JOIN punktinfotype t  ON t.infotypeid = pi.infotypeid
               WHERE substr(t.infotype, 1, length(?2)) = ?2
                 AND pi.registreringtil IS NULL
                 AND pi.tekst = ?1
               ORDER BY pi.objektid
               LIMIT 1"
            ),
            rusqlite::params![ident, IDENT_PREFIX],
            RawPunkt::from_row,
          )
          .optional()?;
        raw.map(RawPunkt::into_punkt).transpose()
      })
      .await
  }

  // ── Point information ─────────────────────────────────────────────────────

  async fn commit_sagsevent(
    &self,
    sagsevent: Sagsevent,
    punktinformationer: Vec<NewPunktInformation>,
  ) -> Result<Vec<PunktInformation>> {
    debug!(
      sagsevent = %sagsevent.id,
      eventtype = %sagsevent.eventtype,
      facts = punktinformationer.len(),
      "committing sagsevent"
    );

    let sagsevent = at_persisted_precision(sagsevent);
    let (id, eventtype) = (sagsevent.id, sagsevent.eventtype);
    let (opened, closed) = self
      .write(move |conn| commit_in(conn, &sagsevent, &punktinformationer))
      .await?;

    info!(
      sagsevent = %id,
      eventtype = %eventtype,
      opened = opened.len(),
      closed,
      "sagsevent committed"
    );
    Ok(opened)
  }

  async fn close_punktinfo(
    &self,
    objektid: i64,
    sagsevent: Sagsevent,
  ) -> Result<PunktInformation> {
    let sagsevent = at_persisted_precision(sagsevent);
    let id = sagsevent.id;
    let fact = self
      .write(move |conn| close_in(conn, objektid, &sagsevent))
      .await?;
    info!(objektid, sagsevent = %id, infotype = %fact.infotype, "punktinfo closed");
    Ok(fact)
  }

  async fn get_punktinfo(&self, objektid: i64) -> Result<Option<PunktInformation>> {
    self.read(move |conn| load_punktinfo(conn, objektid)).await
  }

  async fn punktinformationer(
    &self,
    punkt_id: Uuid,
    include_closed: bool,
  ) -> Result<Vec<PunktInformation>> {
    self
      .read(move |conn| {
        let filter = if include_closed {
          "WHERE pi.punktid = ?1 ORDER BY pi.objektid"
        } else {
          "WHERE pi.punktid = ?1 AND pi.registreringtil IS NULL ORDER BY pi.objektid"
        };
        query_punktinfo(conn, filter, rusqlite::params![encode_uuid(punkt_id)])
      })
      .await
  }

  async fn historik(
    &self,
    punkt_id: Uuid,
    infotype: String,
  ) -> Result<Vec<PunktInformation>> {
    self
      .read(move |conn| {
        query_punktinfo(
          conn,
          "WHERE pi.punktid = ?1 AND t.infotype = ?2
           ORDER BY pi.registreringfra, pi.objektid",
          rusqlite::params![encode_uuid(punkt_id), infotype],
        )
      })
      .await
  }
}
