//! SQL schema for the FIRE SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.
//!
//! Timestamps are fixed-width RFC 3339 strings (microseconds, `Z` suffix), so
//! text comparison is chronological comparison.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS` / `OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS sag (
    id              TEXT PRIMARY KEY,
    navn            TEXT NOT NULL UNIQUE,
    behandler       TEXT NOT NULL,
    beskrivelse     TEXT NOT NULL DEFAULT '',
    registreringfra TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sagsevent (
    id              TEXT PRIMARY KEY,
    sagid           TEXT NOT NULL REFERENCES sag(id),
    eventtype       TEXT NOT NULL,   -- 'PUNKT_OPRETTET' | 'PUNKTINFO_TILFOEJET' | ...
    registreringfra TEXT NOT NULL,
    beskrivelse     TEXT NOT NULL CHECK (trim(beskrivelse) != '')
);

CREATE TABLE IF NOT EXISTS punktinfotype (
    infotypeid  INTEGER PRIMARY KEY AUTOINCREMENT,
    infotype    TEXT NOT NULL UNIQUE,
    anvendelse  TEXT NOT NULL,       -- 'FLAG' | 'TAL' | 'TEKST'
    beskrivelse TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS punkt (
    id              TEXT PRIMARY KEY,
    registreringfra TEXT NOT NULL,
    registreringtil TEXT,
    sagseventfraid  TEXT NOT NULL REFERENCES sagsevent(id),
    sagseventtilid  TEXT REFERENCES sagsevent(id),
    CHECK ((registreringtil IS NULL) = (sagseventtilid IS NULL))
);

-- Point information is append-only: rows are inserted open and closed once
-- by stamping registreringtil/sagseventtilid. Nothing else is ever updated
-- and nothing is deleted; the triggers below make that a hard rule.
CREATE TABLE IF NOT EXISTS punktinfo (
    objektid        INTEGER PRIMARY KEY AUTOINCREMENT,
    punktid         TEXT NOT NULL REFERENCES punkt(id),
    infotypeid      INTEGER NOT NULL REFERENCES punktinfotype(infotypeid),
    tekst           TEXT,
    tal             REAL,
    registreringfra TEXT NOT NULL,
    registreringtil TEXT,
    sagseventfraid  TEXT NOT NULL REFERENCES sagsevent(id),
    sagseventtilid  TEXT REFERENCES sagsevent(id),
    CHECK ((registreringtil IS NULL) = (sagseventtilid IS NULL)),
    CHECK (registreringtil IS NULL OR registreringtil >= registreringfra)
);

-- At most one open fact per (punkt, infotype).
CREATE UNIQUE INDEX IF NOT EXISTS punktinfo_open_idx
    ON punktinfo(punktid, infotypeid) WHERE registreringtil IS NULL;
CREATE INDEX IF NOT EXISTS punktinfo_punkt_idx  ON punktinfo(punktid);
CREATE INDEX IF NOT EXISTS sagsevent_sag_idx    ON sagsevent(sagid);

CREATE TRIGGER IF NOT EXISTS punktinfo_immutable
BEFORE UPDATE OF objektid, punktid, infotypeid, tekst, tal,
                 registreringfra, sagseventfraid ON punktinfo
BEGIN
    SELECT RAISE(ABORT, 'punktinfo: column is immutable');
END;

CREATE TRIGGER IF NOT EXISTS punktinfo_no_reopen
BEFORE UPDATE OF registreringtil, sagseventtilid ON punktinfo
WHEN OLD.registreringtil IS NOT NULL
BEGIN
    SELECT RAISE(ABORT, 'punktinfo: row is already closed');
END;

CREATE TRIGGER IF NOT EXISTS punktinfo_no_delete
BEFORE DELETE ON punktinfo
BEGIN
    SELECT RAISE(ABORT, 'punktinfo: rows are never deleted');
END;

CREATE TRIGGER IF NOT EXISTS sagsevent_immutable
BEFORE UPDATE ON sagsevent
BEGIN
    SELECT RAISE(ABORT, 'sagsevent: rows are immutable');
END;

CREATE TRIGGER IF NOT EXISTS sagsevent_no_delete
BEFORE DELETE ON sagsevent
BEGIN
    SELECT RAISE(ABORT, 'sagsevent: rows are never deleted');
END;

INSERT OR IGNORE INTO punktinfotype (infotype, anvendelse, beskrivelse) VALUES
    ('ATTR:beskrivelse',        'TEKST', 'Beskrivelse af punktet'),
    ('ATTR:muligt_datumstabil', 'FLAG',  'Punktet er muligvis datumstabilt'),
    ('ATTR:bemærkning',         'TEKST', 'Fri bemærkning'),
    ('ATTR:hjælpepunkt',        'FLAG',  'Hjælpepunkt'),
    ('ATTR:tabtgået',           'FLAG',  'Punktet er tabtgået'),
    ('ATTR:teknikpunkt',        'FLAG',  'Teknikpunkt'),
    ('ATTR:MV_punkt',           'FLAG',  'Punkt til måling af vandstand'),
    ('ATTR:fundamentalpunkt',   'FLAG',  'Fundamentalpunkt'),
    ('ATTR:tinglysningsnr',     'TEKST', 'Tinglysningsnummer'),
    ('AFM:naturlig',            'FLAG',  'Naturlig afmærkning'),
    ('AFM:højde_over_terræn',   'TAL',   'Afmærkningens højde over terræn [m]'),
    ('IDENT:landsnr',           'TEKST', 'Landsnummer'),
    ('IDENT:GNSS',              'TEKST', 'GNSS-ident'),
    ('IDENT:GI',                'TEKST', 'GI-nummer'),
    ('IDENT:station',           'TEKST', 'Stationsnummer'),
    ('IDENT:refgeo_id',         'TEKST', 'Id i REFGEO'),
    ('REGION:DK',               'FLAG',  'Punktet ligger i Danmark'),
    ('NET:10KM',                'TEKST', '10 km-net'),
    ('SKITSE:master_md5',       'TEKST', 'MD5 af masterskitse'),
    ('SKITSE:master_sti',       'TEKST', 'Sti til masterskitse'),
    ('SKITSE:png_md5',          'TEKST', 'MD5 af png-skitse'),
    ('SKITSE:png_sti',          'TEKST', 'Sti til png-skitse');

PRAGMA user_version = 1;
";
