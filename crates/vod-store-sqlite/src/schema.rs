//! SQL schema for the verse-of-the-day SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Written by the importer only; read-only to the selector.
CREATE TABLE IF NOT EXISTS bible_versions (
    code         TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    language     TEXT NOT NULL DEFAULT 'fr',
    total_verses INTEGER NOT NULL DEFAULT 0,
    etag         TEXT NOT NULL DEFAULT '',   -- SHA-256 over the ordered verses
    updated_at   TEXT NOT NULL
);

-- verse_id gives the stable order the picker indexes into.
CREATE TABLE IF NOT EXISTS bible_verses (
    verse_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    version_code TEXT NOT NULL REFERENCES bible_versions(code) ON DELETE CASCADE,
    book         TEXT NOT NULL,
    chapter      INTEGER NOT NULL,
    verse        INTEGER NOT NULL,
    text         TEXT NOT NULL,
    UNIQUE (version_code, book, chapter, verse)
);

CREATE TABLE IF NOT EXISTS churches (
    church_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    verse_date      TEXT,            -- displayed verse; all three set together
    verse_text      TEXT,
    verse_reference TEXT
);

CREATE TABLE IF NOT EXISTS church_events (
    event_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    church_id INTEGER NOT NULL REFERENCES churches(church_id) ON DELETE CASCADE,
    title     TEXT NOT NULL,
    starts_at TEXT NOT NULL,         -- naive local date-time
    ends_at   TEXT NOT NULL,
    tags      TEXT NOT NULL DEFAULT '[]'
);

-- One resolution per (date, church). Never deleted: audit trail.
CREATE TABLE IF NOT EXISTS daily_verses (
    daily_verse_id INTEGER PRIMARY KEY AUTOINCREMENT,
    date           TEXT NOT NULL,    -- YYYY-MM-DD
    church_id      INTEGER NOT NULL,
    version_code   TEXT NOT NULL,
    language       TEXT NOT NULL,
    context_key    TEXT NOT NULL,
    text           TEXT NOT NULL,
    reference      TEXT NOT NULL,
    created_at     TEXT NOT NULL,    -- RFC 3339 UTC; server-assigned
    UNIQUE (date, church_id)
);

-- Append-only; keyed by the version-independent natural key.
CREATE TABLE IF NOT EXISTS verse_usage (
    usage_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    church_id    INTEGER NOT NULL,
    used_on      TEXT NOT NULL,
    version_code TEXT NOT NULL,
    book         TEXT NOT NULL,
    chapter      INTEGER NOT NULL,
    verse        INTEGER NOT NULL,
    UNIQUE (church_id, used_on, book, chapter, verse)
);

CREATE INDEX IF NOT EXISTS bible_verses_book_idx   ON bible_verses(version_code, book);
CREATE INDEX IF NOT EXISTS church_events_church_idx ON church_events(church_id);
CREATE INDEX IF NOT EXISTS verse_usage_church_idx  ON verse_usage(church_id, used_on);

PRAGMA user_version = 1;
";
