//! [`SqliteStore`], the SQLite implementation of [`VerseStore`].

use std::{collections::BTreeMap, path::Path};

use chrono::{NaiveDate, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use sha2::{Digest, Sha256};

use vod_core::{
  church::{Church, ChurchEvent, DisplayedVerse},
  corpus::PoolFilter,
  daily::{DailyVerse, NewDailyVerse, VerseUsageRecord},
  store::VerseStore,
  verse::{BibleVerse, BibleVersion, NewVerse, NewVersion},
};

use crate::{
  Error, Result,
  encode::{
    DAILY_COLUMNS, RawChurch, RawDailyVerse, RawEvent, RawUsage, RawVersion, VERSE_COLUMNS,
    VERSION_COLUMNS, encode_date, encode_datetime, encode_dt, encode_tags, verse_from_row,
  },
  schema::SCHEMA,
};

// ─── SQL ─────────────────────────────────────────────────────────────────────

/// Get-or-create: a concurrent writer that got there first wins.
const INSERT_DAILY_IF_ABSENT: &str = "
  INSERT INTO daily_verses (
    date, church_id, version_code, language, context_key, text, reference, created_at
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
  ON CONFLICT (date, church_id) DO NOTHING";

/// Forced recomputation: replace the resolved fields, keep `created_at`.
const UPSERT_DAILY: &str = "
  INSERT INTO daily_verses (
    date, church_id, version_code, language, context_key, text, reference, created_at
  ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
  ON CONFLICT (date, church_id) DO UPDATE SET
    version_code = excluded.version_code,
    language     = excluded.language,
    context_key  = excluded.context_key,
    text         = excluded.text,
    reference    = excluded.reference";

const CHURCH_COLUMNS: &str = "church_id, name, verse_date, verse_text, verse_reference";
const EVENT_COLUMNS: &str = "church_id, title, starts_at, ends_at, tags";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A verse-of-the-day store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All writes
/// go through one connection thread, so a transaction is never interleaved
/// with another writer from the same process.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
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

  // ── Import ────────────────────────────────────────────────────────────────

  /// Create or refresh a version and its verses in one transaction.
  ///
  /// Existing verses keep their position; only their text is replaced. The
  /// version's `total_verses` and `etag` are recomputed from the full,
  /// ordered verse list.
  pub async fn import_version(
    &self,
    version: NewVersion,
    verses: Vec<NewVerse>,
  ) -> Result<BibleVersion> {
    let now = encode_dt(Utc::now());

    let raw: RawVersion = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO bible_versions (code, name, language, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (code) DO UPDATE SET
             name       = excluded.name,
             language   = excluded.language,
             updated_at = excluded.updated_at",
          rusqlite::params![version.code, version.name, version.language, now],
        )?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO bible_verses (version_code, book, chapter, verse, text)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (version_code, book, chapter, verse) DO UPDATE SET
               text = excluded.text",
          )?;
          for v in &verses {
            stmt.execute(rusqlite::params![version.code, v.book, v.chapter, v.verse, v.text])?;
          }
        }

        let (total, etag) = {
          let mut stmt = tx.prepare(
            "SELECT book, chapter, verse, text FROM bible_verses
             WHERE version_code = ?1 ORDER BY verse_id",
          )?;
          let mut rows = stmt.query(rusqlite::params![version.code])?;
          let mut hasher = Sha256::new();
          let mut total: u32 = 0;
          while let Some(row) = rows.next()? {
            let book: String = row.get(0)?;
            let chapter: u32 = row.get(1)?;
            let verse: u32 = row.get(2)?;
            let text: String = row.get(3)?;
            hasher.update(format!("{book}|{chapter}|{verse}|{text}\n").as_bytes());
            total += 1;
          }
          (total, hex::encode(hasher.finalize()))
        };

        tx.execute(
          "UPDATE bible_versions SET total_verses = ?2, etag = ?3 WHERE code = ?1",
          rusqlite::params![version.code, total, etag],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {VERSION_COLUMNS} FROM bible_versions WHERE code = ?1"),
          rusqlite::params![version.code],
          RawVersion::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    Ok(raw.into_version())
  }

  // ── Churches ──────────────────────────────────────────────────────────────

  /// Create a church with no events and no displayed verse.
  pub async fn add_church(&self, name: impl Into<String>) -> Result<Church> {
    let name = name.into();
    let name_param = name.clone();

    let church_id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO churches (name) VALUES (?1)",
          rusqlite::params![name_param],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Church::new(church_id, name))
  }

  pub async fn add_event(&self, church_id: i64, event: ChurchEvent) -> Result<()> {
    let starts_at = encode_datetime(event.starts_at);
    let ends_at = encode_datetime(event.ends_at);
    let tags = encode_tags(&event.tags)?;
    let title = event.title;

    let exists: bool = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM churches WHERE church_id = ?1",
            rusqlite::params![church_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if exists {
          conn.execute(
            "INSERT INTO church_events (church_id, title, starts_at, ends_at, tags)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![church_id, title, starts_at, ends_at, tags],
          )?;
        }
        Ok(exists)
      })
      .await?;

    if !exists {
      return Err(Error::ChurchNotFound(church_id));
    }
    Ok(())
  }

  async fn events_by_church(&self, church_id: Option<i64>) -> Result<BTreeMap<i64, Vec<ChurchEvent>>> {
    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(id) = church_id {
          let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM church_events
             WHERE church_id = ?1 ORDER BY starts_at, event_id"
          ))?;
          stmt
            .query_map(rusqlite::params![id], RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM church_events ORDER BY church_id, starts_at, event_id"
          ))?;
          stmt
            .query_map([], RawEvent::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    let mut grouped: BTreeMap<i64, Vec<ChurchEvent>> = BTreeMap::new();
    for raw in raws {
      let church_id = raw.church_id;
      grouped.entry(church_id).or_default().push(raw.into_event()?);
    }
    Ok(grouped)
  }
}

// ─── VerseStore impl ─────────────────────────────────────────────────────────

impl VerseStore for SqliteStore {
  type Error = Error;

  // ── Corpus ────────────────────────────────────────────────────────────────

  async fn get_version(&self, code: &str) -> Result<Option<BibleVersion>> {
    let code = code.to_owned();

    let raw: Option<RawVersion> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM bible_versions WHERE code = ?1"),
            rusqlite::params![code],
            RawVersion::from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawVersion::into_version))
  }

  async fn first_version(&self) -> Result<Option<BibleVersion>> {
    let raw: Option<RawVersion> = self
      .conn
      .call(|conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM bible_versions ORDER BY code LIMIT 1"),
            [],
            RawVersion::from_row,
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(RawVersion::into_version))
  }

  async fn verses_for(&self, version_code: &str, filter: &PoolFilter) -> Result<Vec<BibleVerse>> {
    let version_code = version_code.to_owned();
    let books = filter.books.clone();

    let verses: Vec<BibleVerse> = self
      .conn
      .call(move |conn| {
        // Book restriction is pushed into SQL; keywords and length are
        // checked in Rust for Unicode-aware case folding.
        let mut sql =
          format!("SELECT {VERSE_COLUMNS} FROM bible_verses WHERE version_code = ?1");
        if !books.is_empty() {
          let placeholders = (0..books.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
          sql.push_str(&format!(" AND book IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY verse_id");

        let mut stmt = conn.prepare(&sql)?;
        let params = std::iter::once(version_code).chain(books);
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), verse_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      verses
        .into_iter()
        .filter(|v| filter.matches_text(&v.text))
        .collect(),
    )
  }

  // ── Daily cache ───────────────────────────────────────────────────────────

  async fn get_daily_verse(&self, church_id: i64, date: NaiveDate) -> Result<Option<DailyVerse>> {
    let date_str = encode_date(date);

    let raw: Option<RawDailyVerse> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {DAILY_COLUMNS} FROM daily_verses WHERE date = ?1 AND church_id = ?2"
            ),
            rusqlite::params![date_str, church_id],
            RawDailyVerse::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawDailyVerse::into_daily_verse).transpose()
  }

  async fn commit_resolution(&self, input: NewDailyVerse, overwrite: bool) -> Result<DailyVerse> {
    let date_str = encode_date(input.date);
    let created_at = encode_dt(Utc::now());

    let raw: RawDailyVerse = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front so another process cannot
        // slip a row in between the upsert and the read-back.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = if overwrite { UPSERT_DAILY } else { INSERT_DAILY_IF_ABSENT };
        let written = tx.execute(
          sql,
          rusqlite::params![
            date_str,
            input.church_id,
            input.version_code,
            input.language,
            input.context_key,
            input.text,
            input.reference,
            created_at,
          ],
        )?;

        if written > 0 {
          tx.execute(
            "INSERT OR IGNORE INTO verse_usage (
               church_id, used_on, version_code, book, chapter, verse
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
              input.church_id,
              date_str,
              input.version_code,
              input.key.book,
              input.key.chapter,
              input.key.verse,
            ],
          )?;
        }

        let raw = tx.query_row(
          &format!("SELECT {DAILY_COLUMNS} FROM daily_verses WHERE date = ?1 AND church_id = ?2"),
          rusqlite::params![date_str, input.church_id],
          RawDailyVerse::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_daily_verse()
  }

  async fn daily_verse_history(&self, church_id: i64, limit: usize) -> Result<Vec<DailyVerse>> {
    let limit_val = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawDailyVerse> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DAILY_COLUMNS} FROM daily_verses
           WHERE church_id = ?1 ORDER BY date DESC LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![church_id, limit_val], RawDailyVerse::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDailyVerse::into_daily_verse).collect()
  }

  // ── Usage log ─────────────────────────────────────────────────────────────

  async fn usage_between(
    &self,
    church_id: i64,
    from: NaiveDate,
    until: NaiveDate,
  ) -> Result<Vec<VerseUsageRecord>> {
    let from_str = encode_date(from);
    let until_str = encode_date(until);

    let raws: Vec<RawUsage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT church_id, used_on, version_code, book, chapter, verse
           FROM verse_usage
           WHERE church_id = ?1 AND used_on >= ?2 AND used_on < ?3
           ORDER BY used_on, usage_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![church_id, from_str, until_str], RawUsage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUsage::into_record).collect()
  }

  // ── Churches ──────────────────────────────────────────────────────────────

  async fn list_churches(&self) -> Result<Vec<Church>> {
    let raws: Vec<RawChurch> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {CHURCH_COLUMNS} FROM churches ORDER BY church_id"))?;
        let rows = stmt
          .query_map([], RawChurch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut events = self.events_by_church(None).await?;
    raws
      .into_iter()
      .map(|raw| {
        let church_events = events.remove(&raw.church_id).unwrap_or_default();
        raw.into_church(church_events)
      })
      .collect()
  }

  async fn get_church(&self, church_id: i64) -> Result<Option<Church>> {
    let raw: Option<RawChurch> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CHURCH_COLUMNS} FROM churches WHERE church_id = ?1"),
            rusqlite::params![church_id],
            RawChurch::from_row,
          )
          .optional()?)
      })
      .await?;

    let Some(raw) = raw else {
      return Ok(None);
    };
    let events = self
      .events_by_church(Some(church_id))
      .await?
      .remove(&church_id)
      .unwrap_or_default();
    raw.into_church(events).map(Some)
  }

  async fn set_displayed_verse(&self, church_id: i64, displayed: DisplayedVerse) -> Result<()> {
    let date_str = encode_date(displayed.date);

    let updated: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE churches
           SET verse_date = ?2, verse_text = ?3, verse_reference = ?4
           WHERE church_id = ?1",
          rusqlite::params![church_id, date_str, displayed.text, displayed.reference],
        )?)
      })
      .await?;

    if updated == 0 {
      return Err(Error::ChurchNotFound(church_id));
    }
    Ok(())
  }
}
