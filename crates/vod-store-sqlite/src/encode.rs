//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD`, event times as naive
//! `YYYY-MM-DDTHH:MM:SS`, and creation timestamps as RFC 3339 strings. Event
//! tags are stored as compact JSON.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use vod_core::{
  church::{Church, ChurchEvent, DisplayedVerse},
  daily::{DailyVerse, VerseUsageRecord},
  verse::{BibleVerse, BibleVersion, VerseKey},
};

use crate::{Error, Result};

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FMT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── NaiveDateTime ───────────────────────────────────────────────────────────

pub fn encode_datetime(dt: NaiveDateTime) -> String { dt.format(DATETIME_FMT).to_string() }

pub fn decode_datetime(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, DATETIME_FMT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Tags ────────────────────────────────────────────────────────────────────

pub fn encode_tags(tags: &[String]) -> Result<String> { Ok(serde_json::to_string(tags)?) }

pub fn decode_tags(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const VERSION_COLUMNS: &str = "code, name, language, total_verses, etag";

/// Raw values read directly from a `bible_versions` row.
pub struct RawVersion {
  pub code:         String,
  pub name:         String,
  pub language:     String,
  pub total_verses: u32,
  pub etag:         String,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      code:         row.get(0)?,
      name:         row.get(1)?,
      language:     row.get(2)?,
      total_verses: row.get(3)?,
      etag:         row.get(4)?,
    })
  }

  pub fn into_version(self) -> BibleVersion {
    BibleVersion {
      code:         self.code,
      name:         self.name,
      language:     self.language,
      total_verses: self.total_verses,
      etag:         self.etag,
    }
  }
}

pub const VERSE_COLUMNS: &str = "version_code, book, chapter, verse, text";

pub fn verse_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BibleVerse> {
  Ok(BibleVerse {
    version_code: row.get(0)?,
    book:         row.get(1)?,
    chapter:      row.get(2)?,
    verse:        row.get(3)?,
    text:         row.get(4)?,
  })
}

pub const DAILY_COLUMNS: &str =
  "date, church_id, version_code, language, context_key, text, reference, created_at";

/// Raw values read directly from a `daily_verses` row.
pub struct RawDailyVerse {
  pub date:         String,
  pub church_id:    i64,
  pub version_code: String,
  pub language:     String,
  pub context_key:  String,
  pub text:         String,
  pub reference:    String,
  pub created_at:   String,
}

impl RawDailyVerse {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      date:         row.get(0)?,
      church_id:    row.get(1)?,
      version_code: row.get(2)?,
      language:     row.get(3)?,
      context_key:  row.get(4)?,
      text:         row.get(5)?,
      reference:    row.get(6)?,
      created_at:   row.get(7)?,
    })
  }

  pub fn into_daily_verse(self) -> Result<DailyVerse> {
    Ok(DailyVerse {
      date:         decode_date(&self.date)?,
      church_id:    self.church_id,
      version_code: self.version_code,
      language:     self.language,
      context_key:  self.context_key,
      text:         self.text,
      reference:    self.reference,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `verse_usage` row.
pub struct RawUsage {
  pub church_id:    i64,
  pub used_on:      String,
  pub version_code: String,
  pub book:         String,
  pub chapter:      u32,
  pub verse:        u32,
}

impl RawUsage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      church_id:    row.get(0)?,
      used_on:      row.get(1)?,
      version_code: row.get(2)?,
      book:         row.get(3)?,
      chapter:      row.get(4)?,
      verse:        row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<VerseUsageRecord> {
    Ok(VerseUsageRecord {
      church_id:    self.church_id,
      used_on:      decode_date(&self.used_on)?,
      version_code: self.version_code,
      key:          VerseKey {
        book:    self.book,
        chapter: self.chapter,
        verse:   self.verse,
      },
    })
  }
}

/// Raw values read directly from a `churches` row.
pub struct RawChurch {
  pub church_id:       i64,
  pub name:            String,
  pub verse_date:      Option<String>,
  pub verse_text:      Option<String>,
  pub verse_reference: Option<String>,
}

impl RawChurch {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      church_id:       row.get(0)?,
      name:            row.get(1)?,
      verse_date:      row.get(2)?,
      verse_text:      row.get(3)?,
      verse_reference: row.get(4)?,
    })
  }

  pub fn into_church(self, events: Vec<ChurchEvent>) -> Result<Church> {
    let displayed = match (self.verse_date, self.verse_text, self.verse_reference) {
      (Some(date), Some(text), Some(reference)) => Some(DisplayedVerse {
        date: decode_date(&date)?,
        text,
        reference,
      }),
      _ => None,
    };
    Ok(Church {
      church_id: self.church_id,
      name: self.name,
      events,
      displayed,
    })
  }
}

/// Raw values read directly from a `church_events` row.
pub struct RawEvent {
  pub church_id: i64,
  pub title:     String,
  pub starts_at: String,
  pub ends_at:   String,
  pub tags:      String,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      church_id: row.get(0)?,
      title:     row.get(1)?,
      starts_at: row.get(2)?,
      ends_at:   row.get(3)?,
      tags:      row.get(4)?,
    })
  }

  pub fn into_event(self) -> Result<ChurchEvent> {
    Ok(ChurchEvent {
      title:     self.title,
      starts_at: decode_datetime(&self.starts_at)?,
      ends_at:   decode_datetime(&self.ends_at)?,
      tags:      decode_tags(&self.tags)?,
    })
  }
}
