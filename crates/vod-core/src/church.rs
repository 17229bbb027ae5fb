//! Churches, the tenants a daily verse is resolved for.
//!
//! Churches are owned by the wider application. The selector reads the
//! identity and the upcoming tagged events; the batch job additionally
//! reads and updates the verse currently displayed to members.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A scheduled church event. Tags are short free-form theme strings
/// (e.g. `"mariage"`); only those known to the rule tables influence
/// selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurchEvent {
  pub title:     String,
  pub starts_at: NaiveDateTime,
  pub ends_at:   NaiveDateTime,
  pub tags:      Vec<String>,
}

impl ChurchEvent {
  /// `true` if the event's `[starts_at, ends_at]` span intersects the
  /// half-open window `[start, end)`.
  pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
    self.starts_at < end && self.ends_at >= start
  }
}

/// The verse members currently see for this church.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayedVerse {
  pub date:      NaiveDate,
  pub text:      String,
  pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Church {
  pub church_id: i64,
  pub name:      String,
  #[serde(default)]
  pub events:    Vec<ChurchEvent>,
  pub displayed: Option<DisplayedVerse>,
}

impl Church {
  pub fn new(church_id: i64, name: impl Into<String>) -> Self {
    Self {
      church_id,
      name: name.into(),
      events: Vec::new(),
      displayed: None,
    }
  }

  /// Events overlapping `[start, end)`, most recent start first.
  pub fn events_in_window(
    &self,
    start: NaiveDateTime,
    end: NaiveDateTime,
  ) -> Vec<&ChurchEvent> {
    let mut events: Vec<&ChurchEvent> = self
      .events
      .iter()
      .filter(|e| e.overlaps(start, end))
      .collect();
    events.sort_by(|a, b| b.starts_at.cmp(&a.starts_at));
    events
  }
}
