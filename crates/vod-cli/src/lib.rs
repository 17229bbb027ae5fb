//! Support code for the `vod` binary: runtime settings, rule loading and the
//! notification sink.

use std::{
  collections::BTreeMap,
  convert::Infallible,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use vod_core::{
  batch::Notifier,
  church::Church,
  daily::ResolvedVerse,
  repetition::DEFAULT_WINDOW_DAYS,
  rules::ContextRules,
  selector::{DEFAULT_LANGUAGE, DEFAULT_VERSION},
  verse::{NewVerse, NewVersion},
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `vod.toml` and `VOD_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  #[serde(default = "default_version")]
  pub default_version:        String,
  #[serde(default = "default_language")]
  pub default_language:       String,
  #[serde(default = "default_window_days")]
  pub repetition_window_days: u32,
  /// TOML file replacing the built-in context rules.
  #[serde(default)]
  pub rules_path:             Option<PathBuf>,
}

fn default_store_path() -> PathBuf { PathBuf::from("vod.sqlite3") }
fn default_version() -> String { DEFAULT_VERSION.to_owned() }
fn default_language() -> String { DEFAULT_LANGUAGE.to_owned() }
fn default_window_days() -> u32 { DEFAULT_WINDOW_DAYS }

impl Settings {
  /// Layer an optional config file under `VOD_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("VOD"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  /// The configured rule tables, or the built-in ones.
  pub fn rules(&self) -> anyhow::Result<ContextRules> {
    match &self.rules_path {
      Some(path) => load_rules(path),
      None => Ok(ContextRules::default()),
    }
  }
}

/// Read [`ContextRules`] from a TOML file.
pub fn load_rules(path: &Path) -> anyhow::Result<ContextRules> {
  config::Config::builder()
    .add_source(config::File::from(path))
    .build()
    .with_context(|| format!("failed to read rules file {path:?}"))?
    .try_deserialize()
    .with_context(|| format!("invalid rules in {path:?}"))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Import files ─────────────────────────────────────────────────────────────

/// A bible version as a JSON document: metadata plus its verses in reading
/// order.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionFile {
  #[serde(flatten)]
  pub version: NewVersion,
  pub verses:  Vec<NewVerse>,
}

// ─── Notifications ────────────────────────────────────────────────────────────

const MESSAGE_TITLE: &str = "Verset du jour";
const MAX_BODY_TEXT: usize = 140;

/// The push message announcing a verse of the day to one church's members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseMessage {
  pub topic: String,
  pub title: String,
  pub body:  String,
  pub data:  BTreeMap<String, String>,
}

impl VerseMessage {
  pub fn new(church: &Church, verse: &ResolvedVerse) -> Self {
    let data = BTreeMap::from([
      ("type".to_owned(), "VERSE_DU_JOUR".to_owned()),
      ("reference".to_owned(), verse.reference.clone()),
      ("text".to_owned(), verse.text.clone()),
      ("date".to_owned(), verse.date.to_string()),
      ("version".to_owned(), verse.version.clone()),
      ("lang".to_owned(), verse.language.clone()),
    ]);
    Self {
      topic: format!("eglise_{}", church.church_id),
      title: MESSAGE_TITLE.to_owned(),
      body: message_body(&verse.reference, &verse.text),
      data,
    }
  }
}

/// `"<reference> — <text>"`, with whitespace collapsed and the text cut to
/// [`MAX_BODY_TEXT`] characters.
fn message_body(reference: &str, text: &str) -> String {
  let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
  let text = if text.chars().count() > MAX_BODY_TEXT {
    let cut: String = text.chars().take(MAX_BODY_TEXT - 1).collect();
    format!("{}…", cut.trim_end())
  } else {
    text
  };
  format!("{reference} — {text}")
}

/// Logs each message instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = Infallible;

  async fn notify(&self, church: &Church, verse: &ResolvedVerse) -> Result<(), Infallible> {
    let message = VerseMessage::new(church, verse);
    tracing::info!(
      topic = %message.topic,
      title = %message.title,
      body = %message.body,
      "verse of the day notification"
    );
    Ok(())
  }
}
