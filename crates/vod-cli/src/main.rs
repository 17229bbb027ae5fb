//! `vod`: daily verse of the day selection for every church.
//!
//! # Usage
//!
//! ```
//! vod import lsg.json
//! vod pick --church 3
//! vod update-all --dry-run
//! vod history --church 3 --limit 7
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vod_cli::{LogNotifier, Settings, VersionFile, expand_tilde};
use vod_core::{
  batch::{BatchOptions, update_all_churches},
  selector::VerseOfDaySelector,
  store::VerseStore,
};
use vod_store_sqlite::SqliteStore;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "vod", version, about = "Verse of the day for churches")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "vod.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Import or update a bible version from a JSON file.
  Import {
    file: PathBuf,
  },

  /// Resolve the verse of the day for one church.
  Pick {
    #[arg(long)]
    church:  i64,
    /// Calendar day (YYYY-MM-DD); today by default.
    #[arg(long)]
    date:    Option<NaiveDate>,
    #[arg(long = "bibleversion")]
    version: Option<String>,
    #[arg(long)]
    lang:    Option<String>,
    /// Ignore the cached verse and select again.
    #[arg(long)]
    force:   bool,
  },

  /// Resolve, display and announce the verse of the day for every church.
  UpdateAll {
    #[arg(long)]
    date:         Option<NaiveDate>,
    #[arg(long = "bibleversion")]
    version:      Option<String>,
    #[arg(long)]
    lang:         Option<String>,
    /// Compute and report only; nothing is written or sent.
    #[arg(long)]
    dry_run:      bool,
    /// Notify even when the displayed verse is unchanged.
    #[arg(long)]
    force_notify: bool,
    /// Recompute and rewrite every church's verse.
    #[arg(long)]
    force_update: bool,
  },

  /// Show the most recent verses chosen for a church.
  History {
    #[arg(long)]
    church: i64,
    #[arg(long, default_value_t = 30)]
    limit:  usize,
  },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store_path = expand_tilde(&settings.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let today = Local::now().date_naive();

  match cli.command {
    Command::Import { file } => {
      let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
      let parsed: VersionFile =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
      let version = store
        .import_version(parsed.version, parsed.verses)
        .await
        .context("import failed")?;
      tracing::info!(
        code = %version.code,
        total = version.total_verses,
        etag = %version.etag,
        "imported bible version"
      );
    }

    Command::Pick { church, date, version, lang, force } => {
      let selector = selector(store, &settings)?;
      let Some(church) = selector.store().get_church(church).await? else {
        bail!("church {church} not found");
      };
      let on_date = date.unwrap_or(today);
      let version = version.unwrap_or_else(|| settings.default_version.clone());
      let lang = lang.unwrap_or_else(|| settings.default_language.clone());

      let resolved = if force {
        selector
          .recompute_for_church(&church, on_date, &version, &lang)
          .await?
      } else {
        selector
          .pick_for_church(&church, on_date, &version, &lang)
          .await?
      };
      println!("{}", serde_json::to_string_pretty(&resolved)?);
    }

    Command::UpdateAll {
      date,
      version,
      lang,
      dry_run,
      force_notify,
      force_update,
    } => {
      let selector = selector(store, &settings)?;
      let version = version.unwrap_or_else(|| settings.default_version.clone());
      let lang = lang.unwrap_or_else(|| settings.default_language.clone());
      let options = BatchOptions {
        force_update,
        force_notify,
        dry_run,
      };

      let summary = update_all_churches(
        &selector,
        &LogNotifier,
        &version,
        &lang,
        date.unwrap_or(today),
        options,
      )
      .await
      .context("daily batch failed")?;
      println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Command::History { church, limit } => {
      let history = store.daily_verse_history(church, limit).await?;
      println!("{}", serde_json::to_string_pretty(&history)?);
    }
  }

  Ok(())
}

fn selector(
  store: SqliteStore,
  settings: &Settings,
) -> anyhow::Result<VerseOfDaySelector<SqliteStore>> {
  let rules = settings.rules()?;
  Ok(
    VerseOfDaySelector::new(Arc::new(store), rules)
      .with_window_days(settings.repetition_window_days),
  )
}
