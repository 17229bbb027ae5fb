//! Error types for `vod-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No bible version exists at all, not even as a fallback.
  #[error("no bible version available")]
  NoVersionAvailable,

  /// The resolved version has no verses, even unfiltered and unexcluded.
  #[error("no verses available for version {0:?}")]
  NoVersesAvailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error raised by a [`crate::store::VerseStore`].
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
