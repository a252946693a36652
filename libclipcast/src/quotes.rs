//! Picking, composing and recording quotes
//!
//! Clippings are handed out oldest first. Once a clipping has been posted
//! (or deliberately skipped) its identity goes into the processed ledger and
//! it is never offered again.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::clippings::{read_clippings_file, Clipping};
use crate::config::Config;
use crate::error::{ClipcastError, LedgerError, PlatformError, Result};
use crate::ledger::ProcessedLedger;
use crate::platforms::Platform;

/// A clipping that has just been published
#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub clipping: Clipping,
    pub content: String,
    pub status_id: String,
}

pub struct QuoteService {
    clippings_path: PathBuf,
    ledger: ProcessedLedger,
    hashtags: Option<String>,
}

impl QuoteService {
    pub fn new(
        clippings_path: impl Into<PathBuf>,
        ledger: ProcessedLedger,
        hashtags: Option<String>,
    ) -> Self {
        Self {
            clippings_path: clippings_path.into(),
            ledger,
            hashtags,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.clippings_path(),
            ProcessedLedger::new(config.processed_path()),
            config.post.hashtags.clone(),
        )
    }

    /// Every clipping in the export, oldest first
    pub fn clippings(&self) -> Result<Vec<Clipping>> {
        read_clippings_file(&self.clippings_path)
    }

    /// Clippings that can still be posted, oldest first
    ///
    /// Clippings marked for skipping are left out, as are repeated
    /// highlights of the same passage.
    pub fn unprocessed(&self) -> Result<Vec<Clipping>> {
        let mut seen: HashSet<String> = self.ledger.load()?;

        Ok(self
            .clippings()?
            .into_iter()
            .filter(|c| !c.marked_for_skip)
            .filter(|c| seen.insert(c.id()))
            .collect())
    }

    /// # Errors
    ///
    /// Returns `ClipcastError::NoUnprocessed` when every clipping has been handled.
    pub fn oldest_unprocessed(&self) -> Result<Clipping> {
        self.unprocessed()?
            .into_iter()
            .next()
            .ok_or(ClipcastError::NoUnprocessed)
    }

    pub fn oldest_unprocessed_n(&self, n: usize) -> Result<Vec<Clipping>> {
        Ok(self.unprocessed()?.into_iter().take(n).collect())
    }

    /// Clippings the user prefixed with `>> `
    pub fn marked_for_skipping(&self) -> Result<Vec<Clipping>> {
        Ok(self
            .clippings()?
            .into_iter()
            .filter(|c| c.marked_for_skip)
            .collect())
    }

    /// Record every marked clipping as processed
    ///
    /// Returns how many were added to the ledger.
    pub fn skip_selected(&self) -> Result<usize> {
        let marked = self.marked_for_skipping()?;
        info!("Adding {} marked clippings as processed", marked.len());

        let mut added = 0;
        for clipping in &marked {
            match self.ledger.mark(clipping) {
                Ok(()) => added += 1,
                Err(ClipcastError::Ledger(LedgerError::AlreadyProcessed(id))) => {
                    warn!("Already processed, leaving as is: {}", id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(added)
    }

    /// The status text for a clipping
    pub fn compose(&self, clipping: &Clipping) -> String {
        let mut content = format!(
            "{}\n\n{} ({})",
            clipping.body, clipping.book_title, clipping.author
        );

        if let Some(hashtags) = self.hashtags.as_deref().map(str::trim) {
            if !hashtags.is_empty() {
                content.push('\n');
                content.push_str(hashtags);
            }
        }

        content
    }

    /// Compose and refuse anything over `limit` characters
    pub fn compose_checked(&self, clipping: &Clipping, limit: Option<usize>) -> Result<String> {
        let content = self.compose(clipping);
        let length = content.chars().count();

        if let Some(limit) = limit {
            if length > limit {
                return Err(PlatformError::Validation(format!(
                    "Quote is {} characters, over the {} character limit: {}",
                    length, limit, content
                ))
                .into());
            }
        }

        Ok(content)
    }

    /// Publish the oldest unprocessed clipping and record it
    ///
    /// The ledger is only written once the platform has accepted the post.
    pub async fn post_oldest(&self, platform: &dyn Platform) -> Result<PostOutcome> {
        let clipping = self.oldest_unprocessed()?;
        let content = self.compose_checked(&clipping, platform.character_limit())?;

        info!("Posting quote of length {}", content.chars().count());
        let status_id = platform.post(&content).await?;
        info!("Posted to {}: {}", platform.name(), status_id);

        self.ledger.mark(&clipping)?;

        Ok(PostOutcome {
            clipping,
            content,
            status_id,
        })
    }

    /// Record the oldest unprocessed clipping without publishing it
    pub fn skip_oldest(&self) -> Result<Clipping> {
        let clipping = self.oldest_unprocessed()?;
        self.ledger.mark(&clipping)?;
        info!("Skipped: {}", clipping.id());
        Ok(clipping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clippings::parse_clipping;
    use tempfile::TempDir;

    fn clipping(body: &str) -> Clipping {
        parse_clipping(&format!(
            "Meditations (Marcus Aurelius)\n\
- Your Highlight at Location 10-11 | Added on Monday, January 4, 2021 8:05:00 AM\n\
\n\
{}",
            body
        ))
        .unwrap()
    }

    fn service(hashtags: Option<&str>) -> (TempDir, QuoteService) {
        let temp_dir = TempDir::new().unwrap();
        let service = QuoteService::new(
            temp_dir.path().join("My Clippings.txt"),
            ProcessedLedger::new(temp_dir.path().join("processed.db")),
            hashtags.map(str::to_string),
        );
        (temp_dir, service)
    }

    #[test]
    fn test_compose_without_hashtags() {
        let (_temp, service) = service(None);
        assert_eq!(
            service.compose(&clipping("Waste no more time.")),
            "Waste no more time.\n\nMeditations (Marcus Aurelius)"
        );
    }

    #[test]
    fn test_compose_with_hashtags() {
        let (_temp, service) = service(Some("#stoicism #quotes"));
        assert_eq!(
            service.compose(&clipping("Waste no more time.")),
            "Waste no more time.\n\nMeditations (Marcus Aurelius)\n#stoicism #quotes"
        );
    }

    #[test]
    fn test_compose_ignores_blank_hashtags() {
        let (_temp, service) = service(Some("   "));
        assert!(!service.compose(&clipping("Waste no more time.")).ends_with('\n'));
    }

    #[test]
    fn test_compose_checked_limit() {
        let (_temp, service) = service(None);
        let quote = clipping(&"word ".repeat(60));

        assert!(service.compose_checked(&quote, None).is_ok());
        assert!(service.compose_checked(&quote, Some(500)).is_ok());

        let err = service.compose_checked(&quote, Some(280)).unwrap_err();
        assert!(matches!(
            err,
            ClipcastError::Platform(PlatformError::Validation(_))
        ));
        assert!(err.to_string().contains("280 character limit"));
    }

    #[test]
    fn test_missing_export_is_an_error() {
        let (_temp, service) = service(None);
        assert!(matches!(
            service.oldest_unprocessed(),
            Err(ClipcastError::Clippings(_))
        ));
    }
}
