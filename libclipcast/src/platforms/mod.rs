//! Platform abstraction and implementations
//!
//! The client library is an external collaborator: every call may fail with
//! a rate-limit or transient error, which the callers in [`crate::retry`]
//! deal with. Two traits split the surface: [`Platform`] for publishing
//! quotes and [`SocialGraph`] for follow/unfollow maintenance.
//!
//! # Examples
//!
//! ```no_run
//! use libclipcast::platforms::{Platform, mastodon::MastodonClient};
//!
//! # async fn example() -> libclipcast::error::Result<()> {
//! let mut platform = MastodonClient::new(
//!     "https://mastodon.social".to_string(),
//!     "access-token".to_string(),
//! )?;
//! platform.authenticate().await?;
//!
//! let status_id = platform.post("Care about your craft.").await?;
//! println!("Posted: {}", status_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Account, Page, PageRequest, Relationship, StatusSummary};

pub mod mastodon;

// Available outside tests so integration tests can drive the services
pub mod mock;

/// Publishing side of the platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Authenticate with the platform
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the credentials are rejected.
    async fn authenticate(&mut self) -> Result<()>;

    /// Publish a status and return its platform id
    ///
    /// # Errors
    ///
    /// - `PlatformError::Validation` if the platform rejects the content
    /// - `PlatformError::RateLimit` / `PlatformError::Network` for retryable failures
    async fn post(&self, content: &str) -> Result<String>;

    /// Check content against platform rules before posting
    fn validate_content(&self, content: &str) -> Result<()>;

    /// Lowercase platform identifier, e.g. "mastodon"
    fn name(&self) -> &str;

    /// Maximum characters per status, `None` if unlimited
    fn character_limit(&self) -> Option<usize>;
}

/// Follow-graph side of the platform
///
/// Listing methods return one [`Page`] at a time; use [`crate::retry::Cursor`]
/// to walk them.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    /// The authenticated account
    async fn verify_credentials(&self) -> Result<Account>;

    /// Resolve a handle such as `user@instance`
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` for unknown handles.
    async fn lookup_account(&self, handle: &str) -> Result<Account>;

    /// Accounts following `account_id`, most recent first
    async fn followers(&self, account_id: &str, page: PageRequest) -> Result<Page<Account>>;

    /// Accounts `account_id` follows, most recent first
    async fn following(&self, account_id: &str, page: PageRequest) -> Result<Page<Account>>;

    /// Relationships between the authenticated account and each of `ids`
    async fn relationships(&self, ids: &[String]) -> Result<Vec<Relationship>>;

    async fn follow(&self, account_id: &str) -> Result<Relationship>;

    async fn unfollow(&self, account_id: &str) -> Result<Relationship>;

    /// Statuses authored by `account_id`, most recent first
    async fn statuses(&self, account_id: &str, page: PageRequest)
        -> Result<Page<StatusSummary>>;

    /// Accounts that boosted `status_id`
    async fn reblogged_by(&self, status_id: &str, page: PageRequest) -> Result<Page<Account>>;

    /// Largest id batch `relationships` accepts
    fn relationship_batch_limit(&self) -> usize {
        40
    }
}
