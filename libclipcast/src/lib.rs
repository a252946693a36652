//! Clipcast - share Kindle highlights and tend a Mastodon follow graph
//!
//! This library reads a Kindle `My Clippings.txt` export, posts the oldest
//! highlight that has not been shared yet, and keeps the account's follow
//! graph in shape with rate-limit-aware, paced API calls.

pub mod clippings;
pub mod config;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod logging;
pub mod platforms;
pub mod quotes;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use clippings::Clipping;
pub use config::Config;
pub use error::{ClipcastError, Result};
pub use graph::{FollowSummary, GraphService};
pub use ledger::{ProcessedLedger, UnfollowJournal};
pub use quotes::{PostOutcome, QuoteService};
pub use retry::{Pacer, RetryPolicy};
pub use types::{Account, Relationship};
