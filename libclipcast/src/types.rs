//! Core types shared between the services and the platform clients

use serde::{Deserialize, Serialize};

/// An account on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// `user` for local accounts, `user@instance` for remote ones
    pub handle: String,
    pub display_name: String,
    /// Follow requests need manual approval
    pub locked: bool,
}

impl Account {
    pub fn new(id: impl Into<String>, handle: impl Into<String>) -> Self {
        let handle = handle.into();
        Self {
            id: id.into(),
            display_name: handle.clone(),
            handle,
            locked: false,
        }
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
        self
    }
}

/// How the authenticated account relates to another account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// The other account's id
    pub id: String,
    /// We follow them
    pub following: bool,
    /// They follow us
    pub followed_by: bool,
}

/// The parts of one of our statuses needed to find who boosted it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub id: String,
    pub reblogs_count: u32,
}

/// Which page of a listing to fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Opaque token from the previous page's `next`; `None` for the first page
    pub cursor: Option<String>,
    /// Page size hint
    pub limit: Option<u32>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the following page; `None` on the last page
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}
