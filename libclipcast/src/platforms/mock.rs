//! Mock platform implementation for testing
//!
//! An in-memory account graph that implements both [`Platform`] and
//! [`SocialGraph`]. Failures can be queued up front to exercise the retry
//! paths, and every write is recorded so tests can assert on it. Listings
//! are served in small pages so cursors have to follow `next` tokens.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{PlatformError, Result};
use crate::platforms::{Platform, SocialGraph};
use crate::types::{Account, Page, PageRequest, Relationship, StatusSummary};

#[derive(Debug, Default)]
struct MockState {
    authenticated: bool,
    accounts: HashMap<String, Account>,
    /// Most recent first
    followers: Vec<String>,
    /// Most recent first
    following: Vec<String>,
    followers_of: HashMap<String, Vec<String>>,
    statuses: Vec<StatusSummary>,
    reblogs: HashMap<String, Vec<String>>,
    failures: VecDeque<PlatformError>,
    posted: Vec<String>,
    followed: Vec<String>,
    unfollowed: Vec<String>,
    calls: usize,
}

/// Mock platform for testing
pub struct MockPlatform {
    me: Account,
    page_size: usize,
    character_limit: Option<usize>,
    state: Mutex<MockState>,
}

impl MockPlatform {
    /// Create a mock platform logged in as `me`
    pub fn new(me: Account) -> Self {
        let mut state = MockState::default();
        state.accounts.insert(me.id.clone(), me.clone());

        Self {
            me,
            page_size: 2,
            character_limit: None,
            state: Mutex::new(state),
        }
    }

    /// Register an account so it can be listed and looked up
    pub fn with_account(self, account: Account) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(account.id.clone(), account);
        self
    }

    /// `id` follows us; call in order oldest to newest
    pub fn with_follower(self, id: &str) -> Self {
        self.state.lock().unwrap().followers.insert(0, id.to_string());
        self
    }

    /// We follow `id`; call in order oldest to newest
    pub fn with_following(self, id: &str) -> Self {
        self.state.lock().unwrap().following.insert(0, id.to_string());
        self
    }

    /// Followers of another account, most recent first
    pub fn with_followers_of(self, account_id: &str, ids: &[&str]) -> Self {
        self.state.lock().unwrap().followers_of.insert(
            account_id.to_string(),
            ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    /// One of our statuses, boosted by `reblogged_by`
    pub fn with_status(self, status_id: &str, reblogged_by: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.statuses.insert(
                0,
                StatusSummary {
                    id: status_id.to_string(),
                    reblogs_count: reblogged_by.len() as u32,
                },
            );
            state.reblogs.insert(
                status_id.to_string(),
                reblogged_by.iter().map(|id| id.to_string()).collect(),
            );
        }
        self
    }

    /// Largest page served, whatever limit is asked for
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_character_limit(mut self, limit: usize) -> Self {
        self.character_limit = Some(limit);
        self
    }

    /// Make the next call fail with `error`; queued failures are used in order
    pub fn fail_next(self, error: PlatformError) -> Self {
        self.state.lock().unwrap().failures.push_back(error);
        self
    }

    pub fn posted(&self) -> Vec<String> {
        self.state.lock().unwrap().posted.clone()
    }

    pub fn followed(&self) -> Vec<String> {
        self.state.lock().unwrap().followed.clone()
    }

    pub fn unfollowed(&self) -> Vec<String> {
        self.state.lock().unwrap().unfollowed.clone()
    }

    /// Current accounts we follow, most recent first
    pub fn following_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().following.clone()
    }

    /// Number of platform calls made, failed ones included
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    /// Count the call and pop a queued failure, if any
    fn begin_call(&self) -> Result<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        match state.failures.pop_front() {
            Some(error) => Err(error.into()),
            None => Ok(state),
        }
    }

    fn page_of(&self, state: &MockState, ids: &[String], page: &PageRequest) -> Page<Account> {
        let start: usize = page
            .cursor
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        // Like a real server, the requested limit is capped at the page size
        let size = page
            .limit
            .map(|l| (l as usize).min(self.page_size))
            .unwrap_or(self.page_size);
        let end = (start + size).min(ids.len());

        let items = ids
            .get(start..end)
            .unwrap_or(&[])
            .iter()
            .map(|id| account_for(state, id))
            .collect();
        let next = (end < ids.len()).then(|| end.to_string());

        Page { items, next }
    }
}

fn account_for(state: &MockState, id: &str) -> Account {
    state
        .accounts
        .get(id)
        .cloned()
        .unwrap_or_else(|| Account::new(id, format!("user{}", id)))
}

fn relationship_for(state: &MockState, id: &str) -> Relationship {
    Relationship {
        id: id.to_string(),
        following: state.following.iter().any(|f| f == id),
        followed_by: state.followers.iter().any(|f| f == id),
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn authenticate(&mut self) -> Result<()> {
        let mut state = self.begin_call()?;
        state.authenticated = true;
        Ok(())
    }

    async fn post(&self, content: &str) -> Result<String> {
        self.validate_content(content)?;

        let mut state = self.begin_call()?;
        if !state.authenticated {
            return Err(PlatformError::Authentication("Not authenticated".to_string()).into());
        }

        state.posted.push(content.to_string());
        Ok(format!("mock-{}", uuid::Uuid::new_v4()))
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        if let Some(limit) = self.character_limit {
            let count = content.chars().count();
            if count > limit {
                return Err(PlatformError::Validation(format!(
                    "Content exceeds {} character limit (got {} characters)",
                    limit, count
                ))
                .into());
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn character_limit(&self) -> Option<usize> {
        self.character_limit
    }
}

#[async_trait]
impl SocialGraph for MockPlatform {
    async fn verify_credentials(&self) -> Result<Account> {
        let _state = self.begin_call()?;
        Ok(self.me.clone())
    }

    async fn lookup_account(&self, handle: &str) -> Result<Account> {
        let state = self.begin_call()?;
        let handle = handle.trim_start_matches('@');
        state
            .accounts
            .values()
            .find(|a| a.handle == handle)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("No account named {}", handle)).into())
    }

    async fn followers(&self, account_id: &str, page: PageRequest) -> Result<Page<Account>> {
        let state = self.begin_call()?;
        let ids = if account_id == self.me.id {
            state.followers.clone()
        } else {
            state
                .followers_of
                .get(account_id)
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(format!("No account {}", account_id)))?
        };
        Ok(self.page_of(&state, &ids, &page))
    }

    async fn following(&self, account_id: &str, page: PageRequest) -> Result<Page<Account>> {
        let state = self.begin_call()?;
        if account_id != self.me.id {
            return Ok(Page::last(Vec::new()));
        }
        let ids = state.following.clone();
        Ok(self.page_of(&state, &ids, &page))
    }

    async fn relationships(&self, ids: &[String]) -> Result<Vec<Relationship>> {
        let state = self.begin_call()?;
        if ids.len() > self.relationship_batch_limit() {
            return Err(PlatformError::Validation(format!(
                "Too many ids in one relationships request: {}",
                ids.len()
            ))
            .into());
        }
        Ok(ids.iter().map(|id| relationship_for(&state, id)).collect())
    }

    async fn follow(&self, account_id: &str) -> Result<Relationship> {
        let mut state = self.begin_call()?;
        if !state.following.iter().any(|f| f == account_id) {
            state.following.insert(0, account_id.to_string());
        }
        state.followed.push(account_id.to_string());
        Ok(relationship_for(&state, account_id))
    }

    async fn unfollow(&self, account_id: &str) -> Result<Relationship> {
        let mut state = self.begin_call()?;
        state.following.retain(|f| f != account_id);
        state.unfollowed.push(account_id.to_string());
        Ok(relationship_for(&state, account_id))
    }

    async fn statuses(
        &self,
        account_id: &str,
        page: PageRequest,
    ) -> Result<Page<StatusSummary>> {
        let state = self.begin_call()?;
        if account_id != self.me.id {
            return Ok(Page::last(Vec::new()));
        }

        let start: usize = page
            .cursor
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        let end = (start + self.page_size).min(state.statuses.len());
        let items = state.statuses.get(start..end).unwrap_or(&[]).to_vec();
        let next = (end < state.statuses.len()).then(|| end.to_string());

        Ok(Page { items, next })
    }

    async fn reblogged_by(&self, status_id: &str, page: PageRequest) -> Result<Page<Account>> {
        let state = self.begin_call()?;
        let ids = state.reblogs.get(status_id).cloned().unwrap_or_default();
        Ok(self.page_of(&state, &ids, &page))
    }
}
