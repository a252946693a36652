//! Rate-limit-aware retries, paginated cursors and pacing for platform calls
//!
//! Every call to the platform goes through [`with_retry`]: a rate limit
//! sleeps for [`RetryPolicy::rate_limit_wait`], a transient error for
//! [`RetryPolicy::error_wait`], and the call is tried again. Anything else is
//! returned to the caller straight away.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{ClipcastError, PlatformError, Result};
use crate::types::{Page, PageRequest};

/// Fixed-backoff retry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait after the platform reports a rate limit
    pub rate_limit_wait: Duration,
    /// Wait after a transient network or server error
    pub error_wait: Duration,
    /// Give up after this many attempts; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_wait: Duration::from_secs(15 * 60),
            error_wait: Duration::from_secs(20),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts
    pub fn immediate(max_attempts: Option<u32>) -> Self {
        Self {
            rate_limit_wait: Duration::ZERO,
            error_wait: Duration::ZERO,
            max_attempts,
        }
    }

    /// How long to wait before retrying after `error`, or `None` if it is not retryable
    pub fn wait_for(&self, error: &ClipcastError) -> Option<Duration> {
        match error {
            ClipcastError::Platform(PlatformError::RateLimit(_)) => Some(self.rate_limit_wait),
            ClipcastError::Platform(PlatformError::Network(_)) => Some(self.error_wait),
            _ => None,
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, context: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        let error = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded on attempt {}", context, attempt);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let Some(wait) = policy.wait_for(&error) else {
            return Err(error);
        };

        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                warn!("{} failed after {} attempts: {}", context, attempt, error);
                return Err(error);
            }
        }

        warn!(
            "{} failed (attempt {}): {}. Waiting {} before retrying",
            context,
            attempt,
            error,
            humantime::format_duration(wait)
        );
        sleep(wait).await;
    }
}

/// Walks a paginated listing one item at a time
///
/// Pages are fetched lazily through [`with_retry`], so a caller that stops
/// early never requests pages it does not need.
///
/// ```no_run
/// use libclipcast::platforms::SocialGraph;
/// use libclipcast::retry::{Cursor, RetryPolicy};
/// use libclipcast::types::PageRequest;
///
/// # async fn example(graph: &dyn SocialGraph) -> libclipcast::error::Result<()> {
/// let policy = RetryPolicy::default();
/// let mut followers = Cursor::new(&policy, "list followers", |page: PageRequest| graph.followers("42", page))
///     .limit(400);
/// while let Some(account) = followers.next_item().await? {
///     println!("{}", account.handle);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Cursor<'p, T, F> {
    fetch: F,
    policy: &'p RetryPolicy,
    context: String,
    page_size: Option<u32>,
    limit: Option<usize>,
    buffer: VecDeque<T>,
    next_token: Option<String>,
    exhausted: bool,
    yielded: usize,
}

impl<'p, T, F, Fut> Cursor<'p, T, F>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    pub fn new(policy: &'p RetryPolicy, context: impl Into<String>, fetch: F) -> Self {
        Self {
            fetch,
            policy,
            context: context.into(),
            page_size: None,
            limit: None,
            buffer: VecDeque::new(),
            next_token: None,
            exhausted: false,
            yielded: 0,
        }
    }

    /// Stop after `limit` items
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Ask the platform for pages of `size` items
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub async fn next_item(&mut self) -> Result<Option<T>> {
        if self.limit.is_some_and(|limit| self.yielded >= limit) {
            return Ok(None);
        }

        while self.buffer.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }

        self.yielded += 1;
        Ok(self.buffer.pop_front())
    }

    /// Up to `n` further items; empty once the listing is done
    pub async fn next_batch(&mut self, n: usize) -> Result<Vec<T>> {
        let mut batch = Vec::with_capacity(n);
        while batch.len() < n {
            match self.next_item().await? {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Drain the remaining items
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await? {
            items.push(item);
        }
        Ok(items)
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = PageRequest {
            cursor: self.next_token.clone(),
            limit: self.page_size,
        };

        let fetch = &mut self.fetch;
        let page = with_retry(self.policy, &self.context, || fetch(request.clone())).await?;

        tracing::debug!("{}: fetched {} items", self.context, page.items.len());

        // Stop on a token that does not advance
        let repeated = page.next.is_some() && page.next == request.cursor;
        if repeated {
            warn!("{}: next page token repeated, stopping", self.context);
        }

        if page.items.is_empty() || page.next.is_none() || repeated {
            self.exhausted = true;
        }
        self.next_token = page.next;
        self.buffer.extend(page.items);

        Ok(())
    }
}

/// Sleeps between write actions so the platform is not flooded
#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Duration,
}

impl Pacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn pause(&self, reason: &str) {
        if self.delay.is_zero() {
            return;
        }
        info!(
            "Waiting {} {}",
            humantime::format_duration(self.delay),
            reason
        );
        sleep(self.delay).await;
    }
}
