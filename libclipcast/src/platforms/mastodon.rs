//! Mastodon platform implementation
//!
//! Talks to Mastodon (and Mastodon-API compatible Fediverse servers) through
//! the megalodon library. Listing endpoints are paginated with the `Link`
//! response header; the `max_id` of the `rel="next"` link becomes the cursor
//! for the following page.

use async_trait::async_trait;
use megalodon::megalodon::{
    AccountFollowersInputOptions, GetAccountStatusesInputOptions, PostStatusOutput,
};
use megalodon::{Megalodon, SNS};
use secrecy::{ExposeSecret, SecretString};

use crate::config::{expand_path, MastodonConfig};
use crate::error::{PlatformError, Result};
use crate::platforms::{Platform, SocialGraph};
use crate::types::{Account, Page, PageRequest, Relationship, StatusSummary};

const DEFAULT_CHARACTER_LIMIT: usize = 500;

/// Mastodon platform client
pub struct MastodonClient {
    client: Box<dyn Megalodon + Send + Sync>,

    /// Character limit for posts (instance-specific)
    character_limit: usize,
}

impl MastodonClient {
    /// Create a new Mastodon client
    ///
    /// Starts with the stock 500 character limit; [`Platform::authenticate`]
    /// replaces it with the instance's own.
    ///
    /// # Arguments
    ///
    /// * `instance_url` - Base URL of the instance (e.g., "https://mastodon.social")
    /// * `access_token` - OAuth access token
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        Self::with_token(instance_url, SecretString::from(access_token))
    }

    fn with_token(instance_url: String, access_token: SecretString) -> Result<Self> {
        let client = megalodon::generator(
            SNS::Mastodon,
            normalize_instance_url(&instance_url),
            Some(access_token.expose_secret().to_string()),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            character_limit: DEFAULT_CHARACTER_LIMIT,
        })
    }

    /// Create a Mastodon client from configuration
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the token file cannot be
    /// read or is empty.
    pub fn from_config(config: &MastodonConfig) -> Result<Self> {
        let token_path = expand_path(&config.token_file);

        let token = std::fs::read_to_string(&token_path).map_err(|e| {
            PlatformError::Authentication(format!(
                "Failed to read Mastodon token file {}: {}",
                token_path.display(),
                e
            ))
        })?;
        let token = SecretString::from(token.trim().to_string());

        if token.expose_secret().is_empty() {
            return Err(
                PlatformError::Authentication("Mastodon token file is empty".to_string()).into(),
            );
        }

        Self::with_token(config.instance.clone(), token)
    }

    /// Fetch the instance's status character limit
    async fn fetch_instance_info(&mut self) -> Result<()> {
        let response = self
            .client
            .get_instance()
            .await
            .map_err(|e| map_megalodon_error(e, "fetch instance info"))?;

        let limit = response.json.configuration.statuses.max_characters;
        self.character_limit = limit as usize;
        tracing::debug!("Instance character limit: {}", self.character_limit);

        Ok(())
    }
}

/// Ensure the instance URL carries a scheme
fn normalize_instance_url(instance: &str) -> String {
    let instance = instance.trim_end_matches('/');
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

fn to_account(account: megalodon::entities::Account) -> Account {
    Account {
        id: account.id,
        handle: account.acct,
        display_name: account.display_name,
        locked: account.locked,
    }
}

fn to_relationship(relationship: megalodon::entities::Relationship) -> Relationship {
    Relationship {
        id: relationship.id,
        following: relationship.following,
        followed_by: relationship.followed_by,
    }
}

fn follower_options(page: &PageRequest) -> AccountFollowersInputOptions {
    AccountFollowersInputOptions {
        max_id: page.cursor.clone(),
        limit: page.limit,
        ..Default::default()
    }
}

/// Pull the `max_id` of the `rel="next"` entry out of a `Link` header
///
/// `<https://example.social/api/v1/accounts/1/followers?max_id=7>; rel="next", <...>; rel="prev"`
fn next_cursor(link: Option<&str>) -> Option<String> {
    let link = link?;

    link.split(',')
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            part.get(start..end)
        })
        .and_then(|url| {
            let query = url.split_once('?')?.1;
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("max_id="))
                .map(str::to_string)
        })
}

fn link_header<T>(response: &megalodon::response::Response<T>) -> Option<&str> {
    response.header.get("link").and_then(|v| v.to_str().ok())
}

#[async_trait]
impl Platform for MastodonClient {
    async fn authenticate(&mut self) -> Result<()> {
        self.client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        if let Err(e) = self.fetch_instance_info().await {
            tracing::warn!(
                "Could not read instance character limit, keeping {}: {}",
                self.character_limit,
                e
            );
        }

        Ok(())
    }

    async fn post(&self, content: &str) -> Result<String> {
        self.validate_content(content)?;

        let response = self
            .client
            .post_status(content.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let post_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(post_id)
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        let char_count = content.chars().count();

        if char_count > self.character_limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                self.character_limit, char_count
            ))
            .into());
        }

        if content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "mastodon"
    }

    fn character_limit(&self) -> Option<usize> {
        Some(self.character_limit)
    }
}

#[async_trait]
impl SocialGraph for MastodonClient {
    async fn verify_credentials(&self) -> Result<Account> {
        let response = self
            .client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "verify credentials"))?;
        Ok(to_account(response.json))
    }

    async fn lookup_account(&self, handle: &str) -> Result<Account> {
        let handle = handle.trim_start_matches('@');
        let response = self
            .client
            .lookup_account(handle.to_string())
            .await
            .map_err(|e| map_megalodon_error(e, &format!("lookup {}", handle)))?;
        Ok(to_account(response.json))
    }

    async fn followers(&self, account_id: &str, page: PageRequest) -> Result<Page<Account>> {
        let options = follower_options(&page);
        let response = self
            .client
            .get_account_followers(account_id.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "list followers"))?;

        let next = next_cursor(link_header(&response));
        Ok(Page {
            items: response.json.into_iter().map(to_account).collect(),
            next,
        })
    }

    async fn following(&self, account_id: &str, page: PageRequest) -> Result<Page<Account>> {
        let options = follower_options(&page);
        let response = self
            .client
            .get_account_following(account_id.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "list following"))?;

        let next = next_cursor(link_header(&response));
        Ok(Page {
            items: response.json.into_iter().map(to_account).collect(),
            next,
        })
    }

    async fn relationships(&self, ids: &[String]) -> Result<Vec<Relationship>> {
        let response = self
            .client
            .get_relationships(ids.to_vec())
            .await
            .map_err(|e| map_megalodon_error(e, "get relationships"))?;
        Ok(response.json.into_iter().map(to_relationship).collect())
    }

    async fn follow(&self, account_id: &str) -> Result<Relationship> {
        let response = self
            .client
            .follow_account(account_id.to_string(), None)
            .await
            .map_err(|e| map_megalodon_error(e, "follow"))?;
        Ok(to_relationship(response.json))
    }

    async fn unfollow(&self, account_id: &str) -> Result<Relationship> {
        let response = self
            .client
            .unfollow_account(account_id.to_string())
            .await
            .map_err(|e| map_megalodon_error(e, "unfollow"))?;
        Ok(to_relationship(response.json))
    }

    async fn statuses(
        &self,
        account_id: &str,
        page: PageRequest,
    ) -> Result<Page<StatusSummary>> {
        let options = GetAccountStatusesInputOptions {
            max_id: page.cursor.clone(),
            limit: page.limit,
            exclude_reblogs: Some(true),
            ..Default::default()
        };
        let response = self
            .client
            .get_account_statuses(account_id.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "list statuses"))?;

        let next = next_cursor(link_header(&response));
        Ok(Page {
            items: response
                .json
                .into_iter()
                .map(|status| StatusSummary {
                    id: status.id,
                    reblogs_count: status.reblogs_count as u32,
                })
                .collect(),
            next,
        })
    }

    /// Only the first page of boosters: megalodon's endpoint takes no paging options
    async fn reblogged_by(&self, status_id: &str, _page: PageRequest) -> Result<Page<Account>> {
        let response = self
            .client
            .get_status_reblogged_by(status_id.to_string())
            .await
            .map_err(|e| map_megalodon_error(e, "list boosts"))?;

        Ok(Page::last(
            response.json.into_iter().map(to_account).collect(),
        ))
    }
}

/// Map megalodon errors to PlatformError
///
/// HTTP failures carry their status on `OwnError`:
/// - 401/403 → `PlatformError::Authentication`
/// - 404 → `PlatformError::NotFound`
/// - 422 and other 4xx → `PlatformError::Validation`
/// - 429 → `PlatformError::RateLimit`
/// - 5xx → `PlatformError::Network` (retried)
///
/// Anything without a status falls back to the message text.
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    match &error {
        megalodon::error::Error::OwnError(own) => match own.status {
            Some(status) => map_status(status, &own.message, context),
            None => map_error_message(&error.to_string(), context),
        },
        megalodon::error::Error::JsonError(_) => PlatformError::Posting(format!(
            "Mastodon response parse error ({}): {}",
            context, error
        )),
        _ => map_error_message(&error.to_string(), context),
    }
}

fn map_status(status: u16, message: &str, context: &str) -> PlatformError {
    match status {
        401 | 403 => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): HTTP {} {}. \
                    Suggestion: Verify your OAuth token is valid and has not expired.",
            context, status, message
        )),
        404 => PlatformError::NotFound(format!("Mastodon ({}): HTTP 404 {}", context, message)),
        429 => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): HTTP 429 {}",
            context, message
        )),
        400..=499 => PlatformError::Validation(format!(
            "Mastodon rejected the request ({}): HTTP {} {}",
            context, status, message
        )),
        _ => PlatformError::Network(format!(
            "Mastodon server error ({}): HTTP {} {}",
            context, status, message
        )),
    }
}

fn map_error_message(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    if error_lower.contains("unauthorized")
        || error_lower.contains("forbidden")
        || error_lower.contains("token")
    {
        PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("rate limit") || error_lower.contains("too many requests") {
        PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}",
            context, error_str
        ))
    } else if error_lower.contains("not found") {
        PlatformError::NotFound(format!("Mastodon ({}): {}", context, error_str))
    } else if error_lower.contains("parse")
        || error_lower.contains("json")
        || error_lower.contains("deserialize")
    {
        PlatformError::Posting(format!(
            "Mastodon response parse error ({}): {}",
            context, error_str
        ))
    } else {
        PlatformError::Network(format!(
            "Mastodon error ({}): {}. \
                Suggestion: Check your network connection and instance availability.",
            context, error_str
        ))
    }
}
