//! Follow-graph maintenance
//!
//! Every platform call goes through [`with_retry`], listings are walked with
//! a [`Cursor`], and every follow or unfollow is followed by a [`Pacer`]
//! pause so the account is not flagged for bulk activity.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ClipcastError, Result};
use crate::ledger::UnfollowJournal;
use crate::platforms::SocialGraph;
use crate::retry::{with_retry, Cursor, Pacer, RetryPolicy};
use crate::types::{Account, PageRequest, Relationship};

/// How many of our own followers `follow_all_followers` looks at
pub const FOLLOWER_SCAN_LIMIT: usize = 400;

/// How many of our own statuses are checked for boosts
pub const STATUS_SCAN_LIMIT: usize = 200;

/// Largest page the Mastodon API hands out for account listings
const ACCOUNT_PAGE_SIZE: u32 = 80;

const PACE_REASON: &str = "to avoid flooding the API";

/// What `follow_all_followers` did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowSummary {
    pub followers_followed: usize,
    pub boosters_followed: usize,
}

impl FollowSummary {
    pub fn total(&self) -> usize {
        self.followers_followed + self.boosters_followed
    }
}

pub struct GraphService<'g> {
    graph: &'g dyn SocialGraph,
    policy: RetryPolicy,
    pacer: Pacer,
    journal: UnfollowJournal,
}

impl<'g> GraphService<'g> {
    pub fn new(
        graph: &'g dyn SocialGraph,
        policy: RetryPolicy,
        pacer: Pacer,
        journal: UnfollowJournal,
    ) -> Self {
        Self {
            graph,
            policy,
            pacer,
            journal,
        }
    }

    pub fn from_config(graph: &'g dyn SocialGraph, config: &Config) -> Result<Self> {
        Ok(Self::new(
            graph,
            config.pacing.retry_policy()?,
            Pacer::new(config.pacing.action_delay()?),
            UnfollowJournal::new(config.unfollowed_path()),
        ))
    }

    async fn me(&self) -> Result<Account> {
        let graph = self.graph;
        with_retry(&self.policy, "verify credentials", move || {
            graph.verify_credentials()
        })
        .await
    }

    async fn lookup(&self, handle: &str) -> Result<Account> {
        let graph = self.graph;
        with_retry(&self.policy, "lookup account", move || {
            graph.lookup_account(handle)
        })
        .await
    }

    /// Relationships for `accounts`, keyed by account id
    async fn relationships_for(
        &self,
        accounts: &[Account],
    ) -> Result<HashMap<String, Relationship>> {
        let graph = self.graph;
        let mut relationships = HashMap::new();

        for chunk in accounts.chunks(graph.relationship_batch_limit().max(1)) {
            let ids: Vec<String> = chunk.iter().map(|a| a.id.clone()).collect();
            let ids = ids.as_slice();
            let batch = with_retry(&self.policy, "get relationships", move || {
                graph.relationships(ids)
            })
            .await?;
            relationships.extend(batch.into_iter().map(|r| (r.id.clone(), r)));
        }

        Ok(relationships)
    }

    async fn follow(&self, account: &Account) -> Result<()> {
        let graph = self.graph;
        let id = account.id.as_str();
        with_retry(&self.policy, "follow", move || graph.follow(id)).await?;
        Ok(())
    }

    /// Whether the account behind `handle` follows us
    pub async fn is_following_me(&self, handle: &str) -> Result<bool> {
        let account = self.lookup(handle).await?;
        let relationships = self.relationships_for(std::slice::from_ref(&account)).await?;

        Ok(relationships
            .get(&account.id)
            .map(|r| r.followed_by)
            .unwrap_or(false))
    }

    /// Unfollow up to `amount` accounts that do not follow us back,
    /// longest-followed first
    ///
    /// Accounts in the unfollow journal are left alone; every unfollow is
    /// journaled. Returns the number of accounts unfollowed.
    pub async fn unfollow_unfollowers(&self, amount: usize) -> Result<usize> {
        if amount == 0 {
            return Ok(0);
        }

        info!(
            "Will try to unfollow the oldest {} accounts which are not following back",
            amount
        );

        let me = self.me().await?;
        let previously_unfollowed = self.journal.load_ids()?;

        let graph = self.graph;
        let me_id = me.id.as_str();
        let mut following = Cursor::new(&self.policy, "list following", move |page: PageRequest| {
            graph.following(me_id, page)
        })
        .page_size(ACCOUNT_PAGE_SIZE)
        .collect()
        .await?;
        info!("Following {} accounts", following.len());

        // The listing is most recent first
        following.reverse();

        let mut candidates = Vec::new();
        for account in following {
            if previously_unfollowed.contains(&account.id) {
                warn!(
                    "Not unfollowing {} ({}) since we had already unfollowed them in the past",
                    account.handle, account.id
                );
            } else {
                candidates.push(account);
            }
        }

        let mut unfollowed = 0;
        for chunk in candidates.chunks(graph.relationship_batch_limit().max(1)) {
            let relationships = self.relationships_for(chunk).await?;

            for account in chunk {
                let follows_back = relationships
                    .get(&account.id)
                    .map(|r| r.followed_by)
                    .unwrap_or(false);
                if follows_back {
                    continue;
                }

                if unfollowed > 0 {
                    self.pacer.pause(PACE_REASON).await;
                }

                info!(
                    "[{}/{}] Unfollowing {}",
                    unfollowed + 1,
                    amount,
                    account.handle
                );
                let id = account.id.as_str();
                with_retry(&self.policy, "unfollow", move || graph.unfollow(id)).await?;
                self.journal.record(&account.id, &account.handle)?;
                unfollowed += 1;

                if unfollowed >= amount {
                    info!("Finished unfollowing {} accounts", unfollowed);
                    return Ok(unfollowed);
                }
            }
        }

        info!(
            "Ran out of accounts to unfollow after {} of {}",
            unfollowed, amount
        );
        Ok(unfollowed)
    }

    /// Follow back our followers and everyone who boosted our statuses
    pub async fn follow_all_followers(&self) -> Result<FollowSummary> {
        let me = self.me().await?;
        let graph = self.graph;
        let me_id = me.id.as_str();
        let mut summary = FollowSummary::default();

        info!("--- Ensure that we're following all followers ---");
        let followers = Cursor::new(&self.policy, "list followers", move |page: PageRequest| {
            graph.followers(me_id, page)
        })
        .page_size(ACCOUNT_PAGE_SIZE)
        .limit(FOLLOWER_SCAN_LIMIT)
        .collect()
        .await?;
        summary.followers_followed = self.follow_not_followed(&me, &followers, "follower").await?;

        info!("--- Following all accounts that have boosted us ---");
        let mut statuses = Cursor::new(&self.policy, "list statuses", move |page: PageRequest| {
            graph.statuses(me_id, page)
        })
        .page_size(40)
        .limit(STATUS_SCAN_LIMIT);

        while let Some(status) = statuses.next_item().await? {
            if status.reblogs_count == 0 {
                continue;
            }

            let status_id = status.id.as_str();
            let boosters = Cursor::new(&self.policy, "list boosts", move |page: PageRequest| {
                graph.reblogged_by(status_id, page)
            })
            .page_size(ACCOUNT_PAGE_SIZE)
            .collect()
            .await?;

            summary.boosters_followed += self.follow_not_followed(&me, &boosters, "booster").await?;
        }

        info!(
            "Followed {} followers and {} boosters",
            summary.followers_followed, summary.boosters_followed
        );
        Ok(summary)
    }

    /// Follow each of `accounts` we do not follow yet
    async fn follow_not_followed(
        &self,
        me: &Account,
        accounts: &[Account],
        kind: &str,
    ) -> Result<usize> {
        let mut seen = HashSet::new();
        let accounts: Vec<Account> = accounts
            .iter()
            .filter(|a| a.id != me.id && seen.insert(a.id.clone()))
            .cloned()
            .collect();

        let relationships = self.relationships_for(&accounts).await?;

        let mut followed = 0;
        for account in &accounts {
            let already_following = relationships
                .get(&account.id)
                .map(|r| r.following)
                .unwrap_or(false);
            if already_following {
                continue;
            }

            info!("Starting to follow {} {}", kind, account.handle);
            self.follow(account).await?;
            followed += 1;
            self.pacer.pause(PACE_REASON).await;
        }

        Ok(followed)
    }

    /// Follow up to `amount` followers of the given accounts, in handle order
    ///
    /// Skips ourselves, accounts we already follow and locked accounts.
    /// Returns the number of accounts followed.
    pub async fn follow_followers_of_others(
        &self,
        amount: usize,
        handles: &[String],
    ) -> Result<usize> {
        if handles.is_empty() {
            return Err(ClipcastError::InvalidInput(
                "At least one handle is required".to_string(),
            ));
        }
        if amount == 0 {
            return Ok(0);
        }

        let me = self.me().await?;
        let graph = self.graph;
        let batch_size = graph.relationship_batch_limit().max(1);
        let mut followed = 0;

        for handle in handles {
            info!("--- Starting to follow followers of {} ---", handle);
            let target = self.lookup(handle).await?;
            let target_id = target.id.as_str();

            let mut followers = Cursor::new(
                &self.policy,
                format!("list followers of {}", handle),
                move |page: PageRequest| graph.followers(target_id, page),
            )
            .page_size(ACCOUNT_PAGE_SIZE);

            loop {
                let batch = followers.next_batch(batch_size).await?;
                if batch.is_empty() {
                    break;
                }

                let candidates: Vec<Account> = batch
                    .into_iter()
                    .filter(|a| a.id != me.id && !a.locked)
                    .collect();
                let relationships = self.relationships_for(&candidates).await?;

                for account in &candidates {
                    let already_following = relationships
                        .get(&account.id)
                        .map(|r| r.following)
                        .unwrap_or(false);
                    if already_following {
                        continue;
                    }

                    if followed > 0 {
                        self.pacer.pause(PACE_REASON).await;
                    }

                    info!(
                        "[{}/{}] Starting to follow {}",
                        followed + 1,
                        amount,
                        account.handle
                    );
                    self.follow(account).await?;
                    followed += 1;

                    if followed >= amount {
                        return Ok(followed);
                    }
                }
            }
        }

        info!(
            "Ran out of followers to follow after {} of {}",
            followed, amount
        );
        Ok(followed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockPlatform;
    use tempfile::TempDir;

    fn service<'g>(graph: &'g MockPlatform, temp_dir: &TempDir) -> GraphService<'g> {
        GraphService::new(
            graph,
            RetryPolicy::immediate(Some(5)),
            Pacer::disabled(),
            UnfollowJournal::new(temp_dir.path().join("unfollowed.txt")),
        )
    }

    #[test]
    fn test_follow_summary_total() {
        let summary = FollowSummary {
            followers_followed: 2,
            boosters_followed: 3,
        };
        assert_eq!(summary.total(), 5);
    }

    #[tokio::test]
    async fn test_is_following_me() {
        let temp_dir = TempDir::new().unwrap();
        let graph = MockPlatform::new(Account::new("1", "me"))
            .with_account(Account::new("2", "fan"))
            .with_account(Account::new("3", "stranger"))
            .with_follower("2");
        let service = service(&graph, &temp_dir);

        assert!(service.is_following_me("fan").await.unwrap());
        assert!(!service.is_following_me("stranger").await.unwrap());
        assert!(service.is_following_me("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_zero_amounts_are_no_ops() {
        let temp_dir = TempDir::new().unwrap();
        let graph = MockPlatform::new(Account::new("1", "me")).with_following("2");
        let service = service(&graph, &temp_dir);

        assert_eq!(service.unfollow_unfollowers(0).await.unwrap(), 0);
        assert_eq!(
            service
                .follow_followers_of_others(0, &["someone".to_string()])
                .await
                .unwrap(),
            0
        );
        assert_eq!(graph.call_count(), 0);
    }

    #[tokio::test]
    async fn test_follow_followers_of_others_requires_handles() {
        let temp_dir = TempDir::new().unwrap();
        let graph = MockPlatform::new(Account::new("1", "me"));
        let service = service(&graph, &temp_dir);

        let err = service.follow_followers_of_others(10, &[]).await.unwrap_err();
        assert!(matches!(err, ClipcastError::InvalidInput(_)));
    }
}
