//! BHAP storage
//!
//! The `BhapStore` trait is the narrow interface the service needs from
//! persistence. `MemoryStore` keeps everything behind async locks; the
//! PostgreSQL backend lives in `pg_store`.

use crate::bhap::error::BhapError;
use crate::bhap::models::{Bhap, NewBhap, NewUser, Status, User, Vote, VoteValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Next unused BHAP id given the largest id in use
pub fn next_id(max_existing: Option<i64>) -> i64 {
    max_existing.map_or(0, |max| max + 1)
}

/// Persistence operations used by the BHAP core.
///
/// Every write is a single compare-and-set step: `create_bhap` allocates
/// the id and inserts together, `update_draft` and `set_status` check the
/// stored status and write together, and `create_vote` checks the BHAP is
/// open for voting and that no vote exists before inserting.
#[async_trait]
pub trait BhapStore: Send + Sync {
    async fn get_bhap(&self, id: i64) -> Result<Bhap, BhapError>;

    /// All BHAPs ordered by id
    async fn list_bhaps(&self) -> Result<Vec<Bhap>, BhapError>;

    async fn create_bhap(&self, new: NewBhap) -> Result<Bhap, BhapError>;

    /// Replace title and content while the BHAP is still a draft.
    /// Fails with `NotEditable` carrying the stored status otherwise.
    async fn update_draft(
        &self,
        id: i64,
        title: String,
        content: String,
        modified_at: DateTime<Utc>,
    ) -> Result<Bhap, BhapError>;

    /// Move from `from` to `to` only if the stored status is still `from`.
    /// Fails with `IllegalTransition` from the stored status otherwise.
    async fn set_status(
        &self,
        id: i64,
        from: Status,
        to: Status,
        modified_at: DateTime<Utc>,
    ) -> Result<Bhap, BhapError>;

    async fn list_votes(&self, bhap_id: i64) -> Result<Vec<Vote>, BhapError>;

    async fn get_vote(&self, bhap_id: i64, user_id: i64) -> Result<Option<Vote>, BhapError>;

    async fn create_vote(
        &self,
        bhap_id: i64,
        user_id: i64,
        value: VoteValue,
    ) -> Result<Vote, BhapError>;

    async fn count_users(&self) -> Result<usize, BhapError>;

    async fn create_user(&self, new: NewUser) -> Result<User, BhapError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, BhapError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, BhapError>;
}

#[derive(Default)]
struct Users {
    by_id: BTreeMap<i64, User>,
    email_index: HashMap<String, i64>,
}

/// In-memory store
pub struct MemoryStore {
    bhaps: RwLock<BTreeMap<i64, Bhap>>,
    /// Votes keyed by (bhap, voter)
    votes: RwLock<BTreeMap<(i64, i64), Vote>>,
    users: RwLock<Users>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            bhaps: RwLock::new(BTreeMap::new()),
            votes: RwLock::new(BTreeMap::new()),
            users: RwLock::new(Users::default()),
        }
    }

    /// Insert a vote row verbatim, bypassing the typed `create_vote` path
    #[cfg(test)]
    pub async fn insert_raw_vote(&self, vote: Vote) {
        let mut votes = self.votes.write().await;
        votes.insert((vote.bhap_id, vote.voter_id), vote);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BhapStore for MemoryStore {
    async fn get_bhap(&self, id: i64) -> Result<Bhap, BhapError> {
        let bhaps = self.bhaps.read().await;
        bhaps.get(&id).cloned().ok_or(BhapError::NotFound(id))
    }

    async fn list_bhaps(&self) -> Result<Vec<Bhap>, BhapError> {
        let bhaps = self.bhaps.read().await;
        Ok(bhaps.values().cloned().collect())
    }

    async fn create_bhap(&self, new: NewBhap) -> Result<Bhap, BhapError> {
        // Allocation and insert share one write guard
        let mut bhaps = self.bhaps.write().await;
        let id = next_id(bhaps.keys().next_back().copied());
        let bhap = new.into_bhap(id, Utc::now());
        bhaps.insert(id, bhap.clone());
        debug!("Allocated BHAP {}", id);
        Ok(bhap)
    }

    async fn update_draft(
        &self,
        id: i64,
        title: String,
        content: String,
        modified_at: DateTime<Utc>,
    ) -> Result<Bhap, BhapError> {
        let mut bhaps = self.bhaps.write().await;
        let bhap = bhaps.get_mut(&id).ok_or(BhapError::NotFound(id))?;
        if bhap.status != Status::Draft {
            return Err(BhapError::NotEditable(bhap.status));
        }
        bhap.title = title;
        bhap.content = content;
        bhap.last_modified = modified_at;
        Ok(bhap.clone())
    }

    async fn set_status(
        &self,
        id: i64,
        from: Status,
        to: Status,
        modified_at: DateTime<Utc>,
    ) -> Result<Bhap, BhapError> {
        let mut bhaps = self.bhaps.write().await;
        let bhap = bhaps.get_mut(&id).ok_or(BhapError::NotFound(id))?;
        if bhap.status != from {
            return Err(BhapError::IllegalTransition { from: bhap.status, to });
        }
        bhap.status = to;
        bhap.last_modified = modified_at;
        Ok(bhap.clone())
    }

    async fn list_votes(&self, bhap_id: i64) -> Result<Vec<Vote>, BhapError> {
        let votes = self.votes.read().await;
        Ok(votes
            .range((bhap_id, i64::MIN)..=(bhap_id, i64::MAX))
            .map(|(_, vote)| vote.clone())
            .collect())
    }

    async fn get_vote(&self, bhap_id: i64, user_id: i64) -> Result<Option<Vote>, BhapError> {
        let votes = self.votes.read().await;
        Ok(votes.get(&(bhap_id, user_id)).cloned())
    }

    async fn create_vote(
        &self,
        bhap_id: i64,
        user_id: i64,
        value: VoteValue,
    ) -> Result<Vote, BhapError> {
        // Status changes wait on the bhaps guard until the vote is in
        let mut votes = self.votes.write().await;
        let bhaps = self.bhaps.read().await;
        let status = bhaps.get(&bhap_id).ok_or(BhapError::NotFound(bhap_id))?.status;
        if status != Status::Discussion {
            return Err(BhapError::VotingClosed(status));
        }
        if votes.contains_key(&(bhap_id, user_id)) {
            return Err(BhapError::DuplicateVote { bhap_id, voter_id: user_id });
        }
        let vote = Vote::new(bhap_id, user_id, value);
        votes.insert((bhap_id, user_id), vote.clone());
        Ok(vote)
    }

    async fn count_users(&self) -> Result<usize, BhapError> {
        let users = self.users.read().await;
        Ok(users.by_id.len())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, BhapError> {
        let mut users = self.users.write().await;
        if users.email_index.contains_key(&new.email) {
            return Err(BhapError::EmailTaken(new.email));
        }

        let id = users.by_id.keys().next_back().map_or(1, |max| max + 1);
        let user = User {
            id,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            created_at: Utc::now(),
        };
        users.email_index.insert(user.email.clone(), id);
        users.by_id.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, BhapError> {
        let users = self.users.read().await;
        Ok(users.by_id.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, BhapError> {
        let users = self.users.read().await;
        Ok(users
            .email_index
            .get(email)
            .and_then(|id| users.by_id.get(id).cloned()))
    }
}
