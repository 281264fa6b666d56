//! BHAP data models
//!
//! Proposals, votes and the users that author and vote on them.

use crate::auth::Role;
use crate::bhap::error::BhapError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a BHAP in the review lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Still being written by its author
    Draft,
    /// On hold
    Deferred,
    /// Rejected during voting
    Rejected,
    /// Open for discussion and voting
    Discussion,
    /// Removed by its author or an admin
    Withdrawn,
    /// Accepted by vote
    Accepted,
    /// Superseded by another BHAP
    Replaced,
    /// Not to be taken seriously
    #[serde(rename = "April Fools")]
    AprilFools,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Draft,
        Status::Deferred,
        Status::Rejected,
        Status::Discussion,
        Status::Withdrawn,
        Status::Accepted,
        Status::Replaced,
        Status::AprilFools,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::Deferred => "Deferred",
            Status::Rejected => "Rejected",
            Status::Discussion => "Discussion",
            Status::Withdrawn => "Withdrawn",
            Status::Accepted => "Accepted",
            Status::Replaced => "Replaced",
            Status::AprilFools => "April Fools",
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Draft
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = BhapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BhapError::InvalidStatus(s.to_string()))
    }
}

/// A ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteValue {
    Accepted,
    Rejected,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Accepted => "Accepted",
            VoteValue::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteValue {
    type Err = BhapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accepted" => Ok(VoteValue::Accepted),
            "Rejected" => Ok(VoteValue::Rejected),
            other => Err(BhapError::InvalidVoteValue(other.to_string())),
        }
    }
}

/// A BHAP proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bhap {
    pub id: i64,
    pub title: String,
    /// Stored in Markdown
    pub content: String,
    pub author_id: i64,
    pub status: Status,
    pub created_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Bhap {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }
}

/// Fields supplied by an author when creating a BHAP. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewBhap {
    pub author_id: i64,
    pub title: String,
    pub content: String,
}

impl NewBhap {
    /// Build the stored record for an allocated id
    pub fn into_bhap(self, id: i64, now: DateTime<Utc>) -> Bhap {
        Bhap {
            id,
            title: self.title,
            content: self.content,
            author_id: self.author_id,
            status: Status::Draft,
            created_date: now,
            last_modified: now,
        }
    }
}

/// A vote as persisted.
///
/// `value` is kept as the stored text so that corrupt rows reach the tally
/// engine and fail there instead of disappearing at load time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub bhap_id: i64,
    pub voter_id: i64,
    pub value: String,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(bhap_id: i64, voter_id: i64, value: VoteValue) -> Self {
        Self {
            bhap_id,
            voter_id,
            value: value.as_str().to_string(),
            cast_at: Utc::now(),
        }
    }

    pub fn choice(&self) -> Result<VoteValue, BhapError> {
        self.value.parse()
    }
}

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>(), Ok(status));
        }
        assert_eq!(
            "Pending".parse::<Status>(),
            Err(BhapError::InvalidStatus("Pending".to_string()))
        );
    }

    #[test]
    fn test_april_fools_uses_spaced_name() {
        let json = serde_json::to_string(&Status::AprilFools).unwrap();
        assert_eq!(json, "\"April Fools\"");
    }

    #[test]
    fn test_vote_choice_rejects_unknown_values() {
        let mut vote = Vote::new(3, 7, VoteValue::Rejected);
        assert_eq!(vote.choice(), Ok(VoteValue::Rejected));

        vote.value = "Abstain".to_string();
        assert_eq!(
            vote.choice(),
            Err(BhapError::InvalidVoteValue("Abstain".to_string()))
        );
    }
}
