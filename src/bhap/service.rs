//! BHAP service
//!
//! Loads records from the store, runs them through the lifecycle and tally
//! engines, and writes the results back. Each method is one request's worth
//! of work.

use crate::auth::Identity;
use crate::bhap::error::BhapError;
use crate::bhap::lifecycle::{self, Actor, ViewMode, Viewer};
use crate::bhap::models::{Bhap, NewBhap, Status, Vote, VoteValue};
use crate::bhap::store::BhapStore;
use crate::bhap::tally::{self, Tally};
use crate::markdown;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything a renderer needs to show one BHAP to one viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BhapView {
    pub bhap: Bhap,
    pub author_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_name: Option<String>,
    pub mode: ViewMode,
    pub editable: bool,
    pub html_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_vote: Option<VoteValue>,
    pub vote_count: usize,
    /// Registered users minus the author
    pub eligible_voters: usize,
    /// Absent for drafts and for BHAPs that closed with no eligible voters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<Tally>,
    pub allowed_transitions: Vec<Status>,
}

/// One row of the BHAP index
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BhapSummary {
    pub id: i64,
    pub title: String,
    pub status: Status,
    pub author_id: i64,
    pub last_modified: DateTime<Utc>,
}

impl From<Bhap> for BhapSummary {
    fn from(bhap: Bhap) -> Self {
        Self {
            id: bhap.id,
            title: bhap.title,
            status: bhap.status,
            author_id: bhap.author_id,
            last_modified: bhap.last_modified,
        }
    }
}

/// Tally of a BHAP past discussion. One that closed with nobody able to
/// vote has no tally rather than an error.
fn closed_tally(votes: &[Vote], user_count: usize) -> Result<Option<Tally>, BhapError> {
    match tally::tally(votes, user_count, true) {
        Ok(tally) => Ok(Some(tally)),
        Err(BhapError::NoEligibleVoters) if votes.is_empty() => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Clone)]
pub struct BhapService {
    store: Arc<dyn BhapStore>,
}

impl BhapService {
    pub fn new(store: Arc<dyn BhapStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BhapStore> {
        &self.store
    }

    /// Assemble the view of BHAP `id` for `viewer` (None when signed out)
    pub async fn view(&self, id: i64, viewer: Option<Identity>) -> Result<BhapView, BhapError> {
        let bhap = self.store.get_bhap(id).await?;
        let author = self
            .store
            .get_user(bhap.author_id)
            .await?
            .ok_or_else(|| BhapError::Storage(format!("Author {} of BHAP {} is missing", bhap.author_id, id)))?;

        let votes = self.store.list_votes(id).await?;
        let user_count = self.store.count_users().await?;

        let mut viewer_name = None;
        let mut own_vote: Option<Vote> = None;
        if let Some(identity) = viewer {
            viewer_name = self.store.get_user(identity.user_id).await?.map(|u| u.full_name());
            own_vote = self.store.get_vote(id, identity.user_id).await?;
        }

        let is_author = viewer.is_some_and(|identity| bhap.is_authored_by(identity.user_id));
        let mode = lifecycle::determine_view_mode(
            bhap.status,
            Viewer::from_flags(viewer.is_some(), is_author, own_vote.is_some()),
        );
        let selected_vote = own_vote.as_ref().map(Vote::choice).transpose()?;

        let tally = match bhap.status {
            Status::Draft => None,
            Status::Discussion => Some(tally::tally(&votes, user_count, true)?),
            _ => closed_tally(&votes, user_count)?,
        };

        let allowed_transitions = viewer
            .map(|identity| {
                lifecycle::allowed_transitions(
                    Actor { role: identity.role, is_author },
                    bhap.status,
                )
            })
            .unwrap_or_default();

        debug!("BHAP {} viewed in mode {:?}", id, mode);

        Ok(BhapView {
            author_name: author.full_name(),
            viewer_name,
            mode,
            editable: lifecycle::is_editable(bhap.status),
            html_content: markdown::render(&bhap.content),
            selected_vote,
            vote_count: votes.len(),
            eligible_voters: user_count.saturating_sub(1),
            tally,
            allowed_transitions,
            bhap,
        })
    }

    pub async fn list(&self) -> Result<Vec<BhapSummary>, BhapError> {
        let bhaps = self.store.list_bhaps().await?;
        Ok(bhaps.into_iter().map(BhapSummary::from).collect())
    }

    /// Create a draft. `AllocationConflict` is returned as-is for the caller to retry.
    pub async fn create(
        &self,
        author: Identity,
        title: String,
        content: String,
    ) -> Result<Bhap, BhapError> {
        let bhap = self
            .store
            .create_bhap(NewBhap {
                author_id: author.user_id,
                title,
                content,
            })
            .await?;

        info!("BHAP {} created by user {}", bhap.id, author.user_id);
        Ok(bhap)
    }

    /// Replace title and content. Only the author may edit, and only a draft.
    ///
    /// The store rechecks the draft status as it writes, so an edit racing a
    /// status change fails with `NotEditable` instead of reverting it.
    pub async fn edit(
        &self,
        id: i64,
        editor: Identity,
        title: String,
        content: String,
    ) -> Result<Bhap, BhapError> {
        let bhap = self.store.get_bhap(id).await?;

        if !bhap.is_authored_by(editor.user_id) {
            return Err(BhapError::Forbidden(
                "Only the author can edit a BHAP".to_string(),
            ));
        }
        if !lifecycle::is_editable(bhap.status) {
            return Err(BhapError::NotEditable(bhap.status));
        }

        self.store.update_draft(id, title, content, Utc::now()).await
    }

    /// Move a BHAP to `to`. Loses to any status change committed since the
    /// read with `IllegalTransition` from the newer status.
    pub async fn transition(&self, id: i64, actor: Identity, to: Status) -> Result<Bhap, BhapError> {
        let bhap = self.store.get_bhap(id).await?;
        let from = bhap.status;

        if !lifecycle::can_transition(from, to) {
            return Err(BhapError::IllegalTransition { from, to });
        }
        let actor_role = Actor {
            role: actor.role,
            is_author: bhap.is_authored_by(actor.user_id),
        };
        if !lifecycle::actor_may_transition(actor_role, from, to) {
            return Err(BhapError::Forbidden(format!(
                "You may not move this BHAP from {} to {}",
                from, to
            )));
        }

        let bhap = self.store.set_status(id, from, to, Utc::now()).await?;

        info!("BHAP {} moved from {} to {} by user {}", id, from, to, actor.user_id);
        Ok(bhap)
    }

    /// Record `voter`'s vote. The store checks the BHAP is still under
    /// discussion in the same step as the insert.
    pub async fn cast_vote(&self, id: i64, voter: Identity, value: VoteValue) -> Result<Vote, BhapError> {
        let bhap = self.store.get_bhap(id).await?;

        if bhap.status != Status::Discussion {
            return Err(BhapError::VotingClosed(bhap.status));
        }
        if bhap.is_authored_by(voter.user_id) {
            return Err(BhapError::AuthorCannotVote);
        }

        let vote = self.store.create_vote(id, voter.user_id, value).await?;
        info!("User {} voted {} on BHAP {}", voter.user_id, value, id);
        Ok(vote)
    }
}
