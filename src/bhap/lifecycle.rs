//! Lifecycle engine
//!
//! Pure decision logic over a BHAP's status: what a viewer may see and do,
//! whether the content is editable, and which status changes are legal.

use crate::auth::Role;
use crate::bhap::models::Status;
use serde::{Deserialize, Serialize};

/// The set of actions offered to a viewer of a single BHAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    NotLoggedIn,
    DraftAuthor,
    DraftNotAuthor,
    /// Authors cannot vote on their own BHAP
    DiscussionAuthor,
    DiscussionNoVote,
    DiscussionVoted,
    /// Voting and editing are closed
    Finalized,
}

/// Who is looking at a BHAP, relative to that BHAP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    User { is_author: bool, has_voted: bool },
}

impl Viewer {
    /// Authorship and vote flags are ignored when nobody is signed in
    pub fn from_flags(authenticated: bool, is_author: bool, has_voted: bool) -> Self {
        if authenticated {
            Viewer::User { is_author, has_voted }
        } else {
            Viewer::Anonymous
        }
    }
}

/// Pick the viewer's mode.
///
/// Authentication is checked first, then status, then authorship, then
/// whether a vote exists.
pub fn determine_view_mode(status: Status, viewer: Viewer) -> ViewMode {
    match (viewer, status) {
        (Viewer::Anonymous, _) => ViewMode::NotLoggedIn,
        (Viewer::User { is_author: true, .. }, Status::Draft) => ViewMode::DraftAuthor,
        (Viewer::User { is_author: false, .. }, Status::Draft) => ViewMode::DraftNotAuthor,
        (Viewer::User { is_author: true, .. }, Status::Discussion) => ViewMode::DiscussionAuthor,
        (Viewer::User { has_voted: false, .. }, Status::Discussion) => ViewMode::DiscussionNoVote,
        (Viewer::User { has_voted: true, .. }, Status::Discussion) => ViewMode::DiscussionVoted,
        (
            Viewer::User { .. },
            Status::Deferred
            | Status::Rejected
            | Status::Withdrawn
            | Status::Accepted
            | Status::Replaced
            | Status::AprilFools,
        ) => ViewMode::Finalized,
    }
}

/// Only drafts can have their title and content changed
pub fn is_editable(status: Status) -> bool {
    match status {
        Status::Draft => true,
        Status::Deferred
        | Status::Rejected
        | Status::Discussion
        | Status::Withdrawn
        | Status::Accepted
        | Status::Replaced
        | Status::AprilFools => false,
    }
}

/// Statuses reachable from `status` in one step
pub fn successors(status: Status) -> &'static [Status] {
    match status {
        Status::Draft => &[
            Status::Discussion,
            Status::Withdrawn,
            Status::Deferred,
            Status::AprilFools,
        ],
        Status::Discussion => &[
            Status::Accepted,
            Status::Rejected,
            Status::Withdrawn,
            Status::Deferred,
        ],
        Status::Deferred | Status::AprilFools => &[Status::Withdrawn],
        Status::Accepted => &[Status::Replaced],
        Status::Rejected | Status::Withdrawn | Status::Replaced => &[],
    }
}

pub fn can_transition(from: Status, to: Status) -> bool {
    successors(from).contains(&to)
}

/// The acting user's relationship to a BHAP, for transition checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
    pub is_author: bool,
}

/// Whether `actor` may move a BHAP from `from` to `to`.
///
/// Admins may take any legal transition. Authors may open their own draft
/// for discussion and withdraw it while it is a draft or under discussion.
pub fn actor_may_transition(actor: Actor, from: Status, to: Status) -> bool {
    if !can_transition(from, to) {
        return false;
    }
    if actor.role.can_administer() {
        return true;
    }
    actor.is_author
        && matches!(
            (from, to),
            (Status::Draft, Status::Discussion)
                | (Status::Draft, Status::Withdrawn)
                | (Status::Discussion, Status::Withdrawn)
        )
}

/// Every status `actor` may move a BHAP in `status` to
pub fn allowed_transitions(actor: Actor, status: Status) -> Vec<Status> {
    successors(status)
        .iter()
        .copied()
        .filter(|to| actor_may_transition(actor, status, *to))
        .collect()
}
