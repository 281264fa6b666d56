//! Vote tally engine
//!
//! Counts a BHAP's votes against the number of eligible voters and derives
//! integer percentages, rounded half-up on the exact ratio.

use crate::bhap::error::BhapError;
use crate::bhap::models::{Vote, VoteValue};
use serde::Serialize;

/// Vote breakdown for one BHAP
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub undecided_count: usize,
    pub accepted_pct: u32,
    pub rejected_pct: u32,
    pub undecided_pct: u32,
}

/// Tally `votes` against `eligible_voter_count` registered users.
///
/// With `exclude_author` the author is removed from the denominator, since
/// authors cannot vote on their own BHAP.
pub fn tally(
    votes: &[Vote],
    eligible_voter_count: usize,
    exclude_author: bool,
) -> Result<Tally, BhapError> {
    let mut accepted_count = 0;
    let mut rejected_count = 0;
    for vote in votes {
        match vote.choice()? {
            VoteValue::Accepted => accepted_count += 1,
            VoteValue::Rejected => rejected_count += 1,
        }
    }

    let denominator = if exclude_author {
        eligible_voter_count.checked_sub(1).ok_or(BhapError::NoEligibleVoters)?
    } else {
        eligible_voter_count
    };
    if denominator == 0 {
        return Err(BhapError::NoEligibleVoters);
    }

    let undecided_count = denominator
        .checked_sub(accepted_count + rejected_count)
        .ok_or(BhapError::InconsistentVoterCount {
            eligible: denominator,
            votes: votes.len(),
        })?;

    Ok(Tally {
        accepted_count,
        rejected_count,
        undecided_count,
        accepted_pct: percent(accepted_count, denominator),
        rejected_pct: percent(rejected_count, denominator),
        undecided_pct: percent(undecided_count, denominator),
    })
}

/// `count / denominator` as a percentage, rounded half-up.
///
/// Integer form of `floor(100 * count / denominator + 1/2)`, exact for all
/// inputs. `count <= denominator` and `denominator > 0`.
fn percent(count: usize, denominator: usize) -> u32 {
    ((100 * count + denominator / 2) / denominator) as u32
}
