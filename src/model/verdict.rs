use serde::{Deserialize, Serialize};

use crate::model::ballot::{BallotBox, Choice};
use crate::model::id::QuestionId;
use crate::model::panel::PANEL_SIZE;

/// Final or provisional outcome of a question.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    A,
    B,
    #[serde(rename = "tie")]
    Tie,
}

/// The verdict derived from a ballot box. Never stored independently: it is
/// a pure function of the ballots and can be re-derived at any time.
///
/// `completion` is true only when all twelve ballots are in; a force-closed
/// box reports its partial tally with `completion = false`. An even split
/// reads as `Tie` either way, but only counts as a resolved tie when
/// `completion` is true; before that it is merely "currently even".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    #[serde(skip)]
    pub question_id: QuestionId,
    pub completion: bool,
    pub tally_a: u32,
    pub tally_b: u32,
    pub outcome: Outcome,
}

impl Verdict {
    /// Tally a ballot box. Pure read; the caller provides a consistent
    /// snapshot (in practice the per-session lock is held across the read).
    pub fn tally(bbox: &BallotBox) -> Self {
        let mut tally_a = 0;
        let mut tally_b = 0;
        for ballot in bbox.ballots() {
            match ballot.choice {
                Choice::A => tally_a += 1,
                Choice::B => tally_b += 1,
            }
        }
        let outcome = match tally_a.cmp(&tally_b) {
            std::cmp::Ordering::Greater => Outcome::A,
            std::cmp::Ordering::Less => Outcome::B,
            std::cmp::Ordering::Equal => Outcome::Tie,
        };
        Self {
            question_id: bbox.panel().question_id().clone(),
            completion: bbox.is_closed() && bbox.received() == PANEL_SIZE,
            tally_a,
            tally_b,
            outcome,
        }
    }
}

/// Live progress of a voting session: `received` out of [`PANEL_SIZE`], with
/// a truncating integer percentage so the figure is reproducible for a given
/// ballot count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub received: usize,
    pub total: usize,
    pub percentage: u8,
}

impl Progress {
    pub fn new(received: usize) -> Self {
        Self {
            received,
            total: PANEL_SIZE,
            percentage: (received * 100 / PANEL_SIZE) as u8,
        }
    }
}
