use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::id::{BallotId, JurorId, QuestionId};
use crate::model::panel::{Panel, PANEL_SIZE};

use std::collections::HashMap;

/// One of the two options of a binary-choice question.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

/// One juror's single, immutable verdict on one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub id: BallotId,
    pub question_id: QuestionId,
    pub juror_id: JurorId,
    pub choice: Choice,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxStatus {
    Open,
    Closed,
}

/// The per-question container of ballots. Keying the ballots by juror id
/// makes the voted-check and the insertion a single map operation; the owner
/// serializes access per question (see [`crate::model::session`]), which is
/// what makes check-then-insert atomic against concurrent submissions.
#[derive(Debug, Clone, PartialEq)]
pub struct BallotBox {
    panel: Panel,
    ballots: HashMap<JurorId, Ballot>,
    status: BoxStatus,
}

impl BallotBox {
    /// Open a ballot box for a freshly-selected panel.
    pub fn open(panel: Panel) -> Self {
        Self {
            panel,
            ballots: HashMap::with_capacity(PANEL_SIZE),
            status: BoxStatus::Open,
        }
    }

    /// Accept a ballot from a panel member. Exactly-once: a second ballot
    /// from the same juror is rejected, never overwritten. Receiving the
    /// final ballot closes the box as a side effect.
    pub fn submit(
        &mut self,
        ballot_id: BallotId,
        juror_id: JurorId,
        choice: Choice,
        submitted_at: DateTime<Utc>,
    ) -> Result<Ballot> {
        let question_id = self.panel.question_id().clone();
        if self.status == BoxStatus::Closed {
            return Err(Error::BoxClosed(question_id));
        }
        if !self.panel.contains(&juror_id) {
            return Err(Error::NotPanelMember {
                question_id,
                juror_id,
            });
        }
        if self.ballots.contains_key(&juror_id) {
            return Err(Error::AlreadyVoted {
                question_id,
                juror_id,
            });
        }
        let ballot = Ballot {
            id: ballot_id,
            question_id,
            juror_id: juror_id.clone(),
            choice,
            submitted_at,
        };
        self.ballots.insert(juror_id, ballot.clone());

        if self.ballots.len() > PANEL_SIZE {
            return Err(Error::Invariant(format!(
                "Ballot box for question {} holds more than {PANEL_SIZE} ballots",
                ballot.question_id
            )));
        }
        if self.ballots.len() == PANEL_SIZE {
            self.status = BoxStatus::Closed;
        }
        Ok(ballot)
    }

    /// Explicitly close the box (timeout or cancellation). Idempotent.
    pub fn close(&mut self) {
        self.status = BoxStatus::Closed;
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn received(&self) -> usize {
        self.ballots.len()
    }

    pub fn is_closed(&self) -> bool {
        self.status == BoxStatus::Closed
    }

    pub fn ballots(&self) -> impl Iterator<Item = &Ballot> {
        self.ballots.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::juror::examples::juror;

    fn example_box() -> (BallotBox, Vec<JurorId>) {
        let pool: Vec<_> = (0..15)
            .map(|i| {
                let region = ["Europe", "Asia", "Africa"][i % 3];
                juror(&format!("juror{i:02}"), region, "25-34")
            })
            .collect();
        let panel = Panel::select(QuestionId::from("question1"), &pool).unwrap();
        let members = panel.members().to_vec();
        (BallotBox::open(panel), members)
    }

    #[test]
    fn accepts_one_ballot_per_panel_member() {
        let (mut bbox, members) = example_box();
        let ballot = bbox
            .submit(1, members[0].clone(), Choice::A, Utc::now())
            .unwrap();
        assert_eq!(members[0], ballot.juror_id);
        assert_eq!(1, bbox.received());

        let err = bbox
            .submit(2, members[0].clone(), Choice::B, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyVoted { .. }));
        // The tally still reflects only the first ballot.
        assert_eq!(1, bbox.received());
        assert_eq!(Choice::A, bbox.ballots().next().unwrap().choice);
    }

    #[test]
    fn rejects_non_panel_members() {
        let (mut bbox, _) = example_box();
        let err = bbox
            .submit(1, JurorId::from("outsider"), Choice::A, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::NotPanelMember { .. }));
        assert_eq!(0, bbox.received());
    }

    #[test]
    fn closes_itself_on_the_final_ballot() {
        let (mut bbox, members) = example_box();
        for (i, member) in members.iter().enumerate() {
            assert!(!bbox.is_closed());
            bbox.submit(i as u32, member.clone(), Choice::A, Utc::now())
                .unwrap();
        }
        assert!(bbox.is_closed());
        assert_eq!(PANEL_SIZE, bbox.received());
    }

    #[test]
    fn rejects_ballots_once_closed() {
        let (mut bbox, members) = example_box();
        bbox.submit(1, members[0].clone(), Choice::A, Utc::now())
            .unwrap();
        bbox.close();
        bbox.close(); // Idempotent.

        let err = bbox
            .submit(2, members[1].clone(), Choice::B, Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::BoxClosed(_)));
        assert_eq!(1, bbox.received());
    }
}
