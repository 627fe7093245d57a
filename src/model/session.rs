use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use rocket::tokio::sync::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::ballot::{Ballot, BallotBox, Choice};
use crate::model::id::{JurorId, QuestionId};
use crate::model::panel::{Panel, PANEL_SIZE};
use crate::model::pool::JurorPool;
use crate::model::verdict::Verdict;
use crate::scheduled_task::ScheduledTask;

/// States in a question's verdict lifecycle. `Created` is a question known
/// to the coordinator but without a panel (e.g. after a failed selection);
/// `Finalized` is terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Created,
    Selecting,
    Voting,
    Finalized,
}

struct SessionInner {
    state: SessionState,
    /// Present from the moment selection succeeds; the panel lives inside.
    bbox: Option<BallotBox>,
}

/// Per-question session. The inner mutex is the per-question critical
/// section: it serializes the ballot box's check-then-insert against
/// concurrent submissions, while sessions for different questions share
/// nothing and proceed in parallel.
pub struct Session {
    question_id: QuestionId,
    inner: Mutex<SessionInner>,
}

/// A consistent snapshot of a session for status reporting; taken under the
/// session lock so it never observes a partially-inserted ballot.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub received: usize,
    pub tally_a: u32,
    pub tally_b: u32,
}

type TimerMap = HashMap<QuestionId, ScheduledTask>;

/// The verdict session coordinator: owns every question's session, drives
/// the `Created → Selecting → Voting → Finalized` lifecycle, and schedules
/// the voting timeout for each open session.
pub struct Sessions {
    sessions: RwLock<HashMap<QuestionId, Arc<Session>>>,
    timers: Arc<Mutex<TimerMap>>,
    next_ballot_id: AtomicU32,
}

impl Sessions {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_ballot_id: AtomicU32::new(1),
        }
    }

    /// Start a verdict session: select a panel from the eligible pool and
    /// open its ballot box, with a forced close scheduled after `voting_ttl`.
    ///
    /// Idempotent-once: if the question already has a live panel, that panel
    /// is returned unchanged rather than re-selected; a finalized question
    /// reports [`Error::AlreadySelected`]. A failed selection leaves the
    /// question in `Created`, so the caller can retry once the pool grows.
    pub async fn create(
        &self,
        question_id: QuestionId,
        category: Option<&str>,
        pool: &JurorPool,
        voting_ttl: Duration,
    ) -> Result<Panel> {
        let session = self.get_or_insert(question_id.clone()).await;
        let mut inner = session.inner.lock().await;
        match inner.state {
            SessionState::Voting => {
                let bbox = inner.bbox.as_ref().expect("voting session has a ballot box");
                return Ok(bbox.panel().clone());
            }
            SessionState::Finalized => return Err(Error::AlreadySelected(question_id)),
            SessionState::Created | SessionState::Selecting => {}
        }

        inner.state = SessionState::Selecting;
        let eligible = pool.list_eligible(category).await;
        match Panel::select(question_id.clone(), &eligible) {
            Ok(panel) => {
                inner.bbox = Some(BallotBox::open(panel.clone()));
                inner.state = SessionState::Voting;
                drop(inner);
                self.schedule_timeout(session, voting_ttl).await;
                info!(
                    "Opened voting for question {} (diversity score {:.2})",
                    question_id,
                    panel.diversity_score()
                );
                Ok(panel)
            }
            Err(err) => {
                inner.state = SessionState::Created;
                Err(err)
            }
        }
    }

    /// Accept one juror's ballot for a question. The twelfth ballot closes
    /// the box and finalizes the session.
    pub async fn submit(
        &self,
        question_id: &QuestionId,
        juror_id: JurorId,
        choice: Choice,
        pool: &JurorPool,
    ) -> Result<Ballot> {
        let session = self.get(question_id).await?;
        let mut inner = session.inner.lock().await;
        match inner.state {
            SessionState::Voting => {}
            SessionState::Created | SessionState::Selecting => {
                return Err(Error::InvalidState(format!(
                    "Question {question_id} is not open for voting"
                )))
            }
            SessionState::Finalized => {
                return Err(Error::InvalidState(format!(
                    "Question {question_id} is already finalized"
                )))
            }
        }

        let bbox = inner.bbox.as_mut().expect("voting session has a ballot box");
        let ballot_id = self.next_ballot_id.fetch_add(1, Ordering::Relaxed);
        let ballot = bbox.submit(ballot_id, juror_id, choice, Utc::now())?;
        let finalized = bbox.is_closed();
        if finalized {
            inner.state = SessionState::Finalized;
        }
        drop(inner);

        if finalized {
            self.clear_timeout(question_id).await;
            info!("Question {question_id} received all {PANEL_SIZE} ballots, finalized");
        }
        pool.record_served(&ballot.juror_id, ballot.submitted_at).await;
        Ok(ballot)
    }

    /// Live status of a session.
    pub async fn status(&self, question_id: &QuestionId) -> Result<StatusSnapshot> {
        let session = self.get(question_id).await?;
        let inner = session.inner.lock().await;
        Ok(match &inner.bbox {
            Some(bbox) => {
                let verdict = Verdict::tally(bbox);
                StatusSnapshot {
                    state: inner.state,
                    received: bbox.received(),
                    tally_a: verdict.tally_a,
                    tally_b: verdict.tally_b,
                }
            }
            None => StatusSnapshot {
                state: inner.state,
                received: 0,
                tally_a: 0,
                tally_b: 0,
            },
        })
    }

    /// The (re-derivable) verdict for a question. Provisional while voting
    /// is in progress; see [`Verdict`] for the completion semantics.
    pub async fn verdict(&self, question_id: &QuestionId) -> Result<Verdict> {
        let session = self.get(question_id).await?;
        let inner = session.inner.lock().await;
        match &inner.bbox {
            Some(bbox) => Ok(Verdict::tally(bbox)),
            None => Err(Error::InvalidState(format!(
                "Question {question_id} has no panel yet"
            ))),
        }
    }

    /// Force-close a voting session early. The resulting verdict reflects
    /// whatever ballots were received, reported honestly as incomplete.
    /// Idempotent on an already-finalized session.
    pub async fn cancel(&self, question_id: &QuestionId) -> Result<Verdict> {
        let session = self.get(question_id).await?;
        let mut inner = session.inner.lock().await;
        let bbox = inner.bbox.as_mut().ok_or_else(|| {
            Error::InvalidState(format!("Question {question_id} has no voting session to cancel"))
        })?;
        bbox.close();
        let verdict = Verdict::tally(bbox);
        let received = bbox.received();
        inner.state = SessionState::Finalized;
        drop(inner);

        self.clear_timeout(question_id).await;
        warn!("Voting for question {question_id} force-closed with {received}/{PANEL_SIZE} ballots");
        Ok(verdict)
    }

    async fn get(&self, question_id: &QuestionId) -> Result<Arc<Session>> {
        self.sessions
            .read()
            .await
            .get(question_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("No session for question '{question_id}'")))
    }

    async fn get_or_insert(&self, question_id: QuestionId) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(question_id.clone())
            .or_insert_with(|| {
                Arc::new(Session {
                    question_id,
                    inner: Mutex::new(SessionInner {
                        state: SessionState::Created,
                        bbox: None,
                    }),
                })
            })
            .clone()
    }

    /// Schedule the forced close for a freshly-opened session, replacing any
    /// stale timer for the same question.
    async fn schedule_timeout(&self, session: Arc<Session>, voting_ttl: Duration) {
        let question_id = session.question_id.clone();
        let timers = self.timers.clone();
        let timer_key = question_id.clone();
        let timeout = async move {
            let mut inner = session.inner.lock().await;
            if let Some(bbox) = inner.bbox.as_mut() {
                if !bbox.is_closed() {
                    bbox.close();
                    warn!(
                        "Voting for question {} timed out with {}/{PANEL_SIZE} ballots",
                        session.question_id,
                        bbox.received()
                    );
                    inner.state = SessionState::Finalized;
                }
            }
            drop(inner);
            timers.lock().await.remove(&timer_key);
        };

        let run_at = Utc::now() + voting_ttl;
        let mut timers_locked = self.timers.lock().await;
        if let Some(stale) = timers_locked.remove(&question_id) {
            stale.abort();
        }
        timers_locked.insert(question_id, ScheduledTask::new(timeout, run_at));
    }

    async fn clear_timeout(&self, question_id: &QuestionId) {
        if let Some(timer) = self.timers.lock().await.remove(question_id) {
            timer.abort();
        }
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rocket::tokio;

    use super::*;
    use crate::model::juror::examples::juror;
    use crate::model::verdict::Outcome;

    fn ttl() -> Duration {
        Duration::seconds(600)
    }

    async fn seeded_pool(count: usize) -> JurorPool {
        let pool = JurorPool::new();
        for i in 0..count {
            let region = ["Europe", "Asia", "Africa"][i % 3];
            let age = ["18-24", "25-34", "35-44", "45-54"][i % 4];
            pool.register(juror(&format!("juror{i:02}"), region, age))
                .await
                .unwrap();
        }
        pool
    }

    #[rocket::async_test]
    async fn full_lifecycle_reaches_a_final_verdict() {
        let sessions = Sessions::new();
        let pool = seeded_pool(15).await;
        let question = QuestionId::from("question1");

        let panel = sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap();
        assert_eq!(PANEL_SIZE, panel.members().len());

        for (i, member) in panel.members().iter().enumerate() {
            let choice = if i < 7 { Choice::A } else { Choice::B };
            sessions
                .submit(&question, member.clone(), choice, &pool)
                .await
                .unwrap();
        }

        let status = sessions.status(&question).await.unwrap();
        assert_eq!(SessionState::Finalized, status.state);
        assert_eq!(PANEL_SIZE, status.received);

        let verdict = sessions.verdict(&question).await.unwrap();
        assert!(verdict.completion);
        assert_eq!(7, verdict.tally_a);
        assert_eq!(5, verdict.tally_b);
        assert_eq!(Outcome::A, verdict.outcome);

        // Finalized is terminal.
        let err = sessions
            .submit(&question, panel.members()[0].clone(), Choice::A, &pool)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[rocket::async_test]
    async fn create_is_idempotent_while_voting() {
        let sessions = Sessions::new();
        let pool = seeded_pool(20).await;
        let question = QuestionId::from("question1");

        let first = sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap();
        let second = sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap();
        assert_eq!(first.members(), second.members());
    }

    #[rocket::async_test]
    async fn failed_selection_leaves_question_retryable() {
        let sessions = Sessions::new();
        let pool = seeded_pool(10).await;
        let question = QuestionId::from("question1");

        let err = sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientPool { .. }));
        let status = sessions.status(&question).await.unwrap();
        assert_eq!(SessionState::Created, status.state);

        // Pool grows; retry succeeds.
        for i in 10..15 {
            pool.register(juror(&format!("juror{i:02}"), "Africa", "55+"))
                .await
                .unwrap();
        }
        sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap();
        let status = sessions.status(&question).await.unwrap();
        assert_eq!(SessionState::Voting, status.state);
    }

    #[rocket::async_test]
    async fn cancel_reports_partial_verdict_as_incomplete() {
        let sessions = Sessions::new();
        let pool = seeded_pool(15).await;
        let question = QuestionId::from("question1");

        let panel = sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap();
        for member in panel.members().iter().take(5) {
            sessions
                .submit(&question, member.clone(), Choice::B, &pool)
                .await
                .unwrap();
        }

        let verdict = sessions.cancel(&question).await.unwrap();
        assert!(!verdict.completion);
        assert_eq!(0, verdict.tally_a);
        assert_eq!(5, verdict.tally_b);
        assert_eq!(Outcome::B, verdict.outcome);

        // Cancelling again is harmless; submitting is not possible.
        sessions.cancel(&question).await.unwrap();
        let err = sessions
            .submit(&question, panel.members()[6].clone(), Choice::A, &pool)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[rocket::async_test]
    async fn voting_ttl_forces_the_session_closed() {
        let sessions = Sessions::new();
        let pool = seeded_pool(15).await;
        let question = QuestionId::from("question1");

        sessions
            .create(question.clone(), None, &pool, Duration::zero())
            .await
            .unwrap();
        // Give the zero-delay timer a moment to fire.
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let status = sessions.status(&question).await.unwrap();
        assert_eq!(SessionState::Finalized, status.state);
        let verdict = sessions.verdict(&question).await.unwrap();
        assert!(!verdict.completion);
    }

    /// Only one of many racing submissions from the same juror may succeed.
    #[rocket::async_test]
    async fn concurrent_duplicate_ballots_cannot_both_land() {
        let sessions = Arc::new(Sessions::new());
        let pool = Arc::new(seeded_pool(15).await);
        let question = QuestionId::from("question1");

        let panel = sessions
            .create(question.clone(), None, &pool, ttl())
            .await
            .unwrap();
        let member = panel.members()[0].clone();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let sessions = sessions.clone();
            let pool = pool.clone();
            let question = question.clone();
            let member = member.clone();
            handles.push(tokio::spawn(async move {
                sessions.submit(&question, member, Choice::A, &pool).await
            }));
        }

        let mut succeeded = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(Error::AlreadyVoted { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(1, succeeded);
        assert_eq!(7, rejected);

        let status = sessions.status(&question).await.unwrap();
        assert_eq!(1, status.received);
    }
}
