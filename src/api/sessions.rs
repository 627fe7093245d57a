use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    id::{JurorId, QuestionId},
    pool::JurorPool,
    session::{SessionState, Sessions},
    verdict::{Progress, Verdict},
};

pub fn routes() -> Vec<Route> {
    routes![create_session, session_status, session_verdict, cancel_session]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    question_id: QuestionId,
    category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    status: SessionState,
    panel: Vec<JurorId>,
    diversity_score: f64,
}

/// Counts of ballots per option, keyed by the option letter.
#[derive(Debug, Serialize)]
struct TallyCounts {
    #[serde(rename = "A")]
    a: u32,
    #[serde(rename = "B")]
    b: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionStatusResponse {
    state: SessionState,
    progress: Progress,
    current_tally: TallyCounts,
}

/// Open a verdict session: select the panel and start accepting ballots.
#[post("/sessions", data = "<request>", format = "json")]
async fn create_session(
    request: Json<CreateSessionRequest>,
    sessions: &State<Sessions>,
    pool: &State<JurorPool>,
    config: &State<Config>,
) -> Result<Json<CreateSessionResponse>> {
    let request = request.into_inner();
    let panel = sessions
        .create(
            request.question_id,
            request.category.as_deref(),
            pool.inner(),
            config.voting_ttl(),
        )
        .await?;
    Ok(Json(CreateSessionResponse {
        status: SessionState::Voting,
        panel: panel.members().to_vec(),
        diversity_score: panel.diversity_score(),
    }))
}

#[get("/sessions/<question_id>/status")]
async fn session_status(
    question_id: QuestionId,
    sessions: &State<Sessions>,
) -> Result<Json<SessionStatusResponse>> {
    let snapshot = sessions.status(&question_id).await?;
    Ok(Json(SessionStatusResponse {
        state: snapshot.state,
        progress: Progress::new(snapshot.received),
        current_tally: TallyCounts {
            a: snapshot.tally_a,
            b: snapshot.tally_b,
        },
    }))
}

/// The current verdict. Provisional (`completion: false`) until all twelve
/// ballots are in.
#[get("/sessions/<question_id>/verdict")]
async fn session_verdict(
    question_id: QuestionId,
    sessions: &State<Sessions>,
) -> Result<Json<Verdict>> {
    Ok(Json(sessions.verdict(&question_id).await?))
}

/// Force-close voting early; responds with the resulting partial verdict.
#[post("/sessions/<question_id>/cancel")]
async fn cancel_session(
    question_id: QuestionId,
    sessions: &State<Sessions>,
) -> Result<Json<Verdict>> {
    Ok(Json(sessions.cancel(&question_id).await?))
}
