use chrono::{DateTime, Utc};
use rocket::{serde::json::Json, Route, State};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    auth::AuthenticatedJuror,
    ballot::Choice,
    id::{BallotId, QuestionId},
    pool::JurorPool,
    session::Sessions,
};

pub fn routes() -> Vec<Route> {
    routes![submit_ballot]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BallotRequest {
    question_id: QuestionId,
    choice: Choice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BallotReceipt {
    ballot_id: BallotId,
    submitted_at: DateTime<Utc>,
}

/// Cast the authenticated juror's single ballot for a question.
#[post("/ballots", data = "<request>", format = "json")]
async fn submit_ballot(
    juror: AuthenticatedJuror,
    request: Json<BallotRequest>,
    sessions: &State<Sessions>,
    pool: &State<JurorPool>,
) -> Result<Json<BallotReceipt>> {
    let request = request.into_inner();
    let ballot = sessions
        .submit(
            &request.question_id,
            juror.juror_id,
            request.choice,
            pool.inner(),
        )
        .await?;
    Ok(Json(BallotReceipt {
        ballot_id: ballot.id,
        submitted_at: ballot.submitted_at,
    }))
}
