use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::model::id::{JurorId, QuestionId};

pub type Result<T> = std::result::Result<T, Error>;

/// All error conditions this backend surfaces. State-violation errors are
/// distinct named variants so a client can tell "you already voted" apart
/// from "voting is closed"; none of them is retried server-side.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Fewer than a full panel's worth of eligible jurors. Recoverable by the
    /// caller once the pool grows or the category filter is broadened.
    #[error(
        "Insufficient eligible jurors for question {question_id}: need {needed}, have {available}"
    )]
    InsufficientPool {
        question_id: QuestionId,
        needed: usize,
        available: usize,
    },
    #[error("A panel has already been selected for question {0}")]
    AlreadySelected(QuestionId),
    #[error("Juror {juror_id} is not on the panel for question {question_id}")]
    NotPanelMember {
        question_id: QuestionId,
        juror_id: JurorId,
    },
    #[error("Juror {juror_id} has already voted on question {question_id}")]
    AlreadyVoted {
        question_id: QuestionId,
        juror_id: JurorId,
    },
    #[error("The ballot box for question {0} is closed")]
    BoxClosed(QuestionId),
    #[error("Invalid session state: {0}")]
    InvalidState(String),
    /// A violated internal invariant, e.g. a panel with a duplicate juror.
    /// This is a bug, not a normal race outcome.
    #[error("Internal consistency fault: {0}")]
    Invariant(String),
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        match self {
            Self::Invariant(_) => error!("{self}"),
            _ => warn!("{self}"),
        }
        Err(match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::InsufficientPool { .. } => Status::ServiceUnavailable,
            Self::AlreadySelected(_) | Self::AlreadyVoted { .. } => Status::Conflict,
            Self::NotPanelMember { .. } => Status::Forbidden,
            Self::BoxClosed(_) => Status::Gone,
            Self::InvalidState(_) => Status::UnprocessableEntity,
            Self::Invariant(_) => Status::InternalServerError,
        })
    }
}
