use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::Error;
use crate::model::id::JurorId;
use crate::model::juror::JurorStatus;
use crate::model::pool::JurorPool;

/// Header carrying the authenticated juror identity. Session verification
/// itself lives in the auth collaborator in front of this service; it
/// forwards the verified juror id here.
pub const JUROR_ID_HEADER: &str = "X-Juror-Id";

/// Request guard for routes that require an authenticated juror. Confirms
/// the forwarded identity maps to a registered, non-suspended juror before
/// any ballot is accepted.
pub struct AuthenticatedJuror {
    pub juror_id: JurorId,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedJuror {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pool = match req.guard::<&State<JurorPool>>().await {
            Outcome::Success(pool) => pool,
            _ => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Invariant("Juror pool is always managed".to_string()),
                ))
            }
        };

        let juror_id = match req
            .headers()
            .get_one(JUROR_ID_HEADER)
            .and_then(|header| header.parse::<JurorId>().ok())
        {
            Some(id) => id,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Missing juror identity".to_string()),
                ))
            }
        };

        match pool.get(&juror_id).await {
            Some(juror) if juror.status != JurorStatus::Suspended => {
                Outcome::Success(Self { juror_id })
            }
            Some(_) => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized(format!("Juror {juror_id} is suspended")),
            )),
            None => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized(format!("No registered juror with ID '{juror_id}'")),
            )),
        }
    }
}
