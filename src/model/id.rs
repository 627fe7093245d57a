use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when parsing an empty identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Identifier must not be empty")]
pub struct EmptyIdError;

macro_rules! opaque_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EmptyIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.is_empty() {
                    Err(EmptyIdError)
                } else {
                    Ok(Self(s.to_string()))
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl<'a> FromParam<'a> for $name {
            type Error = EmptyIdError;

            fn from_param(param: &'a str) -> Result<Self, Self::Error> {
                param.parse()
            }
        }

        impl UriDisplay<Path> for $name {
            fn fmt(
                &self,
                formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>,
            ) -> std::fmt::Result {
                formatter.write_value(&self.0)
            }
        }

        impl_from_uri_param_identity!([Path] $name);
    };
}

opaque_id! {
    /// Identity of a registered juror, assigned by the account collaborator.
    JurorId
}

opaque_id! {
    /// Identity of a question, assigned by the question-authoring collaborator.
    QuestionId
}

/// Ballot identifiers are allocated from a process-wide counter.
pub type BallotId = u32;
