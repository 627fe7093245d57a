#[macro_use]
extern crate rocket;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scheduled_task;

use config::ConfigFairing;
use logging::LoggerFairing;
use model::{pool::JurorPool, session::Sessions};

/// Construct the Rocket instance: every route mounted at the root, config in
/// managed state, and a fresh in-memory juror pool and session registry.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(LoggerFairing)
        .manage(JurorPool::new())
        .manage(Sessions::new())
}
