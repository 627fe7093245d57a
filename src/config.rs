use chrono::Duration;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    voting_ttl: u32,
}

impl Config {
    /// How long a voting session stays open before it is force-closed.
    /// Configured as `voting_ttl`, in seconds.
    pub fn voting_ttl(&self) -> Duration {
        Duration::seconds(self.voting_ttl.into())
    }
}

/// Loads the application config into managed state at ignition, failing
/// launch with a readable message when a value is missing or malformed.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}
