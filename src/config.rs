use std::env;

use crate::error::ConfigError;

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub bot_username: String,
    pub admin_user_id: u64,
    pub database_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let admin_raw = require("ADMIN_USER_ID")?;
        let admin_user_id = admin_raw
            .parse()
            .map_err(|_| ConfigError::InvalidVar {
                var: "ADMIN_USER_ID",
                value: admin_raw,
            })?;

        Ok(Config {
            bot_token: require("BOT_TOKEN")?,
            bot_username: require("BOT_USERNAME")?,
            admin_user_id,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "doge_world.db".to_string()),
        })
    }
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVar(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_reported() {
        // Env-dependent, so only exercise the pure helper.
        let err = require("DOGE_WORLD_DOES_NOT_EXIST").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }
}
