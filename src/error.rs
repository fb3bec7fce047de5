use thiserror::Error;

/// Domain errors. Handlers translate these into user-facing replies at
/// the dispatch boundary; none of them may escape a handler.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("task already completed")]
    DuplicateCompletion,

    #[error("unknown task id {0}")]
    UnknownTask(i64),

    #[error("task reward must be positive, got {0}")]
    InvalidReward(i64),

    #[error("not authorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidCommandArgs(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("telegram api error: {0}")]
    Api(#[from] teloxide::RequestError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Outcome of an outbound send once the retry budget is spent.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("send failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: teloxide::RequestError,
    },

    #[error("permanent send failure: {0}")]
    Permanent(#[source] teloxide::RequestError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing env var {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value:?}")]
    InvalidVar { var: &'static str, value: String },
}
