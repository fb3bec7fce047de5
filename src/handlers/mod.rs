pub mod callbacks;
pub mod commands;

/// Handlers report failures by logging and apologizing to the user;
/// this result type only carries what the dispatcher should see.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
