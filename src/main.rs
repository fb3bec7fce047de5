mod config;
mod db;
mod delivery;
mod error;
mod handlers;
mod models;
mod router;
mod views;

use std::sync::Arc;

use dotenvy::dotenv;
use teloxide::prelude::*;
use tracing::{error, info};

use crate::config::Config;
use crate::db::Store;
use crate::error::BotError;
use crate::handlers::commands::Command;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    if let Err(err) = run().await {
        error!(error = %err, "fatal error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BotError> {
    let cfg = Arc::new(Config::from_env()?);

    let store = Store::new(&cfg.database_path).await?;
    store.seed_default_tasks().await?;

    let bot = Bot::new(cfg.bot_token.clone());

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handlers::commands::handle_command),
        )
        .branch(Update::filter_callback_query().endpoint(handlers::callbacks::handle_callback));

    info!("starting long polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![store.clone(), cfg])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("dispatcher stopped, shutting down");
    store.close().await;
    Ok(())
}
