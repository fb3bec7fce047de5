use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{User as TgUser, UserId};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::delivery;
use crate::error::BotError;
use crate::handlers::HandlerResult;
use crate::views;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "register and open the main menu.")]
    Start(String),
    #[command(description = "add a new task (admin only).")]
    Addtask(String),
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    store: Store,
    cfg: Arc<Config>,
) -> HandlerResult {
    let outcome = match cmd {
        Command::Start(ref arg) => start(&bot, &msg, &store, &cfg, arg.trim()).await,
        Command::Addtask(ref args) => add_task(&bot, &msg, &store, &cfg, args).await,
    };

    // Domain errors stop here: log with context, apologize, keep the
    // event loop alive.
    if let Err(err) = outcome {
        error!(error = %err, chat_id = msg.chat.id.0, "command handler failed");
        let _ = delivery::send_text(&bot, msg.chat.id, views::GENERIC_APOLOGY, None).await;
    }
    Ok(())
}

/// `/start [referrerId]`: register the user, record the referrer on
/// first contact, and show either the social gate or the main menu.
async fn start(
    bot: &Bot,
    msg: &Message,
    store: &Store,
    cfg: &Config,
    referrer_arg: &str,
) -> Result<(), BotError> {
    let Some(tg_user) = msg.from() else {
        return Ok(());
    };
    let user_id = tg_user.id.0 as i64;

    let user = store.get_or_create_user(user_id, &display_name(tg_user)).await?;

    if !referrer_arg.is_empty() {
        // A non-integer argument is ignored, not an error.
        match referrer_arg.parse::<i64>() {
            Ok(referrer_id) => store.set_referrer(user_id, referrer_id).await?,
            Err(_) => warn!(arg = referrer_arg, "ignoring malformed referrer argument"),
        }
    }

    if user.social_tasks_completed {
        let (text, keyboard) = views::main_menu(&cfg.bot_username, user_id);
        delivery::send_text(bot, msg.chat.id, &text, Some(keyboard)).await?;
    } else {
        let (text, keyboard) = views::social_prompt();
        delivery::send_text(bot, msg.chat.id, &text, Some(keyboard)).await?;
    }
    Ok(())
}

/// `/addtask "<name>" "<description>" <reward>` — admin only.
async fn add_task(
    bot: &Bot,
    msg: &Message,
    store: &Store,
    cfg: &Config,
    raw_args: &str,
) -> Result<(), BotError> {
    let Some(tg_user) = msg.from() else {
        return Ok(());
    };

    match create_task_for(store, cfg, tg_user.id, raw_args).await {
        Ok(task) => {
            info!(task_id = task.task_id, "task added");
            delivery::send_text(bot, msg.chat.id, &views::task_added(&task), None).await?;
        }
        Err(BotError::Unauthorized) => {
            warn!(user_id = tg_user.id.0, "unauthorized /addtask attempt");
            delivery::send_text(bot, msg.chat.id, views::UNAUTHORIZED, None).await?;
        }
        Err(BotError::InvalidCommandArgs(reason)) => {
            let text = format!("{reason}\n\n{}", views::ADD_TASK_USAGE);
            delivery::send_text(bot, msg.chat.id, &text, None).await?;
        }
        Err(BotError::InvalidReward(reward)) => {
            let text = format!("Invalid doge_reward {reward}: must be a positive integer.");
            delivery::send_text(bot, msg.chat.id, &text, None).await?;
        }
        Err(other) => return Err(other),
    }
    Ok(())
}

/// Validates authorization and arguments, then inserts the task.
/// Nothing is written unless every check passes.
async fn create_task_for(
    store: &Store,
    cfg: &Config,
    caller: UserId,
    raw_args: &str,
) -> Result<crate::models::task::Task, BotError> {
    if caller.0 != cfg.admin_user_id {
        return Err(BotError::Unauthorized);
    }

    let args = split_quoted(raw_args)
        .ok_or_else(|| BotError::InvalidCommandArgs("Invalid command format. Please check your quotes.".to_string()))?;
    if args.len() < 3 {
        return Err(BotError::InvalidCommandArgs(
            "Expected a name, a description, and a reward.".to_string(),
        ));
    }

    let name = &args[0];
    // Everything between the name and the trailing reward is the
    // description, so unquoted multi-word descriptions still work.
    let description = args[1..args.len() - 1].join(" ");
    let reward: i64 = args[args.len() - 1].parse().map_err(|_| {
        BotError::InvalidCommandArgs("Invalid doge_reward. Please provide a valid integer.".to_string())
    })?;

    store.create_task(name, &description, reward).await
}

/// Split on whitespace, keeping quoted ('...' or "...") segments whole.
/// Returns `None` on an unterminated quote.
fn split_quoted(input: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_token {
        args.push(current);
    }
    Some(args)
}

fn display_name(user: &TgUser) -> String {
    user.username.clone().unwrap_or_else(|| user.full_name())
}
