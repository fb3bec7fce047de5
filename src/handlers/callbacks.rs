use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Store;
use crate::delivery;
use crate::error::BotError;
use crate::handlers::HandlerResult;
use crate::router::CallbackAction;
use crate::views;

/// Pause between the onboarding congratulations and the main menu.
/// Purely visual pacing; other updates keep flowing while it runs.
const MENU_REVEAL_DELAY: Duration = Duration::from_millis(3500);

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    store: Store,
    cfg: Arc<Config>,
) -> HandlerResult {
    let Some(msg) = q.message.clone() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    if let Err(err) = dispatch(&bot, &q, &msg, &store, &cfg).await {
        error!(error = %err, chat_id = chat_id.0, "callback handler failed");
        let _ = delivery::send_text(&bot, chat_id, views::GENERIC_APOLOGY, None).await;
    }
    Ok(())
}

async fn dispatch(
    bot: &Bot,
    q: &CallbackQuery,
    msg: &Message,
    store: &Store,
    cfg: &Config,
) -> Result<(), BotError> {
    bot.answer_callback_query(q.id.clone()).await?;

    let user_id = q.from.id.0 as i64;
    let chat_id = msg.chat.id;

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        warn!(data = ?q.data, "unrecognized callback action");
        return Ok(());
    };

    match action {
        CallbackAction::SocialTasksCompleted => {
            complete_social_tasks(bot, msg, store, cfg, user_id).await
        }
        CallbackAction::CompleteTask(task_id) => {
            complete_task(bot, msg, store, user_id, task_id).await
        }
        CallbackAction::Tasks => show_tasks(bot, store, chat_id, user_id).await,
        CallbackAction::Leaderboard => show_leaderboard(bot, store, chat_id).await,
        CallbackAction::Referral => show_referral_info(bot, store, chat_id, user_id).await,
        CallbackAction::ReferralLink => {
            let text = views::referral_link_message(&cfg.bot_username, user_id);
            delivery::send_text(bot, chat_id, &text, None).await?;
            Ok(())
        }
    }
}

/// The social gate: close it for good, celebrate, then replace the
/// prompt with the main menu after a short pause. No verification that
/// the user actually joined anything.
async fn complete_social_tasks(
    bot: &Bot,
    msg: &Message,
    store: &Store,
    cfg: &Config,
    user_id: i64,
) -> Result<(), BotError> {
    store.mark_onboarded(user_id).await?;
    info!(user_id, "social tasks acknowledged");

    bot.edit_message_text(msg.chat.id, msg.id, views::social_congrats())
        .parse_mode(ParseMode::Markdown)
        .await?;

    tokio::time::sleep(MENU_REVEAL_DELAY).await;

    if let Err(err) = bot.delete_message(msg.chat.id, msg.id).await {
        warn!(error = %err, "could not delete onboarding message");
    }

    let (text, keyboard) = views::main_menu(&cfg.bot_username, user_id);
    delivery::send_text(bot, msg.chat.id, &text, Some(keyboard)).await?;
    Ok(())
}

async fn complete_task(
    bot: &Bot,
    msg: &Message,
    store: &Store,
    user_id: i64,
    task_id: i64,
) -> Result<(), BotError> {
    match store.complete_task(user_id, task_id).await {
        Ok(reward) => {
            info!(user_id, task_id, reward, "task completed");
            bot.edit_message_text(msg.chat.id, msg.id, views::task_completed(reward))
                .parse_mode(ParseMode::Markdown)
                .await?;
            Ok(())
        }
        Err(BotError::DuplicateCompletion) => {
            bot.edit_message_text(msg.chat.id, msg.id, views::ALREADY_COMPLETED)
                .await?;
            Ok(())
        }
        Err(other) => Err(other),
    }
}

async fn show_tasks(
    bot: &Bot,
    store: &Store,
    chat_id: ChatId,
    user_id: i64,
) -> Result<(), BotError> {
    let tasks = store.open_tasks(user_id).await?;
    if tasks.is_empty() {
        delivery::send_text(bot, chat_id, views::NO_OPEN_TASKS, None).await?;
        return Ok(());
    }

    let keyboard = views::tasks_keyboard(&tasks);
    delivery::send_text(bot, chat_id, views::TASKS_HEADER, Some(keyboard)).await?;
    Ok(())
}

async fn show_leaderboard(bot: &Bot, store: &Store, chat_id: ChatId) -> Result<(), BotError> {
    let top = store.top_users(10).await?;
    delivery::send_text(bot, chat_id, &views::leaderboard(&top), None).await?;
    Ok(())
}

async fn show_referral_info(
    bot: &Bot,
    store: &Store,
    chat_id: ChatId,
    user_id: i64,
) -> Result<(), BotError> {
    // A dangling referrer id (no such row) reads as not referred.
    let referrer = match store.get_user(user_id).await?.and_then(|u| u.referred_by) {
        Some(referrer_id) => store.get_user(referrer_id).await?,
        None => None,
    };

    let text = views::referral_info(referrer.as_ref().map(|u| u.username.as_str()));
    delivery::send_text(bot, chat_id, &text, None).await?;
    Ok(())
}
