//! Message texts and inline keyboards. Everything here is pure so the
//! rendering can be checked without a live bot.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use url::Url;

use crate::models::task::Task;
use crate::router::{SOCIAL_TASKS_COMPLETED, TASK_PREFIX};

pub const GENERIC_APOLOGY: &str =
    "Sorry, there was an error processing your request. Please try again later.";
pub const UNAUTHORIZED: &str = "You are not authorized to use this command.";
pub const ALREADY_COMPLETED: &str = "You've already completed this task.";
pub const NO_OPEN_TASKS: &str = "No tasks available at the moment. Check back later!";
pub const TASKS_HEADER: &str = "📜 *Available Tasks:*";

pub const ADD_TASK_USAGE: &str = "Usage: /addtask <name> <description> <doge_reward>\n\
     Example: /addtask \"Begin Again\" \"Follow our Instagram account to earn points\" 50";

const TWITTER_URL: &str = "https://twitter.com/your_twitter";
const TELEGRAM_CHANNEL_URL: &str = "https://t.me/your_channel";
const TELEGRAM_GROUP_URL: &str = "https://t.me/your_group";
const DISCORD_URL: &str = "https://discord.gg/your_invite";

pub fn referral_link(bot_username: &str, user_id: i64) -> String {
    format!("https://t.me/{bot_username}?start={user_id}")
}

pub fn social_prompt() -> (String, InlineKeyboardMarkup) {
    let text = "👋 *Welcome to Doge World!* 🐕\n\n\
         To start earning Doge Points, please join our social accounts:\n\n\
         1. Follow us on Twitter\n\
         2. Join our Telegram channel\n\
         3. Join our Telegram group\n\
         4. Join our Discord server\n\n\
         Click the buttons below to join:"
        .to_string();

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url("🐦 Follow us on Twitter", link(TWITTER_URL))],
        vec![InlineKeyboardButton::url(
            "📢 Join our Telegram channel",
            link(TELEGRAM_CHANNEL_URL),
        )],
        vec![InlineKeyboardButton::url(
            "👥 Join our Telegram group",
            link(TELEGRAM_GROUP_URL),
        )],
        vec![InlineKeyboardButton::url("🎮 Join our Discord server", link(DISCORD_URL))],
        vec![InlineKeyboardButton::callback(
            "✅ I've joined all",
            SOCIAL_TASKS_COMPLETED,
        )],
    ]);

    (text, keyboard)
}

pub fn social_congrats() -> String {
    "🎉 *Congratulations!* You've completed all social tasks!\n\n\
     Preparing your Doge World adventure..."
        .to_string()
}

pub fn main_menu(bot_username: &str, user_id: i64) -> (String, InlineKeyboardMarkup) {
    let text = format!(
        "🐕 *Welcome to Doge World!* 🐕\n\n\
         You are now a *Doge Adventurer* on a quest to collect as many *Doge Points* as possible!\n\n\
         🌟 *How to Earn Doge Points:*\n\
         - Complete tasks to earn points.\n\
         - Invite friends and earn points when they complete tasks.\n\n\
         🔗 *Your Referral Link:* `{}`\n\
         Share this link with friends to earn bonus points!\n\n\
         🏆 *Climb the Leaderboard* and become the *Top Doge*!\n\n\
         Use the buttons below to get started:",
        referral_link(bot_username, user_id)
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📜 Tasks", "tasks")],
        vec![InlineKeyboardButton::callback("🏆 Leaderboard", "leaderboard")],
        vec![InlineKeyboardButton::callback("👤 Referral Info", "referral")],
        vec![InlineKeyboardButton::callback("🔗 Get Referral Link", "referral_link")],
    ]);

    (text, keyboard)
}

/// One button per open task, payload `task_<id>`.
pub fn tasks_keyboard(tasks: &[Task]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(tasks.iter().map(|task| {
        vec![InlineKeyboardButton::callback(
            format!("{} - {} Doge Points", task.task_name, task.doge_reward),
            format!("{TASK_PREFIX}{}", task.task_id),
        )]
    }))
}

pub fn task_completed(reward: i64) -> String {
    format!("🎉 *Task completed!* You earned {reward} Doge Points! 🐕")
}

pub fn leaderboard(rows: &[(String, i64)]) -> String {
    let mut text = "🏆 *Top 10 Doge Adventurers* 🏆\n\n".to_string();
    for (rank, (username, points)) in rows.iter().enumerate() {
        text.push_str(&format!("{}. {}: {} Doge Points\n", rank + 1, username, points));
    }
    text
}

pub fn referral_info(referrer_username: Option<&str>) -> String {
    match referrer_username {
        Some(name) => format!("👤 *You were invited by:* @{name}"),
        None => "You were not referred by anyone.".to_string(),
    }
}

pub fn referral_link_message(bot_username: &str, user_id: i64) -> String {
    format!(
        "🔗 *Your Referral Link:* `{}`\n\n\
         Share this link with friends to earn bonus points!",
        referral_link(bot_username, user_id)
    )
}

pub fn task_added(task: &Task) -> String {
    format!(
        "✅ *Task added successfully!*\n\
         Name: {}\n\
         Description: {}\n\
         Reward: {} Doge Points",
        task.task_name, task.task_description, task.doge_reward
    )
}

// Social links are compile-time constants; a parse failure here is a
// programming error, caught by the test below.
fn link(url: &str) -> Url {
    Url::parse(url).expect("static social link must be a valid url")
}
