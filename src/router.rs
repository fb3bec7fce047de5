/// Prefix for per-task completion buttons. Payloads carrying it must
/// never reach the flat menu dispatch, even with a malformed suffix.
pub const TASK_PREFIX: &str = "task_";

pub const SOCIAL_TASKS_COMPLETED: &str = "social_tasks_completed";

/// The closed set of callback payloads the bot emits on its buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    SocialTasksCompleted,
    CompleteTask(i64),
    Tasks,
    Leaderboard,
    Referral,
    ReferralLink,
}

impl CallbackAction {
    /// Most-specific-first: the exact onboarding payload, then the
    /// `task_<id>` pattern, then the flat menu names. Anything else —
    /// including a `task_` payload with an unparseable id — is `None`
    /// and gets the caller's unrecognized-action branch.
    pub fn parse(data: &str) -> Option<Self> {
        if data == SOCIAL_TASKS_COMPLETED {
            return Some(CallbackAction::SocialTasksCompleted);
        }
        if let Some(rest) = data.strip_prefix(TASK_PREFIX) {
            return rest.parse().ok().map(CallbackAction::CompleteTask);
        }
        match data {
            "tasks" => Some(CallbackAction::Tasks),
            "leaderboard" => Some(CallbackAction::Leaderboard),
            "referral" => Some(CallbackAction::Referral),
            "referral_link" => Some(CallbackAction::ReferralLink),
            _ => None,
        }
    }
}
