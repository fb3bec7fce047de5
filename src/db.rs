use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::BotError;
use crate::models::{task::Task, user::User};

/// Tasks inserted on first startup so a fresh install has something to
/// complete. Matches the live deployment's catalogue.
const DEFAULT_TASKS: &[(&str, &str, i64)] = &[
    ("Join Community", "Join our Telegram community", 100),
    ("Share Invite", "Share your referral link with friends", 50),
    ("Daily Check-in", "Check in daily to earn points", 25),
    ("Complete Profile", "Fill in your profile information", 75),
];

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY,
        username TEXT NOT NULL,
        referred_by INTEGER,
        doge_points INTEGER NOT NULL DEFAULT 0,
        social_tasks_completed INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        task_id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_name TEXT NOT NULL,
        task_description TEXT NOT NULL,
        doge_reward INTEGER NOT NULL CHECK (doge_reward > 0)
    )",
    "CREATE TABLE IF NOT EXISTS completed_tasks (
        user_id INTEGER NOT NULL REFERENCES users(user_id),
        task_id INTEGER NOT NULL REFERENCES tasks(task_id),
        PRIMARY KEY (user_id, task_id)
    )",
];

/// Ledger store over a SQLite pool. Each public operation is a single
/// transaction; handlers get a cloned handle through the dispatcher's
/// dependency map instead of sharing a global connection.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn new(path: &str) -> Result<Self, BotError> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);
        let store = Self::with_options(opts, 4).await?;
        info!("ledger store initialized at {path}");
        Ok(store)
    }

    pub(crate) async fn with_options(
        opts: SqliteConnectOptions,
        max_connections: u32,
    ) -> Result<Self, BotError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }

        Ok(Store { pool })
    }

    /// Close the pool, flushing outstanding writes. For shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert the default task catalogue when the tasks table is empty.
    pub async fn seed_default_tasks(&self) -> Result<(), BotError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        for (name, description, reward) in DEFAULT_TASKS {
            self.create_task(name, description, *reward).await?;
        }
        info!("seeded {} default tasks", DEFAULT_TASKS.len());
        Ok(())
    }

    /// Register a user if unseen; refresh the display name otherwise
    /// (last seen value wins). New users start with zero points, no
    /// referrer, and the social gate still closed.
    pub async fn get_or_create_user(
        &self,
        user_id: i64,
        username: &str,
    ) -> Result<User, BotError> {
        sqlx::query(
            "INSERT INTO users (user_id, username) VALUES (?, ?) \
             ON CONFLICT(user_id) DO UPDATE SET username = excluded.username",
        )
        .bind(user_id)
        .bind(username)
        .execute(&self.pool)
        .await?;

        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username, referred_by, doge_points, social_tasks_completed \
             FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, BotError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, username, referred_by, doge_points, social_tasks_completed \
             FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Record who invited the user. Set-once: a later call with a
    /// different referrer is a silent no-op.
    pub async fn set_referrer(&self, user_id: i64, referrer_id: i64) -> Result<(), BotError> {
        sqlx::query(
            "UPDATE users SET referred_by = ? WHERE user_id = ? AND referred_by IS NULL",
        )
        .bind(referrer_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close the social gate for good. Idempotent; there is no way back.
    pub async fn mark_onboarded(&self, user_id: i64) -> Result<(), BotError> {
        sqlx::query("UPDATE users SET social_tasks_completed = 1 WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Tasks the user has not completed yet.
    pub async fn open_tasks(&self, user_id: i64) -> Result<Vec<Task>, BotError> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT task_id, task_name, task_description, doge_reward FROM tasks \
             WHERE task_id NOT IN (SELECT task_id FROM completed_tasks WHERE user_id = ?) \
             ORDER BY task_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tasks)
    }

    /// Apply a task completion: record it, credit the reward, and pay
    /// the referrer half of it. One transaction — a duplicate tap or a
    /// bogus task id rolls the whole thing back.
    pub async fn complete_task(&self, user_id: i64, task_id: i64) -> Result<i64, BotError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query("INSERT INTO completed_tasks (user_id, task_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(task_id)
            .execute(&mut *tx)
            .await;
        if let Err(err) = inserted {
            return Err(match &err {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    BotError::DuplicateCompletion
                }
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    BotError::UnknownTask(task_id)
                }
                _ => BotError::Database(err),
            });
        }

        let reward: i64 = sqlx::query_scalar("SELECT doge_reward FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(BotError::UnknownTask(task_id))?;

        add_points(&mut *tx, user_id, reward).await?;

        let referrer: Option<i64> =
            sqlx::query_scalar::<_, Option<i64>>("SELECT referred_by FROM users WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .flatten();
        if let Some(referrer_id) = referrer {
            add_points(&mut *tx, referrer_id, reward / 2).await?;
        }

        tx.commit().await?;
        Ok(reward)
    }

    pub async fn add_points(&self, user_id: i64, delta: i64) -> Result<(), BotError> {
        add_points(&self.pool, user_id, delta).await?;
        Ok(())
    }

    /// Leaderboard: top `n` users by points, ties broken by row order.
    pub async fn top_users(&self, n: i64) -> Result<Vec<(String, i64)>, BotError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT username, doge_points FROM users \
             ORDER BY doge_points DESC, rowid ASC LIMIT ?",
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_task(
        &self,
        name: &str,
        description: &str,
        reward: i64,
    ) -> Result<Task, BotError> {
        if reward <= 0 {
            return Err(BotError::InvalidReward(reward));
        }

        let task = sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (task_name, task_description, doge_reward) VALUES (?, ?, ?) \
             RETURNING task_id, task_name, task_description, doge_reward",
        )
        .bind(name)
        .bind(description)
        .bind(reward)
        .fetch_one(&self.pool)
        .await?;
        Ok(task)
    }
}

async fn add_points<'e, E>(executor: E, user_id: i64, delta: i64) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("UPDATE users SET doge_points = doge_points + ? WHERE user_id = ?")
        .bind(delta)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    async fn test_store() -> Store {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        Store::with_options(opts, 1).await.unwrap()
    }

    #[tokio::test]
    async fn new_user_starts_clean() {
        let store = test_store().await;
        let user = store.get_or_create_user(1, "alice").await.unwrap();
        assert_eq!(user.doge_points, 0);
        assert!(!user.social_tasks_completed);
        assert!(user.referred_by.is_none());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_and_refreshes_username() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();
        store.add_points(1, 10).await.unwrap();

        let again = store.get_or_create_user(1, "alice_renamed").await.unwrap();
        assert_eq!(again.username, "alice_renamed");
        assert_eq!(again.doge_points, 10, "re-registering must not reset points");
    }

    #[tokio::test]
    async fn referrer_is_set_once() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();
        store.get_or_create_user(2, "bob").await.unwrap();

        store.set_referrer(2, 1).await.unwrap();
        store.set_referrer(2, 999).await.unwrap();

        let bob = store.get_user(2).await.unwrap().unwrap();
        assert_eq!(bob.referred_by, Some(1));
    }

    #[tokio::test]
    async fn onboarding_is_terminal_and_idempotent() {
        let store = test_store().await;
        let fresh = store.get_or_create_user(1, "alice").await.unwrap();
        assert!(!fresh.social_tasks_completed);

        store.mark_onboarded(1).await.unwrap();
        store.mark_onboarded(1).await.unwrap();
        let user = store.get_user(1).await.unwrap().unwrap();
        assert!(user.social_tasks_completed);
    }

    #[tokio::test]
    async fn create_task_rejects_non_positive_reward() {
        let store = test_store().await;
        assert!(matches!(
            store.create_task("X", "Y", 0).await,
            Err(BotError::InvalidReward(0))
        ));
        assert!(matches!(
            store.create_task("X", "Y", -5).await,
            Err(BotError::InvalidReward(-5))
        ));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 0, "rejected tasks must not be inserted");
    }

    #[tokio::test]
    async fn completing_a_task_credits_the_reward() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();
        let task = store.create_task("Join Community", "...", 100).await.unwrap();

        let reward = store.complete_task(1, task.task_id).await.unwrap();
        assert_eq!(reward, 100);
        let alice = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(alice.doge_points, 100);
    }

    #[tokio::test]
    async fn duplicate_completion_fails_and_changes_nothing() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();
        store.get_or_create_user(2, "bob").await.unwrap();
        store.set_referrer(2, 1).await.unwrap();
        let task = store.create_task("T", "...", 100).await.unwrap();

        store.complete_task(2, task.task_id).await.unwrap();
        let err = store.complete_task(2, task.task_id).await.unwrap_err();
        assert!(matches!(err, BotError::DuplicateCompletion));

        let bob = store.get_user(2).await.unwrap().unwrap();
        let alice = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(bob.doge_points, 100, "second tap must not pay twice");
        assert_eq!(alice.doge_points, 50, "referrer must not be paid twice");
    }

    #[tokio::test]
    async fn unknown_task_fails_and_leaves_no_completion_row() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();

        let err = store.complete_task(1, 9999).await.unwrap_err();
        assert!(matches!(err, BotError::UnknownTask(9999)));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM completed_tasks")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
        let alice = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(alice.doge_points, 0);
    }

    #[tokio::test]
    async fn referral_bonus_is_half_rounded_down() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();
        store.get_or_create_user(2, "bob").await.unwrap();
        store.set_referrer(2, 1).await.unwrap();

        let tiny = store.create_task("Tiny", "...", 1).await.unwrap();
        store.complete_task(2, tiny.task_id).await.unwrap();

        let alice = store.get_user(1).await.unwrap().unwrap();
        assert_eq!(alice.doge_points, 0, "a reward of 1 yields no bonus");
        let bob = store.get_user(2).await.unwrap().unwrap();
        assert_eq!(bob.doge_points, 1);
    }

    #[tokio::test]
    async fn referral_scenario_pays_only_the_direct_referrer() {
        // A completes with no referrer, then B (referred by A) completes
        // the same task: B gets the full reward, A gets half on top.
        let store = test_store().await;
        store.get_or_create_user(1, "a").await.unwrap();
        store.get_or_create_user(2, "b").await.unwrap();
        let task = store.create_task("Join Community", "...", 100).await.unwrap();

        store.complete_task(1, task.task_id).await.unwrap();
        assert_eq!(store.get_user(1).await.unwrap().unwrap().doge_points, 100);

        store.set_referrer(2, 1).await.unwrap();
        store.complete_task(2, task.task_id).await.unwrap();

        assert_eq!(store.get_user(2).await.unwrap().unwrap().doge_points, 100);
        assert_eq!(store.get_user(1).await.unwrap().unwrap().doge_points, 150);
    }

    #[tokio::test]
    async fn bonus_to_unknown_referrer_is_dropped() {
        // referred_by carries no foreign key, so a dangling referrer id
        // is storable; the bonus update simply touches zero rows.
        let store = test_store().await;
        store.get_or_create_user(2, "bob").await.unwrap();
        store.set_referrer(2, 777).await.unwrap();
        let task = store.create_task("T", "...", 100).await.unwrap();

        store.complete_task(2, task.task_id).await.unwrap();
        assert_eq!(store.get_user(2).await.unwrap().unwrap().doge_points, 100);
    }

    #[tokio::test]
    async fn open_tasks_excludes_completed_ones() {
        let store = test_store().await;
        store.get_or_create_user(1, "alice").await.unwrap();
        let first = store.create_task("A", "...", 10).await.unwrap();
        store.create_task("B", "...", 20).await.unwrap();

        assert_eq!(store.open_tasks(1).await.unwrap().len(), 2);

        store.complete_task(1, first.task_id).await.unwrap();
        let open = store.open_tasks(1).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].task_name, "B");
    }

    #[tokio::test]
    async fn top_users_is_bounded_and_descending() {
        let store = test_store().await;
        for (id, name, points) in [(1, "a", 30), (2, "b", 50), (3, "c", 10), (4, "d", 50)] {
            store.get_or_create_user(id, name).await.unwrap();
            store.add_points(id, points).await.unwrap();
        }

        let top = store.top_users(3).await.unwrap();
        assert_eq!(top.len(), 3);
        assert!(top.windows(2).all(|w| w[0].1 >= w[1].1));
        // Tied at 50: b registered before d, so b ranks first.
        assert_eq!(top[0].0, "b");
        assert_eq!(top[1].0, "d");
    }

    #[tokio::test]
    async fn seeding_is_a_noop_when_tasks_exist() {
        let store = test_store().await;
        store.seed_default_tasks().await.unwrap();
        let seeded = store.open_tasks(0).await.unwrap();
        assert_eq!(seeded.len(), DEFAULT_TASKS.len());
        assert_eq!(seeded[0].task_name, "Join Community");
        assert_eq!(seeded[0].doge_reward, 100);

        store.seed_default_tasks().await.unwrap();
        assert_eq!(store.open_tasks(0).await.unwrap().len(), DEFAULT_TASKS.len());
    }
}
