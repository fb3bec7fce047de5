use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct Task {
    pub task_id: i64,
    pub task_name: String,
    pub task_description: String,
    pub doge_reward: i64,
}
