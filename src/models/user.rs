use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub referred_by: Option<i64>,
    pub doge_points: i64,
    pub social_tasks_completed: bool,
}
