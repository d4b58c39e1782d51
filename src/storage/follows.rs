use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, FeedFollow, FeedFollowRow};

const FOLLOW_COLUMNS: &str = r#"
    ff.id, ff.user_id, ff.feed_id, ff.created_at, ff.updated_at,
    u.name AS user_name, f.name AS feed_name
"#;

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Make `user_id` follow `feed_id`, returning the follow with both names.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if the user already follows the feed.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, DatabaseError> {
        let now = to_millis(Utc::now());
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, FeedFollowRow>(&format!(
            r#"
            SELECT {FOLLOW_COLUMNS}
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.id = ?
        "#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_follow())
    }

    /// Feeds followed by `user_id`, oldest follow first.
    pub async fn get_feed_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FeedFollow>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(&format!(
            r#"
            SELECT {FOLLOW_COLUMNS}
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.created_at, ff.rowid
        "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedFollowRow::into_follow).collect())
    }

    /// Remove the (user, feed) follow. Returns false if it did not exist.
    pub async fn delete_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
