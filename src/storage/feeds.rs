use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, Feed, FeedListing, FeedRow};

/// Least recently fetched first; never-fetched feeds (NULL) lead, and rowid
/// (insertion order) breaks ties so repeated selection always makes progress.
const NEXT_FEED_ORDER: &str = "ORDER BY last_fetched_at ASC NULLS FIRST, rowid ASC";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Add a feed owned by `user_id`.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if a feed with the same URL already exists.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let now = to_millis(Utc::now());
        let row = sqlx::query_as::<_, FeedRow>(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, url, user_id, created_at, updated_at, last_fetched_at
        "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_feed())
    }

    /// All feeds with the name of the user who added each one.
    pub async fn get_feeds(&self) -> Result<Vec<FeedListing>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedListing>(
            r#"
            SELECT f.name, f.url, u.name AS owner_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at, f.rowid
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Peek at the feed the scheduler would pick next, without marking it.
    pub async fn get_next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            {NEXT_FEED_ORDER}
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }

    /// Record that `feed_id` was fetched at `at`. Returns false if no such feed.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let at = to_millis(at);
        let result = sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(at)
            .bind(at)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Select the least recently fetched feed and mark it fetched at `at`.
    ///
    /// Selection and mark happen in a single `UPDATE ... RETURNING` statement,
    /// so two `agg` processes sharing a database can never claim the same feed
    /// in one round. The returned feed carries the new `last_fetched_at`.
    pub async fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>, DatabaseError> {
        let at = to_millis(at);
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = (SELECT id FROM feeds {NEXT_FEED_ORDER} LIMIT 1)
            RETURNING id, name, url, user_id, created_at, updated_at, last_fetched_at
        "#
        ))
        .bind(at)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedRow::into_feed))
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, User};
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    async fn test_db() -> (Database, User) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        (db, user)
    }

    fn feed_url(n: usize) -> String {
        format!("https://feed{}.example.com/rss", n)
    }

    #[tokio::test]
    async fn test_create_feed_starts_unfetched() {
        let (db, user) = test_db().await;
        let feed = db.create_feed("Blog", &feed_url(1), user.id).await.unwrap();

        assert_eq!(feed.name, "Blog");
        assert_eq!(feed.user_id, user.id);
        assert!(feed.last_fetched_at.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_is_conflict() {
        let (db, user) = test_db().await;
        db.create_feed("One", &feed_url(1), user.id).await.unwrap();

        let err = db.create_feed("Two", &feed_url(1), user.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_get_feeds_includes_owner() {
        let (db, alice) = test_db().await;
        let bob = db.create_user("bob").await.unwrap();
        db.create_feed("A", &feed_url(1), alice.id).await.unwrap();
        db.create_feed("B", &feed_url(2), bob.id).await.unwrap();

        let listing = db.get_feeds().await.unwrap();
        let summary: Vec<(&str, &str)> = listing
            .iter()
            .map(|f| (f.name.as_str(), f.owner_name.as_str()))
            .collect();
        assert_eq!(summary, vec![("A", "alice"), ("B", "bob")]);
    }

    #[tokio::test]
    async fn test_get_feed_by_url() {
        let (db, user) = test_db().await;
        let created = db.create_feed("Blog", &feed_url(1), user.id).await.unwrap();

        let found = db.get_feed_by_url(&feed_url(1)).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(db.get_feed_by_url(&feed_url(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_feed_prefers_never_fetched() {
        let (db, user) = test_db().await;
        let first = db.create_feed("A", &feed_url(1), user.id).await.unwrap();
        let second = db.create_feed("B", &feed_url(2), user.id).await.unwrap();

        db.mark_feed_fetched(first.id, Utc::now()).await.unwrap();

        let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, second.id);
    }

    #[tokio::test]
    async fn test_next_feed_oldest_fetch_first() {
        let (db, user) = test_db().await;
        let a = db.create_feed("A", &feed_url(1), user.id).await.unwrap();
        let b = db.create_feed("B", &feed_url(2), user.id).await.unwrap();
        let now = Utc::now();

        db.mark_feed_fetched(a.id, now).await.unwrap();
        db.mark_feed_fetched(b.id, now - Duration::minutes(5)).await.unwrap();

        let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, b.id);
    }

    #[tokio::test]
    async fn test_mark_unknown_feed_returns_false() {
        let (db, _) = test_db().await;
        assert!(!db.mark_feed_fetched(uuid::Uuid::new_v4(), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_on_empty_store() {
        let (db, _) = test_db().await;
        assert!(db.claim_next_feed(Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_visits_every_feed_once_in_insertion_order() {
        let (db, user) = test_db().await;
        let mut created = Vec::new();
        for n in 0..5 {
            created.push(db.create_feed(&format!("F{n}"), &feed_url(n), user.id).await.unwrap());
        }

        let now = Utc::now();
        let mut claimed = Vec::new();
        for _ in 0..created.len() {
            let feed = db.claim_next_feed(now).await.unwrap().unwrap();
            assert_eq!(feed.last_fetched_at.map(|t| t.timestamp_millis()), Some(now.timestamp_millis()));
            claimed.push(feed.id);
        }

        let expected: Vec<_> = created.iter().map(|f| f.id).collect();
        assert_eq!(claimed, expected);
    }

    #[tokio::test]
    async fn test_claim_rotates_after_full_round() {
        let (db, user) = test_db().await;
        let a = db.create_feed("A", &feed_url(1), user.id).await.unwrap();
        let b = db.create_feed("B", &feed_url(2), user.id).await.unwrap();
        let t0 = Utc::now();

        assert_eq!(db.claim_next_feed(t0).await.unwrap().unwrap().id, a.id);
        assert_eq!(db.claim_next_feed(t0 + Duration::seconds(1)).await.unwrap().unwrap().id, b.id);
        assert_eq!(db.claim_next_feed(t0 + Duration::seconds(2)).await.unwrap().unwrap().id, a.id);
    }
}
