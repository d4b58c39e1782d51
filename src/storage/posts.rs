use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, DatabaseError, NewPost, Post, PostRow};

/// Upper bound on `browse` page size
const MAX_POSTS: i64 = 1000;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post under a fresh id.
    ///
    /// # Errors
    ///
    /// `DatabaseError::Conflict` if a post with the same URL already exists.
    /// The ingester treats that as the normal "already seen" outcome.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let now = to_millis(Utc::now());
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, url, description, published_at, feed_id, created_at, updated_at
        "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.map(to_millis))
        .bind(post.feed_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_post())
    }

    /// Posts from feeds `user_id` follows, newest publication first.
    ///
    /// Posts without a publication date sort after dated ones, newest
    /// insertion first among themselves.
    pub async fn get_posts_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id, p.title, p.url, p.description, p.published_at, p.feed_id,
                   p.created_at, p.updated_at
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC, p.rowid DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    pub async fn count_posts_for_feed(&self, feed_id: Uuid) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, Feed, NewPost, User};
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, User, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/feed.xml", user.id)
            .await
            .unwrap();
        (db, user, feed)
    }

    fn new_post(feed: &Feed, slug: &str, days_ago: Option<i64>) -> NewPost {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        NewPost {
            title: format!("Post {slug}"),
            url: format!("https://example.com/{slug}"),
            description: Some(format!("About {slug}")),
            published_at: days_ago.map(|d| base - Duration::days(d)),
            feed_id: feed.id,
        }
    }

    #[tokio::test]
    async fn test_create_post_preserves_optional_fields() {
        let (db, _, feed) = setup().await;
        let mut candidate = new_post(&feed, "a", Some(0));
        candidate.description = None;

        let post = db.create_post(&candidate).await.unwrap();
        assert_eq!(post.description, None);
        assert_eq!(post.published_at, candidate.published_at);
        assert_eq!(post.feed_id, feed.id);
    }

    #[tokio::test]
    async fn test_duplicate_url_is_conflict() {
        let (db, _, feed) = setup().await;
        db.create_post(&new_post(&feed, "a", Some(1))).await.unwrap();

        let err = db.create_post(&new_post(&feed, "a", Some(2))).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)), "got {err:?}");
        assert_eq!(db.count_posts_for_feed(feed.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_posts_for_user_newest_first_with_limit() {
        let (db, user, feed) = setup().await;
        db.create_feed_follow(user.id, feed.id).await.unwrap();
        db.create_post(&new_post(&feed, "old", Some(10))).await.unwrap();
        db.create_post(&new_post(&feed, "undated", None)).await.unwrap();
        db.create_post(&new_post(&feed, "new", Some(0))).await.unwrap();
        db.create_post(&new_post(&feed, "mid", Some(5))).await.unwrap();

        let titles = |posts: Vec<crate::storage::Post>| -> Vec<String> {
            posts.into_iter().map(|p| p.title).collect()
        };

        let two = db.get_posts_for_user(user.id, 2).await.unwrap();
        assert_eq!(titles(two), vec!["Post new", "Post mid"]);

        let all = db.get_posts_for_user(user.id, 10).await.unwrap();
        assert_eq!(
            titles(all),
            vec!["Post new", "Post mid", "Post old", "Post undated"]
        );
    }

    #[tokio::test]
    async fn test_posts_for_user_only_followed_feeds() {
        let (db, alice, feed) = setup().await;
        let other = db
            .create_feed("Other", "https://other.example.com/rss", alice.id)
            .await
            .unwrap();
        db.create_feed_follow(alice.id, feed.id).await.unwrap();

        db.create_post(&new_post(&feed, "mine", Some(1))).await.unwrap();
        db.create_post(&new_post(&other, "theirs", Some(0))).await.unwrap();

        let posts = db.get_posts_for_user(alice.id, 10).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://example.com/mine");
    }

    #[tokio::test]
    async fn test_posts_for_user_without_follows() {
        let (db, user, feed) = setup().await;
        db.create_post(&new_post(&feed, "a", Some(1))).await.unwrap();
        assert!(db.get_posts_for_user(user.id, 5).await.unwrap().is_empty());
    }
}
