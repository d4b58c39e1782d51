use uuid::Uuid;

use super::dates::parse_pub_date;
use super::document::RssItem;
use crate::storage::{Database, NewPost};

/// Outcome of storing one fetched document's items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Items stored as new posts
    pub inserted: usize,
    /// Items whose URL was already stored
    pub duplicates: usize,
    /// Items that could not be stored for any other reason
    pub failed: usize,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }
}

/// Map a fetched item onto a post for `feed_id`.
///
/// Title and link are copied verbatim; an empty description becomes `None`
/// and an unparseable `pubDate` leaves the publication time unset.
pub fn to_new_post(item: &RssItem, feed_id: Uuid) -> NewPost {
    let description = if item.description.is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    let published_at = parse_pub_date(&item.pub_date);
    if published_at.is_none() && !item.pub_date.trim().is_empty() {
        tracing::debug!(link = %item.link, pub_date = %item.pub_date, "Unrecognized pubDate");
    }

    NewPost {
        title: item.title.clone(),
        url: item.link.clone(),
        description,
        published_at,
        feed_id,
    }
}

/// Store every item as a post of `feed_id`.
///
/// Items already stored (same URL) are counted as duplicates. Any other
/// storage failure is logged and the item skipped; one bad item never stops
/// the rest of the batch.
pub async fn ingest_items(db: &Database, feed_id: Uuid, items: &[RssItem]) -> IngestReport {
    let mut report = IngestReport::default();

    for item in items {
        let post = to_new_post(item, feed_id);
        match db.create_post(&post).await {
            Ok(_) => report.inserted += 1,
            Err(e) if e.is_conflict() => report.duplicates += 1,
            Err(e) => {
                tracing::warn!(url = %post.url, error = %e, "Failed to store post");
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Feed;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn item(link: &str, description: &str, pub_date: &str) -> RssItem {
        RssItem {
            title: format!("Title of {link}"),
            link: link.to_string(),
            description: description.to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    async fn setup() -> (Database, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/feed.xml", user.id)
            .await
            .unwrap();
        (db, feed)
    }

    #[test]
    fn test_to_new_post_maps_fields() {
        let feed_id = Uuid::new_v4();
        let post = to_new_post(
            &item("https://example.com/a", "Body", "Mon, 02 Jan 2006 15:04:05 -0700"),
            feed_id,
        );

        assert_eq!(post.title, "Title of https://example.com/a");
        assert_eq!(post.url, "https://example.com/a");
        assert_eq!(post.description.as_deref(), Some("Body"));
        assert_eq!(
            post.published_at,
            Some(Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap())
        );
        assert_eq!(post.feed_id, feed_id);
    }

    #[test]
    fn test_to_new_post_empty_optionals() {
        let post = to_new_post(&item("https://example.com/a", "", "not a date"), Uuid::new_v4());
        assert_eq!(post.description, None);
        assert_eq!(post.published_at, None);
    }

    #[tokio::test]
    async fn test_ingest_counts_duplicates() {
        let (db, feed) = setup().await;
        let items = vec![
            item("https://example.com/a", "A", ""),
            item("https://example.com/b", "B", ""),
            item("https://example.com/a", "A again", ""),
        ];

        let report = ingest_items(&db, feed.id, &items).await;
        assert_eq!(
            report,
            IngestReport {
                inserted: 2,
                duplicates: 1,
                failed: 0
            }
        );
        assert_eq!(report.total(), 3);
        assert_eq!(db.count_posts_for_feed(feed.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_is_idempotent() {
        let (db, feed) = setup().await;
        let items = vec![item("https://example.com/a", "A", "")];

        ingest_items(&db, feed.id, &items).await;
        let second = ingest_items(&db, feed.id, &items).await;

        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(db.count_posts_for_feed(feed.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_unknown_feed_fails_per_item() {
        let (db, _) = setup().await;
        let items = vec![
            item("https://example.com/a", "", ""),
            item("https://example.com/b", "", ""),
        ];

        // Foreign key violation on every item; the batch still completes
        let report = ingest_items(&db, Uuid::new_v4(), &items).await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.inserted, 0);
    }
}
