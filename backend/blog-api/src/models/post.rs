use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Post model - a text body with an optional attached media URL.
///
/// Wire casing is camelCase (`mediaUrl`, `authorId`, ...) per the API
/// contract; columns stay snake_case.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public author fields joined into post listings. Only columns that exist
/// on `users` are exposed; the password hash is structurally absent.
#[derive(Debug, Clone, Serialize)]
pub struct PostAuthor {
    pub id: i64,
    pub email: String,
}

/// A post joined with its author's public fields, as returned by the
/// listing endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithAuthor {
    pub id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: PostAuthor,
}

/// Flat row shape for the posts-with-author join query.
#[derive(Debug, FromRow)]
pub struct PostWithAuthorRow {
    pub id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_email: String,
}

impl From<PostWithAuthorRow> for PostWithAuthor {
    fn from(row: PostWithAuthorRow) -> Self {
        PostWithAuthor {
            id: row.id,
            content: row.content,
            media_url: row.media_url,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            author: PostAuthor {
                id: row.author_id,
                email: row.author_email,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_camel_case() {
        let post = Post {
            id: 3,
            content: "hello".to_string(),
            media_url: Some("/uploads/x.png".to_string()),
            author_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&post).expect("serialize");
        assert_eq!(json["mediaUrl"], "/uploads/x.png");
        assert_eq!(json["authorId"], 1);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("media_url").is_none());
    }

    #[test]
    fn joined_author_exposes_only_public_fields() {
        let row = PostWithAuthorRow {
            id: 3,
            content: "hello".to_string(),
            media_url: None,
            author_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            author_email: "a@x.com".to_string(),
        };

        let json = serde_json::to_value(PostWithAuthor::from(row)).expect("serialize");
        assert_eq!(json["author"]["id"], 1);
        assert_eq!(json["author"]["email"], "a@x.com");
        assert!(json["author"].get("password").is_none());
        assert!(json["author"].get("passwordHash").is_none());
    }
}
