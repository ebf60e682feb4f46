use sqlx::PgPool;

use crate::error::Result;
use crate::models::post::PostWithAuthorRow;
use crate::models::{Post, PostWithAuthor};

/// Create a new post owned by `author_id`
pub async fn create_post(
    pool: &PgPool,
    content: &str,
    media_url: Option<&str>,
    author_id: i64,
) -> Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (content, media_url, author_id)
        VALUES ($1, $2, $3)
        RETURNING id, content, media_url, author_id, created_at, updated_at
        "#,
    )
    .bind(content)
    .bind(media_url)
    .bind(author_id)
    .fetch_one(pool)
    .await?;

    Ok(post)
}

/// Find a post by id
pub async fn find_post_by_id(pool: &PgPool, post_id: i64) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content, media_url, author_id, created_at, updated_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// List all posts, newest first, each joined with its author's public
/// fields. The password hash is never selected.
pub async fn list_posts_with_authors(pool: &PgPool) -> Result<Vec<PostWithAuthor>> {
    let rows = sqlx::query_as::<_, PostWithAuthorRow>(
        r#"
        SELECT p.id, p.content, p.media_url, p.author_id, p.created_at, p.updated_at,
               u.email AS author_email
        FROM posts p
        JOIN users u ON u.id = p.author_id
        ORDER BY p.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PostWithAuthor::from).collect())
}

/// Apply new content/media to a post and bump `updated_at`.
///
/// Last writer wins under concurrent updates; there is no optimistic
/// locking on posts.
pub async fn update_post(
    pool: &PgPool,
    post_id: i64,
    content: &str,
    media_url: Option<&str>,
) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET content = $2, media_url = $3, updated_at = now()
        WHERE id = $1
        RETURNING id, content, media_url, author_id, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(content)
    .bind(media_url)
    .fetch_optional(pool)
    .await?;

    Ok(post)
}

/// Delete a post. Returns whether a row was removed.
pub async fn delete_post(pool: &PgPool, post_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// List posts belonging to one author, newest first.
pub async fn find_posts_by_author(pool: &PgPool, author_id: i64) -> Result<Vec<Post>> {
    let posts = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, content, media_url, author_id, created_at, updated_at
        FROM posts
        WHERE author_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(author_id)
    .fetch_all(pool)
    .await?;

    Ok(posts)
}
