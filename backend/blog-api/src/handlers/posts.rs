/// Post handlers - CRUD endpoints with author-ownership checks
///
/// Create and update accept exactly two body shapes: a JSON object
/// (`{content, mediaUrl?}`) or a multipart form with a `content` text field
/// and an optional `media` file field. Anything else is a validation error;
/// there is no best-effort recovery of malformed payloads.
use actix_multipart::Multipart;
use actix_web::{web, Either, HttpResponse};
use futures_util::StreamExt;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;

use crate::db::post_repo;
use crate::error::{AppError, Result};
use crate::middleware::AuthenticatedUser;
use crate::models::Post;
use crate::services::MediaStorage;

/// Hard cap on an uploaded media file. The server's `PayloadConfig` must
/// allow at least this much plus multipart framing, or requests die at the
/// transport layer before this handler sees them.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Distinguishes an absent `mediaUrl` from an explicit `null`: on update,
/// absent keeps the current attachment while `null` detaches it.
fn double_option<'de, D>(deserializer: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostBody {
    pub content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub media_url: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub message: String,
    pub post: Post,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Either accepted request shape, reduced to one struct.
#[derive(Debug, Default)]
struct PostInput {
    content: Option<String>,
    media_url: Option<Option<String>>,
    /// Freshly stored upload URL, removed again if the request fails later.
    uploaded: Option<String>,
}

/// Parse a JSON or multipart body into a `PostInput`, storing an uploaded
/// `media` file on the way.
async fn read_post_input(
    body: Either<web::Json<PostBody>, Multipart>,
    storage: &MediaStorage,
) -> Result<PostInput> {
    match body {
        Either::Left(json) => {
            let body = json.into_inner();
            Ok(PostInput {
                content: body.content,
                media_url: body.media_url,
                uploaded: None,
            })
        }
        Either::Right(multipart) => read_multipart_input(multipart, storage).await,
    }
}

async fn read_multipart_input(payload: Multipart, storage: &MediaStorage) -> Result<PostInput> {
    let mut input = PostInput::default();

    // A file may already be on disk when a later field makes the request
    // invalid; roll it back so rejected requests leave nothing behind.
    match fill_multipart_input(&mut input, payload, storage).await {
        Ok(()) => Ok(input),
        Err(e) => {
            discard_upload(&input, storage).await;
            Err(e)
        }
    }
}

async fn fill_multipart_input(
    input: &mut PostInput,
    mut payload: Multipart,
    storage: &MediaStorage,
) -> Result<()> {
    while let Some(item) = payload.next().await {
        let mut field = item
            .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {}", e)))?;

        match field.name() {
            "content" => {
                input.content = Some(read_text_field(&mut field).await?);
            }
            "mediaUrl" => {
                input.media_url = Some(Some(read_text_field(&mut field).await?));
            }
            "media" => {
                let filename = field
                    .content_disposition()
                    .get_filename()
                    .map(str::to_owned)
                    .ok_or_else(|| {
                        AppError::Validation("Field 'media' must be a file".to_string())
                    })?;

                let data = read_field_bytes(&mut field).await?;
                let url = storage.store(&filename, &data).await?;
                input.uploaded = Some(url.clone());
                input.media_url = Some(Some(url));
            }
            other => {
                return Err(AppError::Validation(format!(
                    "Unexpected multipart field '{}'",
                    other
                )));
            }
        }
    }

    Ok(())
}

/// Remove a file stored for a request that did not go through.
async fn discard_upload(input: &PostInput, storage: &MediaStorage) {
    if let Some(url) = input.uploaded.as_deref() {
        storage.remove(url).await;
    }
}

async fn read_field_bytes(field: &mut actix_multipart::Field) -> Result<Vec<u8>> {
    let mut data = Vec::new();

    while let Some(chunk) = field.next().await {
        let chunk = chunk
            .map_err(|e| AppError::Validation(format!("Error reading upload: {}", e)))?;
        if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(format!(
                "Upload exceeds {} byte limit",
                MAX_UPLOAD_BYTES
            )));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(data)
}

async fn read_text_field(field: &mut actix_multipart::Field) -> Result<String> {
    let data = read_field_bytes(field).await?;
    String::from_utf8(data)
        .map_err(|_| AppError::Validation("Text field must be valid UTF-8".to_string()))
}

/// Create a new post
///
/// POST /api/posts (authenticated). The author is always the requester;
/// nothing in the body can set it.
pub async fn create_post(
    pool: web::Data<PgPool>,
    storage: web::Data<MediaStorage>,
    user: AuthenticatedUser,
    body: Either<web::Json<PostBody>, Multipart>,
) -> Result<HttpResponse> {
    let input = read_post_input(body, &storage).await?;

    let content = match input.content.as_deref().map(str::trim) {
        Some(content) if !content.is_empty() => content.to_string(),
        _ => {
            discard_upload(&input, &storage).await;
            return Err(AppError::Validation("Content is required".to_string()));
        }
    };

    let media_url = input.media_url.clone().flatten();

    let post = match post_repo::create_post(&pool, &content, media_url.as_deref(), user.id).await {
        Ok(post) => post,
        Err(e) => {
            discard_upload(&input, &storage).await;
            return Err(e);
        }
    };

    tracing::info!(post_id = post.id, author_id = user.id, "post created");

    Ok(HttpResponse::Created().json(PostResponse {
        message: "Post created".to_string(),
        post,
    }))
}

/// List all posts, newest first, with author public fields
///
/// GET /api/posts (public)
pub async fn list_posts(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let posts = post_repo::list_posts_with_authors(&pool).await?;
    Ok(HttpResponse::Ok().json(posts))
}

/// Update a post's content/media
///
/// PUT /api/posts/{id} (authenticated, author only). Fields absent from
/// the body keep their current values; an explicit `mediaUrl: null`
/// detaches the attachment.
pub async fn update_post(
    pool: web::Data<PgPool>,
    storage: web::Data<MediaStorage>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
    body: Either<web::Json<PostBody>, Multipart>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();

    let existing = post_repo::find_post_by_id(&pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if existing.author_id != user.id {
        return Err(AppError::Authorization(
            "You are not the author of this post".to_string(),
        ));
    }

    let input = read_post_input(body, &storage).await?;

    let content = match input.content.as_deref().map(str::trim) {
        Some(content) if !content.is_empty() => content.to_string(),
        Some(_) => {
            discard_upload(&input, &storage).await;
            return Err(AppError::Validation("Content must not be empty".to_string()));
        }
        None => existing.content.clone(),
    };

    // Absent keeps the current attachment; an explicit null detaches it.
    let media_url = match input.media_url.clone() {
        None => existing.media_url.clone(),
        Some(media_url) => media_url,
    };

    let post = match post_repo::update_post(&pool, post_id, &content, media_url.as_deref()).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            discard_upload(&input, &storage).await;
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Err(e) => {
            discard_upload(&input, &storage).await;
            return Err(e);
        }
    };

    // The replaced or detached local file goes away only once the row
    // update has succeeded; a missing file is not an error.
    if let Some(old) = existing.media_url.as_deref() {
        if post.media_url.as_deref() != Some(old) {
            storage.remove(old).await;
        }
    }

    tracing::info!(post_id = post.id, author_id = user.id, "post updated");

    Ok(HttpResponse::Ok().json(PostResponse {
        message: "Post updated".to_string(),
        post,
    }))
}

/// Delete a post
///
/// DELETE /api/posts/{id} (authenticated, author only)
pub async fn delete_post(
    pool: web::Data<PgPool>,
    storage: web::Data<MediaStorage>,
    user: AuthenticatedUser,
    post_id: web::Path<i64>,
) -> Result<HttpResponse> {
    let post_id = post_id.into_inner();

    let existing = post_repo::find_post_by_id(&pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if existing.author_id != user.id {
        return Err(AppError::Authorization(
            "You are not the author of this post".to_string(),
        ));
    }

    if let Some(media_url) = existing.media_url.as_deref() {
        storage.remove(media_url).await;
    }

    post_repo::delete_post(&pool, post_id).await?;

    tracing::info!(post_id = post_id, author_id = user.id, "post deleted");

    Ok(HttpResponse::Ok().json(DeleteResponse {
        message: "Post deleted".to_string(),
    }))
}
