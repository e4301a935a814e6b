/**
 * Portfolio Routes
 * Showcase items, each owning exactly one uploaded image or video
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::PortfolioItem;
use crate::error::{ApiError, ApiResult};
use crate::media::{MediaStore, MediaType, StoredMedia};
use crate::pagination::{PageRange, Paginated};
use crate::routes::form::FormData;
use crate::AppState;

async fn fetch_item(pool: &PgPool, id: Uuid) -> ApiResult<PortfolioItem> {
    sqlx::query_as::<_, PortfolioItem>("SELECT * FROM portfolio_items WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Portfolio item not found"))
}

/// A declared `mediaType` must agree with what the uploaded bytes turned out to be.
fn check_declared_type(declared: Option<MediaType>, stored: &StoredMedia) -> ApiResult<()> {
    match declared {
        Some(t) if t != stored.media_type => Err(ApiError::bad_request(format!(
            "mediaType '{}' does not match the uploaded {} file",
            t.as_str(),
            stored.media_type.as_str()
        ))),
        _ => Ok(()),
    }
}

/// GET /portfolio - newest first
pub async fn list_items(
    State(state): State<AppState>,
    range: PageRange,
) -> ApiResult<Paginated<PortfolioItem>> {
    let items = sqlx::query_as::<_, PortfolioItem>(
        r#"
        SELECT * FROM portfolio_items
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(range.limit())
    .bind(range.offset())
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM portfolio_items")
        .fetch_one(&state.pool)
        .await?;

    Ok(Paginated::new(items, range, total.0))
}

/// GET /portfolio/{id}
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PortfolioItem>> {
    Ok(Json(fetch_item(&state.pool, id).await?))
}

/// POST /portfolio - file + title required (auth required)
pub async fn create_item(
    State(state): State<AppState>,
    mut form: FormData,
) -> ApiResult<impl IntoResponse> {
    let upload = form
        .take_file("file")
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let title = form
        .text("title")
        .ok_or_else(|| ApiError::bad_request("Title is required"))?;
    let description = form.text("description");
    let declared = form.parse::<MediaType>("mediaType")?;

    let stored = state.media.store(&upload).await?;
    let item = state
        .media
        .commit(Some(&stored.filename), None, async {
            check_declared_type(declared, &stored)?;
            let item = sqlx::query_as::<_, PortfolioItem>(
                r#"
                INSERT INTO portfolio_items (title, description, media_type, media_url, created_at, updated_at)
                VALUES ($1, $2, $3, $4, now(), now())
                RETURNING *
                "#,
            )
            .bind(&title)
            .bind(&description)
            .bind(stored.media_type.as_str())
            .bind(&stored.filename)
            .fetch_one(&state.pool)
            .await?;
            Ok(item)
        })
        .await?;

    tracing::info!(
        id = %item.id,
        url = %MediaStore::public_url(&item.media_url),
        "portfolio item created"
    );

    Ok((StatusCode::CREATED, Json(item)))
}

/// PUT /portfolio/{id} - partial update, optional replacement file (auth required)
///
/// The new file is written and the row updated before the old file is removed,
/// so a failure part-way leaves at worst an orphaned file, never a row pointing
/// at a missing one.
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut form: FormData,
) -> ApiResult<Json<PortfolioItem>> {
    let existing = fetch_item(&state.pool, id).await?;

    let title = match form.optional_text("title") {
        Some(None) => return Err(ApiError::bad_request("Title cannot be empty")),
        Some(Some(t)) => t,
        None => existing.title.clone(),
    };
    let description = form
        .optional_text("description")
        .unwrap_or_else(|| existing.description.clone());
    let declared = form.parse::<MediaType>("mediaType")?;

    let replacement = match form.take_file("file") {
        Some(upload) => Some(state.media.store(&upload).await?),
        None => {
            if declared.is_some_and(|t| t != existing.media_type) {
                return Err(ApiError::bad_request(
                    "mediaType can only change together with a new file",
                ));
            }
            None
        }
    };

    let (media_type, media_url) = match &replacement {
        Some(stored) => (stored.media_type, stored.filename.clone()),
        None => (existing.media_type, existing.media_url.clone()),
    };
    let new_file = replacement.as_ref().map(|s| s.filename.as_str());
    let old_file = new_file.map(|_| existing.media_url.as_str());

    let item = state
        .media
        .commit(new_file, old_file, async {
            if let Some(stored) = &replacement {
                check_declared_type(declared, stored)?;
            }
            sqlx::query_as::<_, PortfolioItem>(
                r#"
                UPDATE portfolio_items
                SET title = $1, description = $2, media_type = $3, media_url = $4, updated_at = now()
                WHERE id = $5
                RETURNING *
                "#,
            )
            .bind(&title)
            .bind(&description)
            .bind(media_type.as_str())
            .bind(&media_url)
            .bind(id)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| ApiError::not_found("Portfolio item not found"))
        })
        .await?;

    tracing::info!(id = %item.id, replaced = new_file.is_some(), "portfolio item updated");

    Ok(Json(item))
}

/// DELETE /portfolio/{id} - removes the row, then its file (auth required)
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PortfolioItem>> {
    let item = sqlx::query_as::<_, PortfolioItem>(
        "DELETE FROM portfolio_items WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("Portfolio item not found"))?;

    state.media.discard(&item.media_url).await;
    tracing::info!(id = %item.id, "portfolio item deleted");

    Ok(Json(item))
}
