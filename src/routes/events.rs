/**
 * Event Routes
 * Event listings, optional cover image, and visitor ticket requests
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Event, EventStatus, EventTicketRequest, EventType, TicketRequestStatus};
use crate::error::{ApiError, ApiResult};
use crate::media::{MediaType, StoredMedia};
use crate::pagination::{PageRange, Paginated};
use crate::routes::form::FormData;
use crate::routes::users::normalize_email;
use crate::AppState;

// ============================================================================
// Validation
// ============================================================================

lazy_static::lazy_static! {
    /// Valid slug pattern: lowercase letters, numbers, and hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Derive a slug from a title: "Summer Show 2026!" -> "summer-show-2026".
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    pub message: Option<String>,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusRequest {
    pub status: String,
}

/// Column values for an insert or update, before they are written.
#[derive(Debug, Clone)]
struct EventDraft {
    slug: String,
    title: String,
    description: Option<String>,
    event_type: EventType,
    status: EventStatus,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    location: Option<String>,
    capacity: Option<i32>,
    allow_ticket_request: bool,
    organizer_name: Option<String>,
    organizer_email: Option<String>,
    organizer_phone: Option<String>,
    external_link: Option<String>,
}

impl EventDraft {
    fn from_form(form: &FormData) -> ApiResult<Self> {
        let title = form
            .text("title")
            .ok_or_else(|| ApiError::bad_request("Title is required"))?;
        let start_date = form
            .datetime("startDate")?
            .ok_or_else(|| ApiError::bad_request("startDate is required"))?;
        let slug = form.text("slug").unwrap_or_else(|| slugify(&title));

        let mut draft = Self {
            slug,
            title,
            description: None,
            event_type: EventType::Own,
            status: EventStatus::Draft,
            start_date,
            end_date: None,
            location: None,
            capacity: None,
            allow_ticket_request: false,
            organizer_name: None,
            organizer_email: None,
            organizer_phone: None,
            external_link: None,
        };
        draft.apply(form)?;
        Ok(draft)
    }

    fn from_event(event: &Event) -> Self {
        Self {
            slug: event.slug.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            event_type: event.event_type,
            status: event.status,
            start_date: event.start_date,
            end_date: event.end_date,
            location: event.location.clone(),
            capacity: event.capacity,
            allow_ticket_request: event.allow_ticket_request,
            organizer_name: event.organizer_name.clone(),
            organizer_email: event.organizer_email.clone(),
            organizer_phone: event.organizer_phone.clone(),
            external_link: event.external_link.clone(),
        }
    }

    /// Overwrite every field present in the form; absent fields keep their value.
    fn apply(&mut self, form: &FormData) -> ApiResult<()> {
        match form.optional_text("title") {
            Some(None) => return Err(ApiError::bad_request("Title cannot be empty")),
            Some(Some(title)) => self.title = title,
            None => {}
        }
        match form.optional_text("slug") {
            Some(None) => return Err(ApiError::bad_request("Slug cannot be empty")),
            Some(Some(slug)) => self.slug = slug,
            None => {}
        }
        if let Some(description) = form.optional_text("description") {
            self.description = description.map(|html| ammonia::clean(&html));
        }
        if let Some(event_type) = form.parse::<EventType>("eventType")? {
            self.event_type = event_type;
        }
        if let Some(status) = form.parse::<EventStatus>("status")? {
            self.status = status;
        }
        if let Some(start_date) = form.datetime("startDate")? {
            self.start_date = start_date;
        }
        if form.has("endDate") {
            self.end_date = form.datetime("endDate")?;
        }
        if let Some(location) = form.optional_text("location") {
            self.location = location;
        }
        if form.has("capacity") {
            self.capacity = form.parse::<i32>("capacity")?;
        }
        if let Some(allow) = form.bool("allowTicketRequest")? {
            self.allow_ticket_request = allow;
        }
        if let Some(v) = form.optional_text("organizerName") {
            self.organizer_name = v;
        }
        if let Some(v) = form.optional_text("organizerEmail") {
            self.organizer_email = v.map(|email| email.trim().to_lowercase());
        }
        if let Some(v) = form.optional_text("organizerPhone") {
            self.organizer_phone = v;
        }
        if let Some(v) = form.optional_text("externalLink") {
            self.external_link = v;
        }
        Ok(())
    }

    fn validate(&self) -> ApiResult<()> {
        if !is_valid_slug(&self.slug) {
            return Err(ApiError::bad_request(
                "Invalid slug: use only lowercase letters, numbers, and hyphens",
            ));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ApiError::bad_request("endDate cannot be before startDate"));
            }
        }
        if self.capacity.is_some_and(|c| c < 0) {
            return Err(ApiError::bad_request("capacity cannot be negative"));
        }
        if let Some(email) = &self.organizer_email {
            normalize_email(email).map_err(|_| ApiError::bad_request("Invalid organizerEmail"))?;
        }
        if let Some(link) = &self.external_link {
            if !(link.starts_with("http://") || link.starts_with("https://")) {
                return Err(ApiError::bad_request("externalLink must be an http(s) URL"));
            }
        }
        Ok(())
    }
}

fn slug_conflict(e: sqlx::Error) -> ApiError {
    match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::conflict("Slug already exists"),
        other => other,
    }
}

async fn fetch_event(pool: &PgPool, id: Uuid) -> ApiResult<Event> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// Cover images must be images.
async fn store_image(state: &AppState, form: &mut FormData) -> ApiResult<Option<StoredMedia>> {
    let Some(upload) = form.take_file("image") else {
        return Ok(None);
    };
    let stored = state.media.store(&upload).await?;
    if stored.media_type != MediaType::Image {
        state.media.discard(&stored.filename).await;
        return Err(ApiError::bad_request("Event image must be an image file"));
    }
    Ok(Some(stored))
}

// ============================================================================
// Event Handlers
// ============================================================================

/// GET /events - published events by start date (public)
pub async fn list_published(
    State(state): State<AppState>,
    range: PageRange,
) -> ApiResult<Paginated<Event>> {
    let events = sqlx::query_as::<_, Event>(
        r#"
        SELECT * FROM events
        WHERE status = $1
        ORDER BY start_date ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(EventStatus::Published.as_str())
    .bind(range.limit())
    .bind(range.offset())
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE status = $1")
        .bind(EventStatus::Published.as_str())
        .fetch_one(&state.pool)
        .await?;

    Ok(Paginated::new(events, range, total.0))
}

/// GET /events/slug/{slug} - a single published event (public)
pub async fn get_published_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Event>> {
    if !is_valid_slug(&slug) {
        return Err(ApiError::not_found("Event not found"));
    }

    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE slug = $1 AND status = $2")
        .bind(&slug)
        .bind(EventStatus::Published.as_str())
        .fetch_optional(&state.pool)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// GET /events/admin - every event, optional ?status= filter (auth required)
pub async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
    range: PageRange,
) -> ApiResult<Paginated<Event>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<EventStatus>())
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let (events, total) = match status {
        Some(status) => {
            let events = sqlx::query_as::<_, Event>(
                r#"
                SELECT * FROM events
                WHERE status = $1
                ORDER BY start_date DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(status.as_str())
            .bind(range.limit())
            .bind(range.offset())
            .fetch_all(&state.pool)
            .await?;

            let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&state.pool)
                .await?;

            (events, total.0)
        }
        None => {
            let events = sqlx::query_as::<_, Event>(
                "SELECT * FROM events ORDER BY start_date DESC LIMIT $1 OFFSET $2",
            )
            .bind(range.limit())
            .bind(range.offset())
            .fetch_all(&state.pool)
            .await?;

            let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
                .fetch_one(&state.pool)
                .await?;

            (events, total.0)
        }
    };

    Ok(Paginated::new(events, range, total))
}

/// GET /events/{id} (auth required)
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    Ok(Json(fetch_event(&state.pool, id).await?))
}

/// POST /events - create, optional `image` file (auth required)
pub async fn create_event(
    State(state): State<AppState>,
    mut form: FormData,
) -> ApiResult<impl IntoResponse> {
    let draft = EventDraft::from_form(&form)?;
    draft.validate()?;

    let image = store_image(&state, &mut form).await?;
    let image_url = image.as_ref().map(|s| s.filename.clone());

    let event = state
        .media
        .commit(image_url.as_deref(), None, async {
            sqlx::query_as::<_, Event>(
                r#"
                INSERT INTO events (
                    slug, title, description, event_type, status, start_date, end_date,
                    location, capacity, allow_ticket_request, organizer_name, organizer_email,
                    organizer_phone, external_link, image_url, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, now(), now())
                RETURNING *
                "#,
            )
            .bind(&draft.slug)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.event_type.as_str())
            .bind(draft.status.as_str())
            .bind(draft.start_date)
            .bind(draft.end_date)
            .bind(&draft.location)
            .bind(draft.capacity)
            .bind(draft.allow_ticket_request)
            .bind(&draft.organizer_name)
            .bind(&draft.organizer_email)
            .bind(&draft.organizer_phone)
            .bind(&draft.external_link)
            .bind(&image_url)
            .fetch_one(&state.pool)
            .await
            .map_err(slug_conflict)
        })
        .await?;

    tracing::info!(id = %event.id, slug = %event.slug, "event created");

    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /events/{id} - partial update; `image` replaces, `removeImage=true` clears (auth required)
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut form: FormData,
) -> ApiResult<Json<Event>> {
    let existing = fetch_event(&state.pool, id).await?;

    let mut draft = EventDraft::from_event(&existing);
    draft.apply(&form)?;
    draft.validate()?;

    let remove_image = form.bool("removeImage")?.unwrap_or(false);
    let replacement = store_image(&state, &mut form).await?;
    let image_url = match &replacement {
        Some(stored) => Some(stored.filename.clone()),
        None if remove_image => None,
        None => existing.image_url.clone(),
    };
    let new_image = replacement.as_ref().map(|s| s.filename.as_str());
    let old_image = existing
        .image_url
        .as_deref()
        .filter(|_| replacement.is_some() || remove_image);

    let event = state
        .media
        .commit(new_image, old_image, async {
            sqlx::query_as::<_, Event>(
                r#"
                UPDATE events SET
                    slug = $1, title = $2, description = $3, event_type = $4, status = $5,
                    start_date = $6, end_date = $7, location = $8, capacity = $9,
                    allow_ticket_request = $10, organizer_name = $11, organizer_email = $12,
                    organizer_phone = $13, external_link = $14, image_url = $15, updated_at = now()
                WHERE id = $16
                RETURNING *
                "#,
            )
            .bind(&draft.slug)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(draft.event_type.as_str())
            .bind(draft.status.as_str())
            .bind(draft.start_date)
            .bind(draft.end_date)
            .bind(&draft.location)
            .bind(draft.capacity)
            .bind(draft.allow_ticket_request)
            .bind(&draft.organizer_name)
            .bind(&draft.organizer_email)
            .bind(&draft.organizer_phone)
            .bind(&draft.external_link)
            .bind(&image_url)
            .bind(id)
            .fetch_optional(&state.pool)
            .await
            .map_err(slug_conflict)?
            .ok_or_else(|| ApiError::not_found("Event not found"))
        })
        .await?;

    tracing::info!(id = %event.id, slug = %event.slug, "event updated");

    Ok(Json(event))
}

/// DELETE /events/{id} - ticket requests cascade, image file removed (auth required)
pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    let event = sqlx::query_as::<_, Event>("DELETE FROM events WHERE id = $1 RETURNING *")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;

    if let Some(image) = &event.image_url {
        state.media.discard(image).await;
    }
    tracing::info!(id = %event.id, slug = %event.slug, "event deleted");

    Ok(Json(event))
}

// ============================================================================
// Ticket Request Handlers
// ============================================================================

/// Checks the request against the event and returns the normalized email.
fn validate_ticket_request(event: &Event, payload: &CreateTicketRequest) -> ApiResult<String> {
    if event.status != EventStatus::Published || !event.allow_ticket_request {
        return Err(ApiError::bad_request(
            "This event does not accept ticket requests",
        ));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    let email = normalize_email(&payload.email)?;
    if payload.quantity < 1 {
        return Err(ApiError::bad_request("Quantity must be at least 1"));
    }
    if let Some(capacity) = event.capacity {
        if payload.quantity > capacity {
            return Err(ApiError::bad_request(format!(
                "Quantity cannot exceed the event capacity of {}",
                capacity
            )));
        }
    }
    Ok(email)
}

/// POST /events/{id}/ticket-requests (public)
pub async fn create_ticket_request(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(payload): Json<CreateTicketRequest>,
) -> ApiResult<impl IntoResponse> {
    let event = fetch_event(&state.pool, event_id).await?;
    let email = validate_ticket_request(&event, &payload)?;

    let request = sqlx::query_as::<_, EventTicketRequest>(
        r#"
        INSERT INTO event_ticket_requests (event_id, name, email, phone, quantity, message, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        RETURNING *
        "#,
    )
    .bind(event.id)
    .bind(payload.name.trim())
    .bind(&email)
    .bind(payload.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()))
    .bind(payload.quantity)
    .bind(payload.message.as_deref().map(str::trim).filter(|m| !m.is_empty()))
    .bind(TicketRequestStatus::Pending.as_str())
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(event = %event.slug, request = %request.id, "ticket request received");

    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /events/{id}/ticket-requests (auth required)
pub async fn list_ticket_requests(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    range: PageRange,
) -> ApiResult<Paginated<EventTicketRequest>> {
    fetch_event(&state.pool, event_id).await?;

    let requests = sqlx::query_as::<_, EventTicketRequest>(
        r#"
        SELECT * FROM event_ticket_requests
        WHERE event_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(event_id)
    .bind(range.limit())
    .bind(range.offset())
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM event_ticket_requests WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&state.pool)
            .await?;

    Ok(Paginated::new(requests, range, total.0))
}

/// GET /events/ticket-requests - across all events (auth required)
pub async fn list_all_ticket_requests(
    State(state): State<AppState>,
    range: PageRange,
) -> ApiResult<Paginated<EventTicketRequest>> {
    let requests = sqlx::query_as::<_, EventTicketRequest>(
        "SELECT * FROM event_ticket_requests ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(range.limit())
    .bind(range.offset())
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM event_ticket_requests")
        .fetch_one(&state.pool)
        .await?;

    Ok(Paginated::new(requests, range, total.0))
}

/// PUT /events/ticket-requests/{id} - manual status change (auth required)
pub async fn update_ticket_request_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTicketStatusRequest>,
) -> ApiResult<Json<EventTicketRequest>> {
    let status = payload
        .status
        .parse::<TicketRequestStatus>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    sqlx::query_as::<_, EventTicketRequest>(
        "UPDATE event_ticket_requests SET status = $1 WHERE id = $2 RETURNING *",
    )
    .bind(status.as_str())
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Ticket request not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{offline_state, send};
    use axum::{body::Body, http::Request};

    fn event(status: EventStatus, allow: bool, capacity: Option<i32>) -> Event {
        Event {
            id: Uuid::new_v4(),
            slug: "spring-show".to_string(),
            title: "Spring Show".to_string(),
            description: None,
            event_type: EventType::Own,
            status,
            start_date: Utc::now(),
            end_date: None,
            location: None,
            capacity,
            allow_ticket_request: allow,
            organizer_name: None,
            organizer_email: None,
            organizer_phone: None,
            external_link: None,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ticket(quantity: i32) -> CreateTicketRequest {
        CreateTicketRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            quantity,
            message: None,
        }
    }

    fn form(value: serde_json::Value) -> FormData {
        match value {
            serde_json::Value::Object(map) => FormData::from_json(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer Show 2026!"), "summer-show-2026");
        assert_eq!(slugify("  --Hello,  World--  "), "hello-world");
        assert!(is_valid_slug(&slugify("Open Studio: Night #3")));
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("open-studio-3"));
        assert!(!is_valid_slug("Open-Studio"));
        assert!(!is_valid_slug("double--dash"));
        assert!(!is_valid_slug("-leading"));
    }

    #[test]
    fn test_draft_from_form_defaults_and_derived_slug() {
        let draft = EventDraft::from_form(&form(serde_json::json!({
            "title": "Open Studio Night",
            "startDate": "2026-06-01T18:00:00Z"
        })))
        .unwrap();
        assert_eq!(draft.slug, "open-studio-night");
        assert_eq!(draft.event_type, EventType::Own);
        assert_eq!(draft.status, EventStatus::Draft);
        assert!(!draft.allow_ticket_request);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_draft_requires_title_and_start_date() {
        assert!(EventDraft::from_form(&form(serde_json::json!({ "title": "x" }))).is_err());
        assert!(EventDraft::from_form(&form(serde_json::json!({
            "startDate": "2026-06-01T18:00:00Z"
        })))
        .is_err());
    }

    #[test]
    fn test_draft_apply_partial_update() {
        let existing = event(EventStatus::Draft, false, Some(50));
        let mut draft = EventDraft::from_event(&existing);
        draft
            .apply(&form(serde_json::json!({
                "status": "PUBLISHED",
                "eventType": "THIRD_PARTY",
                "allowTicketRequest": "true",
                "capacity": "",
                "description": "<p>Hi</p><script>alert(1)</script>"
            })))
            .unwrap();
        assert_eq!(draft.status, EventStatus::Published);
        assert_eq!(draft.event_type, EventType::ThirdParty);
        assert!(draft.allow_ticket_request);
        assert_eq!(draft.capacity, None);
        assert_eq!(draft.description.as_deref(), Some("<p>Hi</p>"));
        assert_eq!(draft.title, existing.title);
    }

    #[test]
    fn test_draft_rejects_bad_values() {
        let existing = event(EventStatus::Draft, false, None);

        let mut draft = EventDraft::from_event(&existing);
        assert!(draft.apply(&form(serde_json::json!({ "status": "ARCHIVED" }))).is_err());

        let mut draft = EventDraft::from_event(&existing);
        draft
            .apply(&form(serde_json::json!({ "endDate": "2000-01-01T00:00:00Z" })))
            .unwrap();
        assert!(draft.validate().is_err());

        let mut draft = EventDraft::from_event(&existing);
        draft
            .apply(&form(serde_json::json!({ "externalLink": "javascript:alert(1)" })))
            .unwrap();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_ticket_request_rules() {
        let open = event(EventStatus::Published, true, Some(10));
        assert!(validate_ticket_request(&open, &ticket(2)).is_ok());
        assert!(validate_ticket_request(&open, &ticket(0)).is_err());
        assert!(validate_ticket_request(&open, &ticket(11)).is_err());

        let draft = event(EventStatus::Draft, true, None);
        assert!(validate_ticket_request(&draft, &ticket(1)).is_err());

        let closed = event(EventStatus::Published, false, None);
        assert!(validate_ticket_request(&closed, &ticket(1)).is_err());

        let mut bad_email = ticket(1);
        bad_email.email = "nobody".to_string();
        assert!(validate_ticket_request(&open, &bad_email).is_err());
        bad_email.email = "guest@localhost".to_string();
        assert!(validate_ticket_request(&open, &bad_email).is_err());

        let mut mixed_case = ticket(1);
        mixed_case.email = " Guest@Example.COM ".to_string();
        assert_eq!(validate_ticket_request(&open, &mixed_case).unwrap(), "guest@example.com");
    }

    #[tokio::test]
    async fn test_admin_routes_require_token() {
        let dir = tempfile::tempdir().unwrap();
        for (method, uri) in [
            ("GET", "/events/admin".to_string()),
            ("POST", "/events".to_string()),
            ("GET", format!("/events/{}", Uuid::new_v4())),
            ("DELETE", format!("/events/{}", Uuid::new_v4())),
            ("GET", format!("/events/{}/ticket-requests", Uuid::new_v4())),
            ("PUT", format!("/events/ticket-requests/{}", Uuid::new_v4())),
        ] {
            let app = crate::create_app(offline_state(dir.path()));
            let req = Request::builder()
                .method(method)
                .uri(&uri)
                .body(Body::empty())
                .unwrap();
            let (status, _) = send(app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }
}
