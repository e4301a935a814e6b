/**
 * Newsletter Routes
 * Subscriptions and one-shot Bcc broadcasts to users and subscribers
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::NewsletterSubscriber;
use crate::error::{ApiError, ApiResult};
use crate::mail::{dedupe_recipients, Broadcast, MailTransport};
use crate::pagination::{PageRange, Paginated};
use crate::routes::users::normalize_email;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SendNewsletterRequest {
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendNewsletterResponse {
    pub recipients: usize,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A broadcast with content but no recipients yet.
fn compose(payload: SendNewsletterRequest) -> ApiResult<Broadcast> {
    let subject = payload.subject.trim().to_string();
    if subject.is_empty() {
        return Err(ApiError::bad_request("Subject is required"));
    }
    let html = non_blank(payload.html);
    let text = non_blank(payload.text);
    if html.is_none() && text.is_none() {
        return Err(ApiError::bad_request("Either html or text content is required"));
    }

    Ok(Broadcast {
        subject,
        html,
        text,
        recipients: Vec::new(),
    })
}

fn address(mut broadcast: Broadcast, emails: Vec<String>) -> ApiResult<Broadcast> {
    broadcast.recipients = dedupe_recipients(emails);
    if broadcast.recipients.is_empty() {
        return Err(ApiError::bad_request("There are no recipients to send to"));
    }
    Ok(broadcast)
}

async fn deliver(mailer: &dyn MailTransport, broadcast: &Broadcast) -> ApiResult<usize> {
    mailer
        .send(broadcast)
        .await
        .map_err(|e| ApiError::internal(format!("newsletter delivery failed: {}", e)))?;
    Ok(broadcast.recipients.len())
}

/// POST /newsletter/subscribe - creates or re-activates (public)
pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&payload.email)?;

    let subscriber = sqlx::query_as::<_, NewsletterSubscriber>(
        r#"
        INSERT INTO newsletter_subscribers (email, active, created_at)
        VALUES ($1, true, now())
        ON CONFLICT (email) DO UPDATE SET active = true
        RETURNING *
        "#,
    )
    .bind(&email)
    .fetch_one(&state.pool)
    .await?;

    Ok((StatusCode::CREATED, Json(subscriber)))
}

/// POST /newsletter/unsubscribe (public)
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> ApiResult<Json<NewsletterSubscriber>> {
    let email = normalize_email(&payload.email)?;

    sqlx::query_as::<_, NewsletterSubscriber>(
        "UPDATE newsletter_subscribers SET active = false WHERE email = $1 RETURNING *",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Subscriber not found"))
}

/// GET /newsletter/subscribers (auth required)
pub async fn list_subscribers(
    State(state): State<AppState>,
    range: PageRange,
) -> ApiResult<Paginated<NewsletterSubscriber>> {
    let subscribers = sqlx::query_as::<_, NewsletterSubscriber>(
        "SELECT * FROM newsletter_subscribers ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(range.limit())
    .bind(range.offset())
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM newsletter_subscribers")
        .fetch_one(&state.pool)
        .await?;

    Ok(Paginated::new(subscribers, range, total.0))
}

/// DELETE /newsletter/subscribers/{id} (auth required)
pub async fn delete_subscriber(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<NewsletterSubscriber>> {
    sqlx::query_as::<_, NewsletterSubscriber>(
        "DELETE FROM newsletter_subscribers WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::not_found("Subscriber not found"))
}

/// POST /newsletter/send - one message, every recipient in Bcc (auth required)
pub async fn send_newsletter(
    State(state): State<AppState>,
    Json(payload): Json<SendNewsletterRequest>,
) -> ApiResult<Json<SendNewsletterResponse>> {
    let broadcast = compose(payload)?;

    let emails: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT email FROM users
        UNION ALL
        SELECT email FROM newsletter_subscribers WHERE active = true
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    let broadcast = address(broadcast, emails)?;
    let recipients = deliver(state.mailer.as_ref(), &broadcast).await?;

    tracing::info!(recipients, subject = %broadcast.subject, "newsletter sent");

    Ok(Json(SendNewsletterResponse { recipients }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::TestTransport;
    use crate::routes::test_support::{bearer, offline_state, send};
    use axum::{body::Body, http::Request};

    fn request(subject: &str, html: Option<&str>, text: Option<&str>) -> SendNewsletterRequest {
        SendNewsletterRequest {
            subject: subject.to_string(),
            html: html.map(str::to_string),
            text: text.map(str::to_string),
        }
    }

    fn emails(list: &[&str]) -> Vec<String> {
        list.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_subject_body_and_recipients_are_required() {
        assert!(compose(request("  ", Some("<p>x</p>"), None)).is_err());
        assert!(compose(request("Hi", None, Some("   "))).is_err());

        let broadcast = compose(request("Hi", Some("<p>x</p>"), None)).unwrap();
        assert!(address(broadcast.clone(), vec![]).is_err());
        assert!(address(broadcast, emails(&["a@example.com"])).is_ok());
    }

    #[test]
    fn test_recipients_from_users_and_subscribers_are_deduped() {
        let broadcast = address(
            compose(request("Spring", Some("<p>News</p>"), None)).unwrap(),
            emails(&["Ana@example.com", "bob@example.com", "ana@example.com"]),
        )
        .unwrap();
        assert_eq!(broadcast.recipients, vec!["ana@example.com", "bob@example.com"]);
    }

    #[tokio::test]
    async fn test_deliver_sends_one_broadcast() {
        let transport = TestTransport::new();
        let broadcast = address(
            compose(request("Spring", None, Some("News"))).unwrap(),
            emails(&["a@example.com", "b@example.com"]),
        )
        .unwrap();

        let count = deliver(&transport, &broadcast).await.unwrap();
        assert_eq!(count, 2);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipients.len(), 2);
    }

    #[tokio::test]
    async fn test_deliver_failure_is_internal_error() {
        let transport = TestTransport::failing();
        let broadcast = address(
            compose(request("x", None, Some("y"))).unwrap(),
            emails(&["a@example.com"]),
        )
        .unwrap();
        let err = deliver(&transport, &broadcast).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_requires_token_and_subject() {
        let dir = tempfile::tempdir().unwrap();

        let app = crate::create_app(offline_state(dir.path()));
        let req = Request::post("/newsletter/send")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"subject":"Hi","text":"x"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let app = crate::create_app(offline_state(dir.path()));
        let req = Request::post("/newsletter/send")
            .header("content-type", "application/json")
            .header("authorization", bearer(Uuid::new_v4()))
            .body(Body::from(r#"{"subject":"","text":"x"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_email() {
        let dir = tempfile::tempdir().unwrap();
        let app = crate::create_app(offline_state(dir.path()));
        let req = Request::post("/newsletter/subscribe")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"email":"not-an-email"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
