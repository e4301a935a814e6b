/**
 * Settings Routes
 * Free-form site settings, stored as key/value text
 */
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::models::Setting;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MAX_KEY_LENGTH: usize = 128;

#[derive(Debug, Deserialize, Serialize)]
pub struct SettingPayload {
    pub key: String,
    pub value: String,
}

fn normalize_key(key: &str) -> ApiResult<String> {
    let key = key.trim();
    if key.is_empty() {
        return Err(ApiError::bad_request("Setting key is required"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Setting key cannot exceed {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(key.to_string())
}

async fn all_settings(pool: &sqlx::PgPool) -> ApiResult<BTreeMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings ORDER BY key")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}

/// GET /settings - every setting as one flat object
pub async fn get_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    Ok(Json(all_settings(&state.pool).await?))
}

/// GET /settings/{key}
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SettingPayload>> {
    let key = normalize_key(&key)?;

    sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = $1")
        .bind(&key)
        .fetch_optional(&state.pool)
        .await?
        .map(|s| {
            Json(SettingPayload {
                key: s.key,
                value: s.value,
            })
        })
        .ok_or_else(|| ApiError::not_found(format!("Setting '{}' not found", key)))
}

/// POST /settings - upsert one key (auth required)
pub async fn upsert_setting(
    State(state): State<AppState>,
    Json(payload): Json<SettingPayload>,
) -> ApiResult<Json<Setting>> {
    let key = normalize_key(&payload.key)?;

    let setting = sqlx::query_as::<_, Setting>(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
        RETURNING *
        "#,
    )
    .bind(&key)
    .bind(&payload.value)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(key = %setting.key, "setting saved");

    Ok(Json(setting))
}

/// PUT /settings - upsert many keys in one transaction (auth required)
pub async fn bulk_update_settings(
    State(state): State<AppState>,
    Json(payload): Json<BTreeMap<String, String>>,
) -> ApiResult<Json<BTreeMap<String, String>>> {
    let entries = payload
        .iter()
        .map(|(k, v)| normalize_key(k).map(|k| (k, v)))
        .collect::<ApiResult<Vec<_>>>()?;

    let mut tx = state.pool.begin().await?;
    for (key, value) in &entries {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(count = entries.len(), "settings updated");

    Ok(Json(all_settings(&state.pool).await?))
}

/// DELETE /settings/{key} (auth required)
pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SettingPayload>> {
    let key = normalize_key(&key)?;

    let deleted = sqlx::query_as::<_, Setting>("DELETE FROM settings WHERE key = $1 RETURNING *")
        .bind(&key)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Setting '{}' not found", key)))?;

    Ok(Json(SettingPayload {
        key: deleted.key,
        value: deleted.value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{bearer, database_state, offline_state, send};
    use axum::{body::Body, http::Request, http::StatusCode};
    use uuid::Uuid;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  site_title ").unwrap(), "site_title");
        assert!(matches!(normalize_key("   "), Err(ApiError::BadRequest(_))));
        assert!(normalize_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[tokio::test]
    async fn test_writes_require_token() {
        let dir = tempfile::tempdir().unwrap();
        for (method, uri, body) in [
            ("POST", "/settings", r#"{"key":"a","value":"b"}"#),
            ("PUT", "/settings", r#"{"a":"b"}"#),
            ("DELETE", "/settings/a", ""),
        ] {
            let app = crate::create_app(offline_state(dir.path()));
            let req = Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap();
            let (status, _) = send(app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }
    }

    #[tokio::test]
    async fn test_blank_key_is_rejected_before_storage() {
        let dir = tempfile::tempdir().unwrap();

        let app = crate::create_app(offline_state(dir.path()));
        let req = Request::post("/settings")
            .header("content-type", "application/json")
            .header("authorization", bearer(Uuid::new_v4()))
            .body(Body::from(r#"{"key":"  ","value":"x"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let app = crate::create_app(offline_state(dir.path()));
        let req = Request::put("/settings")
            .header("content-type", "application/json")
            .header("authorization", bearer(Uuid::new_v4()))
            .body(Body::from(r#"{"ok":"1","":"2"}"#))
            .unwrap();
        let (status, _) = send(app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_latest_value() {
        let dir = tempfile::tempdir().unwrap();
        let Some(state) = database_state(dir.path()).await else {
            return;
        };
        let key = format!("test_{}", Uuid::new_v4().simple());

        for value in ["first", "second"] {
            let req = Request::post("/settings")
                .header("content-type", "application/json")
                .header("authorization", bearer(Uuid::new_v4()))
                .body(Body::from(
                    serde_json::json!({ "key": key, "value": value }).to_string(),
                ))
                .unwrap();
            let (status, _) = send(crate::create_app(state.clone()), req).await;
            assert_eq!(status, StatusCode::OK);
        }

        let rows: Vec<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = $1")
            .bind(&key)
            .fetch_all(&state.pool)
            .await
            .unwrap();
        assert_eq!(rows, vec![("second".to_string(),)]);

        let req = Request::get(format!("/settings/{}", key)).body(Body::empty()).unwrap();
        let (status, body) = send(crate::create_app(state.clone()), req).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["value"], "second");

        sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(&key)
            .execute(&state.pool)
            .await
            .unwrap();
    }
}
