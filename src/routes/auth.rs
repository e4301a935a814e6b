/**
 * Authentication Routes
 * Registration, login, and the current user
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{authenticate, hash_password, issue_token, verify_password, AuthUser};
use crate::db::models::{Role, User};
use crate::error::{ApiError, ApiResult};
use crate::routes::users::{check_password, load_role, normalize_email, registration_role};
use crate::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Validated registration fields.
#[derive(Debug)]
struct NewUser {
    name: String,
    email: String,
    password: String,
    role: Option<Role>,
}

impl NewUser {
    fn from_request(req: RegisterRequest) -> ApiResult<Self> {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::bad_request("Name is required"));
        }
        let email = normalize_email(&req.email)?;
        check_password(&req.password)?;
        let role = req
            .role
            .as_deref()
            .map(str::parse::<Role>)
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        Ok(Self {
            name,
            email,
            password: req.password,
            role,
        })
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
///
/// Open while the users table is empty; that first account is always an admin.
/// Afterwards only an authenticated admin may create accounts.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let new_user = NewUser::from_request(payload)?;
    let caller = authenticate(&headers, &state.config.jwt_secret).ok();
    let password_hash = hash_password(new_user.password).await?;

    let mut tx = state.pool.begin().await?;
    sqlx::query("LOCK TABLE users IN SHARE ROW EXCLUSIVE MODE")
        .execute(&mut *tx)
        .await?;

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&mut *tx)
        .await?;

    let caller_role = match caller {
        Some(caller) if existing.0 > 0 => load_role(&mut *tx, caller.user_id).await?,
        _ => None,
    };
    let role = registration_role(existing.0, caller_role, new_user.role)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, role, created_at)
        VALUES ($1, $2, $3, $4, now())
        RETURNING *
        "#,
    )
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&password_hash)
    .bind(role.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::conflict("Email already registered"),
        other => other,
    })?;

    tx.commit().await?;

    tracing::info!(id = %user.id, role = %user.role, "user registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(payload.email.trim())
        .fetch_optional(&state.pool)
        .await?;

    let Some(user) = user else {
        tracing::warn!("Login attempt for unknown email");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !verify_password(payload.password, user.password_hash.clone()).await {
        tracing::warn!(id = %user.id, "Login attempt with wrong password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = issue_token(user.id, &state.config.jwt_secret)
        .map_err(|e| ApiError::internal(format!("failed to sign token: {}", e)))?;

    tracing::info!(id = %user.id, "user logged in");

    Ok(Json(AuthResponse { token, user }))
}

/// GET /auth/me (auth required)
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(auth.user_id)
        .fetch_optional(&state.pool)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))
}
