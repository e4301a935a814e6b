/**
 * User Routes
 * Admin listing and editing of CMS accounts
 */
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{hash_password, AuthUser};
use crate::db::models::{Role, User};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{PageRange, Paginated};
use crate::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// Lowercased, trimmed address: `local@domain.tld`, no whitespace, one `@`.
pub fn normalize_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(ApiError::bad_request("Invalid email format"))
    }
}

pub fn check_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Role of an existing account, `None` when the id is unknown.
pub async fn load_role<'e, E>(executor: E, id: Uuid) -> ApiResult<Option<Role>>
where
    E: sqlx::PgExecutor<'e>,
{
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    role.map(|r| r.parse::<Role>())
        .transpose()
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Role for a new account: the first one is an admin, later ones need an admin caller.
pub fn registration_role(
    existing_users: i64,
    caller: Option<Role>,
    requested: Option<Role>,
) -> ApiResult<Role> {
    if existing_users == 0 {
        return Ok(Role::Admin);
    }
    match caller {
        None => Err(ApiError::unauthorized(
            "Registration is closed; ask an administrator for an account",
        )),
        Some(Role::Admin) => Ok(requested.unwrap_or(Role::Editor)),
        Some(_) => Err(ApiError::forbidden("Only administrators can create accounts")),
    }
}

/// Validated column values; `None` keeps the stored value.
#[derive(Debug, Default, PartialEq)]
struct UserChanges {
    name: Option<String>,
    email: Option<String>,
    role: Option<Role>,
    password: Option<String>,
}

impl UserChanges {
    fn from_request(req: UpdateUserRequest) -> ApiResult<Self> {
        let name = match req.name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => return Err(ApiError::bad_request("Name cannot be empty")),
            other => other,
        };
        let email = req.email.as_deref().map(normalize_email).transpose()?;
        let role = req
            .role
            .as_deref()
            .map(str::parse::<Role>)
            .transpose()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        if let Some(password) = &req.password {
            check_password(password)?;
        }

        Ok(Self {
            name,
            email,
            role,
            password: req.password,
        })
    }
}

/// Admins may change anyone; editors may change their own name, email and password.
fn authorize_update(
    caller_id: Uuid,
    caller_role: Role,
    target_id: Uuid,
    changes: &UserChanges,
) -> ApiResult<()> {
    if caller_role == Role::Admin {
        return Ok(());
    }
    if caller_id != target_id {
        return Err(ApiError::forbidden("Only administrators can edit other users"));
    }
    if changes.role.is_some() {
        return Err(ApiError::forbidden("Only administrators can change roles"));
    }
    Ok(())
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    range: PageRange,
) -> ApiResult<Paginated<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users ORDER BY created_at ASC LIMIT $1 OFFSET $2",
    )
    .bind(range.limit())
    .bind(range.offset())
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;

    Ok(Paginated::new(users, range, total.0))
}

/// GET /users/{id}
pub async fn get_user(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("User not found"))
}

/// PUT /users/{id} - partial update; a new password is re-hashed
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    let changes = UserChanges::from_request(payload)?;

    let caller_role = load_role(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;
    authorize_update(auth.user_id, caller_role, id, &changes)?;

    let password_hash = match changes.password {
        Some(password) => Some(hash_password(password).await?),
        None => None,
    };

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            name = COALESCE($1, name),
            email = COALESCE($2, email),
            role = COALESCE($3, role),
            password_hash = COALESCE($4, password_hash)
        WHERE id = $5
        RETURNING *
        "#,
    )
    .bind(&changes.name)
    .bind(&changes.email)
    .bind(changes.role.map(|r| r.as_str()))
    .bind(&password_hash)
    .bind(id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::conflict("Email already in use"),
        other => other,
    })?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(
        id = %user.id,
        by = %auth.user_id,
        password_changed = password_hash.is_some(),
        "user updated"
    );

    Ok(Json(user))
}
