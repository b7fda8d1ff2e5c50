use crate::billing::plans;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Optional; must name a catalog plan. Defaults to `free`.
    pub plan_key: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct Claims {
    sub: i32,
    role: String,
    exp: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i32,
    pub email: String,
    pub role: String,
    pub plan_key: String,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i32,
    password_hash: String,
    role: String,
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

pub async fn register_user(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    if payload.password.len() < 8 {
        return Err(AppError::BadRequest("Password too short".into()));
    }
    let email = normalize_email(&payload.email);
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    let plan_key = match payload.plan_key.as_deref() {
        None => "free".to_string(),
        Some(key) => match plans::find(key) {
            Some(plan) => plan.key.to_string(),
            None => return Err(AppError::BadRequest(format!("Unknown plan: {key}"))),
        },
    };
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Message(format!("Hashing failed: {}", e)))?;
    let inserted = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (email, password_hash, plan_key) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(&email)
    .bind(hash.to_string())
    .bind(&plan_key)
    .fetch_one(&pool)
    .await;
    match inserted {
        Ok(id) => Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": id, "planKey": plan_key })),
        )),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("users_email_key") {
                    return Err(AppError::BadRequest("Email already registered".into()));
                }
            }
            Err(AppError::Db(e))
        }
    }
}

pub async fn login_user(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, &'static str)> {
    let rec = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, password_hash, role FROM users WHERE email = $1",
    )
    .bind(normalize_email(&payload.email))
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::Unauthorized)?;
    let parsed = PasswordHash::new(&rec.password_hash).map_err(|e| {
        error!(?e, "stored password hash failed to parse");
        AppError::Message(format!("Hash error: {}", e))
    })?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed)
        .is_err()
    {
        return Err(AppError::Unauthorized);
    }
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .expect("valid timestamp")
        .timestamp() as usize;
    let claims = Claims {
        sub: rec.id,
        role: rec.role,
        exp,
    };
    let secret = crate::config::JWT_SECRET.as_str();
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(?e, "token encoding error");
        AppError::Message("Token error".into())
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("rent_session={token}; HttpOnly; Secure; SameSite=Strict; Path=/")
            .parse()
            .expect("valid header value"),
    );
    Ok((headers, "Login successful"))
}

pub async fn logout_user() -> (HeaderMap, &'static str) {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        "rent_session=deleted; HttpOnly; Path=/; Max-Age=0"
            .parse()
            .expect("valid header value"),
    );
    (headers, "Logged out")
}

pub async fn current_user(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, role }: AuthUser,
) -> AppResult<Json<UserInfo>> {
    let row = sqlx::query_as::<_, (String, String)>("SELECT email, plan_key FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(UserInfo {
        id: user_id,
        email: row.0,
        role,
        plan_key: row.1,
    }))
}

#[cfg(test)]
mod tests {
    use super::normalize_email;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }
}
