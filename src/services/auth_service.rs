use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use uuid::Uuid;

use crate::dto::auth::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use crate::validation::is_valid_phone;
use crate::{
    config::AppConfig,
    db::DbPool,
    error::{AppError, AppResult, FieldError},
    models::User,
    response::ApiResponse,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn issue_token(config: &AppConfig, user: &User) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn validate_register(payload: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if payload.first_name.trim().len() < 2 {
        errors.push(FieldError::new("firstName", "First name is too short"));
    }
    if payload.last_name.trim().len() < 2 {
        errors.push(FieldError::new("lastName", "Last name is too short"));
    }
    if !payload.email.contains('@') {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    if payload.password.len() < 6 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    if let Some(phone) = payload.phone.as_deref()
        && !phone.is_empty()
        && !is_valid_phone(phone)
    {
        errors.push(FieldError::new("phone", "Invalid phone number"));
    }
    errors
}

pub async fn register_user(
    pool: &DbPool,
    config: &AppConfig,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let errors = validate_register(&payload);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(payload.email.as_str())
        .fetch_optional(pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let phone = payload.phone.filter(|p| !p.is_empty());
    if let Some(phone) = phone.as_deref() {
        let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(pool)
            .await?;
        if taken.is_some() {
            return Err(AppError::BadRequest("Phone is already taken".to_string()));
        }
    }

    let password_hash = hash_password(&payload.password)?;
    let id = Uuid::new_v4();

    // Role is never taken from the request body.
    let user: User = sqlx::query_as(
        "INSERT INTO users (id, email, password_hash, first_name, last_name, phone, address, role) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'user') RETURNING *",
    )
    .bind(id)
    .bind(payload.email.as_str())
    .bind(password_hash)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(phone)
    .bind(payload.address)
    .fetch_one(pool)
    .await?;

    let token = issue_token(config, &user)?;

    Ok(ApiResponse::success(
        "User registered",
        AuthResponse { token, user },
        None,
    ))
}

pub async fn login_user(
    pool: &DbPool,
    config: &AppConfig,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let LoginRequest { email, password } = payload;
    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    if !user.is_active {
        return Err(AppError::Forbidden);
    }

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(config, &user)?;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse { token, user },
        None,
    ))
}

pub async fn get_profile(pool: &DbPool, user_id: Uuid) -> AppResult<ApiResponse<User>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Profile", user, None))
}
