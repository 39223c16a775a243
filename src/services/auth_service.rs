use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;

use crate::{
    dto::auth::{ChangePasswordRequest, Claims, LoginRequest, LoginResponse, RegisterRequest},
    error::{AppError, AppResult},
    models::{NewUser, Role, User, UserProfile},
    response::{ApiResponse, Meta},
    services::data_service::DataService,
    state::AuthSettings,
};

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(password_hash)
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(password_hash) {
        Ok(hash) => hash,
        Err(err) => {
            tracing::warn!(error = %err, "stored password hash is unreadable");
            return false;
        }
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Hash the password and insert a user with the given role.
pub fn create_user(
    data: &DataService,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> AppResult<User> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("email is invalid".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::BadRequest("password is required".to_string()));
    }
    if data.get_user_by_email(email).is_some() {
        return Err(AppError::BadRequest("Email is already taken".to_string()));
    }

    let password_hash = hash_password(password)?;
    Ok(data.add_user(NewUser {
        name: name.trim().to_string(),
        email: email.to_string(),
        username: None,
        password_hash,
        role,
        phone: None,
    }))
}

pub fn register_user(
    data: &DataService,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    let RegisterRequest {
        name,
        email,
        password,
    } = payload;
    let user = create_user(data, &name, &email, &password, Role::Customer)?;
    Ok(ApiResponse::success("User created", user.profile(), None))
}

pub fn login_user(
    data: &DataService,
    auth: &AuthSettings,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = data
        .authenticate(&email, &password)
        .ok_or(AppError::InvalidCredentials)?;

    let token = issue_token(auth, &user)?;
    tracing::info!(user_id = user.id, "user logged in");

    let resp = LoginResponse {
        token: format!("Bearer {}", token),
        user: user.profile(),
    };
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

/// The token's claims are the session pointer: who, since when, and which
/// token generation.
pub fn issue_token(auth: &AuthSettings, user: &User) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::hours(auth.token_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
        ver: user.token_version,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn change_password(
    data: &DataService,
    user_id: i64,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    let user = data.get_user(user_id).ok_or(AppError::NotFound)?;
    if !verify_password(&payload.current_password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }
    if payload.new_password.is_empty() {
        return Err(AppError::BadRequest("password is required".to_string()));
    }
    let password_hash = hash_password(&payload.new_password)?;
    let user = data
        .set_password_hash(user_id, password_hash)
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id, "password changed");
    Ok(ApiResponse::success("Password changed", user.profile(), None))
}

/// Sign the user out everywhere by invalidating all tokens issued so far.
pub fn logout_user(
    data: &DataService,
    user_id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    data.revoke_tokens(user_id).ok_or(AppError::NotFound)?;
    tracing::info!(user_id, "user signed out");
    Ok(ApiResponse::success(
        "Logged out",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
