use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, TypedHeader};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cookies::{self, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME},
        password::{self, MIN_PASSWORD_LENGTH},
        session::{self, IssuedSession},
        AuthenticatedUser,
    },
    documents::{forms::is_valid_email, quota::DocumentQuota},
    error::{AppError, AppResult, FieldErrors, JsonBody},
    models::{NewUser, Role, SubscriptionTier, User},
    schema::users::{self, dsl},
    state::AppState,
};

use super::to_iso;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub subscription: SubscriptionTier,
    pub documents_created: i32,
    pub documents_limit: i32,
    pub documents_remaining: Option<i32>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        let quota = DocumentQuota::for_user(&user);
        Self {
            id: user.id,
            role: user.role(),
            subscription: user.subscription(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            documents_created: user.documents_created,
            documents_limit: user.documents_limit,
            documents_remaining: quota.remaining(),
            created_at: to_iso(user.created_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email);

    let mut errors = FieldErrors::new();
    if !is_valid_email(&email) {
        errors.insert("email".into(), "must be a valid email address".into());
    }
    if payload.password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.insert(
            "password".into(),
            format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
        );
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let mut conn = state.db()?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        email,
        password_hash,
        first_name: normalize_name(payload.first_name),
        last_name: normalize_name(payload.last_name),
        role: Role::User.as_str().to_string(),
        subscription: SubscriptionTier::Free.as_str().to_string(),
        documents_limit: SubscriptionTier::Free.default_limit(state.config.free_documents_limit),
    };

    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => {
            return Err(AppError::bad_request("email already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let user: User = dsl::users.find(new_user.id).first(&mut conn)?;
    let issued = session::open_session(
        &mut conn,
        &state.jwt,
        &user,
        state.config.refresh_token_expiry_days,
    )?;

    info!(user_id = %user.id, "user registered");

    let headers = session_cookies(&state, &issued)?;
    Ok((
        StatusCode::CREATED,
        headers,
        Json(auth_response(&state, user, issued)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let mut conn = state.db()?;

    let user: User = dsl::users
        .filter(dsl::email.eq(normalize_email(&payload.email)))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;

    if !valid {
        warn!(user_id = %user.id, "login rejected: wrong password");
        return Err(AppError::unauthorized());
    }

    let issued = session::open_session(
        &mut conn,
        &state.jwt,
        &user,
        state.config.refresh_token_expiry_days,
    )?;

    info!(user_id = %user.id, role = %user.role(), "user logged in");

    let headers = session_cookies(&state, &issued)?;
    Ok((headers, Json(auth_response(&state, user, issued))))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let jar = jar.ok_or_else(AppError::unauthorized)?;
    let refresh_value = jar
        .get(REFRESH_COOKIE_NAME)
        .ok_or_else(AppError::unauthorized)?;

    let mut conn = state.db()?;
    let current = session::find_by_refresh_token(&mut conn, refresh_value)?
        .ok_or_else(AppError::unauthorized)?;

    session::revoke(&mut conn, current.id)?;

    let user: User = dsl::users
        .find(current.user_id)
        .first(&mut conn)
        .map_err(AppError::from)?;

    let issued = session::open_session(
        &mut conn,
        &state.jwt,
        &user,
        state.config.refresh_token_expiry_days,
    )?;

    info!(user_id = %user.id, session_id = %issued.session_id, "session refreshed");

    let headers = session_cookies(&state, &issued)?;
    Ok((headers, Json(auth_response(&state, user, issued))))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let refresh_session = match jar
        .as_ref()
        .and_then(|TypedHeader(jar)| jar.get(REFRESH_COOKIE_NAME))
    {
        Some(value) => session::find_by_refresh_token(&mut conn, value)?
            .filter(|other| other.user_id == user.user_id),
        None => None,
    };

    // Other devices keep their sessions.
    let mut revoked = session::revoke(&mut conn, user.session_id)?;
    if let Some(other) = refresh_session {
        revoked += session::revoke(&mut conn, other.id)?;
    }

    info!(user_id = %user.user_id, revoked, "user logged out");

    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        cookies::clear_cookie(&state.config, ACCESS_COOKIE_NAME)?,
    );
    headers.append(
        SET_COOKIE,
        cookies::clear_cookie(&state.config, REFRESH_COOKIE_NAME)?,
    );
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let mut conn = state.db()?;
    let record: User = dsl::users.find(user.user_id).first(&mut conn)?;
    Ok(Json(UserResponse::from(record)))
}

fn auth_response(state: &AppState, user: User, issued: IssuedSession) -> AuthResponse {
    AuthResponse {
        user: UserResponse::from(user),
        access_token: issued.access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.expires_in_seconds(),
    }
}

fn session_cookies(state: &AppState, issued: &IssuedSession) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(
        SET_COOKIE,
        cookies::access_cookie(&state.config, &issued.access_token)?,
    );
    headers.append(
        SET_COOKIE,
        cookies::refresh_cookie(
            &state.config,
            &issued.refresh_token,
            issued.refresh_expires_at,
        )?,
    );
    Ok(headers)
}
