pub mod cookies;
pub mod jwt;
pub mod password;
pub mod session;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization, Cookie};
use axum_extra::TypedHeader;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Role, User},
    schema::users,
    state::AppState,
};

/// Identity attached to a request that presented a valid access token for a
/// live session.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub session_id: Uuid,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let mut candidates = Vec::with_capacity(2);
        if let Ok(TypedHeader(Authorization(bearer))) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
        {
            candidates.push(bearer.token().to_owned());
        }
        if let Ok(TypedHeader(jar)) = TypedHeader::<Cookie>::from_request_parts(parts, state).await
        {
            if let Some(value) = jar.get(cookies::ACCESS_COOKIE_NAME) {
                candidates.push(value.to_owned());
            }
        }

        let claims = candidates
            .iter()
            .find_map(|token| state.jwt.verify_token(token).ok())
            .ok_or_else(AppError::unauthorized)?;

        let mut conn = state.db()?;
        if !session::is_active(&mut conn, claims.sid, claims.sub)? {
            return Err(AppError::unauthorized());
        }

        // Role comes from the row, not the token, so admin changes apply at once.
        let user: User = users::table
            .find(claims.sub)
            .first(&mut conn)
            .optional()?
            .ok_or_else(AppError::unauthorized)?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role(),
            session_id: claims.sid,
        })
    }
}

/// An [`AuthenticatedUser`] holding the admin role; anyone else gets 403.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, path = %parts.uri.path(), "admin route denied");
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminUser(user))
    }
}
