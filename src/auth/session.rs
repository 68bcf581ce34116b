use chrono::{DateTime, Duration as ChronoDuration, Utc};
use diesel::{pg::PgConnection, prelude::*};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    auth::jwt::JwtService,
    error::{AppError, AppResult},
    models::{NewSession, Session, User},
    schema::sessions::{self, dsl},
};

/// Tokens handed to the client after a successful login, registration or
/// refresh.
pub struct IssuedSession {
    pub session_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

pub fn open_session(
    conn: &mut PgConnection,
    jwt: &JwtService,
    user: &User,
    refresh_expiry_days: i64,
) -> AppResult<IssuedSession> {
    let now = Utc::now();
    let refresh_token = generate_refresh_token();
    let refresh_expires_at = now + ChronoDuration::days(refresh_expiry_days);

    let new_session = NewSession {
        id: Uuid::new_v4(),
        user_id: user.id,
        token_hash: hash_refresh_token(&refresh_token),
        issued_at: now.naive_utc(),
        expires_at: refresh_expires_at.naive_utc(),
    };

    diesel::insert_into(sessions::table)
        .values(&new_session)
        .execute(conn)?;

    let access_token = jwt
        .generate_token(user.id, &user.email, user.role(), new_session.id)
        .map_err(AppError::from)?;

    Ok(IssuedSession {
        session_id: new_session.id,
        access_token,
        refresh_token,
        refresh_expires_at,
    })
}

/// True while the session has neither expired nor been revoked.
pub fn is_active(conn: &mut PgConnection, session_id: Uuid, user_id: Uuid) -> QueryResult<bool> {
    let now = Utc::now().naive_utc();
    let found = dsl::sessions
        .filter(dsl::id.eq(session_id))
        .filter(dsl::user_id.eq(user_id))
        .filter(dsl::revoked_at.is_null())
        .filter(dsl::expires_at.gt(now))
        .select(dsl::id)
        .first::<Uuid>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn find_by_refresh_token(
    conn: &mut PgConnection,
    refresh_token: &str,
) -> QueryResult<Option<Session>> {
    let now = Utc::now().naive_utc();
    dsl::sessions
        .filter(dsl::token_hash.eq(hash_refresh_token(refresh_token)))
        .filter(dsl::revoked_at.is_null())
        .filter(dsl::expires_at.gt(now))
        .first::<Session>(conn)
        .optional()
}

pub fn revoke(conn: &mut PgConnection, session_id: Uuid) -> QueryResult<usize> {
    let now = Utc::now().naive_utc();
    diesel::update(
        dsl::sessions
            .filter(dsl::id.eq(session_id))
            .filter(dsl::revoked_at.is_null()),
    )
    .set((dsl::revoked_at.eq(now), dsl::updated_at.eq(now)))
    .execute(conn)
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
