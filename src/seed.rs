//! Provisioning of the operator's admin account.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::password::{self, MIN_PASSWORD_LENGTH},
    documents::forms::is_valid_email,
    models::{NewUser, Role, SubscriptionTier, User, UNLIMITED_DOCUMENTS},
    routes::auth::normalize_email,
    schema::users,
};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("admin email {0:?} is not a valid address")]
    InvalidEmail(String),
    #[error("admin password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("failed to hash admin password: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type SeedResult<T> = Result<T, SeedError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created(Uuid),
    Updated(Uuid),
    Unchanged(Uuid),
}

impl SeedOutcome {
    pub fn user_id(self) -> Uuid {
        match self {
            SeedOutcome::Created(id) | SeedOutcome::Updated(id) | SeedOutcome::Unchanged(id) => id,
        }
    }
}

fn validate_credentials(email: &str, password: &str) -> SeedResult<String> {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(SeedError::InvalidEmail(email));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SeedError::WeakPassword(MIN_PASSWORD_LENGTH));
    }
    Ok(email)
}

fn hash(password: &str) -> SeedResult<String> {
    password::hash_password(password).map_err(|err| SeedError::Hash(err.to_string()))
}

/// Makes sure `email` belongs to an admin on the premium tier with no
/// document limit. Existing accounts are promoted in place and take the given
/// password; running it twice is a no-op.
pub fn ensure_admin(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
) -> SeedResult<SeedOutcome> {
    let email = validate_credentials(email, password)?;

    let existing: Option<User> = users::table
        .filter(users::email.eq(&email))
        .first(conn)
        .optional()?;

    let Some(user) = existing else {
        let new_user = NewUser {
            id: Uuid::new_v4(),
            email,
            password_hash: hash(password)?,
            first_name: None,
            last_name: None,
            role: Role::Admin.as_str().to_string(),
            subscription: SubscriptionTier::Premium.as_str().to_string(),
            documents_limit: UNLIMITED_DOCUMENTS,
        };
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(conn)?;
        return Ok(SeedOutcome::Created(new_user.id));
    };

    let privileged = user.role() == Role::Admin
        && user.subscription() == SubscriptionTier::Premium
        && user.documents_limit == UNLIMITED_DOCUMENTS;
    let password_matches =
        password::verify_password(password, &user.password_hash).unwrap_or(false);

    if privileged && password_matches {
        return Ok(SeedOutcome::Unchanged(user.id));
    }

    let password_hash = if password_matches {
        user.password_hash.clone()
    } else {
        hash(password)?
    };

    diesel::update(users::table.find(user.id))
        .set((
            users::role.eq(Role::Admin.as_str()),
            users::subscription.eq(SubscriptionTier::Premium.as_str()),
            users::documents_limit.eq(UNLIMITED_DOCUMENTS),
            users::password_hash.eq(password_hash),
            users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    Ok(SeedOutcome::Updated(user.id))
}
