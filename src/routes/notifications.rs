use axum::extract::{Json, Path, Query, State};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::Notification,
    schema::notifications,
    state::AppState,
};

use super::to_iso;

#[derive(Deserialize)]
pub struct NotificationListQuery {
    pub unread: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            title: notification.title,
            message: notification.message,
            is_read: notification.is_read,
            created_at: to_iso(notification.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationListQuery>,
) -> AppResult<Json<Vec<NotificationResponse>>> {
    let mut conn = state.db()?;

    let mut statement = notifications::table
        .filter(notifications::user_id.eq(user.user_id))
        .order(notifications::created_at.desc())
        .into_boxed();
    if query.unread.unwrap_or(false) {
        statement = statement.filter(notifications::is_read.eq(false));
    }

    let rows: Vec<Notification> = statement.load(&mut conn)?;
    Ok(Json(
        rows.into_iter().map(NotificationResponse::from).collect(),
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<NotificationResponse>> {
    let mut conn = state.db()?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user.user_id)),
    )
    .set(notifications::is_read.eq(true))
    .execute(&mut conn)?;
    if updated == 0 {
        return Err(AppError::not_found());
    }

    let notification: Notification = notifications::table.find(notification_id).first(&mut conn)?;
    Ok(Json(NotificationResponse::from(notification)))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let mut conn = state.db()?;
    let updated = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user.user_id))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(&mut conn)?;

    Ok(Json(MarkAllReadResponse { updated }))
}
