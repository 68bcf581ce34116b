use std::collections::BTreeMap;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AdminUser,
    documents::{quota::DocumentQuota, DocumentKind},
    error::{AppError, AppResult, FieldErrors, JsonBody},
    models::{
        BlogPost, DocumentTemplate, NewBlogPost, NewDocumentTemplate, NewNotification, Role,
        SubscriptionTier, User, UserDocument, UNLIMITED_DOCUMENTS,
    },
    notifications::Broadcast,
    schema::{blog_posts, document_templates, notifications, user_documents, users},
    state::AppState,
    utils::json::{classify_nullable, NullableValue},
};

use super::auth::UserResponse;
use super::content::{BlogPostResponse, TemplateResponse};
use super::documents::DocumentResponse;

const MAX_SLUG_LENGTH: usize = 255;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub role: Option<String>,
    pub subscription: Option<String>,
    pub documents_limit: Option<i32>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct UserChangeset {
    role: Option<String>,
    subscription: Option<String>,
    documents_limit: Option<i32>,
    updated_at: Option<NaiveDateTime>,
}

pub async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<User> = users::table
        .order(users::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(UserResponse::from).collect()))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    let mut conn = state.db()?;
    let existing: User = users::table.find(user_id).first(&mut conn)?;

    let mut errors = FieldErrors::new();
    let role = match payload.role.as_deref().map(str::parse::<Role>) {
        Some(Ok(role)) => Some(role),
        Some(Err(err)) => {
            errors.insert("role".into(), err);
            None
        }
        None => None,
    };
    let subscription = match payload
        .subscription
        .as_deref()
        .map(str::parse::<SubscriptionTier>)
    {
        Some(Ok(tier)) => Some(tier),
        Some(Err(err)) => {
            errors.insert("subscription".into(), err);
            None
        }
        None => None,
    };
    if payload
        .documents_limit
        .is_some_and(|limit| limit < UNLIMITED_DOCUMENTS)
    {
        errors.insert(
            "documentsLimit".into(),
            "must be -1 (unlimited) or a non-negative number".into(),
        );
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    if role.is_none() && subscription.is_none() && payload.documents_limit.is_none() {
        return Err(AppError::bad_request("no changes provided"));
    }

    if existing.id == admin.user_id && role == Some(Role::User) {
        return Err(AppError::forbidden("admins cannot remove their own admin role"));
    }

    let documents_limit = payload.documents_limit.or_else(|| {
        subscription.map(|tier| tier.default_limit(state.config.free_documents_limit))
    });

    let changeset = UserChangeset {
        role: role.map(|r| r.as_str().to_string()),
        subscription: subscription.map(|t| t.as_str().to_string()),
        documents_limit,
        updated_at: Some(Utc::now().naive_utc()),
    };

    diesel::update(users::table.find(existing.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: User = users::table.find(existing.id).first(&mut conn)?;
    info!(
        admin_id = %admin.user_id,
        user_id = %updated.id,
        role = %updated.role(),
        subscription = %updated.subscription(),
        documents_limit = updated.documents_limit,
        "user account updated"
    );
    Ok(Json(UserResponse::from(updated)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub users: i64,
    pub premium_users: i64,
    pub admins: i64,
    pub users_at_limit: i64,
    pub documents: i64,
    pub documents_by_type: BTreeMap<String, i64>,
}

pub async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let mut conn = state.db()?;

    let accounts: Vec<User> = users::table.load(&mut conn)?;
    let premium_users = accounts
        .iter()
        .filter(|u| u.subscription() == SubscriptionTier::Premium)
        .count() as i64;
    let admins = accounts.iter().filter(|u| u.role() == Role::Admin).count() as i64;
    let users_at_limit = accounts
        .iter()
        .filter(|u| !DocumentQuota::for_user(u).allows_another())
        .count() as i64;

    let documents: i64 = user_documents::table
        .select(count_star())
        .first(&mut conn)?;

    let per_kind: Vec<(String, i64)> = user_documents::table
        .group_by(user_documents::doc_type)
        .select((user_documents::doc_type, count_star()))
        .load(&mut conn)?;

    let mut documents_by_type: BTreeMap<String, i64> = DocumentKind::ALL
        .iter()
        .map(|kind| (kind.as_str().to_string(), 0))
        .collect();
    for (kind, count) in per_kind {
        documents_by_type.insert(kind, count);
    }

    Ok(Json(StatsResponse {
        users: accounts.len() as i64,
        premium_users,
        admins,
        users_at_limit,
        documents,
        documents_by_type,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDocumentsQuery {
    pub user_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

pub async fn list_all_documents(
    State(state): State<AppState>,
    Query(query): Query<AdminDocumentsQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;

    let mut statement = user_documents::table
        .order(user_documents::created_at.desc())
        .into_boxed();
    if let Some(user_id) = query.user_id {
        statement = statement.filter(user_documents::user_id.eq(user_id));
    }
    if let Some(kind) = query.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        let kind = kind.parse::<DocumentKind>().map_err(AppError::bad_request)?;
        statement = statement.filter(user_documents::doc_type.eq(kind.as_str()));
    }

    let rows: Vec<UserDocument> = statement.load(&mut conn)?;
    Ok(Json(rows.into_iter().map(DocumentResponse::from).collect()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub is_premium: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = document_templates)]
struct TemplateChangeset {
    doc_type: Option<String>,
    name: Option<String>,
    description: Option<Option<String>>,
    is_active: Option<bool>,
    is_premium: Option<bool>,
    updated_at: Option<NaiveDateTime>,
}

pub async fn list_templates(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TemplateResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<DocumentTemplate> = document_templates::table
        .order((document_templates::doc_type.asc(), document_templates::name.asc()))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(TemplateResponse::from).collect()))
}

pub async fn create_template(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateResponse>)> {
    let mut errors = FieldErrors::new();
    let kind = match payload.kind.parse::<DocumentKind>() {
        Ok(kind) => Some(kind),
        Err(err) => {
            errors.insert("type".into(), err);
            None
        }
    };
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        errors.insert("name".into(), "is required".into());
    }
    let Some(kind) = kind.filter(|_| errors.is_empty()) else {
        return Err(AppError::validation(errors));
    };

    let new_template = NewDocumentTemplate {
        id: Uuid::new_v4(),
        doc_type: kind.as_str().to_string(),
        name,
        description: trimmed_text(payload.description),
        is_active: payload.is_active.unwrap_or(true),
        is_premium: payload.is_premium.unwrap_or(false),
    };

    let mut conn = state.db()?;
    diesel::insert_into(document_templates::table)
        .values(&new_template)
        .execute(&mut conn)?;

    let template: DocumentTemplate = document_templates::table
        .find(new_template.id)
        .first(&mut conn)?;
    info!(template_id = %template.id, kind = %kind, "template created");
    Ok((StatusCode::CREATED, Json(TemplateResponse::from(template))))
}

pub async fn update_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<Json<TemplateResponse>> {
    let mut conn = state.db()?;
    let existing: DocumentTemplate = document_templates::table
        .find(template_id)
        .first(&mut conn)?;

    let mut changeset = TemplateChangeset::default();

    if let Some(kind) = string_field(&body, "type")? {
        let kind = kind.parse::<DocumentKind>().map_err(AppError::bad_request)?;
        changeset.doc_type = Some(kind.as_str().to_string());
    }
    if let Some(name) = string_field(&body, "name")? {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::bad_request("name must not be empty"));
        }
        changeset.name = Some(name.to_string());
    }
    match classify_nullable(body.get("description")).map_err(AppError::bad_request)? {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.description = Some(None),
        NullableValue::String(value) => changeset.description = Some(trimmed_text(Some(value))),
    }
    changeset.is_active = bool_field(&body, "isActive")?;
    changeset.is_premium = bool_field(&body, "isPremium")?;

    if changeset.doc_type.is_none()
        && changeset.name.is_none()
        && changeset.description.is_none()
        && changeset.is_active.is_none()
        && changeset.is_premium.is_none()
    {
        return Err(AppError::bad_request("no changes provided"));
    }

    changeset.updated_at = Some(Utc::now().naive_utc());
    diesel::update(document_templates::table.find(existing.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: DocumentTemplate = document_templates::table
        .find(existing.id)
        .first(&mut conn)?;
    info!(template_id = %updated.id, "template updated");
    Ok(Json(TemplateResponse::from(updated)))
}

pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let deleted =
        diesel::delete(document_templates::table.find(template_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    info!(template_id = %template_id, "template deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub is_published: Option<bool>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = blog_posts)]
struct PostChangeset {
    slug: Option<String>,
    title: Option<String>,
    excerpt: Option<Option<String>>,
    content: Option<String>,
    is_published: Option<bool>,
    published_at: Option<Option<NaiveDateTime>>,
    updated_at: Option<NaiveDateTime>,
}

pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<BlogPostResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<BlogPost> = blog_posts::table
        .order(blog_posts::created_at.desc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(BlogPostResponse::from).collect()))
}

pub async fn create_post(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<BlogPostResponse>)> {
    let mut errors = FieldErrors::new();
    let slug = payload.slug.trim().to_lowercase();
    if let Err(message) = validate_slug(&slug) {
        errors.insert("slug".into(), message.into());
    }
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        errors.insert("title".into(), "is required".into());
    }
    if payload.content.trim().is_empty() {
        errors.insert("content".into(), "is required".into());
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let is_published = payload.is_published.unwrap_or(false);
    let new_post = NewBlogPost {
        id: Uuid::new_v4(),
        slug,
        title,
        excerpt: trimmed_text(payload.excerpt),
        content: payload.content,
        is_published,
        published_at: is_published.then(|| Utc::now().naive_utc()),
    };

    let mut conn = state.db()?;
    diesel::insert_into(blog_posts::table)
        .values(&new_post)
        .execute(&mut conn)
        .map_err(slug_conflict)?;

    let post: BlogPost = blog_posts::table.find(new_post.id).first(&mut conn)?;
    info!(post_id = %post.id, slug = %post.slug, published = post.is_published, "blog post created");
    Ok((StatusCode::CREATED, Json(BlogPostResponse::from(post))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<Json<BlogPostResponse>> {
    let mut conn = state.db()?;
    let existing: BlogPost = blog_posts::table.find(post_id).first(&mut conn)?;

    let mut changeset = PostChangeset::default();

    if let Some(slug) = string_field(&body, "slug")? {
        let slug = slug.trim().to_lowercase();
        validate_slug(&slug).map_err(AppError::bad_request)?;
        if slug != existing.slug {
            changeset.slug = Some(slug);
        }
    }
    if let Some(title) = string_field(&body, "title")? {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
        changeset.title = Some(title.to_string());
    }
    if let Some(content) = string_field(&body, "content")? {
        if content.trim().is_empty() {
            return Err(AppError::bad_request("content must not be empty"));
        }
        changeset.content = Some(content);
    }
    match classify_nullable(body.get("excerpt")).map_err(AppError::bad_request)? {
        NullableValue::Omitted => {}
        NullableValue::Null => changeset.excerpt = Some(None),
        NullableValue::String(value) => changeset.excerpt = Some(trimmed_text(Some(value))),
    }
    if let Some(published) = bool_field(&body, "isPublished")? {
        changeset.is_published = Some(published);
        // First publication stamps the date; later toggles keep it.
        if published && existing.published_at.is_none() {
            changeset.published_at = Some(Some(Utc::now().naive_utc()));
        }
    }

    if changeset.slug.is_none()
        && changeset.title.is_none()
        && changeset.content.is_none()
        && changeset.excerpt.is_none()
        && changeset.is_published.is_none()
    {
        return Err(AppError::bad_request("no changes provided"));
    }

    changeset.updated_at = Some(Utc::now().naive_utc());
    diesel::update(blog_posts::table.find(existing.id))
        .set(&changeset)
        .execute(&mut conn)
        .map_err(slug_conflict)?;

    let updated: BlogPost = blog_posts::table.find(existing.id).first(&mut conn)?;
    info!(post_id = %updated.id, published = updated.is_published, "blog post updated");
    Ok(Json(BlogPostResponse::from(updated)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    let deleted = diesel::delete(blog_posts::table.find(post_id)).execute(&mut conn)?;
    if deleted == 0 {
        return Err(AppError::not_found());
    }
    info!(post_id = %post_id, "blog post deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    pub user_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct BroadcastResponse {
    pub recipients: usize,
}

pub async fn broadcast_notification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(payload): JsonBody<BroadcastRequest>,
) -> AppResult<Json<BroadcastResponse>> {
    let title = payload.title.trim().to_string();
    let message = payload.message.trim().to_string();

    let mut errors = FieldErrors::new();
    if title.is_empty() {
        errors.insert("title".into(), "is required".into());
    }
    if message.is_empty() {
        errors.insert("message".into(), "is required".into());
    }
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let mut conn = state.db()?;
    let recipients: Vec<Uuid> = match payload.user_id {
        Some(user_id) => {
            let user: User = users::table.find(user_id).first(&mut conn)?;
            vec![user.id]
        }
        None => users::table.select(users::id).load(&mut conn)?,
    };

    let rows: Vec<NewNotification> = recipients
        .iter()
        .map(|user_id| NewNotification {
            id: Uuid::new_v4(),
            user_id: *user_id,
            title: title.clone(),
            message: message.clone(),
        })
        .collect();
    if !rows.is_empty() {
        diesel::insert_into(notifications::table)
            .values(&rows)
            .execute(&mut conn)?;
    }
    drop(conn);

    let broadcast = Broadcast {
        title,
        message,
        recipients,
        sent_by: admin.user_id,
    };
    // Rows are already stored; a failed push only loses the live delivery.
    if let Err(err) = state.broadcaster.broadcast(&broadcast).await {
        warn!(error = %err, "notification broadcaster failed");
    }

    info!(
        admin_id = %admin.user_id,
        recipients = broadcast.recipients.len(),
        "notification broadcast stored"
    );
    Ok(Json(BroadcastResponse {
        recipients: broadcast.recipients.len(),
    }))
}

fn string_field(body: &Value, key: &str) -> AppResult<Option<String>> {
    match body.get(key) {
        None => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(AppError::bad_request(format!(
            "{key} must be a string, got {other}"
        ))),
    }
}

fn bool_field(body: &Value, key: &str) -> AppResult<Option<bool>> {
    match body.get(key) {
        None => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(AppError::bad_request(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

fn trimmed_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.is_empty() {
        return Err("slug is required");
    }
    if slug.len() > MAX_SLUG_LENGTH {
        return Err("slug is too long");
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("slug must not start or end with a dash");
    }
    if !slug
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
    {
        return Err("slug may contain only latin letters, digits and dashes");
    }
    Ok(())
}

fn slug_conflict(err: DieselError) -> AppError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::bad_request("slug already exists")
        }
        other => AppError::from(other),
    }
}
