use axum::extract::{Json, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::documents::{
    forms::{DocumentForm, FormFields},
    generator,
    quota::DocumentQuota,
    DocumentKind, DocumentStatus,
};
use crate::error::{AppError, AppResult, FieldErrors, JsonBody};
use crate::models::{NewUserDocument, SubscriptionTier, User, UserDocument};
use crate::schema::{user_documents, users};
use crate::state::AppState;

use super::to_iso;

const MAX_TITLE_LENGTH: usize = 255;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    #[serde(flatten)]
    pub fields: FormFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    pub status: Option<String>,
    pub form_data: Option<FormFields>,
    pub generated_content: Option<String>,
}

#[derive(Deserialize)]
pub struct DocumentListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = user_documents)]
struct DocumentChangeset {
    title: Option<String>,
    status: Option<String>,
    form_data: Option<Value>,
    generated_content: Option<String>,
    updated_at: Option<NaiveDateTime>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: String,
    pub form_data: Value,
    pub generated_content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<UserDocument> for DocumentResponse {
    fn from(doc: UserDocument) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            kind: doc.doc_type,
            title: doc.title,
            status: doc.status,
            form_data: doc.form_data,
            generated_content: doc.generated_content,
            created_at: to_iso(doc.created_at),
            updated_at: to_iso(doc.updated_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub title: String,
    pub generated_content: String,
}

/// Validates the raw request into a typed form plus the title to store.
fn validate_request(payload: &CreateDocumentRequest) -> AppResult<(DocumentForm, String)> {
    let kind = payload.kind.parse::<DocumentKind>().map_err(|err| {
        let mut errors = FieldErrors::new();
        errors.insert("type".into(), err);
        AppError::validation(errors)
    })?;

    let mut errors = match payload.fields.validate(kind) {
        Ok(form) => {
            let title = match payload.title.as_deref().map(str::trim) {
                Some(title) if !title.is_empty() => title.to_string(),
                _ => format!("{} — {}", kind.title(), form.company().company_name),
            };
            if title.chars().count() <= MAX_TITLE_LENGTH {
                return Ok((form, title));
            }
            FieldErrors::new()
        }
        Err(errors) => errors,
    };

    if payload
        .title
        .as_deref()
        .is_some_and(|title| title.trim().chars().count() > MAX_TITLE_LENGTH)
    {
        errors.insert(
            "title".into(),
            format!("must be at most {MAX_TITLE_LENGTH} characters"),
        );
    }
    if errors.is_empty() {
        errors.insert(
            "companyName".into(),
            format!("is too long for the default title ({MAX_TITLE_LENGTH} characters)"),
        );
    }
    Err(AppError::validation(errors))
}

pub async fn create_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<CreateDocumentRequest>,
) -> AppResult<(StatusCode, Json<DocumentResponse>)> {
    let (form, title) = validate_request(&payload)?;
    let kind = form.kind();
    let generated_content = generator::generate_today(&form);
    let form_data = serde_json::to_value(&form)?;

    let mut conn = state.db()?;
    let document = conn.transaction::<UserDocument, AppError, _>(|conn| {
        // Row lock serializes concurrent creations by the same user.
        let owner: User = users::table
            .find(user.user_id)
            .for_update()
            .first(conn)?;

        let quota = DocumentQuota::for_user(&owner);
        if !quota.allows_another() {
            warn!(
                user_id = %owner.id,
                created = quota.created,
                limit = quota.limit,
                "document creation rejected: limit reached"
            );
            return Err(AppError::quota_exceeded());
        }

        let new_document = NewUserDocument {
            id: Uuid::new_v4(),
            user_id: owner.id,
            doc_type: kind.as_str().to_string(),
            title,
            form_data,
            generated_content,
            status: DocumentStatus::Completed.as_str().to_string(),
        };

        diesel::insert_into(user_documents::table)
            .values(&new_document)
            .execute(conn)?;

        diesel::update(users::table.find(owner.id))
            .set((
                users::documents_created.eq(users::documents_created + 1),
                users::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        Ok(user_documents::table.find(new_document.id).first(conn)?)
    })?;

    info!(
        document_id = %document.id,
        user_id = %user.user_id,
        kind = %kind,
        "document generated"
    );

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

pub async fn preview_document(
    _user: AuthenticatedUser,
    JsonBody(payload): JsonBody<CreateDocumentRequest>,
) -> AppResult<Json<PreviewResponse>> {
    let (form, title) = validate_request(&payload)?;
    Ok(Json(PreviewResponse {
        kind: form.kind(),
        title,
        generated_content: generator::generate_today(&form),
    }))
}

pub async fn list_documents(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<DocumentListQuery>,
) -> AppResult<Json<Vec<DocumentResponse>>> {
    let mut conn = state.db()?;

    let mut statement = user_documents::table
        .filter(user_documents::user_id.eq(user.user_id))
        .order(user_documents::created_at.desc())
        .into_boxed();

    if let Some(kind) = query.kind.as_deref().filter(|k| !k.trim().is_empty()) {
        let kind = kind.parse::<DocumentKind>().map_err(AppError::bad_request)?;
        statement = statement.filter(user_documents::doc_type.eq(kind.as_str()));
    }
    if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let status = status
            .parse::<DocumentStatus>()
            .map_err(AppError::bad_request)?;
        statement = statement.filter(user_documents::status.eq(status.as_str()));
    }

    let documents: Vec<UserDocument> = statement.load(&mut conn)?;
    Ok(Json(
        documents.into_iter().map(DocumentResponse::from).collect(),
    ))
}

/// Loads a document the caller may see. Other users' documents read as
/// missing; admins see everything.
fn load_visible_document(
    conn: &mut PgConnection,
    user: &AuthenticatedUser,
    document_id: Uuid,
) -> AppResult<UserDocument> {
    let document: UserDocument = user_documents::table.find(document_id).first(conn)?;
    if document.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::not_found());
    }
    Ok(document)
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;
    let document = load_visible_document(&mut conn, &user, document_id)?;
    Ok(Json(DocumentResponse::from(document)))
}

pub async fn update_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
    JsonBody(payload): JsonBody<UpdateDocumentRequest>,
) -> AppResult<Json<DocumentResponse>> {
    let mut conn = state.db()?;

    let account: User = users::table.find(user.user_id).first(&mut conn)?;
    if account.subscription() != SubscriptionTier::Premium && !user.is_admin() {
        return Err(AppError::forbidden(
            "editing documents requires a premium subscription",
        ));
    }

    let document = load_visible_document(&mut conn, &user, document_id)?;

    if payload.form_data.is_some() && payload.generated_content.is_some() {
        return Err(AppError::bad_request(
            "formData and generatedContent cannot be changed together",
        ));
    }

    let mut changeset = DocumentChangeset::default();
    let mut errors = FieldErrors::new();

    if let Some(title) = payload.title.as_deref() {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            errors.insert("title".into(), "must not be empty".into());
        } else if trimmed.chars().count() > MAX_TITLE_LENGTH {
            errors.insert(
                "title".into(),
                format!("must be at most {MAX_TITLE_LENGTH} characters"),
            );
        } else {
            changeset.title = Some(trimmed.to_string());
        }
    }

    if let Some(status) = payload.status.as_deref() {
        match status.parse::<DocumentStatus>() {
            Ok(status) => changeset.status = Some(status.as_str().to_string()),
            Err(err) => {
                errors.insert("status".into(), err);
            }
        }
    }

    if let Some(fields) = payload.form_data {
        let kind = document
            .doc_type
            .parse::<DocumentKind>()
            .map_err(AppError::internal)?;
        let base = serde_json::from_value::<DocumentForm>(document.form_data.clone())
            .map(|form| form.to_fields())
            .unwrap_or_default();
        match fields.overlay(base).validate(kind) {
            Ok(form) => {
                changeset.generated_content = Some(generator::generate_today(&form));
                changeset.form_data = Some(serde_json::to_value(&form)?);
            }
            Err(form_errors) => errors.extend(form_errors),
        }
    }

    if let Some(content) = payload.generated_content {
        if content.trim().is_empty() {
            errors.insert("generatedContent".into(), "must not be empty".into());
        } else {
            changeset.generated_content = Some(content);
        }
    }

    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    if changeset.title.is_none()
        && changeset.status.is_none()
        && changeset.generated_content.is_none()
    {
        return Err(AppError::bad_request("no changes provided"));
    }

    changeset.updated_at = Some(Utc::now().naive_utc());
    diesel::update(user_documents::table.find(document.id))
        .set(&changeset)
        .execute(&mut conn)?;

    let updated: UserDocument = user_documents::table.find(document.id).first(&mut conn)?;
    info!(document_id = %updated.id, user_id = %user.user_id, "document updated");
    Ok(Json(DocumentResponse::from(updated)))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let document = load_visible_document(&mut conn, &user, document_id)?;

    diesel::delete(user_documents::table.find(document.id)).execute(&mut conn)?;
    info!(document_id = %document.id, user_id = %user.user_id, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(document_id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let format = query
        .format
        .as_deref()
        .map(|f| f.trim().to_lowercase())
        .unwrap_or_else(|| "txt".to_string());

    let (content_type, extension) = match format.as_str() {
        "txt" => ("text/plain; charset=utf-8", "txt"),
        "html" => ("text/html; charset=utf-8", "html"),
        "pdf" | "docx" => {
            return Err(AppError::not_implemented(format!(
                "{format} export is not available"
            )));
        }
        other => {
            return Err(AppError::bad_request(format!(
                "unsupported export format: {other}"
            )));
        }
    };

    let mut conn = state.db()?;
    let document = load_visible_document(&mut conn, &user, document_id)?;

    let body = if extension == "html" {
        render_html(&document.title, &document.generated_content)
    } else {
        document.generated_content.clone()
    };

    let disposition = attachment_content_disposition(&format!("{}.{extension}", document.title));
    let disposition = HeaderValue::from_str(&disposition).map_err(AppError::internal)?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

fn attachment_content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn render_html(title: &str, content: &str) -> String {
    let paragraphs: Vec<String> = content
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<String> = block.lines().map(escape_html).collect();
            format!("<p>{}</p>", lines.join("<br>\n"))
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html lang=\"ru\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        paragraphs.join("\n")
    )
}
