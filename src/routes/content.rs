use axum::extract::{Json, Path, State};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    documents::DocumentKind,
    error::{AppError, AppResult},
    models::{BlogPost, DocumentTemplate, SubscriptionTier},
    schema::{blog_posts, document_templates},
    state::AppState,
};

use super::to_iso;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_premium: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DocumentTemplate> for TemplateResponse {
    fn from(template: DocumentTemplate) -> Self {
        Self {
            id: template.id,
            kind: template.doc_type,
            name: template.name,
            description: template.description,
            is_active: template.is_active,
            is_premium: template.is_premium,
            created_at: to_iso(template.created_at),
            updated_at: to_iso(template.updated_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPostResponse {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub is_published: bool,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BlogPost> for BlogPostResponse {
    fn from(post: BlogPost) -> Self {
        Self {
            id: post.id,
            slug: post.slug,
            title: post.title,
            excerpt: post.excerpt,
            content: post.content,
            is_published: post.is_published,
            published_at: post.published_at.map(to_iso),
            created_at: to_iso(post.created_at),
            updated_at: to_iso(post.updated_at),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub tier: SubscriptionTier,
    /// `-1` means unlimited.
    pub documents_limit: i32,
    pub can_edit_documents: bool,
    pub document_types: Vec<DocumentKind>,
}

#[derive(Serialize)]
pub struct PricingResponse {
    pub tiers: Vec<PricingTier>,
}

pub async fn list_templates(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<TemplateResponse>>> {
    let mut conn = state.db()?;
    let templates: Vec<DocumentTemplate> = document_templates::table
        .filter(document_templates::is_active.eq(true))
        .order((document_templates::doc_type.asc(), document_templates::name.asc()))
        .load(&mut conn)?;

    Ok(Json(
        templates.into_iter().map(TemplateResponse::from).collect(),
    ))
}

pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<BlogPostResponse>>> {
    let mut conn = state.db()?;
    let posts: Vec<BlogPost> = blog_posts::table
        .filter(blog_posts::is_published.eq(true))
        .order((
            blog_posts::published_at.desc(),
            blog_posts::created_at.desc(),
        ))
        .load(&mut conn)?;

    Ok(Json(posts.into_iter().map(BlogPostResponse::from).collect()))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<BlogPostResponse>> {
    let mut conn = state.db()?;
    let post: BlogPost = blog_posts::table
        .filter(blog_posts::slug.eq(slug.trim()))
        .filter(blog_posts::is_published.eq(true))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(BlogPostResponse::from(post)))
}

pub async fn pricing(State(state): State<AppState>) -> Json<PricingResponse> {
    Json(pricing_tiers(state.config.free_documents_limit))
}

fn pricing_tiers(free_limit: i32) -> PricingResponse {
    let tiers = [SubscriptionTier::Free, SubscriptionTier::Premium]
        .into_iter()
        .map(|tier| PricingTier {
            tier,
            documents_limit: tier.default_limit(free_limit),
            can_edit_documents: tier == SubscriptionTier::Premium,
            document_types: DocumentKind::ALL.to_vec(),
        })
        .collect();
    PricingResponse { tiers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_reflects_configured_free_limit() {
        let pricing = pricing_tiers(5);
        assert_eq!(pricing.tiers.len(), 2);
        assert_eq!(pricing.tiers[0].tier, SubscriptionTier::Free);
        assert_eq!(pricing.tiers[0].documents_limit, 5);
        assert!(!pricing.tiers[0].can_edit_documents);
        assert_eq!(pricing.tiers[1].documents_limit, -1);
        assert!(pricing.tiers[1].can_edit_documents);
    }

    #[test]
    fn pricing_serializes_camel_case() {
        let value = serde_json::to_value(pricing_tiers(3)).expect("json");
        assert_eq!(value["tiers"][0]["tier"], "free");
        assert_eq!(value["tiers"][0]["documentsLimit"], 3);
        assert_eq!(value["tiers"][1]["documentTypes"][0], "privacy");
    }
}
