use axum::http::HeaderValue;
use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};

pub const ACCESS_COOKIE_NAME: &str = "auth-token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

pub fn access_cookie(config: &AppConfig, token: &str) -> AppResult<HeaderValue> {
    let max_age = config.jwt_expiry_minutes * 60;
    build_cookie(
        config,
        ACCESS_COOKIE_NAME,
        token,
        "SameSite=Lax",
        max_age,
        None,
    )
}

pub fn refresh_cookie(
    config: &AppConfig,
    token: &str,
    expires_at: DateTime<Utc>,
) -> AppResult<HeaderValue> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    build_cookie(
        config,
        REFRESH_COOKIE_NAME,
        token,
        "SameSite=Strict",
        max_age,
        Some(expires_at.to_rfc2822()),
    )
}

pub fn clear_cookie(config: &AppConfig, name: &str) -> AppResult<HeaderValue> {
    build_cookie(
        config,
        name,
        "",
        "SameSite=Strict",
        0,
        Some("Thu, 01 Jan 1970 00:00:00 GMT".to_string()),
    )
}

fn build_cookie(
    config: &AppConfig,
    name: &str,
    value: &str,
    same_site: &str,
    max_age: i64,
    expires: Option<String>,
) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{}={}", name, value)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push(same_site.into());
    parts.push(format!("Max-Age={}", max_age));
    if let Some(expires) = expires {
        parts.push(format!("Expires={}", expires));
    }
    if config.cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &config.cookie_domain {
        parts.push(format!("Domain={}", domain));
    }

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config(secure: bool, domain: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/test".into(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            jwt_secret: "secret".into(),
            jwt_issuer: "issuer".into(),
            jwt_audience: "audience".into(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            cookie_secure: secure,
            cookie_domain: domain.map(str::to_string),
            cors_allowed_origin: None,
            free_documents_limit: 3,
            admin_email: None,
            admin_password: None,
        }
    }

    #[test]
    fn access_cookie_lives_as_long_as_the_token() {
        let value = access_cookie(&config(false, None), "abc").expect("cookie");
        let text = value.to_str().expect("ascii");
        assert!(text.starts_with("auth-token=abc; Path=/; HttpOnly"));
        assert!(text.contains("Max-Age=3600"));
        assert!(!text.contains("Secure"));
    }

    #[test]
    fn refresh_cookie_respects_secure_and_domain() {
        let expires = Utc::now() + Duration::days(1);
        let value =
            refresh_cookie(&config(true, Some("example.ru")), "xyz", expires).expect("cookie");
        let text = value.to_str().expect("ascii");
        assert!(text.starts_with("refresh_token=xyz;"));
        assert!(text.contains("SameSite=Strict"));
        assert!(text.contains("; Secure"));
        assert!(text.contains("Domain=example.ru"));
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let value = clear_cookie(&config(false, None), ACCESS_COOKIE_NAME).expect("cookie");
        let text = value.to_str().expect("ascii");
        assert!(text.starts_with("auth-token=;"));
        assert!(text.contains("Max-Age=0"));
    }
}
