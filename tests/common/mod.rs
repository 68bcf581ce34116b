use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use legaldocs::auth::jwt::JwtService;
use legaldocs::auth::password;
use legaldocs::config::AppConfig;
use legaldocs::db::{self, PgPool};
use legaldocs::models::{NewUser, Role, SubscriptionTier, User};
use legaldocs::notifications::{Broadcast, NotificationBroadcaster};
use legaldocs::routes;
use legaldocs::schema::users;
use legaldocs::state::AppState;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const FREE_LIMIT: i32 = 3;

/// Keeps every broadcast so tests can assert on delivery.
#[derive(Default)]
pub struct RecordingBroadcaster {
    sent: Mutex<Vec<Broadcast>>,
}

#[async_trait]
impl NotificationBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, broadcast: &Broadcast) -> Result<()> {
        self.sent.lock().await.push(broadcast.clone());
        Ok(())
    }
}

impl RecordingBroadcaster {
    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<Broadcast> {
        self.sent.lock().await.clone()
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    broadcaster: Arc<RecordingBroadcaster>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            cookie_secure: false,
            cookie_domain: None,
            cors_allowed_origin: None,
            free_documents_limit: FREE_LIMIT,
            admin_email: None,
            admin_password: None,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let broadcaster_for_state: Arc<dyn NotificationBroadcaster> = broadcaster.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, broadcaster_for_state, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            broadcaster,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    #[allow(dead_code)]
    pub fn broadcaster(&self) -> Arc<RecordingBroadcaster> {
        self.broadcaster.clone()
    }

    pub async fn insert_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
        subscription: SubscriptionTier,
    ) -> Result<Uuid> {
        let email = email.to_string();
        let password = password.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                email,
                password_hash: password::hash_password(&password)?,
                first_name: None,
                last_name: None,
                role: role.as_str().to_string(),
                subscription: subscription.as_str().to_string(),
                documents_limit: subscription.default_limit(FREE_LIMIT),
            };
            diesel::insert_into(users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn user(&self, user_id: Uuid) -> Result<User> {
        self.with_conn(move |conn| {
            users::table
                .find(user_id)
                .first(conn)
                .context("failed to load user")
        })
        .await
    }

    pub async fn login_token(&self, email: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/api/login", &LoginPayload { email, password }, None)
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = json_body(response).await?;
        body["accessToken"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response has no accessToken"))
    }

    /// Inserts a user and returns a bearer token for them.
    #[allow(dead_code)]
    pub async fn signed_in(
        &self,
        email: &str,
        role: Role,
        subscription: SubscriptionTier,
    ) -> Result<(Uuid, String)> {
        let password = "correct-horse-battery";
        let user_id = self.insert_user(email, password, role, subscription).await?;
        let token = self.login_token(email, password).await?;
        Ok((user_id, token))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<Vec<u8>>,
        token: Option<&str>,
        cookie: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let body = match payload {
            Some(bytes) => {
                builder = builder.header("content-type", "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };
        let request = builder.body(body)?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::POST, path, Some(body), token, None).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        self.send(Method::PUT, path, Some(body), token, None).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, token, None).await
    }

    #[allow(dead_code)]
    pub async fn get_with_cookie(&self, path: &str, cookie: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, None, None, Some(cookie)).await
    }

    #[allow(dead_code)]
    pub async fn post_with_cookie(&self, path: &str, cookie: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, None, None, Some(cookie)).await
    }

    #[allow(dead_code)]
    pub async fn post_empty(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::POST, path, None, token, None).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path, None, token, None).await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

/// Collects `name=value` pairs from every Set-Cookie header into a Cookie
/// header value.
#[allow(dead_code)]
pub fn cookie_header(response: &hyper::Response<Body>) -> String {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("; ")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE notifications, user_documents, sessions, blog_posts, document_templates, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
