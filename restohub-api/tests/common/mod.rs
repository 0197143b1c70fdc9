//! Common test utilities for integration tests
//!
//! - In-memory stand-ins for the mailer, payment processor, Google
//!   verifier and media store
//! - A router over a lazily connected pool, so routes that never reach the
//!   database can be exercised without one
//! - Request helpers built on `tower::ServiceExt::oneshot`

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use restohub_api::{
    app::{build_router, AppState},
    config::Config,
};
use restohub_shared::{
    auth::google::{GoogleIdentity, GoogleVerifier, VerifyError},
    billing::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway, PlanSetup},
    db::pool::{create_lazy_pool, DatabaseConfig},
    mail::{MailError, Mailer, OtpPurpose},
    models::subscription::Plan,
    storage::{MediaStore, StorageError},
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

pub const GOOGLE_TOKEN: &str = "valid-google-token";
pub const GOOGLE_EMAIL: &str = "google.user@example.com";

/// Mailer that keeps every OTP it is asked to send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, OtpPurpose)>>,
}

impl RecordingMailer {
    /// The most recent code sent to `email`
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _, _)| to == email)
            .map(|(_, code, _)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string(), purpose));
        Ok(())
    }
}

/// Payment processor that answers with predictable IDs
#[derive(Default)]
pub struct FakeGateway {
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_plan(&self, plan: Plan) -> Result<PlanSetup, GatewayError> {
        Ok(PlanSetup {
            plan,
            product_id: format!("prod_{}", plan.as_str()),
            price_id: format!("price_{}", plan.as_str()),
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        let id = format!("cs_test_{}", checkouts.len());

        Ok(CheckoutSession {
            url: format!("https://checkout.example.com/{}", id),
            id,
        })
    }
}

/// Accepts exactly [`GOOGLE_TOKEN`]
pub struct FakeGoogle;

#[async_trait]
impl GoogleVerifier for FakeGoogle {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, VerifyError> {
        if id_token != GOOGLE_TOKEN {
            return Err(VerifyError::InvalidToken("unknown token".to_string()));
        }

        Ok(GoogleIdentity {
            email: GOOGLE_EMAIL.to_string(),
            name: Some("Google User".to_string()),
            given_name: Some("Google".to_string()),
            family_name: Some("User".to_string()),
        })
    }
}

/// Media store backed by a map
#[derive(Default)]
pub struct MemoryMedia {
    files: Mutex<HashMap<String, Vec<u8>>>,
    counter: Mutex<u64>,
}

impl MemoryMedia {
    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[async_trait]
impl MediaStore for MemoryMedia {
    async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let path = format!("{}/{}-{}", dir, counter, file_name);
        self.files.lock().unwrap().insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    fn url_for(&self, path: &str) -> String {
        format!("/media/{}", path)
    }
}

/// Router plus handles on its fake integrations
pub struct TestApp {
    pub router: Router,
    pub db: PgPool,
    pub config: Config,
    pub mailer: Arc<RecordingMailer>,
    pub payments: Arc<FakeGateway>,
    pub media: Arc<MemoryMedia>,
}

impl TestApp {
    /// App over a pool that only connects when a query runs
    pub fn lazy() -> Self {
        let config = Config::for_tests();
        let db = create_lazy_pool(&DatabaseConfig {
            url: config.database.url.clone(),
            max_connections: 2,
            min_connections: 0,
            acquire_timeout_seconds: 1,
            ..Default::default()
        })
        .expect("lazy pool");

        Self::with_pool(db, config)
    }

    /// App over a migrated database named by `DATABASE_URL`
    pub async fn with_database() -> Self {
        let mut config = Config::for_tests();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        let db = PgPool::connect(&config.database.url)
            .await
            .expect("connect to test database");
        restohub_shared::db::migrations::run_migrations(&db)
            .await
            .expect("run migrations");

        Self::with_pool(db, config)
    }

    pub fn with_pool(db: PgPool, config: Config) -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let payments = Arc::new(FakeGateway::default());
        let media = Arc::new(MemoryMedia::default());

        let state = AppState::with_services(
            db.clone(),
            config.clone(),
            mailer.clone(),
            payments.clone(),
            Arc::new(FakeGoogle),
            media.clone(),
        );

        Self {
            router: build_router(state),
            db,
            config,
            mailer,
            payments,
            media,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Sends a JSON request, optionally with a bearer token
    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = self
            .send(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        read_json(response).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = self.send(builder.body(Body::empty()).unwrap()).await;
        read_json(response).await
    }
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// A multipart body with text fields and `(field, file name, bytes)` files
pub fn multipart_body(
    fields: &[(&str, &str)],
    files: &[(&str, &str, &[u8])],
) -> (String, Vec<u8>) {
    let boundary = "restohub-test-boundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    for (name, file_name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                boundary, name, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    (format!("multipart/form-data; boundary={}", boundary), body)
}

/// A unique address so database tests do not collide
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}
