/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use restohub_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = restohub_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{Config, MAX_BODY_BYTES},
    error::ApiError,
    middleware::security::SecurityHeadersLayer,
};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use restohub_shared::{
    auth::{
        google::{GoogleVerifier, TokenInfoVerifier},
        middleware::authenticate,
    },
    billing::{stripe::StripeGateway, PaymentGateway},
    mail::{ConsoleMailer, Mailer},
    models::metrics::{
        executive::{
            BusinessHealthBreakdown, ExecutiveDashboard, ExecutiveFinancialBreakdown,
            ExecutiveReport,
        },
        marketing::{
            MarketingDashboard, MarketingReport, StaffOpsBreakdown, TeamPerformanceBreakdown,
        },
        operations::{
            DailyOperationBreakdown, OperationDashboard, OperationFinancialBreakdown,
            OperationReport,
        },
        MetricRecord,
    },
    storage::{LocalMediaStore, MediaStore},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Integrations sit behind trait objects so tests can swap them out.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// OTP delivery
    pub mailer: Arc<dyn Mailer>,

    /// Payment processor
    pub payments: Arc<dyn PaymentGateway>,

    /// Google ID-token verification
    pub google: Arc<dyn GoogleVerifier>,

    /// Uploaded file storage
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    /// Creates application state with the production integrations
    pub fn new(db: PgPool, config: Config) -> Self {
        let mailer = Arc::new(ConsoleMailer);
        let payments = Arc::new(StripeGateway::new(
            config.stripe.secret_key.clone(),
            config.stripe.api_base.clone(),
        ));
        let google = Arc::new(TokenInfoVerifier::new(config.google.client_id.clone()));
        let media = Arc::new(LocalMediaStore::new(
            config.media.root.clone(),
            config.media.url.clone(),
        ));

        Self::with_services(db, config, mailer, payments, google, media)
    }

    /// Creates application state from explicit integrations
    pub fn with_services(
        db: PgPool,
        config: Config,
        mailer: Arc<dyn Mailer>,
        payments: Arc<dyn PaymentGateway>,
        google: Arc<dyn GoogleVerifier>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            mailer,
            payments,
            google,
            media,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Adds list/record and delete routes for one metric table under `path`
fn metric_routes<M: MetricRecord>(router: Router<AppState>, path: &str) -> Router<AppState> {
    use crate::routes::metrics;

    router
        .route(&format!("{}/", path), get(metrics::list::<M>).post(metrics::create::<M>))
        .route(&format!("{}/:id/", path), delete(metrics::remove::<M>))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                   # Health check (public)
/// ├── /api/auth/
/// │   ├── POST register/ login/ google-login/ refresh-token/
/// │   ├── POST otp/create/ otp/verify/
/// │   ├── POST password-reset/request/ reset/otp-verify/ password-reset/confirm/
/// │   ├── GET  subscription/payment/{success,cancel}/   # 303 to the frontend
/// │   ├── POST subscription/webhook/                    # signed callbacks
/// │   └── (JWT) password-change/ users/ account/ profile/ onboarding/
/// │             documents/ subscription/ calendar/events/
/// ├── /api/operations/{dashboard,report,daily-breakdown,financial-breakdown}/   (JWT)
/// ├── /api/marketing/{dashboard,report,team-performance,staff-ops-breakdown}/   (JWT)
/// └── /api/executive/{dashboard,report,business-health,financial-breakdown}/    (JWT)
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Body size limit
/// 5. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check));

    // Account routes that need no token
    let public_routes = Router::new()
        .route("/register/", post(routes::auth::register))
        .route("/login/", post(routes::auth::login))
        .route("/otp/create/", post(routes::auth::create_otp))
        .route("/otp/verify/", post(routes::auth::verify_otp))
        .route("/password-reset/request/", post(routes::auth::request_password_reset))
        .route("/reset/otp-verify/", post(routes::auth::verify_reset_otp))
        .route("/password-reset/confirm/", post(routes::auth::confirm_password_reset))
        .route("/refresh-token/", post(routes::auth::refresh_token))
        .route("/google-login/", post(routes::auth::google_login))
        .route(
            "/subscription/payment/success/",
            get(routes::subscriptions::payment_success),
        )
        .route(
            "/subscription/payment/cancel/",
            get(routes::subscriptions::payment_cancel),
        )
        .route("/subscription/webhook/", post(routes::webhook::stripe_webhook));

    // Everything else under /api/auth requires a JWT
    let protected_routes = Router::new()
        .route("/password-change/", post(routes::auth::change_password))
        .route("/users/", get(routes::auth::list_users))
        .route("/users/:id/", delete(routes::auth::delete_user))
        .route("/account/", delete(routes::auth::delete_account))
        .route(
            "/profile/",
            get(routes::profile::get_profile).put(routes::profile::update_profile),
        )
        .route("/profile/picture/", put(routes::profile::update_picture))
        .route(
            "/onboarding/",
            get(routes::onboarding::get_progress).post(routes::onboarding::create_progress),
        )
        .route("/onboarding/get/", get(routes::onboarding::get_existing))
        .route("/onboarding/update/", put(routes::onboarding::update_progress))
        .route("/onboarding/files/", put(routes::onboarding::upload_files))
        .route(
            "/documents/",
            get(routes::documents::list_documents).post(routes::documents::upload_document),
        )
        .route(
            "/documents/:id/",
            get(routes::documents::get_document)
                .put(routes::documents::update_document)
                .delete(routes::documents::delete_document),
        )
        .route("/subscription/", get(routes::subscriptions::list_subscriptions))
        .route("/subscription/cancel/", post(routes::subscriptions::cancel_subscription))
        .route("/subscription/stripe/setup/", post(routes::subscriptions::setup_plans))
        .route("/subscription/stripe/checkout/", post(routes::subscriptions::checkout))
        .route("/subscription/:id/", get(routes::subscriptions::get_subscription))
        .route(
            "/calendar/events/",
            get(routes::calendar::list_events).post(routes::calendar::create_event),
        )
        .route(
            "/calendar/events/:id/",
            get(routes::calendar::get_event)
                .put(routes::calendar::update_event)
                .delete(routes::calendar::delete_event),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let metric_router = Router::new();
    let metric_router = metric_routes::<OperationDashboard>(metric_router, "/operations/dashboard");
    let metric_router = metric_routes::<OperationReport>(metric_router, "/operations/report");
    let metric_router =
        metric_routes::<DailyOperationBreakdown>(metric_router, "/operations/daily-breakdown");
    let metric_router = metric_routes::<OperationFinancialBreakdown>(
        metric_router,
        "/operations/financial-breakdown",
    );
    let metric_router = metric_routes::<MarketingDashboard>(metric_router, "/marketing/dashboard");
    let metric_router = metric_routes::<MarketingReport>(metric_router, "/marketing/report");
    let metric_router =
        metric_routes::<TeamPerformanceBreakdown>(metric_router, "/marketing/team-performance");
    let metric_router =
        metric_routes::<StaffOpsBreakdown>(metric_router, "/marketing/staff-ops-breakdown");
    let metric_router = metric_routes::<ExecutiveDashboard>(metric_router, "/executive/dashboard");
    let metric_router = metric_routes::<ExecutiveReport>(metric_router, "/executive/report");
    let metric_router =
        metric_routes::<BusinessHealthBreakdown>(metric_router, "/executive/business-health");
    let metric_router = metric_routes::<ExecutiveFinancialBreakdown>(
        metric_router,
        "/executive/financial-breakdown",
    );
    let metric_router = metric_router.route_layer(axum::middleware::from_fn_with_state(
        state.clone(),
        jwt_auth_layer,
    ));

    let api_routes = Router::new()
        .nest("/auth", public_routes.merge(protected_routes))
        .merge(metric_router);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// JWT authentication middleware layer
///
/// Validates the bearer token, loads the user, then injects an
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(&state.db, state.jwt_secret(), req.headers()).await?;

    tracing::debug!(user_id = %auth_context.user_id, "Request authenticated");
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
