use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use ticketguard::config::AppConfig;
use ticketguard::detection::gate::GateThresholds;
use ticketguard::detection::score::SignalWeights;
use ticketguard::detection::telemetry::SyntheticTelemetry;
use ticketguard::http::middleware::auth::AuthVerifier;
use ticketguard::http::middleware::rate_limit::RateLimitState;
use ticketguard::http::middleware::screening::ScreeningState;
use ticketguard::ml::http_scorer::HttpMlScorer;
use ticketguard::ml::MlScorer;
use ticketguard::queue::rescore_queue::RescoreQueue;
use ticketguard::queue::worker::RescoreWorker;
use ticketguard::repo::block_list_repo::BlockListRepo;
use ticketguard::repo::suspicious_events_repo::SuspiciousEventsRepo;
use ticketguard::repo::transactions_repo::TransactionsRepo;
use ticketguard::service::captcha::CaptchaClient;
use ticketguard::service::geo::GeoResolver;
use ticketguard::service::payment_service::PaymentService;
use ticketguard::service::realtime::RealtimeEmitter;
use ticketguard::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let transactions_repo = TransactionsRepo { pool: pool.clone() };
    let suspicious_repo = SuspiciousEventsRepo { pool: pool.clone() };
    let block_list_repo = BlockListRepo { pool: pool.clone() };

    let emitter = RealtimeEmitter {
        redis_client: redis::Client::open(cfg.redis_url.clone())?,
        suspicious_channel: cfg.suspicious_channel.clone(),
        payment_channel: cfg.payment_channel.clone(),
    };
    let geo = GeoResolver::new(&cfg);
    let captcha = CaptchaClient::new(&cfg);
    let ml_scorer: Arc<dyn MlScorer> = Arc::new(HttpMlScorer::new(&cfg));

    let rescore_queue = RescoreQueue::new(cfg.rescore_concurrency, cfg.rescore_max_attempts);
    let weights = SignalWeights::default();
    let thresholds = GateThresholds::from_config(&cfg);

    let payment_service = PaymentService {
        transactions_repo: transactions_repo.clone(),
        suspicious_repo: suspicious_repo.clone(),
        block_list_repo: block_list_repo.clone(),
        geo: geo.clone(),
        telemetry: Arc::new(SyntheticTelemetry),
        emitter: emitter.clone(),
        queue: rescore_queue.clone(),
        weights: weights.clone(),
        thresholds,
        max_payment_amount: cfg.max_payment_amount,
        auto_complete_secs: cfg.auto_complete_secs,
        simulated_processing_ms: cfg.simulated_processing_ms,
    };

    let worker = RescoreWorker {
        queue: rescore_queue.clone(),
        transactions_repo: transactions_repo.clone(),
        suspicious_repo: suspicious_repo.clone(),
        emitter: emitter.clone(),
        scorer: ml_scorer.clone(),
        weights,
        thresholds,
        retry_delay_ms: cfg.rescore_retry_delay_ms,
        poll_ms: cfg.rescore_poll_ms,
    };
    tokio::spawn(worker.run());

    let state = AppState {
        payment_service,
        suspicious_repo: suspicious_repo.clone(),
        block_list_repo: block_list_repo.clone(),
        rescore_queue,
        ml_scorer,
        captcha,
        pool,
        redis_client,
    };

    let verifier = AuthVerifier::new(&cfg.jwt_secret);
    let screening = ScreeningState {
        block_list_repo,
        suspicious_repo,
        emitter,
        geo,
        log_threshold: cfg.log_threshold,
    };

    let payment_routes = Router::new()
        .route("/payment/initiate", post(ticketguard::http::handlers::payments::initiate))
        .route("/payment/process", post(ticketguard::http::handlers::payments::process))
        .route(
            "/payment/status/:transaction_id",
            get(ticketguard::http::handlers::payments::status),
        )
        .route("/payment/history", get(ticketguard::http::handlers::payments::history))
        .layer(from_fn_with_state(
            RateLimitState {
                redis_client: redis::Client::open(cfg.redis_url.clone())?,
                scope: "payment",
                window_secs: cfg.rate_window_secs,
                max_requests: cfg.rate_max_payment as i64,
            },
            ticketguard::http::middleware::rate_limit::enforce,
        ))
        .layer(from_fn_with_state(
            verifier.clone(),
            ticketguard::http::middleware::auth::require_auth,
        ));

    let admin_routes = Router::new()
        .route("/admin/logs", get(ticketguard::http::handlers::admin::logs))
        .route("/admin/block", post(ticketguard::http::handlers::admin::block))
        .route("/admin/unblock", post(ticketguard::http::handlers::admin::unblock))
        .layer(axum::middleware::from_fn(
            ticketguard::http::middleware::auth::require_admin,
        ))
        .layer(from_fn_with_state(
            verifier.clone(),
            ticketguard::http::middleware::auth::require_auth,
        ));

    let user_routes = Router::new()
        .route("/user/logs", get(ticketguard::http::handlers::admin::user_logs))
        .layer(from_fn_with_state(
            screening.clone(),
            ticketguard::http::middleware::screening::screen,
        ))
        .layer(from_fn_with_state(
            verifier,
            ticketguard::http::middleware::auth::require_auth,
        ));

    let captcha_routes = Router::new()
        .route("/captcha/verify", post(ticketguard::http::handlers::captcha::verify))
        .layer(from_fn_with_state(
            screening,
            ticketguard::http::middleware::screening::screen,
        ));

    // Health routes sit outside the general limiter.
    let app = Router::new()
        .merge(payment_routes)
        .merge(admin_routes)
        .merge(user_routes)
        .merge(captcha_routes)
        .layer(from_fn_with_state(
            RateLimitState {
                redis_client: redis::Client::open(cfg.redis_url.clone())?,
                scope: "general",
                window_secs: cfg.rate_window_secs,
                max_requests: cfg.rate_max_general as i64,
            },
            ticketguard::http::middleware::rate_limit::enforce,
        ))
        .route("/health", get(ticketguard::http::handlers::health::basic))
        .route("/health/detailed", get(ticketguard::http::handlers::health::detailed))
        .layer(axum::middleware::from_fn(
            ticketguard::http::middleware::request_id::propagate,
        ))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
