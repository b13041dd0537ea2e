pub mod config;
pub mod error;
pub mod verification;
pub mod domain {
    pub mod event;
    pub mod transaction;
}
pub mod detection {
    pub mod gate;
    pub mod score;
    pub mod signals;
    pub mod telemetry;
}
pub mod ml;
pub mod queue {
    pub mod rescore_queue;
    pub mod worker;
}
pub mod repo {
    pub mod block_list_repo;
    pub mod suspicious_events_repo;
    pub mod transactions_repo;
}
pub mod service {
    pub mod captcha;
    pub mod geo;
    pub mod payment_service;
    pub mod realtime;
}
pub mod http {
    pub mod handlers {
        pub mod admin;
        pub mod captcha;
        pub mod health;
        pub mod payments;
    }
    pub mod middleware {
        pub mod auth;
        pub mod rate_limit;
        pub mod request_id;
        pub mod screening;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
    pub suspicious_repo: repo::suspicious_events_repo::SuspiciousEventsRepo,
    pub block_list_repo: repo::block_list_repo::BlockListRepo,
    pub rescore_queue: queue::rescore_queue::RescoreQueue,
    pub ml_scorer: std::sync::Arc<dyn ml::MlScorer>,
    pub captcha: service::captcha::CaptchaClient,
    pub pool: sqlx::PgPool,
    pub redis_client: redis::Client,
}
