use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use musim_dispatcher::Dispatcher;
use musim_domain::{ShutdownPhase, MESSAGE_PATH, RESPONSE_PATH};
use tokio::sync::watch;

use crate::handlers::{
    health::health_check,
    message::{receive_message, receive_response},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub phase: watch::Receiver<ShutdownPhase>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, phase: watch::Receiver<ShutdownPhase>) -> Self {
        Self { dispatcher, phase }
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(MESSAGE_PATH, post(receive_message))
        .route(RESPONSE_PATH, post(receive_response))
        .with_state(state)
}
