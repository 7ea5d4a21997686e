//! # Musim API
//!
//! 模拟节点的HTTP入口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `POST /message[?service=<name>]` - 接收新请求，201表示已接收，422表示消息无法解析
//! - `POST /response` - 接收下游回复，未知的关联ID返回422
//! - `GET /health` - 节点状态、负载等级、关闭阶段和两张表的大小
//!
//! 消息格式为 `{"sender": "...", "body": "...", "args": "..."}`。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use tower::ServiceBuilder;

use middleware::{request_logging, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建带日志中间件的完整应用
pub fn create_app(state: AppState) -> Router {
    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
