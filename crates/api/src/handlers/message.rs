use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use musim_dispatcher::Acknowledgement;
use musim_domain::Message;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::routes::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    /// 指定的单个下游服务，空字符串视为未指定
    pub service: Option<String>,
}

impl MessageQuery {
    pub fn target(self) -> Option<String> {
        self.service.filter(|s| !s.trim().is_empty())
    }
}

/// 接收新请求
pub async fn receive_message(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let message = Message::parse(&body)?;
    let target = query.target();
    debug!(sender = %message.sender, target = ?target, "收到请求消息");

    let id = state.dispatcher.admit(&message, target).await?;
    info!(request_id = %id, sender = %message.sender, "请求已接收");

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// 接收下游回复
pub async fn receive_response(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let message = Message::parse(&body)?;
    debug!(sender = %message.sender, request_id = %message.args, "收到下游回复");

    // 未知ID已经在acknowledge中转换为错误
    let ack = state.dispatcher.acknowledge(&message).await?;
    let remaining = match ack {
        Acknowledgement::Pending { remaining, .. } => remaining,
        _ => 0,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": message.args, "remaining": remaining })),
    ))
}
