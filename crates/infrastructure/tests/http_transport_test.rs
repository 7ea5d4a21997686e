use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use musim_domain::{Message, MessageKind, Transport};
use musim_errors::SimError;
use musim_infrastructure::HttpTransport;

type Received = Arc<Mutex<Vec<(String, Message)>>>;

async fn spawn_receiver() -> (Received, SocketAddr) {
    let received: Received = Arc::default();
    let app = Router::new()
        .route(
            "/message",
            post(|State(r): State<Received>, Json(m): Json<Message>| async move {
                r.lock().unwrap().push(("/message".to_string(), m));
                StatusCode::CREATED
            }),
        )
        .route(
            "/response",
            post(|Json(_m): Json<Message>| async { StatusCode::UNPROCESSABLE_ENTITY }),
        )
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (received, addr)
}

#[tokio::test]
async fn test_work_message_is_posted_as_json() {
    let (received, addr) = spawn_receiver().await;
    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();

    let message = Message::work("http://10.0.0.5:8080", "17");
    transport
        .send(&format!("http://{addr}"), MessageKind::Work, &message)
        .await
        .unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "/message");
    assert_eq!(received[0].1, message);
}

#[tokio::test]
async fn test_non_success_status_is_transport_error() {
    let (_received, addr) = spawn_receiver().await;
    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();

    let reply = Message::reply("http://10.0.0.5:8080", "17", "done");
    let err = transport
        .send(&format!("http://{addr}"), MessageKind::Response, &reply)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::Transport(ref msg) if msg.contains("422")));
}

#[tokio::test]
async fn test_unreachable_address_is_transport_error() {
    let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
    let result = transport
        .send("http://127.0.0.1:1", MessageKind::Work, &Message::work("me", "1"))
        .await;
    assert!(matches!(result, Err(SimError::Transport(_))));
}
