//! WebSocket Routes
//!
//! 실시간 데이터 스트리밍 WebSocket 엔드포인트
//!
//! # Endpoints
//! - `GET /ws` - WebSocket 연결
//!
//! 연결 즉시 `events`, `prices` 스트림을 받는다. `position:0x...` 구독 시
//! 해당 계정의 포지션 업데이트와 청산 경고가 추가된다.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::services::websocket::{
    parse_client_message, serialize_message, SubscriptionConfirm, WsError,
};
use crate::services::{Channel, ClientMessage, ConnectionInfo, WsHub, WsMessage};
use crate::AppState;

/// WebSocket 업그레이드 핸들러
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// WebSocket 연결 처리
async fn handle_socket(socket: WebSocket, hub: Arc<WsHub>) {
    let (mut sender, mut receiver) = socket.split();

    // 기본 구독
    let mut events_rx = hub.subscribe_events();
    let mut price_rx = hub.subscribe_prices();

    // 연결별 응답 / 사용자 채널 메시지
    let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(64);

    // 연결 ID 생성
    let conn_id = uuid::Uuid::new_v4().to_string();

    // 연결 등록
    hub.register_connection(
        conn_id.clone(),
        ConnectionInfo {
            id: conn_id.clone(),
            connected_at: chrono::Utc::now().timestamp().max(0) as u64,
            subscriptions: vec![Channel::Events, Channel::Prices],
        },
    )
    .await;
    tracing::debug!(conn_id = %conn_id, "websocket connected");

    // 수신 태스크
    let hub_clone = hub.clone();
    let conn_id_clone = conn_id.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut forwarders = Vec::new();
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match parse_client_message(&text) {
                    Ok(client_msg) => {
                        if let Some(task) =
                            handle_client_message(&hub_clone, &conn_id_clone, client_msg, &out_tx)
                                .await
                        {
                            forwarders.push(task);
                        }
                    }
                    Err(err) => {
                        let _ = out_tx
                            .send(WsMessage::Error(WsError {
                                code: 400,
                                message: format!("invalid message: {err}"),
                            }))
                            .await;
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
        for task in forwarders {
            task.abort();
        }
    });

    // 송신 태스크
    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                // 엔진 이벤트
                received = events_rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket client lagging behind events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                // 가격 업데이트
                received = price_rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                // 연결 전용 메시지
                received = out_rx.recv() => match received {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Ok(json) = serialize_message(&msg) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // 연결이 종료될 때까지 대기
    let remaining = tokio::select! {
        _ = &mut recv_task => send_task,
        _ = &mut send_task => recv_task,
    };
    remaining.abort();
    let _ = remaining.await;

    // 연결 해제
    hub.unregister_connection(&conn_id).await;
    tracing::debug!(conn_id = %conn_id, "websocket disconnected");
}

/// 클라이언트 메시지 처리
///
/// 사용자 채널 구독 시 포워딩 태스크를 돌려준다 (연결 종료 시 중단).
async fn handle_client_message(
    hub: &WsHub,
    conn_id: &str,
    msg: ClientMessage,
    out_tx: &mpsc::Sender<WsMessage>,
) -> Option<tokio::task::JoinHandle<()>> {
    match msg {
        ClientMessage::Subscribe { channel } => {
            let parsed: Channel = match channel.parse() {
                Ok(parsed) => parsed,
                Err(err) => {
                    let _ = out_tx
                        .send(WsMessage::Error(WsError {
                            code: 404,
                            message: err.to_string(),
                        }))
                        .await;
                    return None;
                }
            };
            tracing::info!("Connection {} subscribed to {}", conn_id, parsed);
            hub.record_subscription(conn_id, parsed.clone()).await;

            let forwarder = match &parsed {
                Channel::UserPosition(address) => {
                    let mut user_rx = hub.subscribe_user(address).await;
                    let out_tx = out_tx.clone();
                    // 송신 태스크가 끝나면 수신기도 내려놓는다
                    Some(tokio::spawn(async move {
                        loop {
                            let received = tokio::select! {
                                _ = out_tx.closed() => break,
                                received = user_rx.recv() => received,
                            };
                            match received {
                                Ok(msg) => {
                                    if out_tx.send(msg).await.is_err() {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                                Err(broadcast::error::RecvError::Closed) => break,
                            }
                        }
                    }))
                }
                // events / prices는 연결 시 이미 구독됨
                Channel::Events | Channel::Prices => None,
            };

            let _ = out_tx
                .send(WsMessage::Subscribed(SubscriptionConfirm {
                    channel: parsed.to_string(),
                    subscribed: true,
                }))
                .await;
            forwarder
        }
        ClientMessage::Unsubscribe { channel } => {
            tracing::info!("Connection {} unsubscribed from {}", conn_id, channel);
            let _ = out_tx
                .send(WsMessage::Subscribed(SubscriptionConfirm {
                    channel,
                    subscribed: false,
                }))
                .await;
            None
        }
        ClientMessage::Ping => {
            let _ = out_tx.send(WsMessage::Pong).await;
            None
        }
    }
}
