use axum::{debug_handler, extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade}, http::StatusCode, response::{IntoResponse, Response}};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{
    rooms::MessageRouter,
    session,
    transport::{Payload, Transport, WsHub},
    AppResult,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    State(router): State<MessageRouter>,
    State(hub): State<WsHub>,
    session: Session,

    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(user_id) = session::current_user(&session).await? else {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    };

    Ok(ws.on_upgrade(move |stream| serve(stream, user_id, router, hub)))
}

async fn serve(stream: WebSocket, user_id: i64, router: MessageRouter, hub: WsHub) {
    let (connection_id, mut rx) = hub.connect(user_id).await;
    let (mut sender, mut receiver) = stream.split();

    let mut push_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut push_task => break,
            msg = receiver.next() => {
                let Some(Ok(msg)) = msg else {
                    break;
                };
                let Message::Text(text) = msg else {
                    continue;
                };
                let Ok(payload) = serde_json::from_str::<Payload>(text.as_str()) else {
                    debug!(user_id, "ignoring malformed frame");
                    continue;
                };

                if let Err(err) = router.send_to_current(user_id, payload).await {
                    warn!(user_id, %err, "websocket send rejected");
                    let _ = hub.send_to_user(user_id, &Payload::text(err.user_message())).await;
                }
            }
        }
    }

    push_task.abort();
    hub.disconnect(user_id, connection_id).await;
}
