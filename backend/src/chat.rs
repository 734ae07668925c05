use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{validate_token, AuthUser};
use crate::error::{require, require_text, ApiError, ApiResult, AppJson, AppQuery};
use crate::models::{Chat, Message, Notification, PropertyStatus};
use crate::notification::notify;
use crate::profile::current_profile;
use crate::realtime::ChatSubscription;
use crate::AppState;

pub const MAX_MESSAGE_LEN: usize = 4000;
const PREVIEW_LEN: usize = 80;

#[derive(Deserialize)]
pub struct StartChatRequest {
    pub property_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct LiveQuery {
    pub access_token: Option<String>,
}

async fn participant_chat(state: &AppState, user_id: Uuid, chat_id: Uuid) -> ApiResult<Chat> {
    let chat = state
        .store
        .get_chat(chat_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Chat not found"))?;
    if !chat.is_participant(user_id) {
        return Err(ApiError::forbidden("You are not part of this chat"));
    }
    Ok(chat)
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_LEN {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_LEN).collect();
    format!("{cut}…")
}

pub async fn start_chat(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<StartChatRequest>,
) -> ApiResult<Json<Chat>> {
    let property_id = require(request.property_id, "property_id")?;
    let property = state
        .store
        .get_property(property_id)
        .await?
        .filter(|p| p.status == PropertyStatus::Approved)
        .ok_or_else(|| ApiError::not_found("Property not found"))?;
    if property.owner_id == user.id {
        return Err(ApiError::bad_request("You cannot start a chat on your own listing"));
    }
    let customer = current_profile(&state, &user).await?;

    let chat = Chat {
        id: Uuid::new_v4(),
        property_id,
        customer_id: customer.id,
        owner_id: property.owner_id,
        last_message: None,
        last_message_at: None,
        customer_unread: 0,
        owner_unread: 0,
        created_at: Utc::now(),
    };
    Ok(Json(state.store.get_or_create_chat(chat).await?))
}

pub async fn list_chats(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<Chat>>> {
    Ok(Json(state.store.list_chats(user.id).await?))
}

pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Message>>> {
    participant_chat(&state, user.id, chat_id).await?;
    let messages = state.store.list_messages(chat_id).await?;
    state.store.mark_chat_read(chat_id, user.id).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<Uuid>,
    AppJson(request): AppJson<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let content = require_text(request.content, "content")?;
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::BadRequest(format!(
            "content must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }
    let chat = participant_chat(&state, user.id, chat_id).await?;

    let message = Message {
        id: Uuid::new_v4(),
        chat_id,
        sender_id: user.id,
        content,
        created_at: Utc::now(),
    };
    let message = state.store.append_message(message).await?;
    let listeners = state.hub.publish(message.clone());
    log::debug!("Message {} pushed to {} live listeners", message.id, listeners);

    notify(
        state.store.as_ref(),
        Notification::new(
            chat.counterpart(user.id),
            "chat_message",
            "New message",
            preview(&message.content),
        )
        .with_link(format!("/chats/{}", chat_id)),
    )
    .await;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> ApiResult<Json<Chat>> {
    participant_chat(&state, user.id, chat_id).await?;
    Ok(Json(state.store.mark_chat_read(chat_id, user.id).await?))
}

/// WebSocket feed of new messages in one chat. Browsers cannot set headers
/// on the upgrade request, so the token travels in `access_token`.
pub async fn live(
    State(state): State<AppState>,
    Path(chat_id): Path<Uuid>,
    AppQuery(query): AppQuery<LiveQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    let token = query
        .access_token
        .ok_or_else(|| ApiError::Unauthorized("Missing access_token".to_string()))?;
    let user = validate_token(&token, &state.config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
    participant_chat(&state, user.id, chat_id).await?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    // Subscribe before upgrading so nothing sent in between is missed.
    let subscription = state.hub.subscribe();
    log::info!("User {} joined live chat {}", user.id, chat_id);
    Ok(ws.on_upgrade(move |socket| stream_chat(socket, subscription, chat_id)))
}

async fn stream_chat(socket: WebSocket, mut subscription: ChatSubscription, chat_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            next = subscription.next_for(chat_id) => {
                let Some(message) = next else { break };
                let payload = match serde_json::to_string(&message) {
                    Ok(payload) => payload,
                    Err(err) => {
                        log::warn!("Failed to encode message {}: {}", message.id, err);
                        continue;
                    }
                };
                if sender.send(WsMessage::Text(payload)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                // Messages are posted over HTTP; inbound frames are ignored.
                Some(Ok(_)) => {}
            }
        }
    }
    log::info!("Live chat {} stream closed", chat_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn previews_are_truncated_on_char_boundaries() {
        assert_eq!(preview("hello"), "hello");
        let long = "é".repeat(PREVIEW_LEN + 5);
        let short = preview(&long);
        assert_eq!(short.chars().count(), PREVIEW_LEN + 1);
        assert!(short.ends_with('…'));
    }
}
