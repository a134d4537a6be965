use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Request, State},
    http::header,
};

use parley_types::api::{ChatForm, SuccessResponse};

use crate::error::ApiError;
use crate::messages::create_message;
use crate::reactions::create_reaction;
use crate::state::AppState;

/// A `POST /chat` body, read from either a urlencoded or a multipart form.
/// Any rejection (missing Content-Type, unreadable body) becomes a 400 with
/// the usual `{ "error" }` body instead of axum's plain-text response.
#[derive(Debug)]
pub struct ChatSubmission(pub ChatForm);

impl<S> FromRequest<S> for ChatSubmission
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if multipart {
            let body = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            return read_multipart(body).await.map(Self);
        }

        let Form(form) = Form::<ChatForm>::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        Ok(Self(form))
    }
}

async fn read_multipart(mut body: Multipart) -> Result<ChatForm, ApiError> {
    let mut form = ChatForm::default();
    while let Some(field) = body
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let slot = match name.as_str() {
            "intent" => &mut form.intent,
            "content" => &mut form.content,
            "username" => &mut form.username,
            "messageId" => &mut form.message_id,
            "emoji" => &mut form.emoji,
            _ => continue,
        };
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        *slot = Some(value);
    }
    Ok(form)
}

/// `POST /chat`: form mutation, dispatched on `intent`.
/// Absent or `message` creates a message; `react` creates a reaction.
pub async fn post_chat(
    State(state): State<AppState>,
    ChatSubmission(form): ChatSubmission,
) -> Result<Json<SuccessResponse>, ApiError> {
    match form.intent.as_deref() {
        None | Some("message") => {
            create_message(&state, form.content, form.username).await?;
        }
        Some("react") => {
            create_reaction(&state, form.message_id, form.emoji, form.username).await?;
        }
        Some(other) => {
            return Err(ApiError::Validation(format!("unknown intent '{}'", other)));
        }
    }

    Ok(Json(SuccessResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use http_body_util::BodyExt;
    use parley_types::events::ChatEvent;

    async fn submit(state: &AppState, form: ChatForm) -> (StatusCode, serde_json::Value) {
        let response = post_chat(State(state.clone()), ChatSubmission(form)).await;
        into_parts(response.into_response()).await
    }

    async fn into_parts(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn message_form(content: &str, username: &str) -> ChatForm {
        ChatForm {
            content: Some(content.into()),
            username: Some(username.into()),
            ..Default::default()
        }
    }

    fn react_form(message_id: &str, emoji: &str, username: &str) -> ChatForm {
        ChatForm {
            intent: Some("react".into()),
            message_id: Some(message_id.into()),
            emoji: Some(emoji.into()),
            username: Some(username.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn message_intent_defaults_and_succeeds() {
        let state = test_state();
        let mut sub = state.relay.subscribe();

        let (status, body) = submit(&state, message_form("hi", "alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "success": true }));

        let explicit = ChatForm {
            intent: Some("message".into()),
            ..message_form("again", "alice")
        };
        assert_eq!(submit(&state, explicit).await.0, StatusCode::OK);

        assert_eq!(state.db.list_recent_messages(10).unwrap().len(), 2);
        assert!(matches!(sub.next_event().await, Some(ChatEvent::Message { .. })));
        assert!(matches!(sub.next_event().await, Some(ChatEvent::Message { .. })));
    }

    #[tokio::test]
    async fn validation_failures_are_400_with_error_body() {
        let state = test_state();

        let (status, body) = submit(&state, message_form("", "alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = submit(&state, react_form("1", "", "bob")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = ChatForm {
            intent: Some("edit".into()),
            ..message_form("hi", "alice")
        };
        let (status, body) = submit(&state, unknown).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "unknown intent 'edit'");

        assert!(state.db.list_recent_messages(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn react_twice_to_message_one() {
        let state = test_state();
        submit(&state, message_form("hi", "alice")).await;
        let mut sub = state.relay.subscribe();

        for _ in 0..2 {
            let (status, _) = submit(&state, react_form("1", "👍", "bob")).await;
            assert_eq!(status, StatusCode::OK);
        }

        assert_eq!(state.db.reactions_for_messages(&[1]).unwrap().len(), 2);
        for _ in 0..2 {
            match sub.next_event().await {
                Some(ChatEvent::Reaction { message_id, .. }) => assert_eq!(message_id, 1),
                other => panic!("expected reaction event, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn reaction_to_unknown_message_is_404() {
        let state = test_state();
        let (status, body) = submit(&state, react_form("7", "👍", "bob")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "message 7 not found");
    }

    /// Run a raw request through the extractor and handler, as the router would.
    async fn send(state: &AppState, request: Request) -> (StatusCode, serde_json::Value) {
        let response = match ChatSubmission::from_request(request, &()).await {
            Ok(submission) => post_chat(State(state.clone()), submission)
                .await
                .into_response(),
            Err(rejection) => rejection.into_response(),
        };
        into_parts(response).await
    }

    fn post(content_type: Option<&str>, body: impl Into<Body>) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/chat");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(body.into()).unwrap()
    }

    #[tokio::test]
    async fn urlencoded_body_creates_message() {
        let state = test_state();
        let request = post(
            Some("application/x-www-form-urlencoded"),
            "content=hi&username=alice",
        );

        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "success": true }));
        assert_eq!(state.db.list_recent_messages(10).unwrap()[0].content, "hi");
    }

    #[tokio::test]
    async fn multipart_body_creates_message_and_reaction() {
        let state = test_state();
        let mut sub = state.relay.subscribe();
        let ct = "multipart/form-data; boundary=XyZ";

        let message = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"content\"\r\n\r\nhi\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"username\"\r\n\r\nalice\r\n\
            --XyZ--\r\n";
        let (status, _) = send(&state, post(Some(ct), message)).await;
        assert_eq!(status, StatusCode::OK);

        let react = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"intent\"\r\n\r\nreact\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"messageId\"\r\n\r\n1\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"emoji\"\r\n\r\n🎉\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"username\"\r\n\r\nbob\r\n\
            --XyZ--\r\n";
        let (status, _) = send(&state, post(Some(ct), react)).await;
        assert_eq!(status, StatusCode::OK);

        let stored = state.db.list_recent_messages(10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].content, "hi");
        assert_eq!(stored[0].username, "alice");
        assert_eq!(state.db.reactions_for_messages(&[1]).unwrap()[0].emoji, "🎉");

        assert!(matches!(sub.next_event().await, Some(ChatEvent::Message { .. })));
        assert!(matches!(sub.next_event().await, Some(ChatEvent::Reaction { message_id: 1, .. })));
    }

    #[tokio::test]
    async fn missing_content_type_is_json_400() {
        let state = test_state();

        let (status, body) = send(&state, post(None, "content=hi&username=alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) = send(&state, post(Some("text/plain"), "hi")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        assert!(state.db.list_recent_messages(10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncated_multipart_is_json_400() {
        let state = test_state();
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\nhi";

        let (status, body) = send(&state, post(Some("multipart/form-data; boundary=XyZ"), body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert!(state.db.list_recent_messages(10).unwrap().is_empty());
    }
}
