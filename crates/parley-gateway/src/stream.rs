use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_types::events::ChatEvent;

use crate::relay::{Relay, Subscription};

/// Default keep-alive interval for idle streams.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct StreamState {
    pub relay: Relay,
    pub shutdown: CancellationToken,
    pub keepalive: Duration,
}

/// `GET /chat/events`: one server-sent event per relay event, framed as
/// `data: <json>\n\n`. Keep-alive frames are SSE comments and carry no data.
pub async fn chat_events(
    State(state): State<StreamState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.relay.subscribe();
    info!(
        subscribers = state.relay.subscriber_count(),
        "Stream client connected"
    );

    Sse::new(event_stream(subscription, state.shutdown))
        .keep_alive(KeepAlive::new().interval(state.keepalive))
}

/// Drive a subscription until shutdown or until the consumer drops the
/// stream. The subscription is owned by the stream, so every exit path
/// (including a client vanishing mid-await) releases it.
pub fn event_stream(
    mut subscription: Subscription,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = subscription.next_event() => next,
            };

            let Some(event) = next else { break };
            match sse_frame(&event) {
                Ok(frame) => yield Ok(frame),
                Err(e) => warn!("Failed to encode {} event: {}", event.kind(), e),
            }
        }

        subscription.unsubscribe();
        info!("Stream closed");
    }
}

fn sse_frame(event: &ChatEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(event)
}
