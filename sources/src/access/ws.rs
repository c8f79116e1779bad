//! WebSocket access method for the push channel.
//!
//! Once connected we send one subscribe message carrying the `Scope`, then every text frame is
//! expected to be a JSON-encoded `PushEvent`.  Ping/Pong frames count as heartbeats, a Close
//! frame ends the stream.
//!
use async_trait::async_trait;
use futures_util::stream::{self, SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::{PushEvent, PushStream, Scope, Site, SourceError, Streamable};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Keep the write half around, dropping it would close the connection.
///
type Halves = (SplitSink<Socket, Message>, SplitStream<Socket>);

#[derive(Clone, Debug)]
pub struct WsSource {
    site: Site,
}

/// First message sent on the socket.
///
#[derive(Debug, Serialize)]
struct Subscribe<'a> {
    subscribe: &'a Scope,
}

impl WsSource {
    pub fn new(site: &Site) -> Self {
        WsSource { site: site.clone() }
    }
}

/// Turn one text frame into an event.
///
fn decode_frame(text: &str) -> Result<PushEvent, SourceError> {
    serde_json::from_str(text).map_err(|e| SourceError::Decode(e.to_string()))
}

/// Read frames until we get something meaningful for the coordinator.
///
async fn next_event(mut halves: Halves) -> Option<(Result<PushEvent, SourceError>, Halves)> {
    loop {
        let msg = halves.1.next().await?;
        let ev = match msg {
            Ok(Message::Text(text)) => decode_frame(&text),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => Ok(PushEvent::Heartbeat),
            Ok(Message::Close(frame)) => {
                info!("push channel closed by peer: {:?}", frame);
                return None;
            }
            Ok(_) => {
                trace!("ignoring frame");
                continue;
            }
            Err(e) => Err(SourceError::Closed(e.to_string())),
        };
        return Some((ev, halves));
    }
}

#[async_trait]
impl Streamable for WsSource {
    fn name(&self) -> String {
        self.site.name.clone()
    }

    #[tracing::instrument(skip(self))]
    async fn subscribe(&self, scope: &Scope) -> Result<PushStream, SourceError> {
        let url = self.site.stream_endpoint()?;
        debug!("connecting to {url}");

        let (socket, resp) = connect_async(url)
            .await
            .map_err(|e| SourceError::Connect(format!("{url}: {e}")))?;
        trace!("handshake status={}", resp.status());

        let (mut sink, read) = socket.split();

        let msg = serde_json::to_string(&Subscribe { subscribe: scope })
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        sink.send(Message::Text(msg))
            .await
            .map_err(|e| SourceError::Connect(e.to_string()))?;
        info!("subscribed to {url} for {scope}");

        Ok(stream::unfold((sink, read), next_event).boxed())
    }
}
