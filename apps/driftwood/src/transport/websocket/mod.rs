use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::trace;
use url::Url;

use super::{Dialer, Transport, TransportError};

/// Dials the launcher daemon's mirror endpoint over WebSocket.
pub struct WebSocketDialer {
    url: Url,
}

impl WebSocketDialer {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Dialer for WebSocketDialer {
    async fn dial(&self) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;
        Ok(Box::new(WebSocketTransport { stream }))
    }
}

pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(data),
                // Text frames carry the same envelopes; hand the decoder the bytes.
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Close(frame))) => {
                    trace!(target: "transport::ws", ?frame, "close frame received");
                    return Err(TransportError::Closed);
                }
                Some(Ok(other)) => {
                    trace!(target: "transport::ws", kind = ?other, "skipping control frame");
                }
                Some(Err(err)) => return Err(TransportError::Connection(err.to_string())),
                None => return Err(TransportError::Closed),
            }
        }
    }
}
