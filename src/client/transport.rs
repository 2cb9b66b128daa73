use futures_util::{stream::SplitSink, SinkExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::error::ClientError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const SUBPROTOCOL: &str = "guacamole";

pub async fn connect(url: &str) -> Result<WsStream, ClientError> {
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

    tracing::info!("connecting to {url}");
    let (ws_stream, response) = connect_async(request).await?;
    tracing::debug!("handshake complete: {}", response.status());
    Ok(ws_stream)
}

/// Drains `rx` into the socket. When every sender is gone the socket is
/// closed with a close frame.
pub async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            tracing::warn!("ws send failed: {e}");
            return;
        }
    }
    if let Err(e) = sink.close().await {
        tracing::debug!("ws close failed: {e}");
    }
}
