use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("bad length prefix: {0:?}")]
    BadLength(String),
    #[error("expected '.' after length prefix at offset {0}")]
    MissingSeparator(usize),
    #[error("value truncated: wanted {wanted} utf-16 units, frame ended after {got}")]
    Truncated { wanted: usize, got: usize },
    #[error("instruction not terminated by ';'")]
    UnterminatedInstruction,
    #[error("unexpected character {0:?} after field")]
    UnexpectedCharacter(char),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection is not open")]
    NotOpen,
    #[error("connection closed before a response arrived")]
    Closed,
    #[error("a {0} request is already pending")]
    RequestPending(String),
    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),
    #[error("not connected to a node")]
    NoNode,
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
