use thiserror::Error;

/// Failure of a single HTTP request against the workspace API.
///
/// Carried inside [`crate::event::ApiReply`], so it holds owned strings rather
/// than the underlying transport error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server answered with an `{"error": "..."}` envelope.
    #[error("{0}")]
    Server(String),
    #[error("Server error: {0}")]
    Status(u16),
    #[error("{0}")]
    Transport(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine packet type {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket packet type {0:?}")]
    UnknownSocketType(char),
    #[error("binary packets are not supported")]
    Binary,
    #[error("malformed packet payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid channel url: {0}")]
    Url(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("server rejected connection: {0}")]
    Rejected(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}
