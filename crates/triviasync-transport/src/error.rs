/// Transport failures. The connection manager treats every one of them as a
/// lost connection and retries within its budget.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The broker URL is not a plain `ws://` URL.
    #[error("invalid broker url: {0}")]
    InvalidUrl(String),

    /// The socket could not be opened or upgraded.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}
