/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, connecting or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// A frame exceeded [`MAX_FRAME_LEN`](crate::MAX_FRAME_LEN).
    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    /// A frame header announced an empty body.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
