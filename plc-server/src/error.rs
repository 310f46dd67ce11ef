//! The one genuinely fallible boundary in this workspace: binding a socket
//! and reading frames off it. `plc-core` stays infallible; this crate's I/O
//! is where real errors can occur.

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
