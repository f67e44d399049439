/// Shared error type used across all intervue crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("generator {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("binding port {port}: {message}")]
    PortBind { port: u16, message: String },

    #[error("endpoint closed")]
    EndpointClosed,

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
