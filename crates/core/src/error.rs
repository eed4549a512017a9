/// Result alias that carries the custom [`BridgeError`] type.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A required player option was not supplied.
    #[error("No {0} specified")]
    MissingOption(&'static str),
    /// The target surface cannot be drawn to with 2D primitives.
    #[error("target surface does not support 2d drawing")]
    Unsupported2d,
    /// A player method was called before `init` completed.
    #[error("player has not been initialised")]
    NotInitialized,
    /// The engine rejected an operation.
    #[error("engine error: {0}")]
    Engine(String),
    /// An asset could not be fetched from its source.
    #[error("failed to fetch `{location}`: {source}")]
    Asset {
        location: String,
        #[source]
        source: std::io::Error,
    },
    /// Image or audio payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// A caller or engine supplied a value outside its valid range.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Generic error message for cases not covered by other variants.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around image decode and encode errors.
    #[error("{0}")]
    Image(#[from] image::ImageError),
    /// Wrapper around config (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn decode<T: Into<String>>(msg: T) -> Self {
        Self::Decode(msg.into())
    }
}

impl From<&str> for BridgeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BridgeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
