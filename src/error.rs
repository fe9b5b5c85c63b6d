//! Error types for vayulink

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Vayulink error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the transport or a socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No bridge answered the discovery probe
    #[error("No bridge found")]
    DiscoveryFailed,

    /// Bridge rejected the registration PIN
    #[error("Authentication failed: bridge rejected the PIN")]
    AuthenticationFailed,

    /// Another client holds the session and takeover was not requested
    #[error("Another client is already registered with the bridge")]
    AlreadyRegistered,

    /// No response arrived for a request within the configured timeout
    #[error("Request timed out")]
    RequestTimeout,

    /// Malformed frame on the wire
    #[error("Corrupt frame: {0}")]
    CorruptFrame(String),

    /// RMI parameter does not fit its declared width
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Session has been closed or has failed; the caller must reconnect
    #[error("Session is closed")]
    SessionClosed,

    /// Bridge-reported error code in a command confirmation
    #[error("Bridge error: {0:#04x}")]
    Bridge(u8),

    /// Well-formed frame whose payload does not match the expected layout
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Sensor id not present in the known-sensor table
    #[error("Unknown sensor id: {0}")]
    UnknownSensor(u16),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}
