use thiserror::Error;

/// Frame-level decode failure. Always local to one received datagram or
/// response; never tears down a session (spec §7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid frame at offset {offset}: {reason}")]
pub struct InvalidFrameError {
    pub reason: String,
    pub offset: usize,
}

impl InvalidFrameError {
    pub fn new(reason: impl Into<String>, offset: usize) -> Self {
        Self { reason: reason.into(), offset }
    }
}

/// AES/hash/signature failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid PKCS#7 padding")]
    BadPadding,
    #[error("signature verification failed")]
    BadSignature,
    #[error("ciphertext length {0} is not a multiple of the block size")]
    BadLength(usize),
}

/// V3 handshake rejection or cloud credential rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("V3 handshake rejected: {0}")]
    HandshakeRejected(String),
    #[error("cloud rejected credentials")]
    CredentialsRejected,
    #[error("device has no token/key and cannot be authenticated")]
    MissingCredentials,
}

/// Socket connect/read/write failure. Closes the socket and marks the
/// device offline.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("not connected")]
    NotConnected,
}

/// Cloud API returned a non-zero error code. Propagates to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cloud API error {code}: {msg}")]
pub struct ApiError {
    pub code: String,
    pub msg: String,
}

/// Frame was valid but its type was not recognized. Logged and dropped,
/// never propagated to the caller as a hard failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown response type 0x{frame_type:02X} for device type 0x{device_type:02X}")]
pub struct UnknownResponse {
    pub device_type: u8,
    pub frame_type: u8,
}

/// Aggregate error type for library operations that can fail for more than
/// one reason.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    InvalidFrame(#[from] InvalidFrameError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    UnknownResponse(#[from] UnknownResponse),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
