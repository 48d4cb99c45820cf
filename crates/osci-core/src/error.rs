#![forbid(unsafe_code)]

/// Errors produced by the OSCI transport security library.
///
/// Structural errors (`XmlParse`, `XmlStructure`, `MissingElement`,
/// `MissingAttribute`, `DuplicateId`) abort the current parse. Configuration
/// errors (`UnsupportedAlgorithm`, `Crypto`, `Key`, `State`) are
/// caller-correctable. `Role` marks a caller error during verification
/// (unknown signer), which is deliberately distinct from a failed
/// verification — that outcome is a `bool`, never an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("duplicate Id attribute: {0}")]
    DuplicateId(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("invalid object state: {0}")]
    State(String),

    #[error("role error: {0}")]
    Role(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
