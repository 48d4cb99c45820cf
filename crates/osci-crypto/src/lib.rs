#![forbid(unsafe_code)]

//! Cryptographic algorithm implementations for the OSCI transport security
//! library: digests and the digesting sink, signatures, the streaming
//! symmetric cipher pair with IV framing, and RSA key transport.

pub mod cert;
pub mod cipher;
pub mod digest;
pub mod keytransport;
pub mod sign;

pub use cipher::{CipherReader, CipherWriter, SymCipher};
pub use digest::{DigestAlgorithm, DigestWriter};
pub use keytransport::OaepParams;
pub use sign::{SignatureAlgorithm, SignerKey, VerifierKey};
