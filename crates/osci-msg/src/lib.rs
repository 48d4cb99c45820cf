#![forbid(unsafe_code)]

//! The OSCI message data model: content containers, attachments,
//! encrypted payloads, signatures, and their wire parsers.
//!
//! Every part of a message implements [`MessagePart`], which produces the
//! part's canonical bytes on demand. Digests are always computed from
//! those bytes, on the signing path and the verification path alike, so
//! the serialized document never has to be byte-stable across reparses
//! for verification to succeed.

pub mod attachment;
pub mod container;
pub mod content;
pub mod encrypted;
pub mod parse;
pub mod part;
pub mod signature;

pub use attachment::Attachment;
pub use container::{ContainerChild, ContentContainer};
pub use content::{Content, ContentPayload};
pub use encrypted::{CipherData, CipherPayload, CipherValue, EncryptedData, EncryptedKey, SessionKey};
pub use parse::{parse_content_container, parse_encrypted_data, parse_encrypted_key, parse_signature};
pub use part::{DigestCache, MessagePart};
pub use signature::{OsciSignature, Reference, SigningProperties};
