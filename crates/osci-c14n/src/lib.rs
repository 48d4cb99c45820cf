#![forbid(unsafe_code)]

//! Incremental canonical XML for OSCI 1.2 messages.
//!
//! Canonicalization here exists for one purpose: digests must survive
//! re-serialization of XML whose raw bytes differ while remaining
//! semantically identical. The serializer therefore runs in a single
//! streaming pass and captures the canonical bytes of signed elements
//! as a side effect.

pub mod escape;
pub mod serializer;
pub mod writer;

pub use serializer::{canonicalize, CanonicalParser, CaptureSet, SignedPropertiesCapture};
pub use writer::XmlWriter;
