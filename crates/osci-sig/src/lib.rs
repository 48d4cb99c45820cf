#![forbid(unsafe_code)]

//! Signature construction and verification over content containers.
//!
//! Construction and verification share one definition of the reference
//! set a signature must cover, and both recompute digests from the live
//! parts' canonical bytes. Verification failure is a `bool`; only a
//! wrong role or malformed input raises an error.

pub mod properties;
pub mod sign;
pub mod verify;

pub use properties::{build_signed_properties, current_signing_time};
pub use sign::sign_container;
pub use verify::check_signature;
