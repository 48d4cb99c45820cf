#![forbid(unsafe_code)]

//! OSCI 1.2 transport security: XML canonicalization with digest capture,
//! XML-DSig signature construction/verification, and XML-Enc content
//! encryption with IV framing.

pub use osci_c14n as c14n;
pub use osci_core as core;
pub use osci_crypto as crypto;
pub use osci_msg as msg;
pub use osci_roles as roles;
pub use osci_sig as sig;

pub use osci_core::{DialogConfig, Error, Result};
pub use osci_msg::{
    Attachment, CipherPayload, CipherValue, Content, ContentContainer, EncryptedData, EncryptedKey,
    MessagePart, SessionKey,
};
pub use osci_roles::{Role, SoftwareRole};
pub use osci_sig::{check_signature, current_signing_time, sign_container};
