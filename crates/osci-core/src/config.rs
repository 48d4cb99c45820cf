#![forbid(unsafe_code)]

//! Dialog configuration — default algorithms and scoped staging buffers.

use crate::algorithm;
use std::io::Write;

/// Configuration shared by all operations within one dialog.
///
/// Plain value object; callers set fields directly before handing the
/// config to the signing/encryption machinery.
pub struct DialogConfig {
    /// Default digest algorithm URI for new references.
    pub default_digest: String,
    /// Default signature algorithm URI.
    pub default_signature: String,
    /// IV length in bytes for newly produced AES-GCM ciphertexts (12 or 16).
    pub gcm_iv_length: usize,
    /// Reject documents containing two elements with the same `Id` value.
    ///
    /// Disabling this is a backward-compatibility knob for constrained
    /// peers, not a default.
    pub check_duplicate_ids: bool,
    /// Factory for temporary staging buffers used by the base64/cipher
    /// transform chain.
    pub swap_buffers: Box<dyn SwapBufferFactory>,
}

impl DialogConfig {
    pub fn new() -> Self {
        Self {
            default_digest: algorithm::SHA256.to_owned(),
            default_signature: algorithm::RSA_SHA256.to_owned(),
            gcm_iv_length: 12,
            check_duplicate_ids: true,
            swap_buffers: Box::new(MemBufferFactory),
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary byte buffer acquired while a part needs staging space and
/// released when the part is serialized or discarded.
pub trait SwapBuffer: Write {
    /// The bytes accumulated so far.
    fn bytes(&self) -> &[u8];
    /// Consume the buffer, returning its contents.
    fn into_bytes(self: Box<Self>) -> Vec<u8>;
}

/// Factory handing out swap buffers; a disk-backed implementation is the
/// embedding application's concern.
pub trait SwapBufferFactory {
    fn create(&self) -> Box<dyn SwapBuffer>;
}

/// Memory-backed swap buffer factory (the default).
pub struct MemBufferFactory;

impl SwapBufferFactory for MemBufferFactory {
    fn create(&self) -> Box<dyn SwapBuffer> {
        Box::new(MemBuffer(Vec::new()))
    }
}

struct MemBuffer(Vec<u8>);

impl Write for MemBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SwapBuffer for MemBuffer {
    fn bytes(&self) -> &[u8] {
        &self.0
    }
    fn into_bytes(self: Box<Self>) -> Vec<u8> {
        self.0
    }
}
