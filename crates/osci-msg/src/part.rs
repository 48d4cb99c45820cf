#![forbid(unsafe_code)]

//! The message-part contract shared by everything a signature can cover.

use osci_core::{ns, Error};
use osci_crypto::DigestWriter;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;

/// A digest cache keyed by algorithm URI.
///
/// Valid only while the owning part is in a terminal/immutable state; any
/// mutation of the part's underlying bytes must call `invalidate`.
#[derive(Debug, Default, Clone)]
pub struct DigestCache {
    values: RefCell<BTreeMap<String, Vec<u8>>>,
}

impl DigestCache {
    pub fn get_or_compute(
        &self,
        uri: &str,
        compute: impl FnOnce() -> Result<Vec<u8>, Error>,
    ) -> Result<Vec<u8>, Error> {
        if let Some(value) = self.values.borrow().get(uri) {
            return Ok(value.clone());
        }
        let value = compute()?;
        self.values
            .borrow_mut()
            .insert(uri.to_owned(), value.clone());
        Ok(value)
    }

    pub fn invalidate(&self) {
        self.values.borrow_mut().clear();
    }
}

/// Anything a signature reference can point at: a part has an identifier,
/// an ordered transform list, a canonical byte form, and a digest cache.
pub trait MessagePart {
    /// Identifier, unique within the enclosing document (without URI prefix).
    fn ref_id(&self) -> &str;

    /// Ordered transform URIs applied before digesting.
    fn transforms(&self) -> &[String];

    /// The URI form used in signature references. In-document parts use
    /// `#id`; attachments override this with `cid:id`.
    fn reference_uri(&self) -> String {
        format!("{}{}", ns::ID_URI_PREFIX, self.ref_id())
    }

    /// Write the part's canonical bytes, the exact form that is digested.
    fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error>;

    fn digest_cache(&self) -> &DigestCache;

    /// Digest of the canonical bytes, cached per algorithm. The canonical
    /// form is streamed through a [`DigestWriter`] rather than buffered.
    fn digest(&self, digest_uri: &str) -> Result<Vec<u8>, Error> {
        self.digest_cache().get_or_compute(digest_uri, || {
            let mut sink = DigestWriter::new(std::io::sink(), digest_uri)?;
            sink.enable();
            self.write_canonical(&mut sink)?;
            sink.finish_digest()
        })
    }
}
