#![forbid(unsafe_code)]

//! Out-of-band binary attachments.
//!
//! Attachment bytes live in the enclosing message's attachment table, not
//! in the XML tree; parts point at them through `cid:` reference URIs.
//! The same attachment may be referenced from several siblings, so it is
//! shared, never owned by a single container.

use crate::part::{DigestCache, MessagePart};
use osci_core::{ns, Error};
use std::io::Write;
use std::rc::Rc;

pub struct Attachment {
    ref_id: String,
    data: Vec<u8>,
    mime_type: Option<String>,
    transforms: Vec<String>,
    cache: DigestCache,
}

impl Attachment {
    /// `ref_id` is the content id without the `cid:` scheme.
    pub fn new(ref_id: &str, data: Vec<u8>) -> Rc<Self> {
        Rc::new(Self {
            ref_id: ref_id.to_owned(),
            data,
            mime_type: None,
            transforms: Vec::new(),
            cache: DigestCache::default(),
        })
    }

    pub fn with_mime_type(ref_id: &str, data: Vec<u8>, mime_type: &str) -> Rc<Self> {
        Rc::new(Self {
            ref_id: ref_id.to_owned(),
            data,
            mime_type: Some(mime_type.to_owned()),
            transforms: Vec::new(),
            cache: DigestCache::default(),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// The full `cid:` URI used in references.
    pub fn cid_uri(&self) -> String {
        format!("{}{}", ns::CID_URI_PREFIX, self.ref_id)
    }
}

impl MessagePart for Attachment {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn transforms(&self) -> &[String] {
        &self.transforms
    }

    fn reference_uri(&self) -> String {
        self.cid_uri()
    }

    /// Attachments are digested over their raw bytes, untransformed.
    fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error> {
        sink.write_all(&self.data)?;
        Ok(())
    }

    fn digest_cache(&self) -> &DigestCache {
        &self.cache
    }
}
