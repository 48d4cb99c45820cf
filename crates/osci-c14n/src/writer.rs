#![forbid(unsafe_code)]

//! Canonical fragment builder for the construction paths.
//!
//! Synthesized fragments (SignedInfo, SignedProperties, EncryptedData) must
//! already be in canonical form when they are digested or signed, so this
//! writer escapes values and relies on the caller to supply attributes in
//! canonical order. No declaration, no self-closing tags.

use crate::escape;
use osci_core::Error;

pub struct XmlWriter {
    buf: Vec<u8>,
    open: Vec<String>,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Start an element. `attrs` must be in canonical order (namespace
    /// declarations first, sorted; then attributes sorted by URI/name).
    pub fn start_element(&mut self, qname: &str, attrs: &[(&str, &str)]) {
        self.buf.push(b'<');
        self.buf.extend_from_slice(qname.as_bytes());
        for (key, value) in attrs {
            self.buf.push(b' ');
            self.buf.extend_from_slice(key.as_bytes());
            self.buf.extend_from_slice(b"=\"");
            self.buf
                .extend_from_slice(escape::escape_attr(value).as_bytes());
            self.buf.push(b'"');
        }
        self.buf.push(b'>');
        self.open.push(qname.to_owned());
    }

    /// Close the innermost open element.
    pub fn end_element(&mut self) -> Result<(), Error> {
        let qname = self
            .open
            .pop()
            .ok_or_else(|| Error::XmlStructure("no open element to close".into()))?;
        self.buf.extend_from_slice(b"</");
        self.buf.extend_from_slice(qname.as_bytes());
        self.buf.push(b'>');
        Ok(())
    }

    pub fn text(&mut self, text: &str) {
        self.buf
            .extend_from_slice(escape::escape_text(text).as_bytes());
    }

    /// Write raw pre-canonicalized bytes.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `<qname attrs>text</qname>` in one call.
    pub fn text_element(
        &mut self,
        qname: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> Result<(), Error> {
        self.start_element(qname, attrs);
        self.text(text);
        self.end_element()
    }

    /// `<qname attrs></qname>` in one call.
    pub fn empty_element(&mut self, qname: &str, attrs: &[(&str, &str)]) -> Result<(), Error> {
        self.start_element(qname, attrs);
        self.end_element()
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, Error> {
        if let Some(qname) = self.open.last() {
            return Err(Error::XmlStructure(format!("unclosed element: {qname}")));
        }
        Ok(self.buf)
    }
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}
