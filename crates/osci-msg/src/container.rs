#![forbid(unsafe_code)]

//! Content containers: the unit of signing.

use crate::attachment::Attachment;
use crate::content::{Content, ContentPayload};
use crate::encrypted::EncryptedData;
use crate::part::{DigestCache, MessagePart};
use crate::signature::OsciSignature;
use osci_c14n::XmlWriter;
use osci_core::{algorithm, ns, Error};
use std::io::Write;
use std::rc::Rc;

pub enum ContainerChild {
    Content(Content),
    EncryptedData(EncryptedData),
}

impl ContainerChild {
    pub fn as_part(&self) -> &dyn MessagePart {
        match self {
            ContainerChild::Content(c) => c,
            ContainerChild::EncryptedData(e) => e,
        }
    }
}

/// An ordered list of Content/EncryptedData children plus the signatures
/// attached over them. The container exclusively owns its children and
/// signatures; attachments are shared through the message's table.
pub struct ContentContainer {
    ref_id: String,
    children: Vec<ContainerChild>,
    signatures: Vec<OsciSignature>,
    transforms: Vec<String>,
    cache: DigestCache,
}

impl ContentContainer {
    pub fn new(ref_id: &str) -> Self {
        Self {
            ref_id: ref_id.to_owned(),
            children: Vec::new(),
            signatures: Vec::new(),
            transforms: vec![algorithm::C14N.to_owned()],
            cache: DigestCache::default(),
        }
    }

    pub fn add_content(&mut self, content: Content) {
        self.children.push(ContainerChild::Content(content));
        self.cache.invalidate();
    }

    pub fn add_encrypted_data(&mut self, data: EncryptedData) {
        self.children.push(ContainerChild::EncryptedData(data));
        self.cache.invalidate();
    }

    pub fn add_signature(&mut self, signature: OsciSignature) {
        self.signatures.push(signature);
        self.cache.invalidate();
    }

    pub fn children(&self) -> &[ContainerChild] {
        &self.children
    }

    pub fn signatures(&self) -> &[OsciSignature] {
        &self.signatures
    }

    /// Every attachment reachable from this container, including through
    /// nested containers.
    pub fn collect_attachments(&self) -> Vec<Rc<Attachment>> {
        let mut out = Vec::new();
        self.collect_attachments_into(&mut out);
        out
    }

    fn collect_attachments_into(&self, out: &mut Vec<Rc<Attachment>>) {
        for child in &self.children {
            if let ContainerChild::Content(content) = child {
                match content.payload() {
                    ContentPayload::Attachment(att) => out.push(Rc::clone(att)),
                    ContentPayload::Container(nested) => nested.collect_attachments_into(out),
                    ContentPayload::Raw(_) => {}
                }
            }
        }
    }

    /// Serialize the container to a string for transport.
    pub fn serialize(&self) -> Result<String, Error> {
        let mut buf = Vec::new();
        self.write_canonical(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::XmlStructure(format!("non-UTF-8 output: {e}")))
    }
}

impl MessagePart for ContentContainer {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn transforms(&self) -> &[String] {
        &self.transforms
    }

    fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error> {
        let mut w = XmlWriter::new();
        w.start_element(
            "osci:ContentContainer",
            &[("xmlns:osci", ns::OSCI), (ns::attr::ID, &self.ref_id)],
        );
        let mut inner = Vec::new();
        for signature in &self.signatures {
            signature.write_canonical(&mut inner)?;
        }
        for child in &self.children {
            child.as_part().write_canonical(&mut inner)?;
        }
        w.raw(&inner);
        w.end_element()?;
        sink.write_all(&w.into_bytes()?)?;
        Ok(())
    }

    fn digest_cache(&self) -> &DigestCache {
        &self.cache
    }
}
