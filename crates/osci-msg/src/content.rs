#![forbid(unsafe_code)]

//! Leaf content parts.

use crate::attachment::Attachment;
use crate::container::ContentContainer;
use crate::part::{DigestCache, MessagePart};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use osci_c14n::XmlWriter;
use osci_core::{algorithm, ns, Error};
use std::io::Write;
use std::rc::Rc;

/// What a Content element carries: inline bytes (serialized base64), a
/// pointer to an out-of-band attachment, or a nested container.
pub enum ContentPayload {
    Raw(Vec<u8>),
    Attachment(Rc<Attachment>),
    Container(ContentContainer),
}

pub struct Content {
    ref_id: String,
    payload: ContentPayload,
    transforms: Vec<String>,
    cache: DigestCache,
}

impl Content {
    pub fn raw(ref_id: &str, data: Vec<u8>) -> Self {
        Self {
            ref_id: ref_id.to_owned(),
            payload: ContentPayload::Raw(data),
            transforms: vec![algorithm::C14N.to_owned(), algorithm::BASE64.to_owned()],
            cache: DigestCache::default(),
        }
    }

    pub fn attachment(ref_id: &str, attachment: Rc<Attachment>) -> Self {
        Self {
            ref_id: ref_id.to_owned(),
            payload: ContentPayload::Attachment(attachment),
            transforms: vec![algorithm::C14N.to_owned()],
            cache: DigestCache::default(),
        }
    }

    pub fn container(ref_id: &str, container: ContentContainer) -> Self {
        Self {
            ref_id: ref_id.to_owned(),
            payload: ContentPayload::Container(container),
            transforms: vec![algorithm::C14N.to_owned()],
            cache: DigestCache::default(),
        }
    }

    pub fn payload(&self) -> &ContentPayload {
        &self.payload
    }

    pub fn attachment_ref(&self) -> Option<&Rc<Attachment>> {
        match &self.payload {
            ContentPayload::Attachment(att) => Some(att),
            _ => None,
        }
    }

    pub fn nested_container(&self) -> Option<&ContentContainer> {
        match &self.payload {
            ContentPayload::Container(c) => Some(c),
            _ => None,
        }
    }
}

impl MessagePart for Content {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn transforms(&self) -> &[String] {
        &self.transforms
    }

    fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error> {
        let mut w = XmlWriter::new();
        match &self.payload {
            ContentPayload::Raw(data) => {
                w.start_element(
                    "osci:Content",
                    &[("xmlns:osci", ns::OSCI), (ns::attr::ID, &self.ref_id)],
                );
                w.text(&BASE64.encode(data));
                w.end_element()?;
            }
            ContentPayload::Attachment(att) => {
                w.start_element(
                    "osci:Content",
                    &[
                        ("xmlns:osci", ns::OSCI),
                        (ns::attr::ID, &self.ref_id),
                        (ns::attr::HREF, &att.cid_uri()),
                    ],
                );
                w.end_element()?;
            }
            ContentPayload::Container(container) => {
                w.start_element(
                    "osci:Content",
                    &[("xmlns:osci", ns::OSCI), (ns::attr::ID, &self.ref_id)],
                );
                let mut nested = Vec::new();
                container.write_canonical(&mut nested)?;
                w.raw(&nested);
                w.end_element()?;
            }
        }
        sink.write_all(&w.into_bytes()?)?;
        Ok(())
    }

    fn digest_cache(&self) -> &DigestCache {
        &self.cache
    }
}
