#![forbid(unsafe_code)]

//! The event-driven canonical serializer.
//!
//! Consumes a `quick-xml` event stream and emits canonical bytes to a
//! primary sink in a single pass, without materializing the document:
//! sorted attributes, normalized text, namespace propagation with
//! suppression of inherited-equal declarations. Signed elements
//! (ControlBlock, SOAP Body, direct children of the SOAP Header,
//! SignedInfo, SignedProperties, ContentContainer) are digest boundaries:
//! their canonical bytes are additionally captured into a side buffer
//! while still being forwarded to the primary sink, so the surrounding
//! document stays intact. On a signed element the full inherited+local
//! namespace set is re-emitted, making the captured fragment
//! self-contained and independently re-verifiable.
//!
//! Comments and processing instructions do not occur in OSCI messages and
//! are dropped.

use crate::escape;
use osci_core::{algorithm, ns, Error};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

/// Everything captured during one canonicalization pass.
#[derive(Debug, Default)]
pub struct CaptureSet {
    /// `#id` → digest of the signed element's canonical bytes.
    pub digests: BTreeMap<String, Vec<u8>>,
    /// Raw canonical bytes of each `SignedInfo`, in document order.
    pub signed_info: Vec<Vec<u8>>,
    /// Raw canonical bytes of each `SignedProperties`, with its `Id`.
    pub signed_properties: Vec<SignedPropertiesCapture>,
}

#[derive(Debug)]
pub struct SignedPropertiesCapture {
    pub id: Option<String>,
    pub bytes: Vec<u8>,
}

/// Canonicalizes a document into a sink, capturing signed elements.
pub struct CanonicalParser<W: Write> {
    sink: W,
    digest_uri: String,
    check_duplicate_ids: bool,

    ns_stack: Vec<BTreeMap<String, String>>,
    elems: Vec<Frame>,
    captures: Vec<Capture>,
    seen_ids: HashSet<String>,
    out: CaptureSet,
}

struct Frame {
    qname: String,
    ns_uri: String,
    local: String,
    captured: bool,
}

enum CaptureKind {
    Digest { id: String },
    SignedInfo,
    SignedProperties { id: Option<String> },
}

struct Capture {
    kind: CaptureKind,
    buf: Vec<u8>,
}

impl<W: Write> CanonicalParser<W> {
    /// `digest_uri` selects the hash used for Id-keyed signed elements.
    pub fn new(sink: W, digest_uri: &str) -> Self {
        let mut root_ns = BTreeMap::new();
        root_ns.insert("xml".to_owned(), ns::XML.to_owned());
        Self {
            sink,
            digest_uri: digest_uri.to_owned(),
            check_duplicate_ids: true,
            ns_stack: vec![root_ns],
            elems: Vec::new(),
            captures: Vec::new(),
            seen_ids: HashSet::new(),
            out: CaptureSet::default(),
        }
    }

    /// Disable the duplicate-Id hard failure (backward-compat knob only).
    pub fn check_duplicate_ids(mut self, check: bool) -> Self {
        self.check_duplicate_ids = check;
        self
    }

    /// Run the pass over `xml`, returning the sink and the capture set.
    pub fn run(mut self, xml: &str) -> Result<(W, CaptureSet), Error> {
        let mut reader = Reader::from_str(xml);
        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::XmlParse(e.to_string()))?;
            match event {
                Event::Start(e) => self.handle_start(&e, false)?,
                Event::Empty(e) => self.handle_start(&e, true)?,
                Event::End(e) => {
                    let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    self.handle_end(&qname)?;
                }
                Event::Text(t) => {
                    if !self.elems.is_empty() {
                        let text = t.unescape().map_err(|e| Error::XmlParse(e.to_string()))?;
                        self.emit(escape::escape_text(&text).as_bytes())?;
                    }
                }
                Event::CData(c) => {
                    // CDATA sections are replaced by their escaped content.
                    let raw = c.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|e| Error::XmlParse(format!("invalid UTF-8 in CDATA: {e}")))?;
                    self.emit(escape::escape_text(text).as_bytes())?;
                }
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }
        if let Some(frame) = self.elems.last() {
            return Err(Error::XmlStructure(format!(
                "unclosed element: {}",
                frame.qname
            )));
        }
        Ok((self.sink, self.out))
    }

    /// Forward bytes to the sink and every active capture buffer.
    fn emit(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.sink.write_all(bytes)?;
        for capture in &mut self.captures {
            capture.buf.extend_from_slice(bytes);
        }
        Ok(())
    }

    fn handle_start(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), Error> {
        let qname = String::from_utf8_lossy(e.name().as_ref()).into_owned();

        // Raw attributes in document order, values unescaped.
        let mut raw_attrs: Vec<(String, String)> = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| Error::XmlParse(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| Error::XmlParse(e.to_string()))?
                .into_owned();
            raw_attrs.push((key, value));
        }

        // Split off namespace declarations; compute the effective map.
        let mut local_decls: BTreeMap<String, String> = BTreeMap::new();
        let mut attrs: Vec<(String, String)> = Vec::new();
        for (key, value) in raw_attrs {
            if key == "xmlns" {
                local_decls.insert(String::new(), value);
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                local_decls.insert(prefix.to_owned(), value);
            } else {
                attrs.push((key, value));
            }
        }
        let parent_map = self.ns_stack.last().cloned().unwrap_or_default();
        let mut effective = parent_map.clone();
        for (prefix, uri) in &local_decls {
            effective.insert(prefix.clone(), uri.clone());
        }

        let (prefix, local) = split_qname(&qname);
        let ns_uri = effective.get(prefix).cloned().unwrap_or_default();

        // Duplicate-Id policy applies to every element carrying an Id.
        let id = attrs
            .iter()
            .find(|(k, _)| k == ns::attr::ID)
            .map(|(_, v)| v.clone());
        if let Some(ref id) = id {
            if !self.seen_ids.insert(id.clone()) && self.check_duplicate_ids {
                return Err(Error::DuplicateId(id.clone()));
            }
        }

        let capture_kind = self.signed_capture_kind(&ns_uri, local, id.as_deref());
        let captured = capture_kind.is_some();
        if let Some(kind) = capture_kind {
            self.captures.push(Capture {
                kind,
                buf: Vec::new(),
            });
        }

        // Namespace declarations to emit: a signed element re-emits the
        // full effective set; otherwise only declarations that change the
        // inherited binding.
        let mut decls: Vec<(String, String)> = Vec::new();
        if captured {
            for (prefix, uri) in &effective {
                if prefix == "xml" || uri.is_empty() {
                    continue;
                }
                decls.push((decl_qname(prefix), uri.clone()));
            }
        } else {
            for (prefix, uri) in &local_decls {
                if prefix == "xml" {
                    continue;
                }
                let inherited = parent_map.get(prefix);
                if uri.is_empty() {
                    // xmlns="" only matters if a non-empty default was inherited.
                    if inherited.is_some_and(|u| !u.is_empty()) {
                        decls.push((decl_qname(prefix), String::new()));
                    }
                } else if inherited != Some(uri) {
                    decls.push((decl_qname(prefix), uri.clone()));
                }
            }
        }
        decls.sort();

        // Regular attributes sorted by (namespace URI, qualified name).
        let mut sorted_attrs: Vec<(String, String, String)> = attrs
            .into_iter()
            .map(|(key, value)| {
                let (aprefix, _) = split_qname(&key);
                // Unprefixed attributes are in no namespace.
                let auri = if aprefix.is_empty() {
                    String::new()
                } else {
                    effective.get(aprefix).cloned().unwrap_or_default()
                };
                (auri, key, value)
            })
            .collect();
        sorted_attrs.sort();

        let mut tag = Vec::new();
        tag.push(b'<');
        tag.extend_from_slice(qname.as_bytes());
        for (dq, uri) in &decls {
            tag.extend_from_slice(b" ");
            tag.extend_from_slice(dq.as_bytes());
            tag.extend_from_slice(b"=\"");
            tag.extend_from_slice(escape::escape_attr(uri).as_bytes());
            tag.extend_from_slice(b"\"");
        }
        for (_, key, value) in &sorted_attrs {
            tag.extend_from_slice(b" ");
            tag.extend_from_slice(key.as_bytes());
            tag.extend_from_slice(b"=\"");
            tag.extend_from_slice(escape::escape_attr(value).as_bytes());
            tag.extend_from_slice(b"\"");
        }
        tag.push(b'>');
        self.emit(&tag)?;

        self.ns_stack.push(effective);
        self.elems.push(Frame {
            qname: qname.clone(),
            ns_uri,
            local: local.to_owned(),
            captured,
        });

        if empty {
            self.handle_end(&qname)?;
        }
        Ok(())
    }

    fn handle_end(&mut self, qname: &str) -> Result<(), Error> {
        let frame = self
            .elems
            .pop()
            .ok_or_else(|| Error::XmlStructure(format!("unexpected end tag: {qname}")))?;
        if frame.qname != qname {
            return Err(Error::XmlStructure(format!(
                "end tag {qname} does not match open element {}",
                frame.qname
            )));
        }

        let mut tag = Vec::with_capacity(qname.len() + 3);
        tag.extend_from_slice(b"</");
        tag.extend_from_slice(qname.as_bytes());
        tag.push(b'>');
        self.emit(&tag)?;

        self.ns_stack.pop();

        if frame.captured {
            let capture = self
                .captures
                .pop()
                .ok_or_else(|| Error::XmlStructure("capture stack underflow".into()))?;
            match capture.kind {
                CaptureKind::Digest { id } => {
                    let value = osci_crypto::digest::digest(&self.digest_uri, &capture.buf)?;
                    self.out
                        .digests
                        .insert(format!("{}{id}", ns::ID_URI_PREFIX), value);
                }
                CaptureKind::SignedInfo => self.out.signed_info.push(capture.buf),
                CaptureKind::SignedProperties { id } => {
                    self.out.signed_properties.push(SignedPropertiesCapture {
                        id,
                        bytes: capture.buf,
                    });
                }
            }
        }
        Ok(())
    }

    fn signed_capture_kind(
        &self,
        ns_uri: &str,
        local: &str,
        id: Option<&str>,
    ) -> Option<CaptureKind> {
        match (ns_uri, local) {
            (ns::DSIG, ns::node::SIGNED_INFO) => return Some(CaptureKind::SignedInfo),
            (ns::XADES, ns::node::SIGNED_PROPERTIES) => {
                return Some(CaptureKind::SignedProperties {
                    id: id.map(str::to_owned),
                })
            }
            _ => {}
        }
        let is_digest_boundary = matches!(
            (ns_uri, local),
            (ns::OSCI, ns::node::CONTROL_BLOCK)
                | (ns::SOAP, ns::node::BODY)
                | (ns::OSCI, ns::node::CONTENT_CONTAINER)
        ) || self.parent_is_soap_header();
        // Id-keyed boundaries without an Id cannot be referenced, so they
        // are not captured.
        match (is_digest_boundary, id) {
            (true, Some(id)) => Some(CaptureKind::Digest { id: id.to_owned() }),
            _ => None,
        }
    }

    fn parent_is_soap_header(&self) -> bool {
        self.elems
            .last()
            .is_some_and(|f| f.ns_uri == ns::SOAP && f.local == ns::node::HEADER)
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}

fn decl_qname(prefix: &str) -> String {
    if prefix.is_empty() {
        "xmlns".to_owned()
    } else {
        format!("xmlns:{prefix}")
    }
}

/// Canonicalize a standalone fragment, discarding any captures.
pub fn canonicalize(xml: &str) -> Result<Vec<u8>, Error> {
    let parser = CanonicalParser::new(Vec::new(), algorithm::SHA256);
    let (bytes, _) = parser.run(xml)?;
    Ok(bytes)
}
