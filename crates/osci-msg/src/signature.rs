#![forbid(unsafe_code)]

//! The Reference digest model and the signature data object.

use crate::part::MessagePart;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use osci_c14n::XmlWriter;
use osci_core::{algorithm, ns, Error};
use std::io::Write;

/// One digest record inside a signature's SignedInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    uri: String,
    digest_uri: String,
    digest_value: Vec<u8>,
    transforms: Vec<String>,
}

impl Reference {
    /// Signing path: digest a part's freshly produced canonical bytes.
    pub fn from_signed_part(part: &dyn MessagePart, digest_uri: &str) -> Result<Self, Error> {
        Ok(Self {
            uri: part.reference_uri(),
            digest_uri: digest_uri.to_owned(),
            digest_value: part.digest(digest_uri)?,
            transforms: part.transforms().to_vec(),
        })
    }

    /// Verification path: a reference as parsed from serialized XML.
    pub fn from_wire(
        uri: &str,
        digest_uri: &str,
        digest_value: Vec<u8>,
        transforms: Vec<String>,
    ) -> Self {
        Self {
            uri: uri.to_owned(),
            digest_uri: digest_uri.to_owned(),
            digest_value,
            transforms,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn digest_uri(&self) -> &str {
        &self.digest_uri
    }

    pub fn digest_value(&self) -> &[u8] {
        &self.digest_value
    }

    pub fn transforms(&self) -> &[String] {
        &self.transforms
    }

    /// Compare a recomputed digest against the stored value without
    /// short-circuiting on the first mismatching byte.
    pub fn matches_digest(&self, candidate: &[u8]) -> bool {
        constant_time_eq(&self.digest_value, candidate)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The XAdES signing-time property attached to a signature.
#[derive(Debug, Clone)]
pub struct SigningProperties {
    /// ISO-8601 signing time.
    pub time: String,
    /// `Id` of the SignedProperties element.
    pub props_id: String,
    /// Canonical bytes of the SignedProperties fragment; the signing-time
    /// reference digests these exact bytes.
    pub bytes: Vec<u8>,
}

/// One XML-DSig signature over a container's parts.
///
/// Mutable only until the signature value is attached; after that,
/// reference additions are a `State` error.
pub struct OsciSignature {
    signature_uri: String,
    signer_certificate: Vec<u8>,
    signer_uri: Option<String>,
    references: Vec<Reference>,
    signed_info: Vec<u8>,
    signature_value: Vec<u8>,
    signing_properties: Option<SigningProperties>,
}

impl OsciSignature {
    pub fn new(signature_uri: &str, signer_certificate: Vec<u8>) -> Self {
        Self {
            signature_uri: signature_uri.to_owned(),
            signer_certificate,
            signer_uri: None,
            references: Vec::new(),
            signed_info: Vec::new(),
            signature_value: Vec::new(),
            signing_properties: None,
        }
    }

    /// Verification path: rebuild the object from parsed wire data.
    #[allow(clippy::too_many_arguments)]
    pub fn from_wire(
        signature_uri: &str,
        signed_info: Vec<u8>,
        signature_value: Vec<u8>,
        references: Vec<Reference>,
        signer_certificate: Vec<u8>,
        signer_uri: Option<String>,
        signing_properties: Option<SigningProperties>,
    ) -> Self {
        Self {
            signature_uri: signature_uri.to_owned(),
            signer_certificate,
            signer_uri,
            references,
            signed_info,
            signature_value,
            signing_properties,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature_value.is_empty()
    }

    pub fn add_reference(&mut self, reference: Reference) -> Result<(), Error> {
        if self.is_signed() {
            return Err(Error::State(
                "cannot add references after the signature value is set".into(),
            ));
        }
        self.references.push(reference);
        Ok(())
    }

    pub fn set_signing_properties(&mut self, props: SigningProperties) -> Result<(), Error> {
        if self.is_signed() {
            return Err(Error::State(
                "cannot set signing properties after the signature value is set".into(),
            ));
        }
        self.signing_properties = Some(props);
        Ok(())
    }

    pub fn set_signer_uri(&mut self, uri: &str) {
        self.signer_uri = Some(uri.to_owned());
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn find_reference(&self, uri: &str) -> Option<&Reference> {
        self.references.iter().find(|r| r.uri() == uri)
    }

    pub fn signature_uri(&self) -> &str {
        &self.signature_uri
    }

    pub fn signer_certificate(&self) -> &[u8] {
        &self.signer_certificate
    }

    pub fn signer_uri(&self) -> Option<&str> {
        self.signer_uri.as_deref()
    }

    pub fn signed_info(&self) -> &[u8] {
        &self.signed_info
    }

    pub fn signature_value(&self) -> &[u8] {
        &self.signature_value
    }

    pub fn signing_properties(&self) -> Option<&SigningProperties> {
        self.signing_properties.as_ref()
    }

    /// Assemble the canonical SignedInfo over the current reference list.
    ///
    /// `ns_decls` is the full namespace set in scope at the SignedInfo
    /// element (sorted, `xmlns:ds` included): the fragment must carry it so
    /// the bytes match what a later canonicalization pass captures.
    pub fn build_signed_info(&mut self, ns_decls: &[(&str, &str)]) -> Result<&[u8], Error> {
        if self.is_signed() {
            return Err(Error::State(
                "SignedInfo is fixed once the signature value is set".into(),
            ));
        }
        let mut w = XmlWriter::new();
        w.start_element("ds:SignedInfo", ns_decls);
        w.empty_element(
            "ds:CanonicalizationMethod",
            &[(ns::attr::ALGORITHM, algorithm::C14N)],
        )?;
        w.empty_element(
            "ds:SignatureMethod",
            &[(ns::attr::ALGORITHM, &self.signature_uri)],
        )?;
        for reference in &self.references {
            w.start_element("ds:Reference", &[(ns::attr::URI, reference.uri())]);
            if !reference.transforms().is_empty() {
                w.start_element("ds:Transforms", &[]);
                for transform in reference.transforms() {
                    w.empty_element("ds:Transform", &[(ns::attr::ALGORITHM, transform)])?;
                }
                w.end_element()?;
            }
            w.empty_element(
                "ds:DigestMethod",
                &[(ns::attr::ALGORITHM, reference.digest_uri())],
            )?;
            w.text_element("ds:DigestValue", &[], &BASE64.encode(reference.digest_value()))?;
            w.end_element()?;
        }
        w.end_element()?;
        self.signed_info = w.into_bytes()?;
        Ok(&self.signed_info)
    }

    /// Attach the signature value computed over `signed_info`. Terminal.
    pub fn attach_signature_value(&mut self, value: Vec<u8>) -> Result<(), Error> {
        if self.signed_info.is_empty() {
            return Err(Error::State(
                "SignedInfo must be built before attaching a signature value".into(),
            ));
        }
        if self.is_signed() {
            return Err(Error::State("signature value already set".into()));
        }
        self.signature_value = value;
        Ok(())
    }

    /// Serialize the full `ds:Signature` element.
    pub fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error> {
        if !self.is_signed() {
            return Err(Error::State("cannot serialize an unsigned signature".into()));
        }
        let mut w = XmlWriter::new();
        w.start_element("ds:Signature", &[("xmlns:ds", ns::DSIG)]);
        w.raw(&self.signed_info);
        w.text_element("ds:SignatureValue", &[], &BASE64.encode(&self.signature_value))?;
        w.start_element("ds:KeyInfo", &[]);
        if let Some(uri) = &self.signer_uri {
            w.empty_element("ds:RetrievalMethod", &[(ns::attr::URI, uri)])?;
        }
        if !self.signer_certificate.is_empty() {
            w.start_element("ds:X509Data", &[]);
            w.text_element(
                "ds:X509Certificate",
                &[],
                &BASE64.encode(&self.signer_certificate),
            )?;
            w.end_element()?;
        }
        w.end_element()?;
        if let Some(props) = &self.signing_properties {
            w.start_element("ds:Object", &[]);
            w.start_element("xades:QualifyingProperties", &[("xmlns:xades", ns::XADES)]);
            w.raw(&props.bytes);
            w.end_element()?;
            w.end_element()?;
        }
        w.end_element()?;
        sink.write_all(&w.into_bytes()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_reference_from_part() {
        let content = Content::raw("c1", b"hello".to_vec());
        let reference =
            Reference::from_signed_part(&content, algorithm::SHA256).unwrap();
        assert_eq!(reference.uri(), "#c1");
        assert_eq!(reference.digest_uri(), algorithm::SHA256);
        assert!(reference.matches_digest(&content.digest(algorithm::SHA256).unwrap()));
        assert!(!reference.matches_digest(&[0u8; 32]));
    }

    #[test]
    fn test_signed_info_shape() {
        let content = Content::raw("c1", b"hello".to_vec());
        let mut sig = OsciSignature::new(algorithm::RSA_SHA256, b"cert".to_vec());
        sig.add_reference(Reference::from_signed_part(&content, algorithm::SHA256).unwrap())
            .unwrap();
        let si = sig.build_signed_info(&[("xmlns:ds", ns::DSIG)]).unwrap();
        let si = String::from_utf8(si.to_vec()).unwrap();
        assert!(si.starts_with(&format!(r#"<ds:SignedInfo xmlns:ds="{}">"#, ns::DSIG)));
        assert!(si.contains(&format!(
            r#"<ds:SignatureMethod Algorithm="{}"></ds:SignatureMethod>"#,
            algorithm::RSA_SHA256
        )));
        assert!(si.contains(r##"<ds:Reference URI="#c1">"##));
        assert!(si.contains(&format!(
            r#"<ds:Transform Algorithm="{}"></ds:Transform>"#,
            algorithm::BASE64
        )));
    }

    #[test]
    fn test_references_frozen_after_signing() {
        let content = Content::raw("c1", b"hello".to_vec());
        let reference = Reference::from_signed_part(&content, algorithm::SHA256).unwrap();
        let mut sig = OsciSignature::new(algorithm::RSA_SHA256, b"cert".to_vec());
        sig.add_reference(reference.clone()).unwrap();
        sig.build_signed_info(&[("xmlns:ds", ns::DSIG)]).unwrap();
        sig.attach_signature_value(vec![1, 2, 3]).unwrap();

        assert!(matches!(sig.add_reference(reference), Err(Error::State(_))));
        assert!(matches!(
            sig.attach_signature_value(vec![4]),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn test_signature_value_requires_signed_info() {
        let mut sig = OsciSignature::new(algorithm::RSA_SHA256, Vec::new());
        assert!(matches!(
            sig.attach_signature_value(vec![1]),
            Err(Error::State(_))
        ));
    }
}
