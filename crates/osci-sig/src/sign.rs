#![forbid(unsafe_code)]

//! Signature construction over a content container.

use crate::properties;
use osci_core::{algorithm, ns, DialogConfig, Error};
use osci_msg::{
    Attachment, ContainerChild, ContentContainer, ContentPayload, MessagePart, OsciSignature,
    Reference,
};
use std::collections::HashSet;
use std::rc::Rc;

/// A part a signature is expected to cover, keyed by its reference URI.
pub(crate) enum ExpectedPart<'a> {
    Borrowed(&'a dyn MessagePart),
    Attachment(Rc<Attachment>),
}

impl ExpectedPart<'_> {
    pub(crate) fn part(&self) -> &dyn MessagePart {
        match self {
            ExpectedPart::Borrowed(p) => *p,
            ExpectedPart::Attachment(a) => a.as_ref(),
        }
    }
}

/// The reference set a fresh signature over `container` must cover, in
/// document order. One entry per child; a Content wrapping an attachment
/// is keyed by the attachment's `cid:` URI (the attachment bytes are what
/// the signature protects, the element itself only carries the pointer),
/// and attachments inside nested containers are appended after their
/// wrapping child. Shared by construction and verification so the two
/// sides can never disagree on the expected set.
pub(crate) fn expected_parts<'a>(
    container: &'a ContentContainer,
) -> Vec<(String, ExpectedPart<'a>)> {
    let mut out: Vec<(String, ExpectedPart<'a>)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |out: &mut Vec<(String, ExpectedPart<'a>)>, uri: String, part| {
        if seen.insert(uri.clone()) {
            out.push((uri, part));
        }
    };
    for child in container.children() {
        match child {
            ContainerChild::Content(content) => match content.payload() {
                ContentPayload::Attachment(att) => {
                    push(
                        &mut out,
                        att.cid_uri(),
                        ExpectedPart::Attachment(Rc::clone(att)),
                    );
                }
                ContentPayload::Container(nested) => {
                    push(
                        &mut out,
                        content.reference_uri(),
                        ExpectedPart::Borrowed(content),
                    );
                    for att in nested.collect_attachments() {
                        push(&mut out, att.cid_uri(), ExpectedPart::Attachment(att));
                    }
                }
                ContentPayload::Raw(_) => {
                    push(
                        &mut out,
                        content.reference_uri(),
                        ExpectedPart::Borrowed(content),
                    );
                }
            },
            ContainerChild::EncryptedData(data) => {
                push(&mut out, data.reference_uri(), ExpectedPart::Borrowed(data));
            }
        }
    }
    out
}

/// Namespace declarations in scope at a SignedInfo inside a serialized
/// container, in canonical order.
pub(crate) const SIGNED_INFO_NS: &[(&str, &str)] =
    &[("xmlns:ds", ns::DSIG), ("xmlns:osci", ns::OSCI)];

/// Sign `container` with `signer`'s signature key and attach the result.
///
/// With `signing_time`, a XAdES SignedProperties fragment is synthesized
/// and covered by an extra reference. When the container already carries
/// a signature, its reference set is copied verbatim (minus any
/// signing-time reference) instead of being rebuilt, so co-signers cover
/// byte-identical digests.
pub fn sign_container(
    container: &mut ContentContainer,
    signer: &dyn osci_roles::Role,
    config: &DialogConfig,
    signing_time: Option<&str>,
) -> Result<(), Error> {
    let mut signature = OsciSignature::new(
        &config.default_signature,
        signer.signature_certificate().to_vec(),
    );

    match container.signatures().first() {
        Some(existing) => {
            let props_uri = existing
                .signing_properties()
                .map(|p| format!("{}{}", ns::ID_URI_PREFIX, p.props_id));
            for reference in existing.references() {
                if props_uri.as_deref() == Some(reference.uri()) {
                    continue;
                }
                signature.add_reference(reference.clone())?;
            }
        }
        None => {
            for (_, expected) in expected_parts(container) {
                signature.add_reference(Reference::from_signed_part(
                    expected.part(),
                    &config.default_digest,
                )?)?;
            }
        }
    }

    if let Some(time) = signing_time {
        let props_id = format!(
            "{}-signedproperties{}",
            container.ref_id(),
            container.signatures().len() + 1
        );
        let props = properties::build_signed_properties(&props_id, time)?;
        let digest = osci_crypto::digest::digest(&config.default_digest, &props.bytes)?;
        signature.add_reference(Reference::from_wire(
            &format!("{}{}", ns::ID_URI_PREFIX, props_id),
            &config.default_digest,
            digest,
            vec![algorithm::C14N.to_owned()],
        ))?;
        signature.set_signing_properties(props)?;
    }

    signature.build_signed_info(SIGNED_INFO_NS)?;
    let value = signer.sign(signature.signed_info(), &config.default_signature)?;
    signature.attach_signature_value(value)?;

    tracing::debug!(
        container = container.ref_id(),
        references = signature.references().len(),
        "attached signature"
    );
    container.add_signature(signature);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osci_crypto::SignerKey;
    use osci_msg::Content;
    use osci_roles::SoftwareRole;

    fn test_role(cert: &[u8]) -> SoftwareRole {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        SoftwareRole::new(SignerKey::Rsa(key), cert.to_vec())
    }

    #[test]
    fn test_reference_per_child() {
        let mut cc = ContentContainer::new("cc");
        cc.add_content(Content::raw("c1", b"hello".to_vec()));
        let att = Attachment::new("blob", b"binary".to_vec());
        cc.add_content(Content::attachment("c2", att));

        let role = test_role(b"cert-a");
        sign_container(&mut cc, &role, &DialogConfig::default(), None).unwrap();

        let sig = &cc.signatures()[0];
        assert_eq!(sig.references().len(), 2);
        assert_eq!(sig.references()[0].uri(), "#c1");
        assert_eq!(sig.references()[1].uri(), "cid:blob");
    }

    #[test]
    fn test_signing_time_adds_reference() {
        let mut cc = ContentContainer::new("cc");
        cc.add_content(Content::raw("c1", b"x".to_vec()));
        let role = test_role(b"cert-a");
        sign_container(
            &mut cc,
            &role,
            &DialogConfig::default(),
            Some("2024-05-01T12:00:00Z"),
        )
        .unwrap();

        let sig = &cc.signatures()[0];
        assert_eq!(sig.references().len(), 2);
        let props = sig.signing_properties().unwrap();
        assert_eq!(props.time, "2024-05-01T12:00:00Z");
        assert!(sig
            .find_reference(&format!("#{}", props.props_id))
            .is_some());
    }

    #[test]
    fn test_cosigner_copies_reference_set() {
        let mut cc = ContentContainer::new("cc");
        cc.add_content(Content::raw("c1", b"x".to_vec()));
        let config = DialogConfig::default();

        let first = test_role(b"cert-a");
        sign_container(&mut cc, &first, &config, Some("2024-05-01T12:00:00Z")).unwrap();
        let second = test_role(b"cert-b");
        sign_container(&mut cc, &second, &config, None).unwrap();

        let (a, b) = (&cc.signatures()[0], &cc.signatures()[1]);
        // The co-signature covers the same content references but not the
        // first signer's signing time.
        assert_eq!(b.references().len(), 1);
        assert_eq!(a.find_reference("#c1"), b.find_reference("#c1").cloned().as_ref());
    }

    #[test]
    fn test_nested_attachments_are_covered() {
        let att = Attachment::new("deep", b"bytes".to_vec());
        let mut inner = ContentContainer::new("inner");
        inner.add_content(Content::attachment("ic", att));
        let mut cc = ContentContainer::new("cc");
        cc.add_content(Content::container("oc", inner));

        let parts = expected_parts(&cc);
        let uris: Vec<&str> = parts.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(uris, ["#oc", "cid:deep"]);
    }
}
