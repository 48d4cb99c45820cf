#![forbid(unsafe_code)]

//! Signature verification against the live object graph.

use crate::sign::expected_parts;
use osci_core::{ns, Error};
use osci_msg::{ContentContainer, OsciSignature};
use osci_roles::Role;

/// Verify `role`'s signature(s) over `container`.
///
/// Returns `false` for any verification failure (digest mismatch,
/// reference-count mismatch, uncovered part, bad signature value). A role
/// that never signed the container is a caller error and raises
/// [`Error::Role`] instead; failed verification is a business outcome,
/// not an exception.
pub fn check_signature(container: &ContentContainer, role: &dyn Role) -> Result<bool, Error> {
    let candidates: Vec<&OsciSignature> = container
        .signatures()
        .iter()
        .filter(|s| s.signer_certificate() == role.signature_certificate())
        .collect();
    if candidates.is_empty() {
        return Err(Error::Role(
            "container carries no signature by this role's certificate".into(),
        ));
    }

    let verifying_key = role.verifying_key()?;
    for signature in candidates {
        if verify_one(container, signature, &verifying_key)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn verify_one(
    container: &ContentContainer,
    signature: &OsciSignature,
    key: &osci_crypto::VerifierKey,
) -> Result<bool, Error> {
    let expected = expected_parts(container);
    let props = signature.signing_properties();
    let props_uri = props.map(|p| format!("{}{}", ns::ID_URI_PREFIX, p.props_id));

    // Reference-count parity: an added or removed reference fails before
    // any digest is computed.
    let expected_count = expected.len() + usize::from(props.is_some());
    if signature.references().len() != expected_count {
        tracing::debug!(
            stored = signature.references().len(),
            expected = expected_count,
            "reference count mismatch"
        );
        return Ok(false);
    }

    // Recompute every digest from the live parts; the signing-time
    // reference digests the stored SignedProperties bytes instead.
    for reference in signature.references() {
        let is_props_ref = props_uri.as_deref() == Some(reference.uri());
        let recomputed = if let (Some(props), true) = (props, is_props_ref) {
            osci_crypto::digest::digest(reference.digest_uri(), &props.bytes)?
        } else {
            match expected.iter().find(|(uri, _)| uri == reference.uri()) {
                Some((_, part)) => part.part().digest(reference.digest_uri())?,
                None => {
                    tracing::debug!(uri = reference.uri(), "reference matches no live part");
                    return Ok(false);
                }
            }
        };
        if !reference.matches_digest(&recomputed) {
            tracing::debug!(uri = reference.uri(), "digest mismatch");
            return Ok(false);
        }
    }

    // No orphan parts: everything reachable must be covered.
    for (uri, _) in &expected {
        if signature.find_reference(uri).is_none() {
            tracing::debug!(uri = %uri, "part not covered by any reference");
            return Ok(false);
        }
    }

    let algorithm = osci_crypto::sign::from_uri(signature.signature_uri())?;
    algorithm.verify(key, signature.signed_info(), signature.signature_value())
}
