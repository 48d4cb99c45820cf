#![forbid(unsafe_code)]

//! XAdES signing-time properties.

use chrono::{SecondsFormat, Utc};
use osci_c14n::XmlWriter;
use osci_core::{ns, Error};
use osci_msg::SigningProperties;

/// The current UTC time in the ISO-8601 form used by SigningTime.
pub fn current_signing_time() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Build a SignedProperties fragment carrying `signing_time`.
///
/// The fragment is constructed with the full namespace set in scope at
/// its document position inside a signed container (`ds`, `osci`,
/// `xades`, sorted), so its bytes are identical to what a
/// canonicalization pass captures after serialization. The signing-time
/// reference digests exactly these bytes.
pub fn build_signed_properties(
    props_id: &str,
    signing_time: &str,
) -> Result<SigningProperties, Error> {
    let mut w = XmlWriter::new();
    w.start_element(
        "xades:SignedProperties",
        &[
            ("xmlns:ds", ns::DSIG),
            ("xmlns:osci", ns::OSCI),
            ("xmlns:xades", ns::XADES),
            (ns::attr::ID, props_id),
        ],
    );
    w.start_element("xades:SignedSignatureProperties", &[]);
    w.text_element("xades:SigningTime", &[], signing_time)?;
    w.end_element()?;
    w.end_element()?;
    Ok(SigningProperties {
        time: signing_time.to_owned(),
        props_id: props_id.to_owned(),
        bytes: w.into_bytes()?,
    })
}
