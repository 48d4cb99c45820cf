#![forbid(unsafe_code)]

//! XML namespace and element-name constants used across the library.

/// OSCI 1.2 message namespace
pub const OSCI: &str = "http://www.osci.de/2002/04/osci";

/// SOAP 1.1 envelope namespace
pub const SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Encryption namespace
pub const ENC: &str = "http://www.w3.org/2001/04/xmlenc#";

/// XML Encryption 1.1 namespace
pub const ENC11: &str = "http://www.w3.org/2009/xmlenc11#";

/// XAdES qualifying-properties namespace (SignedProperties / SigningTime)
pub const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";

/// Private transport namespace carrying the explicit IV-length element
pub const OSCI2017: &str = "http://xoev.de/transport/osci12/7";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // OSCI / SOAP message parts
    pub const ENVELOPE: &str = "Envelope";
    pub const HEADER: &str = "Header";
    pub const BODY: &str = "Body";
    pub const CONTROL_BLOCK: &str = "ControlBlock";
    pub const CONTENT_CONTAINER: &str = "ContentContainer";
    pub const CONTENT: &str = "Content";

    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_NAME: &str = "KeyName";
    pub const RETRIEVAL_METHOD: &str = "RetrievalMethod";
    pub const OBJECT: &str = "Object";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";

    // XAdES elements
    pub const QUALIFYING_PROPERTIES: &str = "QualifyingProperties";
    pub const SIGNED_PROPERTIES: &str = "SignedProperties";
    pub const SIGNED_SIGNATURE_PROPERTIES: &str = "SignedSignatureProperties";
    pub const SIGNING_TIME: &str = "SigningTime";

    // Encryption elements
    pub const ENCRYPTED_DATA: &str = "EncryptedData";
    pub const ENCRYPTED_KEY: &str = "EncryptedKey";
    pub const ENCRYPTION_METHOD: &str = "EncryptionMethod";
    pub const IV_LENGTH: &str = "IVLength";
    pub const CIPHER_DATA: &str = "CipherData";
    pub const CIPHER_VALUE: &str = "CipherValue";
    pub const CIPHER_REFERENCE: &str = "CipherReference";
    pub const MGF: &str = "MGF";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const MIME_TYPE: &str = "MimeType";
    pub const VALUE: &str = "Value";
    pub const TARGET: &str = "Target";
    pub const HREF: &str = "href";
}

/// Prefix marking an in-document reference URI.
pub const ID_URI_PREFIX: &str = "#";

/// Scheme marking an out-of-band attachment reference URI.
pub const CID_URI_PREFIX: &str = "cid:";
