#![forbid(unsafe_code)]

//! Algorithm URI constants for the OSCI message security layer.
//!
//! The registry is fixed: OSCI 1.2 peers only negotiate algorithms from this
//! list, and extending it means adding an entry here plus an implementation
//! in `osci-crypto`. Each constant is the URI that appears in `Algorithm`
//! attributes on the wire.

// ── Canonicalization / transforms ────────────────────────────────────

pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const BASE64: &str = "http://www.w3.org/2000/09/xmldsig#base64";

// ── Digest algorithms ────────────────────────────────────────────────

pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";
pub const RIPEMD160: &str = "http://www.w3.org/2001/04/xmlenc#ripemd160";
pub const SHA3_256: &str = "http://www.w3.org/2007/05/xmldsig-more#sha3-256";
pub const SHA3_384: &str = "http://www.w3.org/2007/05/xmldsig-more#sha3-384";
pub const SHA3_512: &str = "http://www.w3.org/2007/05/xmldsig-more#sha3-512";

// ── Signature algorithms ─────────────────────────────────────────────

pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
pub const RSA_PSS_SHA256: &str = "http://www.w3.org/2007/05/xmldsig-more#sha256-rsa-MGF1";
pub const RSA_PSS_SHA384: &str = "http://www.w3.org/2007/05/xmldsig-more#sha384-rsa-MGF1";
pub const RSA_PSS_SHA512: &str = "http://www.w3.org/2007/05/xmldsig-more#sha512-rsa-MGF1";
pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

// ── Symmetric cipher algorithms ──────────────────────────────────────

pub const TRIPLEDES_CBC: &str = "http://www.w3.org/2001/04/xmlenc#tripledes-cbc";
pub const AES128_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes128-cbc";
pub const AES192_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes192-cbc";
pub const AES256_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
pub const AES192_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes192-gcm";
pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";

// ── Key transport algorithms ─────────────────────────────────────────

pub const RSA_PKCS1: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
pub const RSA_OAEP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";
pub const RSA_OAEP_ENC11: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";

// ── MGF algorithms (RSA-OAEP enc11) ──────────────────────────────────

pub const MGF1_SHA1: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha1";
pub const MGF1_SHA256: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha256";
pub const MGF1_SHA512: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha512";

/// Fixed IV length in bytes for CBC-family ciphers.
///
/// Returns `None` for the GCM family, where the length is explicit on the
/// wire (12 or 16), and for non-cipher URIs.
pub fn iv_length(uri: &str) -> Option<usize> {
    match uri {
        TRIPLEDES_CBC => Some(8),
        AES128_CBC | AES192_CBC | AES256_CBC => Some(16),
        _ => None,
    }
}

/// Symmetric key length in bytes for a cipher URI.
pub fn key_length(uri: &str) -> Option<usize> {
    match uri {
        TRIPLEDES_CBC => Some(24),
        AES128_CBC | AES128_GCM => Some(16),
        AES192_CBC | AES192_GCM => Some(24),
        AES256_CBC | AES256_GCM => Some(32),
        _ => None,
    }
}

/// Whether a cipher URI is in the AES-GCM family.
pub fn is_gcm(uri: &str) -> bool {
    matches!(uri, AES128_GCM | AES192_GCM | AES256_GCM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iv_lengths() {
        assert_eq!(iv_length(TRIPLEDES_CBC), Some(8));
        assert_eq!(iv_length(AES256_CBC), Some(16));
        assert_eq!(iv_length(AES256_GCM), None);
        assert_eq!(iv_length(SHA256), None);
    }

    #[test]
    fn test_key_lengths() {
        assert_eq!(key_length(TRIPLEDES_CBC), Some(24));
        assert_eq!(key_length(AES128_GCM), Some(16));
        assert_eq!(key_length(AES256_CBC), Some(32));
    }
}
