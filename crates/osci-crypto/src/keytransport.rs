#![forbid(unsafe_code)]

//! RSA key transport: wrapping and unwrapping of symmetric session keys.
//!
//! Supports RSAES-PKCS1-v1_5, the xmlenc RSA-OAEP variant (MGF1 fixed to
//! SHA-1, digest selectable) and the xmlenc11 RSA-OAEP variant with an
//! explicit MGF algorithm.

use osci_core::{algorithm, Error};
use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

/// OAEP parameters carried on an `EncryptionMethod` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaepParams {
    /// `DigestMethod` algorithm URI.
    pub digest: String,
    /// `MGF` algorithm URI (xmlenc11 only; the mgf1p variant fixes SHA-1).
    pub mgf: String,
}

impl Default for OaepParams {
    fn default() -> Self {
        Self {
            digest: algorithm::SHA256.to_owned(),
            mgf: algorithm::MGF1_SHA256.to_owned(),
        }
    }
}

fn oaep_padding(params: &OaepParams) -> Result<Oaep, Error> {
    let padding = match (params.digest.as_str(), params.mgf.as_str()) {
        (algorithm::SHA1, algorithm::MGF1_SHA1) => Oaep::new::<sha1::Sha1>(),
        (algorithm::SHA256, algorithm::MGF1_SHA256) => Oaep::new::<sha2::Sha256>(),
        (algorithm::SHA512, algorithm::MGF1_SHA512) => Oaep::new::<sha2::Sha512>(),
        (algorithm::SHA256, algorithm::MGF1_SHA1) => {
            Oaep::new_with_mgf_hash::<sha2::Sha256, sha1::Sha1>()
        }
        (algorithm::SHA512, algorithm::MGF1_SHA1) => {
            Oaep::new_with_mgf_hash::<sha2::Sha512, sha1::Sha1>()
        }
        (digest, mgf) => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "OAEP digest/MGF combination: {digest} / {mgf}"
            )))
        }
    };
    Ok(padding)
}

fn mgf1p_params(digest: &str) -> OaepParams {
    OaepParams {
        digest: digest.to_owned(),
        mgf: algorithm::MGF1_SHA1.to_owned(),
    }
}

/// Encrypt a session key under the recipient's RSA public key.
///
/// For the OAEP variants `params` selects digest and MGF; `None` uses
/// SHA-256 throughout (SHA-1 MGF for the mgf1p variant, as that URI fixes
/// the mask generation function).
pub fn encrypt_session_key(
    public_key: &RsaPublicKey,
    transport_uri: &str,
    params: Option<&OaepParams>,
    session_key: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut rng = rand::thread_rng();
    match transport_uri {
        algorithm::RSA_PKCS1 => public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, session_key)
            .map_err(|e| Error::Crypto(format!("RSA key transport: {e}"))),
        algorithm::RSA_OAEP => {
            let defaults = mgf1p_params(algorithm::SHA256);
            let padding = oaep_padding(params.unwrap_or(&defaults))?;
            public_key
                .encrypt(&mut rng, padding, session_key)
                .map_err(|e| Error::Crypto(format!("RSA-OAEP key transport: {e}")))
        }
        algorithm::RSA_OAEP_ENC11 => {
            let defaults = OaepParams::default();
            let padding = oaep_padding(params.unwrap_or(&defaults))?;
            public_key
                .encrypt(&mut rng, padding, session_key)
                .map_err(|e| Error::Crypto(format!("RSA-OAEP key transport: {e}")))
        }
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "key transport: {transport_uri}"
        ))),
    }
}

/// Recover a session key with the recipient's RSA private key.
pub fn decrypt_session_key(
    private_key: &RsaPrivateKey,
    transport_uri: &str,
    params: Option<&OaepParams>,
    wrapped_key: &[u8],
) -> Result<Vec<u8>, Error> {
    match transport_uri {
        algorithm::RSA_PKCS1 => private_key
            .decrypt(Pkcs1v15Encrypt, wrapped_key)
            .map_err(|e| Error::Crypto(format!("RSA key transport: {e}"))),
        algorithm::RSA_OAEP => {
            let defaults = mgf1p_params(algorithm::SHA256);
            let padding = oaep_padding(params.unwrap_or(&defaults))?;
            private_key
                .decrypt(padding, wrapped_key)
                .map_err(|e| Error::Crypto(format!("RSA-OAEP key transport: {e}")))
        }
        algorithm::RSA_OAEP_ENC11 => {
            let defaults = OaepParams::default();
            let padding = oaep_padding(params.unwrap_or(&defaults))?;
            private_key
                .decrypt(padding, wrapped_key)
                .map_err(|e| Error::Crypto(format!("RSA-OAEP key transport: {e}")))
        }
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "key transport: {transport_uri}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> RsaPrivateKey {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 2048).unwrap()
    }

    #[test]
    fn test_pkcs1_roundtrip() {
        let sk = test_key();
        let pk = sk.to_public_key();
        let session = [0x42u8; 32];
        let wrapped =
            encrypt_session_key(&pk, algorithm::RSA_PKCS1, None, &session).unwrap();
        assert_eq!(wrapped.len(), 256);
        let recovered =
            decrypt_session_key(&sk, algorithm::RSA_PKCS1, None, &wrapped).unwrap();
        assert_eq!(recovered, session);
    }

    #[test]
    fn test_oaep_roundtrip_both_variants() {
        let sk = test_key();
        let pk = sk.to_public_key();
        let session = [0x17u8; 24];
        for uri in [algorithm::RSA_OAEP, algorithm::RSA_OAEP_ENC11] {
            let wrapped = encrypt_session_key(&pk, uri, None, &session).unwrap();
            let recovered = decrypt_session_key(&sk, uri, None, &wrapped).unwrap();
            assert_eq!(recovered, session, "roundtrip failed for {uri}");
        }
    }

    #[test]
    fn test_oaep_explicit_params() {
        let sk = test_key();
        let pk = sk.to_public_key();
        let params = OaepParams {
            digest: algorithm::SHA512.to_owned(),
            mgf: algorithm::MGF1_SHA512.to_owned(),
        };
        let session = [0x99u8; 16];
        let wrapped =
            encrypt_session_key(&pk, algorithm::RSA_OAEP_ENC11, Some(&params), &session)
                .unwrap();
        let recovered =
            decrypt_session_key(&sk, algorithm::RSA_OAEP_ENC11, Some(&params), &wrapped)
                .unwrap();
        assert_eq!(recovered, session);
    }

    #[test]
    fn test_unsupported_transport() {
        let sk = test_key();
        let pk = sk.to_public_key();
        assert!(
            encrypt_session_key(&pk, "http://example.com/none", None, &[0u8; 16]).is_err()
        );
    }
}
