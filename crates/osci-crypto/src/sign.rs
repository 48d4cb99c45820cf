#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5, RSA-PSS, ECDSA).

use osci_core::{algorithm, Error};
use signature::SignatureEncoding;

/// Private key material for signing.
pub enum SignerKey {
    Rsa(rsa::RsaPrivateKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP384(p384::ecdsa::SigningKey),
}

/// Public key material for verification.
#[derive(Clone)]
pub enum VerifierKey {
    Rsa(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::VerifyingKey),
}

impl SignerKey {
    /// The corresponding public half.
    pub fn verifier(&self) -> VerifierKey {
        match self {
            SignerKey::Rsa(pk) => VerifierKey::Rsa(pk.to_public_key()),
            SignerKey::EcP256(sk) => VerifierKey::EcP256(*sk.verifying_key()),
            SignerKey::EcP384(sk) => VerifierKey::EcP384(*sk.verifying_key()),
        }
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SignerKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &VerifierKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::RSA_PSS_SHA256 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_PSS_SHA384 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_PSS_SHA512 => Ok(Box::new(RsaPss { uri: algorithm::RSA_PSS_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256 { uri: algorithm::ECDSA_SHA256 })),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA384 })),
        algorithm::ECDSA_SHA512 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA512 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha1, Sha256, Sha384, Sha512 }

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignerKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignerKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required".into()));
        };
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &VerifierKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifierKey::Rsa(public_key) = key else {
            return Err(Error::Key("RSA public key required".into()));
        };
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── RSA-PSS ──────────────────────────────────────────────────────────

struct RsaPss { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for RsaPss {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignerKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::RandomizedSigner;
        let SignerKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required for PSS".into()));
        };
        let mut rng = rand::thread_rng();
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pss::SigningKey::<$hasher>::new(private_key.clone());
                let sig = sk.sign_with_rng(&mut rng, data);
                Ok(sig.to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &VerifierKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifierKey::Rsa(public_key) = key else {
            return Err(Error::Key("RSA public key required for PSS".into()));
        };
        let sig = rsa::pss::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA-PSS signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pss::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── ECDSA P-256 ──────────────────────────────────────────────────────

struct EcdsaP256 { uri: &'static str }

/// Convert XML-DSig ECDSA r||s bytes to a typed signature for P-256.
pub fn xmldsig_to_p256(rs: &[u8]) -> Result<p256::ecdsa::Signature, Error> {
    if rs.len() != 64 {
        return Err(Error::Crypto(format!("P-256 signature must be 64 bytes, got {}", rs.len())));
    }
    let r = p256::FieldBytes::from_slice(&rs[..32]);
    let s = p256::FieldBytes::from_slice(&rs[32..]);
    p256::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-256 signature: {e}")))
}

/// Convert a P-256 signature to XML-DSig r||s format.
pub fn p256_to_xmldsig(sig: &p256::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignerKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignerKey::EcP256(sk) = key else {
            return Err(Error::Key("P-256 signing key required".into()));
        };
        let sig: p256::ecdsa::Signature = sk.sign(data);
        Ok(p256_to_xmldsig(&sig))
    }

    fn verify(&self, key: &VerifierKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifierKey::EcP256(vk) = key else {
            return Err(Error::Key("P-256 public key required".into()));
        };
        let sig = xmldsig_to_p256(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

// ── ECDSA P-384 ──────────────────────────────────────────────────────

struct EcdsaP384 { uri: &'static str }

/// Convert XML-DSig ECDSA r||s bytes to a typed signature for P-384.
pub fn xmldsig_to_p384(rs: &[u8]) -> Result<p384::ecdsa::Signature, Error> {
    if rs.len() != 96 {
        return Err(Error::Crypto(format!("P-384 signature must be 96 bytes, got {}", rs.len())));
    }
    let r = p384::FieldBytes::from_slice(&rs[..48]);
    let s = p384::FieldBytes::from_slice(&rs[48..]);
    p384::ecdsa::Signature::from_scalars(*r, *s)
        .map_err(|e| Error::Crypto(format!("invalid P-384 signature: {e}")))
}

/// Convert a P-384 signature to XML-DSig r||s format.
pub fn p384_to_xmldsig(sig: &p384::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignerKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignerKey::EcP384(sk) = key else {
            return Err(Error::Key("P-384 signing key required".into()));
        };
        let sig: p384::ecdsa::Signature = sk.sign(data);
        Ok(p384_to_xmldsig(&sig))
    }

    fn verify(&self, key: &VerifierKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let VerifierKey::EcP384(vk) = key else {
            return Err(Error::Key("P-384 public key required".into()));
        };
        let sig = xmldsig_to_p384(sig_bytes)?;
        Ok(vk.verify(data, &sig).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_test_key() -> rsa::RsaPrivateKey {
        let mut rng = rand::thread_rng();
        rsa::RsaPrivateKey::new(&mut rng, 2048).expect("RSA key generation")
    }

    #[test]
    fn test_rsa_sha256_roundtrip() {
        let key = SignerKey::Rsa(rsa_test_key());
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        let sig = alg.sign(&key, b"signed info bytes").unwrap();
        assert!(alg.verify(&key.verifier(), b"signed info bytes", &sig).unwrap());
        assert!(!alg.verify(&key.verifier(), b"tampered bytes", &sig).unwrap());
    }

    #[test]
    fn test_rsa_pss_roundtrip() {
        let key = SignerKey::Rsa(rsa_test_key());
        let alg = from_uri(algorithm::RSA_PSS_SHA256).unwrap();
        let sig = alg.sign(&key, b"data").unwrap();
        assert!(alg.verify(&key.verifier(), b"data", &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_p256_roundtrip() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let key = SignerKey::EcP256(sk);
        let alg = from_uri(algorithm::ECDSA_SHA256).unwrap();
        let sig = alg.sign(&key, b"data").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(alg.verify(&key.verifier(), b"data", &sig).unwrap());
        assert!(!alg.verify(&key.verifier(), b"other", &sig).unwrap());
    }

    #[test]
    fn test_ecdsa_p384_roundtrip() {
        let sk = p384::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let key = SignerKey::EcP384(sk);
        let alg = from_uri(algorithm::ECDSA_SHA384).unwrap();
        let sig = alg.sign(&key, b"data").unwrap();
        assert_eq!(sig.len(), 96);
        assert!(alg.verify(&key.verifier(), b"data", &sig).unwrap());
    }

    #[test]
    fn test_wrong_key_kind() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let key = SignerKey::EcP256(sk);
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        assert!(alg.sign(&key, b"data").is_err());
    }

    #[test]
    fn test_unsupported_signature_algorithm() {
        assert!(from_uri("http://example.com/fake-sig").is_err());
    }
}
