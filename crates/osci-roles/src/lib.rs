#![forbid(unsafe_code)]

//! Role capabilities: the identity/key-holder contract consumed by the
//! signature and encryption machinery. A role exposes its certificates,
//! signs bytes with its private signature key, and unwraps session keys
//! with its private cipher key. Everything else about identity management
//! lives outside this library.

use osci_crypto::keytransport::OaepParams;
use osci_crypto::{cert, keytransport, sign, SignerKey, VerifierKey};
use osci_core::Error;

/// The collaborator contract for signer and reader identities.
pub trait Role {
    /// DER-encoded certificate bound to the signature key.
    fn signature_certificate(&self) -> &[u8];

    /// DER-encoded certificate bound to the cipher (key transport) key.
    fn cipher_certificate(&self) -> &[u8];

    /// Sign `data` with the role's private signature key.
    fn sign(&self, data: &[u8], algorithm_uri: &str) -> Result<Vec<u8>, Error>;

    /// Unwrap a transported session key with the role's private cipher key.
    fn decrypt(
        &self,
        wrapped_key: &[u8],
        transport_uri: &str,
        params: Option<&OaepParams>,
    ) -> Result<Vec<u8>, Error>;

    /// Public key for verifying this role's signatures. The default
    /// implementation extracts it from the signature certificate.
    fn verifying_key(&self) -> Result<VerifierKey, Error> {
        cert::verifier_from_certificate(self.signature_certificate())
    }
}

/// A role whose keys live in memory. Used by embedding applications that
/// manage key material themselves, and by the test suite.
pub struct SoftwareRole {
    signature_key: SignerKey,
    signature_cert: Vec<u8>,
    cipher_key: Option<rsa::RsaPrivateKey>,
    cipher_cert: Vec<u8>,
}

impl SoftwareRole {
    pub fn new(signature_key: SignerKey, signature_cert: Vec<u8>) -> Self {
        Self {
            signature_key,
            signature_cert,
            cipher_key: None,
            cipher_cert: Vec::new(),
        }
    }

    pub fn with_cipher_key(mut self, key: rsa::RsaPrivateKey, cert: Vec<u8>) -> Self {
        self.cipher_key = Some(key);
        self.cipher_cert = cert;
        self
    }

    pub fn signature_key(&self) -> &SignerKey {
        &self.signature_key
    }
}

impl Role for SoftwareRole {
    fn signature_certificate(&self) -> &[u8] {
        &self.signature_cert
    }

    fn cipher_certificate(&self) -> &[u8] {
        &self.cipher_cert
    }

    fn sign(&self, data: &[u8], algorithm_uri: &str) -> Result<Vec<u8>, Error> {
        sign::from_uri(algorithm_uri)?.sign(&self.signature_key, data)
    }

    fn decrypt(
        &self,
        wrapped_key: &[u8],
        transport_uri: &str,
        params: Option<&OaepParams>,
    ) -> Result<Vec<u8>, Error> {
        let key = self
            .cipher_key
            .as_ref()
            .ok_or_else(|| Error::Key("role has no cipher key".into()))?;
        keytransport::decrypt_session_key(key, transport_uri, params, wrapped_key)
    }

    fn verifying_key(&self) -> Result<VerifierKey, Error> {
        // In-memory roles may carry synthetic certificates; the key pair
        // itself is authoritative.
        Ok(self.signature_key.verifier())
    }
}
