#![forbid(unsafe_code)]

//! The content-encryption state machine: CipherValue, CipherData and
//! EncryptedData.
//!
//! A CipherValue starts `Decrypted` and moves to `Encrypted` exactly once,
//! through a consuming transition; the secret key cannot be changed and the
//! transform never re-runs after that. CipherData enforces the
//! CipherValue/CipherReference mutual exclusivity at assignment time
//! because the object is filled incrementally while parsing.

use crate::container::ContentContainer;
use crate::part::{DigestCache, MessagePart};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use osci_c14n::XmlWriter;
use osci_core::{algorithm, ns, DialogConfig, Error};
use osci_crypto::{CipherReader, CipherWriter, SymCipher};
use std::io::Write;

/// A symmetric session key bound to its cipher descriptor.
#[derive(Clone)]
pub struct SessionKey {
    pub cipher: SymCipher,
    pub key: Vec<u8>,
}

impl SessionKey {
    /// Generate a fresh random key for `cipher_uri`. For GCM, `iv_length`
    /// selects the explicit IV size (12 when `None`).
    pub fn generate(cipher_uri: &str, iv_length: Option<usize>) -> Result<Self, Error> {
        let cipher = SymCipher::from_uri(cipher_uri, iv_length)?;
        let key = cipher.generate_key();
        Ok(Self { cipher, key })
    }
}

/// What a CipherValue encrypts: raw bytes, or a nested container that is
/// canonicalized and then encrypted as one pipeline.
pub enum CipherPayload {
    Raw(Vec<u8>),
    Container(ContentContainer),
}

/// Lifecycle: `Decrypted` (initial) → `Encrypted` (terminal).
pub enum CipherValue {
    Decrypted {
        payload: CipherPayload,
        key: Option<SessionKey>,
    },
    Encrypted {
        /// IV-framed ciphertext, before base64 encoding.
        data: Vec<u8>,
    },
}

impl CipherValue {
    pub fn decrypted(payload: CipherPayload) -> Self {
        CipherValue::Decrypted { payload, key: None }
    }

    /// Parse path: ciphertext recovered from the wire (base64-decoded).
    pub fn encrypted(data: Vec<u8>) -> Self {
        CipherValue::Encrypted { data }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, CipherValue::Encrypted { .. })
    }

    /// Set the session key. Once `Encrypted`, the key may not change.
    pub fn set_key(&mut self, session_key: SessionKey) -> Result<(), Error> {
        match self {
            CipherValue::Decrypted { key, .. } => {
                *key = Some(session_key);
                Ok(())
            }
            CipherValue::Encrypted { .. } => Err(Error::State(
                "cannot set a key on an already encrypted CipherValue".into(),
            )),
        }
    }

    /// Run the cipher transform: canonicalize (for container payloads),
    /// encrypt with IV framing, and move to the terminal state. Calling
    /// this on an `Encrypted` value returns it unchanged.
    pub fn encrypt(self, config: &DialogConfig) -> Result<CipherValue, Error> {
        let (payload, session_key) = match self {
            CipherValue::Encrypted { .. } => return Ok(self),
            CipherValue::Decrypted { payload, key } => {
                let key = key.ok_or_else(|| {
                    Error::Key("CipherValue has no session key to encrypt with".into())
                })?;
                (payload, key)
            }
        };
        let staging = config.swap_buffers.create();
        let mut writer = CipherWriter::new(&session_key.cipher, &session_key.key, staging)?;
        match &payload {
            CipherPayload::Raw(data) => writer.write_all(data)?,
            CipherPayload::Container(container) => container.write_canonical(&mut writer)?,
        }
        let staging = writer.finalize()?;
        Ok(CipherValue::Encrypted {
            data: staging.into_bytes(),
        })
    }

    /// The IV-framed ciphertext; a `State` error while still `Decrypted`.
    pub fn encrypted_bytes(&self) -> Result<&[u8], Error> {
        match self {
            CipherValue::Encrypted { data } => Ok(data),
            CipherValue::Decrypted { .. } => Err(Error::State(
                "CipherValue has not been encrypted yet".into(),
            )),
        }
    }

    /// Stream the plaintext. Cryptographic faults surface as end-of-stream,
    /// never as a distinguishable error.
    pub fn decrypt_reader<'a>(
        &'a self,
        session_key: &SessionKey,
    ) -> Result<CipherReader<&'a [u8]>, Error> {
        let data = self.encrypted_bytes()?;
        CipherReader::new(&session_key.cipher, &session_key.key, data)
    }
}

/// Exactly one of an inline CipherValue or an out-of-band CipherReference.
#[derive(Default)]
pub struct CipherData {
    value: Option<CipherValue>,
    reference: Option<String>,
}

impl CipherData {
    pub fn set_value(&mut self, value: CipherValue) -> Result<(), Error> {
        if self.reference.is_some() {
            return Err(Error::State(
                "CipherData already holds a CipherReference".into(),
            ));
        }
        if self.value.is_some() {
            return Err(Error::State("CipherData already holds a CipherValue".into()));
        }
        self.value = Some(value);
        Ok(())
    }

    pub fn set_reference(&mut self, cid_uri: &str) -> Result<(), Error> {
        if self.value.is_some() {
            return Err(Error::State(
                "CipherData already holds a CipherValue".into(),
            ));
        }
        if self.reference.is_some() {
            return Err(Error::State(
                "CipherData already holds a CipherReference".into(),
            ));
        }
        self.reference = Some(cid_uri.to_owned());
        Ok(())
    }

    pub fn value(&self) -> Option<&CipherValue> {
        self.value.as_ref()
    }

    pub fn take_value(&mut self) -> Option<CipherValue> {
        self.value.take()
    }

    pub fn put_value(&mut self, value: CipherValue) {
        self.value = Some(value);
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

/// An encrypted payload as it appears in a container: encryption method,
/// explicit IV length (with a flag recording whether the serialized form
/// carried it), key pointer and cipher data.
pub struct EncryptedData {
    ref_id: String,
    mime_type: Option<String>,
    method_uri: String,
    iv_length: usize,
    iv_length_present: bool,
    key_ref: Option<String>,
    cipher_data: CipherData,
    transforms: Vec<String>,
    cache: DigestCache,
}

impl EncryptedData {
    pub fn new(ref_id: &str, method_uri: &str, config: &DialogConfig) -> Result<Self, Error> {
        let is_gcm = algorithm::is_gcm(method_uri);
        let iv_length = match algorithm::iv_length(method_uri) {
            Some(fixed) => fixed,
            None if is_gcm => config.gcm_iv_length,
            None => {
                return Err(Error::UnsupportedAlgorithm(format!(
                    "encryption method: {method_uri}"
                )))
            }
        };
        Ok(Self {
            ref_id: ref_id.to_owned(),
            mime_type: None,
            method_uri: method_uri.to_owned(),
            iv_length,
            // New GCM encryptions always write the IVLength element.
            iv_length_present: is_gcm,
            key_ref: None,
            cipher_data: CipherData::default(),
            transforms: vec![algorithm::C14N.to_owned()],
            cache: DigestCache::default(),
        })
    }

    /// Parse path.
    pub fn from_wire(
        ref_id: &str,
        method_uri: &str,
        iv_length: usize,
        iv_length_present: bool,
        mime_type: Option<String>,
        key_ref: Option<String>,
    ) -> Self {
        Self {
            ref_id: ref_id.to_owned(),
            mime_type,
            method_uri: method_uri.to_owned(),
            iv_length,
            iv_length_present,
            key_ref,
            cipher_data: CipherData::default(),
            transforms: vec![algorithm::C14N.to_owned()],
            cache: DigestCache::default(),
        }
    }

    pub fn set_mime_type(&mut self, mime_type: &str) {
        self.mime_type = Some(mime_type.to_owned());
        self.cache.invalidate();
    }

    pub fn set_key_ref(&mut self, uri: &str) {
        self.key_ref = Some(uri.to_owned());
        self.cache.invalidate();
    }

    pub fn set_cipher_value(&mut self, value: CipherValue) -> Result<(), Error> {
        self.cipher_data.set_value(value)?;
        self.cache.invalidate();
        Ok(())
    }

    pub fn set_cipher_reference(&mut self, cid_uri: &str) -> Result<(), Error> {
        self.cipher_data.set_reference(cid_uri)?;
        self.cache.invalidate();
        Ok(())
    }

    pub fn method_uri(&self) -> &str {
        &self.method_uri
    }

    pub fn iv_length(&self) -> usize {
        self.iv_length
    }

    pub fn iv_length_present(&self) -> bool {
        self.iv_length_present
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn key_ref(&self) -> Option<&str> {
        self.key_ref.as_deref()
    }

    pub fn cipher_data(&self) -> &CipherData {
        &self.cipher_data
    }

    /// The cipher descriptor for this element's method and IV length.
    pub fn sym_cipher(&self) -> Result<SymCipher, Error> {
        SymCipher::from_uri(&self.method_uri, Some(self.iv_length))
    }

    /// Run the inline CipherValue's encryption transform in place.
    pub fn encrypt(&mut self, config: &DialogConfig) -> Result<(), Error> {
        let value = self
            .cipher_data
            .take_value()
            .ok_or_else(|| Error::State("EncryptedData holds no CipherValue".into()))?;
        let encrypted = value.encrypt(config)?;
        self.cipher_data.put_value(encrypted);
        self.cache.invalidate();
        Ok(())
    }
}

/// A transported session key: the key-transport algorithm, the wrapped
/// key bytes, and a pointer to the recipient certificate. The wrapping
/// itself happens in `osci-crypto`; this type only carries the result.
pub struct EncryptedKey {
    ref_id: String,
    transport_uri: String,
    mgf_uri: Option<String>,
    key_ref: Option<String>,
    wrapped_key: Vec<u8>,
    transforms: Vec<String>,
    cache: DigestCache,
}

impl EncryptedKey {
    pub fn new(ref_id: &str, transport_uri: &str, wrapped_key: Vec<u8>) -> Self {
        Self {
            ref_id: ref_id.to_owned(),
            transport_uri: transport_uri.to_owned(),
            mgf_uri: None,
            key_ref: None,
            wrapped_key,
            transforms: vec![algorithm::C14N.to_owned()],
            cache: DigestCache::default(),
        }
    }

    /// Explicit mask generation function, enc11 RSA-OAEP only.
    pub fn set_mgf(&mut self, uri: &str) {
        self.mgf_uri = Some(uri.to_owned());
        self.cache.invalidate();
    }

    pub fn set_key_ref(&mut self, uri: &str) {
        self.key_ref = Some(uri.to_owned());
        self.cache.invalidate();
    }

    pub fn transport_uri(&self) -> &str {
        &self.transport_uri
    }

    pub fn mgf_uri(&self) -> Option<&str> {
        self.mgf_uri.as_deref()
    }

    pub fn key_ref(&self) -> Option<&str> {
        self.key_ref.as_deref()
    }

    pub fn wrapped_key(&self) -> &[u8] {
        &self.wrapped_key
    }
}

impl MessagePart for EncryptedKey {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn transforms(&self) -> &[String] {
        &self.transforms
    }

    fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error> {
        let mut w = XmlWriter::new();
        w.start_element(
            "xenc:EncryptedKey",
            &[("xmlns:xenc", ns::ENC), (ns::attr::ID, &self.ref_id)],
        );
        w.start_element(
            "xenc:EncryptionMethod",
            &[(ns::attr::ALGORITHM, &self.transport_uri)],
        );
        if let Some(mgf) = &self.mgf_uri {
            w.empty_element(
                "xenc11:MGF",
                &[("xmlns:xenc11", ns::ENC11), (ns::attr::ALGORITHM, mgf)],
            )?;
        }
        w.end_element()?;
        if let Some(key_ref) = &self.key_ref {
            w.start_element("ds:KeyInfo", &[("xmlns:ds", ns::DSIG)]);
            w.empty_element("ds:RetrievalMethod", &[(ns::attr::URI, key_ref)])?;
            w.end_element()?;
        }
        w.start_element("xenc:CipherData", &[]);
        w.text_element("xenc:CipherValue", &[], &BASE64.encode(&self.wrapped_key))?;
        w.end_element()?;
        w.end_element()?;
        sink.write_all(&w.into_bytes()?)?;
        Ok(())
    }

    fn digest_cache(&self) -> &DigestCache {
        &self.cache
    }
}

impl MessagePart for EncryptedData {
    fn ref_id(&self) -> &str {
        &self.ref_id
    }

    fn transforms(&self) -> &[String] {
        &self.transforms
    }

    /// EncryptedData is digested over its serialized, already-encrypted
    /// form; the plaintext never reaches a digest.
    fn write_canonical(&self, sink: &mut dyn Write) -> Result<(), Error> {
        let mut w = XmlWriter::new();
        let mut attrs: Vec<(&str, &str)> = vec![("xmlns:xenc", ns::ENC), (ns::attr::ID, &self.ref_id)];
        if let Some(mime) = &self.mime_type {
            attrs.push((ns::attr::MIME_TYPE, mime));
        }
        w.start_element("xenc:EncryptedData", &attrs);

        w.start_element(
            "xenc:EncryptionMethod",
            &[(ns::attr::ALGORITHM, &self.method_uri)],
        );
        if self.iv_length_present {
            let value = self.iv_length.to_string();
            w.empty_element(
                "osci2017:IVLength",
                &[("xmlns:osci2017", ns::OSCI2017), (ns::attr::VALUE, &value)],
            )?;
        }
        w.end_element()?;

        if let Some(key_ref) = &self.key_ref {
            w.start_element("ds:KeyInfo", &[("xmlns:ds", ns::DSIG)]);
            w.empty_element("ds:RetrievalMethod", &[(ns::attr::URI, key_ref)])?;
            w.end_element()?;
        }

        w.start_element("xenc:CipherData", &[]);
        if let Some(reference) = self.cipher_data.reference() {
            w.empty_element("xenc:CipherReference", &[(ns::attr::URI, reference)])?;
        } else if let Some(value) = self.cipher_data.value() {
            let data = value.encrypted_bytes()?;
            w.text_element("xenc:CipherValue", &[], &BASE64.encode(data))?;
        } else {
            return Err(Error::State(
                "EncryptedData holds neither CipherValue nor CipherReference".into(),
            ));
        }
        w.end_element()?;

        w.end_element()?;
        sink.write_all(&w.into_bytes()?)?;
        Ok(())
    }

    fn digest_cache(&self) -> &DigestCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_cipher_value_lifecycle() {
        let config = DialogConfig::default();
        let key = SessionKey::generate(algorithm::AES256_GCM, None).unwrap();

        let mut value = CipherValue::decrypted(CipherPayload::Raw(b"secret".to_vec()));
        value.set_key(key.clone()).unwrap();
        let value = value.encrypt(&config).unwrap();
        assert!(value.is_encrypted());

        let mut plain = Vec::new();
        value
            .decrypt_reader(&key)
            .unwrap()
            .read_to_end(&mut plain)
            .unwrap();
        assert_eq!(plain, b"secret");
    }

    #[test]
    fn test_key_frozen_after_encryption() {
        let config = DialogConfig::default();
        let key = SessionKey::generate(algorithm::AES128_CBC, None).unwrap();
        let mut value = CipherValue::decrypted(CipherPayload::Raw(b"x".to_vec()));
        value.set_key(key.clone()).unwrap();
        let mut value = value.encrypt(&config).unwrap();
        assert!(matches!(value.set_key(key), Err(Error::State(_))));
    }

    #[test]
    fn test_encrypt_is_idempotent_once() {
        let config = DialogConfig::default();
        let key = SessionKey::generate(algorithm::AES128_CBC, None).unwrap();
        let mut value = CipherValue::decrypted(CipherPayload::Raw(b"x".to_vec()));
        value.set_key(key).unwrap();
        let value = value.encrypt(&config).unwrap();
        let before = value.encrypted_bytes().unwrap().to_vec();
        let value = value.encrypt(&config).unwrap();
        assert_eq!(value.encrypted_bytes().unwrap(), before.as_slice());
    }

    #[test]
    fn test_encrypt_without_key() {
        let config = DialogConfig::default();
        let value = CipherValue::decrypted(CipherPayload::Raw(b"x".to_vec()));
        assert!(matches!(value.encrypt(&config), Err(Error::Key(_))));
    }

    #[test]
    fn test_cipher_data_mutual_exclusivity() {
        let mut data = CipherData::default();
        data.set_value(CipherValue::encrypted(vec![1, 2, 3])).unwrap();
        assert!(matches!(
            data.set_reference("cid:att"),
            Err(Error::State(_))
        ));

        let mut data = CipherData::default();
        data.set_reference("cid:att").unwrap();
        assert!(matches!(
            data.set_value(CipherValue::encrypted(vec![1])),
            Err(Error::State(_))
        ));
    }

    #[test]
    fn test_encrypted_data_serialization() {
        let config = DialogConfig::default();
        let mut ed = EncryptedData::new("ed1", algorithm::AES256_GCM, &config).unwrap();
        assert_eq!(ed.iv_length(), 12);
        assert!(ed.iv_length_present());

        let key = SessionKey::generate(algorithm::AES256_GCM, None).unwrap();
        let mut value = CipherValue::decrypted(CipherPayload::Raw(b"payload".to_vec()));
        value.set_key(key).unwrap();
        ed.set_cipher_value(value).unwrap();
        ed.encrypt(&config).unwrap();

        let mut buf = Vec::new();
        ed.write_canonical(&mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains(&format!(
            r#"<xenc:EncryptionMethod Algorithm="{}">"#,
            algorithm::AES256_GCM
        )));
        assert!(xml.contains(r#"Value="12""#));
        assert!(xml.contains("<xenc:CipherValue>"));
    }

    #[test]
    fn test_encrypted_key_serialization() {
        let mut ek = EncryptedKey::new("ek1", algorithm::RSA_OAEP_ENC11, vec![1, 2, 3]);
        ek.set_mgf(algorithm::MGF1_SHA256);
        ek.set_key_ref("#reader-cert");
        let mut buf = Vec::new();
        ek.write_canonical(&mut buf).unwrap();
        let xml = String::from_utf8(buf).unwrap();
        assert!(xml.contains(&format!(
            r#"<xenc:EncryptionMethod Algorithm="{}">"#,
            algorithm::RSA_OAEP_ENC11
        )));
        assert!(xml.contains(&format!(
            r#"<xenc11:MGF xmlns:xenc11="{}" Algorithm="{}">"#,
            ns::ENC11,
            algorithm::MGF1_SHA256
        )));
        assert!(xml.contains("<xenc:CipherValue>AQID</xenc:CipherValue>"));
    }

    #[test]
    fn test_cbc_has_no_iv_length_element() {
        let config = DialogConfig::default();
        let ed = EncryptedData::new("ed1", algorithm::AES256_CBC, &config).unwrap();
        assert_eq!(ed.iv_length(), 16);
        assert!(!ed.iv_length_present());
    }
}
