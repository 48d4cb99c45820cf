#![forbid(unsafe_code)]

//! Streaming symmetric cipher pair with IV framing.
//!
//! The encrypting writer generates the IV, emits it before any ciphertext,
//! and streams the payload through the block cipher; the decrypting reader
//! consumes exactly the IV length first and then yields plaintext. IV
//! lengths: 8 bytes for 3DES-CBC, 16 for AES-CBC, explicit 12 or 16 for
//! AES-GCM (carried on the wire by the `IVLength` element).

use osci_core::{algorithm, Error};
use rand::RngCore;
use std::io::{Read, Write};

/// Descriptor for a symmetric cipher: URI, key length and IV length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymCipher {
    uri: &'static str,
    key_len: usize,
    iv_len: usize,
}

impl SymCipher {
    /// Resolve a cipher from its URI.
    ///
    /// `iv_len` is only consulted for the GCM family, where the length is
    /// explicit on the wire; CBC-family lengths are fixed. A GCM cipher
    /// without an explicit length uses 12 bytes (the AEAD-native size).
    pub fn from_uri(uri: &str, iv_len: Option<usize>) -> Result<Self, Error> {
        let (uri, key_len): (&'static str, usize) = match uri {
            algorithm::TRIPLEDES_CBC => (algorithm::TRIPLEDES_CBC, 24),
            algorithm::AES128_CBC => (algorithm::AES128_CBC, 16),
            algorithm::AES192_CBC => (algorithm::AES192_CBC, 24),
            algorithm::AES256_CBC => (algorithm::AES256_CBC, 32),
            algorithm::AES128_GCM => (algorithm::AES128_GCM, 16),
            algorithm::AES192_GCM => (algorithm::AES192_GCM, 24),
            algorithm::AES256_GCM => (algorithm::AES256_GCM, 32),
            _ => return Err(Error::UnsupportedAlgorithm(format!("cipher: {uri}"))),
        };
        let iv_len = match algorithm::iv_length(uri) {
            Some(fixed) => fixed,
            None => {
                let n = iv_len.unwrap_or(12);
                if n != 12 && n != 16 {
                    return Err(Error::Crypto(format!("AES-GCM IV length must be 12 or 16, got {n}")));
                }
                n
            }
        };
        Ok(Self { uri, key_len, iv_len })
    }

    pub fn uri(&self) -> &'static str {
        self.uri
    }

    pub fn key_length(&self) -> usize {
        self.key_len
    }

    pub fn iv_length(&self) -> usize {
        self.iv_len
    }

    pub fn is_gcm(&self) -> bool {
        algorithm::is_gcm(self.uri)
    }

    /// Generate a random session key of the right size.
    pub fn generate_key(&self) -> Vec<u8> {
        let mut key = vec![0u8; self.key_len];
        rand::thread_rng().fill_bytes(&mut key);
        key
    }

    fn check_key(&self, key: &[u8]) -> Result<(), Error> {
        if key.len() != self.key_len {
            return Err(Error::Crypto(format!(
                "expected {} byte key for {}, got {}",
                self.key_len,
                self.uri,
                key.len()
            )));
        }
        Ok(())
    }
}

// ── Encrypting writer ────────────────────────────────────────────────

/// Byte sink that encrypts everything written to it.
///
/// The IV is generated and written to the inner sink on construction.
/// `finalize` must be called to emit the trailing block (CBC padding, GCM
/// ciphertext and tag); dropping the writer without it corrupts the tail
/// of the stream.
pub struct CipherWriter<W: Write> {
    inner: W,
    engine: EncryptEngine,
}

enum EncryptEngine {
    Cbc {
        enc: CbcEnc,
        block: usize,
        buf: Vec<u8>,
    },
    // GCM produces its authentication tag over the whole message, so the
    // plaintext is staged until finalize.
    Gcm {
        key: Vec<u8>,
        iv: Vec<u8>,
        plain: Vec<u8>,
    },
}

impl<W: Write> CipherWriter<W> {
    pub fn new(cipher: &SymCipher, key: &[u8], mut inner: W) -> Result<Self, Error> {
        cipher.check_key(key)?;
        let mut iv = vec![0u8; cipher.iv_length()];
        rand::thread_rng().fill_bytes(&mut iv);
        inner.write_all(&iv)?;

        let engine = if cipher.is_gcm() {
            EncryptEngine::Gcm {
                key: key.to_vec(),
                iv,
                plain: Vec::new(),
            }
        } else {
            let enc = CbcEnc::new(cipher.uri(), key, &iv)?;
            let block = enc.block_size();
            EncryptEngine::Cbc {
                enc,
                block,
                buf: Vec::new(),
            }
        };
        Ok(Self { inner, engine })
    }

    /// Emit the trailing cipher block and return the inner sink.
    pub fn finalize(mut self) -> Result<W, Error> {
        match self.engine {
            EncryptEngine::Cbc {
                mut enc,
                block,
                mut buf,
            } => {
                // PKCS#7: a full padding block is appended even when the
                // plaintext is block-aligned.
                let pad_len = block - (buf.len() % block);
                buf.extend(std::iter::repeat(pad_len as u8).take(pad_len));
                for chunk in buf.chunks_mut(block) {
                    enc.encrypt_block(chunk);
                }
                self.inner.write_all(&buf)?;
            }
            EncryptEngine::Gcm { key, iv, plain } => {
                let ct = gcm_seal(&key, &iv, &plain)?;
                self.inner.write_all(&ct)?;
            }
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        match &mut self.engine {
            EncryptEngine::Cbc { enc, block, buf } => {
                buf.extend_from_slice(data);
                let full = (buf.len() / *block) * *block;
                if full > 0 {
                    let mut ready: Vec<u8> = buf.drain(..full).collect();
                    for chunk in ready.chunks_mut(*block) {
                        enc.encrypt_block(chunk);
                    }
                    self.inner.write_all(&ready)?;
                }
            }
            EncryptEngine::Gcm { plain, .. } => {
                plain.extend_from_slice(data);
            }
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

// ── Decrypting reader ────────────────────────────────────────────────

/// Byte source that decrypts an IV-framed cipher stream.
///
/// The whole stream is decrypted and authenticated before the first
/// plaintext byte is released. A cryptographic fault (bad padding, wrong
/// key, failed GCM tag) is indistinguishable from an empty stream: the
/// reader reports end-of-stream instead of an error, so callers cannot be
/// turned into a padding oracle.
pub struct CipherReader<R: Read> {
    cipher: SymCipher,
    key: Vec<u8>,
    state: ReadState<R>,
}

enum ReadState<R> {
    Pending(R),
    Ready(std::io::Cursor<Vec<u8>>),
    Failed,
}

impl<R: Read> CipherReader<R> {
    pub fn new(cipher: &SymCipher, key: &[u8], inner: R) -> Result<Self, Error> {
        cipher.check_key(key)?;
        Ok(Self {
            cipher: *cipher,
            key: key.to_vec(),
            state: ReadState::Pending(inner),
        })
    }

    fn decrypt_all(&self, inner: &mut R) -> Result<Vec<u8>, Error> {
        let mut data = Vec::new();
        inner.read_to_end(&mut data)?;

        let iv_len = self.cipher.iv_length();
        if data.len() < iv_len {
            return Err(Error::Crypto("cipher stream shorter than IV".into()));
        }
        let (iv, ct) = data.split_at(iv_len);

        if self.cipher.is_gcm() {
            gcm_open(&self.key, iv, ct)
        } else {
            cbc_decrypt(self.cipher.uri(), &self.key, iv, ct)
        }
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if matches!(self.state, ReadState::Pending(_)) {
            let mut inner = match std::mem::replace(&mut self.state, ReadState::Failed) {
                ReadState::Pending(r) => r,
                _ => unreachable!(),
            };
            match self.decrypt_all(&mut inner) {
                Ok(plain) => self.state = ReadState::Ready(std::io::Cursor::new(plain)),
                Err(Error::Io(e)) => return Err(e),
                Err(_) => {
                    // Deliberately opaque: see type-level docs.
                    self.state = ReadState::Failed;
                    return Ok(0);
                }
            }
        }
        match &mut self.state {
            ReadState::Ready(cursor) => cursor.read(buf),
            ReadState::Failed => Ok(0),
            ReadState::Pending(_) => unreachable!(),
        }
    }
}

// ── CBC engines ──────────────────────────────────────────────────────

enum CbcEnc {
    Aes128(cbc::Encryptor<aes::Aes128>),
    Aes192(cbc::Encryptor<aes::Aes192>),
    Aes256(cbc::Encryptor<aes::Aes256>),
    Tdes(cbc::Encryptor<des::TdesEde3>),
}

impl CbcEnc {
    fn new(uri: &str, key: &[u8], iv: &[u8]) -> Result<Self, Error> {
        use cbc::cipher::KeyIvInit;
        let init_err = |e| Error::Crypto(format!("CBC init: {e}"));
        match uri {
            algorithm::AES128_CBC => Ok(Self::Aes128(
                cbc::Encryptor::new_from_slices(key, iv).map_err(init_err)?,
            )),
            algorithm::AES192_CBC => Ok(Self::Aes192(
                cbc::Encryptor::new_from_slices(key, iv).map_err(init_err)?,
            )),
            algorithm::AES256_CBC => Ok(Self::Aes256(
                cbc::Encryptor::new_from_slices(key, iv).map_err(init_err)?,
            )),
            algorithm::TRIPLEDES_CBC => Ok(Self::Tdes(
                cbc::Encryptor::new_from_slices(key, iv).map_err(init_err)?,
            )),
            _ => Err(Error::UnsupportedAlgorithm(format!("CBC cipher: {uri}"))),
        }
    }

    fn block_size(&self) -> usize {
        match self {
            Self::Tdes(_) => 8,
            _ => 16,
        }
    }

    /// Encrypt one block in place; `block` must be exactly `block_size` long.
    fn encrypt_block(&mut self, block: &mut [u8]) {
        use cbc::cipher::generic_array::GenericArray;
        use cbc::cipher::BlockEncryptMut;
        match self {
            Self::Aes128(e) => e.encrypt_block_mut(GenericArray::from_mut_slice(block)),
            Self::Aes192(e) => e.encrypt_block_mut(GenericArray::from_mut_slice(block)),
            Self::Aes256(e) => e.encrypt_block_mut(GenericArray::from_mut_slice(block)),
            Self::Tdes(e) => e.encrypt_block_mut(GenericArray::from_mut_slice(block)),
        }
    }
}

fn cbc_decrypt(uri: &str, key: &[u8], iv: &[u8], ct: &[u8]) -> Result<Vec<u8>, Error> {
    use cbc::cipher::block_padding::NoPadding;
    use cbc::cipher::{BlockDecryptMut, KeyIvInit};

    let block = if uri == algorithm::TRIPLEDES_CBC { 8 } else { 16 };
    if ct.is_empty() || ct.len() % block != 0 {
        return Err(Error::Crypto("CBC ciphertext has invalid length".into()));
    }
    let mut buf = ct.to_vec();

    macro_rules! do_decrypt {
        ($cipher:ty) => {{
            let dec = cbc::Decryptor::<$cipher>::new_from_slices(key, iv)
                .map_err(|e| Error::Crypto(format!("CBC init: {e}")))?;
            dec.decrypt_padded_mut::<NoPadding>(&mut buf)
                .map_err(|e| Error::Crypto(format!("CBC decrypt: {e}")))?;
        }};
    }

    match uri {
        algorithm::AES128_CBC => do_decrypt!(aes::Aes128),
        algorithm::AES192_CBC => do_decrypt!(aes::Aes192),
        algorithm::AES256_CBC => do_decrypt!(aes::Aes256),
        algorithm::TRIPLEDES_CBC => do_decrypt!(des::TdesEde3),
        _ => return Err(Error::UnsupportedAlgorithm(format!("CBC cipher: {uri}"))),
    }

    strip_padding(&buf, block)
}

/// Remove block padding. Both PKCS#7 and ISO 10126 store the padding length
/// in the last byte; checking only that byte accepts either scheme.
fn strip_padding(data: &[u8], block_size: usize) -> Result<Vec<u8>, Error> {
    let pad_byte = *data
        .last()
        .ok_or_else(|| Error::Crypto("empty CBC plaintext".into()))?;
    let pad_len = pad_byte as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Err(Error::Crypto("invalid padding".into()));
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

// ── GCM ──────────────────────────────────────────────────────────────

fn gcm_seal(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::consts::{U12, U16};
    use aes_gcm::aead::generic_array::GenericArray;
    use aes_gcm::{aead::Aead, AesGcm, KeyInit};

    macro_rules! seal {
        ($aes:ty, $n:ty) => {{
            let cipher = AesGcm::<$aes, $n>::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?;
            cipher
                .encrypt(GenericArray::from_slice(iv), plaintext)
                .map_err(|_| Error::Crypto("AES-GCM encrypt failed".into()))
        }};
    }

    match (key.len(), iv.len()) {
        (16, 12) => seal!(aes::Aes128, U12),
        (16, 16) => seal!(aes::Aes128, U16),
        (24, 12) => seal!(aes::Aes192, U12),
        (24, 16) => seal!(aes::Aes192, U16),
        (32, 12) => seal!(aes::Aes256, U12),
        (32, 16) => seal!(aes::Aes256, U16),
        _ => Err(Error::Crypto("unsupported AES-GCM key/IV size".into())),
    }
}

fn gcm_open(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::consts::{U12, U16};
    use aes_gcm::aead::generic_array::GenericArray;
    use aes_gcm::{aead::Aead, AesGcm, KeyInit};

    macro_rules! open {
        ($aes:ty, $n:ty) => {{
            let cipher = AesGcm::<$aes, $n>::new_from_slice(key)
                .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?;
            cipher
                .decrypt(GenericArray::from_slice(iv), ciphertext)
                .map_err(|_| Error::Crypto("AES-GCM decrypt failed".into()))
        }};
    }

    match (key.len(), iv.len()) {
        (16, 12) => open!(aes::Aes128, U12),
        (16, 16) => open!(aes::Aes128, U16),
        (24, 12) => open!(aes::Aes192, U12),
        (24, 16) => open!(aes::Aes192, U16),
        (32, 12) => open!(aes::Aes256, U12),
        (32, 16) => open!(aes::Aes256, U16),
        _ => Err(Error::Crypto("unsupported AES-GCM key/IV size".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(uri: &str, iv_len: Option<usize>, plaintext: &[u8]) -> Vec<u8> {
        let cipher = SymCipher::from_uri(uri, iv_len).unwrap();
        let key = cipher.generate_key();

        let mut w = CipherWriter::new(&cipher, &key, Vec::new()).unwrap();
        w.write_all(plaintext).unwrap();
        let ct = w.finalize().unwrap();
        assert!(ct.len() >= cipher.iv_length());

        let mut r = CipherReader::new(&cipher, &key, ct.as_slice()).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, plaintext, "roundtrip failed for {uri}");
        ct
    }

    #[test]
    fn test_cbc_roundtrip_all_sizes() {
        let inputs: &[&[u8]] = &[
            b"",
            b"A",
            b"Exactly16bytes!!",
            b"a longer message spanning several cipher blocks without alignment",
        ];
        for uri in [
            algorithm::TRIPLEDES_CBC,
            algorithm::AES128_CBC,
            algorithm::AES192_CBC,
            algorithm::AES256_CBC,
        ] {
            for &pt in inputs {
                roundtrip(uri, None, pt);
            }
        }
    }

    #[test]
    fn test_gcm_roundtrip_both_iv_lengths() {
        let inputs: &[&[u8]] = &[b"", b"one block fits..", b"multi-block payload for GCM framing tests"];
        for uri in [algorithm::AES128_GCM, algorithm::AES192_GCM, algorithm::AES256_GCM] {
            for iv_len in [12usize, 16] {
                for &pt in inputs {
                    let ct = roundtrip(uri, Some(iv_len), pt);
                    // IV preamble + ciphertext + 16-byte tag
                    assert_eq!(ct.len(), iv_len + pt.len() + 16);
                }
            }
        }
    }

    #[test]
    fn test_iv_preamble_lengths() {
        assert_eq!(SymCipher::from_uri(algorithm::TRIPLEDES_CBC, None).unwrap().iv_length(), 8);
        assert_eq!(SymCipher::from_uri(algorithm::AES256_CBC, None).unwrap().iv_length(), 16);
        assert_eq!(SymCipher::from_uri(algorithm::AES256_GCM, None).unwrap().iv_length(), 12);
        assert_eq!(SymCipher::from_uri(algorithm::AES256_GCM, Some(16)).unwrap().iv_length(), 16);
        assert!(SymCipher::from_uri(algorithm::AES256_GCM, Some(13)).is_err());
    }

    #[test]
    fn test_streaming_writes_match_single_write() {
        let cipher = SymCipher::from_uri(algorithm::AES128_CBC, None).unwrap();
        let key = cipher.generate_key();
        let pt = b"streamed in several odd-sized chunks to exercise block buffering";

        let mut w = CipherWriter::new(&cipher, &key, Vec::new()).unwrap();
        for chunk in pt.chunks(7) {
            w.write_all(chunk).unwrap();
        }
        let ct = w.finalize().unwrap();

        let mut r = CipherReader::new(&cipher, &key, ct.as_slice()).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, pt);
    }

    #[test]
    fn test_corrupt_gcm_reads_as_empty() {
        let cipher = SymCipher::from_uri(algorithm::AES256_GCM, None).unwrap();
        let key = cipher.generate_key();
        let mut w = CipherWriter::new(&cipher, &key, Vec::new()).unwrap();
        w.write_all(b"authenticated payload").unwrap();
        let mut ct = w.finalize().unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;

        let mut r = CipherReader::new(&cipher, &key, ct.as_slice()).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty(), "fault must present as end-of-stream");
    }

    #[test]
    fn test_wrong_key_reads_as_empty() {
        let cipher = SymCipher::from_uri(algorithm::AES128_GCM, None).unwrap();
        let key = cipher.generate_key();
        let other = cipher.generate_key();
        let mut w = CipherWriter::new(&cipher, &key, Vec::new()).unwrap();
        w.write_all(b"secret").unwrap();
        let ct = w.finalize().unwrap();

        let mut r = CipherReader::new(&cipher, &other, ct.as_slice()).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_truncated_stream_reads_as_empty() {
        let cipher = SymCipher::from_uri(algorithm::AES128_CBC, None).unwrap();
        let key = cipher.generate_key();
        // Shorter than the IV itself.
        let mut r = CipherReader::new(&cipher, &key, &b"short"[..]).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_strip_padding() {
        let mut data = b"hello world!".to_vec();
        data.extend_from_slice(&[0xAB, 0xCD, 0xEF, 0x04]);
        assert_eq!(strip_padding(&data, 16).unwrap(), b"hello world!");
        assert!(strip_padding(&[17u8; 16], 16).is_err());
    }
}
