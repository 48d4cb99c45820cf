#![forbid(unsafe_code)]

//! Digest (hash) algorithm implementations and the digesting sink.

use digest::Digest;
use osci_core::{algorithm, Error};
use std::io::Write;

/// Trait for digest algorithms.
pub trait DigestAlgorithm: Send {
    /// Feed data into the hash.
    fn update(&mut self, data: &[u8]);
    /// Finalize and return the hash value.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// Algorithm URI.
    fn uri(&self) -> &'static str;
}

/// Create a digest algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn DigestAlgorithm>, Error> {
    match uri {
        algorithm::SHA1 => Ok(Box::new(Sha1Digest::new())),
        algorithm::SHA256 => Ok(Box::new(Sha256Digest::new())),
        algorithm::SHA512 => Ok(Box::new(Sha512Digest::new())),
        algorithm::RIPEMD160 => Ok(Box::new(Ripemd160Digest::new())),
        algorithm::SHA3_256 => Ok(Box::new(Sha3_256Digest::new())),
        algorithm::SHA3_384 => Ok(Box::new(Sha3_384Digest::new())),
        algorithm::SHA3_512 => Ok(Box::new(Sha3_512Digest::new())),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "digest algorithm: {uri}"
        ))),
    }
}

/// Compute a digest in one shot.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut hasher = from_uri(uri)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

// ── Concrete implementations ─────────────────────────────────────────

macro_rules! impl_digest {
    ($name:ident, $hasher:ty, $uri:expr) => {
        struct $name {
            inner: $hasher,
        }

        impl $name {
            fn new() -> Self {
                Self {
                    inner: <$hasher>::new(),
                }
            }
        }

        impl DigestAlgorithm for $name {
            fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.inner, data);
            }

            fn finalize(self: Box<Self>) -> Vec<u8> {
                Digest::finalize(self.inner).to_vec()
            }

            fn uri(&self) -> &'static str {
                $uri
            }
        }
    };
}

impl_digest!(Sha1Digest, sha1::Sha1, algorithm::SHA1);
impl_digest!(Sha256Digest, sha2::Sha256, algorithm::SHA256);
impl_digest!(Sha512Digest, sha2::Sha512, algorithm::SHA512);
impl_digest!(Ripemd160Digest, ripemd::Ripemd160, algorithm::RIPEMD160);
impl_digest!(Sha3_256Digest, sha3::Sha3_256, algorithm::SHA3_256);
impl_digest!(Sha3_384Digest, sha3::Sha3_384, algorithm::SHA3_384);
impl_digest!(Sha3_512Digest, sha3::Sha3_512, algorithm::SHA3_512);

// ── Digesting sink ───────────────────────────────────────────────────

/// A byte sink that forwards every byte unchanged to an inner writer and,
/// while enabled, additionally feeds a hash function.
///
/// One writer serves several disjoint hashed regions: `finish_digest`
/// returns the digest of the region hashed so far and re-initializes the
/// hash, so the next `enable` starts a fresh region. Bytes written while
/// disabled are forwarded but never hashed.
pub struct DigestWriter<W: Write> {
    inner: W,
    uri: String,
    hasher: Option<Box<dyn DigestAlgorithm>>,
    enabled: bool,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(inner: W, uri: &str) -> Result<Self, Error> {
        Ok(Self {
            inner,
            uri: uri.to_owned(),
            hasher: Some(from_uri(uri)?),
            enabled: false,
        })
    }

    /// Switch to a different digest algorithm, discarding any hash state.
    pub fn set_algorithm(&mut self, uri: &str) -> Result<(), Error> {
        self.hasher = Some(from_uri(uri)?);
        self.uri = uri.to_owned();
        Ok(())
    }

    pub fn algorithm(&self) -> &str {
        &self.uri
    }

    /// Start hashing subsequent writes.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Stop hashing; subsequent writes are forwarded only.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Finalize the current region's digest and reset for the next region.
    pub fn finish_digest(&mut self) -> Result<Vec<u8>, Error> {
        let hasher = self
            .hasher
            .take()
            .ok_or_else(|| Error::State("digest sink already finalized".into()))?;
        let value = hasher.finalize();
        self.hasher = Some(from_uri(&self.uri)?);
        self.enabled = false;
        Ok(value)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        if self.enabled {
            if let Some(hasher) = self.hasher.as_mut() {
                hasher.update(&buf[..n]);
            }
        }
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
