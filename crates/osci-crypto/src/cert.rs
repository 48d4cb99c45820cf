#![forbid(unsafe_code)]

//! Public key extraction from X.509 certificates.

use crate::sign::VerifierKey;
use der::{Decode, Encode};
use osci_core::Error;
use x509_cert::Certificate;

// rsaEncryption: 1.2.840.113549.1.1.1
const RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
// id-ecPublicKey: 1.2.840.10045.2.1
const EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
// Named curves: P-256, P-384
const CURVE_P256: &str = "1.2.840.10045.3.1.7";
const CURVE_P384: &str = "1.3.132.0.34";

fn subject_spki(cert_der: &[u8]) -> Result<(spki::SubjectPublicKeyInfoOwned, Vec<u8>), Error> {
    let cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
    let spki = cert.tbs_certificate.subject_public_key_info;
    let spki_der = spki
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;
    Ok((spki, spki_der))
}

/// Extract the subject public key of a DER-encoded certificate as a
/// verification key. RSA, EC P-256 and EC P-384 keys are supported.
pub fn verifier_from_certificate(cert_der: &[u8]) -> Result<VerifierKey, Error> {
    use spki::DecodePublicKey;

    let (spki, spki_der) = subject_spki(cert_der)?;

    match spki.algorithm.oid.to_string().as_str() {
        RSA_ENCRYPTION => {
            let pk = rsa::RsaPublicKey::from_public_key_der(&spki_der)
                .map_err(|e| Error::Certificate(format!("invalid RSA public key: {e}")))?;
            Ok(VerifierKey::Rsa(pk))
        }
        EC_PUBLIC_KEY => {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.decode_as::<der::asn1::ObjectIdentifier>().ok())
                .map(|oid| oid.to_string())
                .unwrap_or_default();
            match curve_oid.as_str() {
                CURVE_P256 => {
                    let vk = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
                        .map_err(|e| Error::Certificate(format!("invalid EC P-256 key: {e}")))?;
                    Ok(VerifierKey::EcP256(vk))
                }
                CURVE_P384 => {
                    let vk = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
                        .map_err(|e| Error::Certificate(format!("invalid EC P-384 key: {e}")))?;
                    Ok(VerifierKey::EcP384(vk))
                }
                _ => Err(Error::Certificate(format!(
                    "unsupported EC curve: {curve_oid}"
                ))),
            }
        }
        oid => Err(Error::Certificate(format!(
            "unsupported public key algorithm: {oid}"
        ))),
    }
}

/// Extract an RSA public key from a DER-encoded certificate, for key
/// transport. Fails for non-RSA certificates.
pub fn rsa_public_key_from_certificate(cert_der: &[u8]) -> Result<rsa::RsaPublicKey, Error> {
    match verifier_from_certificate(cert_der)? {
        VerifierKey::Rsa(pk) => Ok(pk),
        _ => Err(Error::Certificate(
            "key transport requires an RSA certificate".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Self-signed test certificates, DER as base64.
    const RSA_CERT: &str = "
        MIIDETCCAfmgAwIBAgIUQ7MTNLioGKp6txzes9Nqx1HA9+YwDQYJKoZIhvcNAQEL
        BQAwGDEWMBQGA1UEAwwNb3NjaS10ZXN0LXJzYTAeFw0yNjA4MjkxOTQxNDhaFw0z
        NjA4MjYxOTQxNDhaMBgxFjAUBgNVBAMMDW9zY2ktdGVzdC1yc2EwggEiMA0GCSqG
        SIb3DQEBAQUAA4IBDwAwggEKAoIBAQDp4+jd6LJPVzT0AJN+p2iNqNw3s8zqH75L
        E5nS+UGkj6Ku3y23r09iRjQUKSv9weUXNRsxzfkbv4V0niMMMMIk26dWvUsNACHB
        S9dNytVCPtfDnsUAaSmWIsqI9CFJECzMMBild2agl8vAFR+Sb57S3fdp1HzFakeB
        O+jMJ7eTkDzhvWG4/Qq20OYkaepc4FcFggywLreOtC9lH2wrNT6ePZUvUN5DIpJy
        o47u1nC3xAXta1dYjFyxq6dZR3j3u3MfPlhQJCN28hubxT8paeDDZyS6i5mQUb1i
        8QFxJHr7u6WWr291TgjnRXkObtLzHgzab1BScRo8wRSb2TzszIeHAgMBAAGjUzBR
        MB0GA1UdDgQWBBRBbfKd3EUhzHfox3YM+g/1YgnwyTAfBgNVHSMEGDAWgBRBbfKd
        3EUhzHfox3YM+g/1YgnwyTAPBgNVHRMBAf8EBTADAQH/MA0GCSqGSIb3DQEBCwUA
        A4IBAQDn5TE+EyXF8FkcVRV8qomhhiEaPIcNRk9e9zctvxtM+tqa+NZir52sFOPy
        nOyGmUKe9AvsbBvm0II5Vv8DlnazL0YWntPBaZlH+aC3vVbPs0ED5yeDZ5zELLyO
        NCJftqwQ9lf4jx2maMj5O1yu5GN4Xc5b+ofxjz2ijfGYRrjx9BZgHamQTHQ3j/ub
        82I4tvz377gJ8x/5m+rzLS/+5MnL2qRSzC//uSuWzX8YAWJO5h544UTLwhYXZ/TR
        wAJC5GEdtRAKHE6i7kCx3bScXeAYnVr5HDrAoWVJ0vh9bt/BdJZQU+nxAYLewzJn
        9Y95AgGBp4w/lAFHOgC7u6REECIr";

    const P256_CERT: &str = "
        MIIBhzCCAS2gAwIBAgIUMvuxmashHyiDviW5gB2mtuMEwF8wCgYIKoZIzj0EAwIw
        GTEXMBUGA1UEAwwOb3NjaS10ZXN0LXAyNTYwHhcNMjYwODI5MTk0MTQ4WhcNMzYw
        ODI2MTk0MTQ4WjAZMRcwFQYDVQQDDA5vc2NpLXRlc3QtcDI1NjBZMBMGByqGSM49
        AgEGCCqGSM49AwEHA0IABEkZgqfFyXkcMWpfbJPD+ztnFsIXP3f0yV7eXIHLWovY
        jTtqn3FJEVAqVb0xUbWDTWq0RrhagYp8vT5WDjUmXWWjUzBRMB0GA1UdDgQWBBR7
        CccDqNvqgEI6ZKzRWPpbkwndlzAfBgNVHSMEGDAWgBR7CccDqNvqgEI6ZKzRWPpb
        kwndlzAPBgNVHRMBAf8EBTADAQH/MAoGCCqGSM49BAMCA0gAMEUCIHB4g+o5SN4O
        x/zlDr4TjU9JA8FBJx+zATEGfZYDBUAXAiEAhjcNreNe1ixe/TgvzLn0bFXsFQa2
        O8OwM+URZ4Om/mk=";

    const P384_CERT: &str = "
        MIIBxTCCAUqgAwIBAgIUXZ815JL/30Tivxq3lBSPSrcVW4MwCgYIKoZIzj0EAwMw
        GTEXMBUGA1UEAwwOb3NjaS10ZXN0LXAzODQwHhcNMjYwODI5MTk0MTQ4WhcNMzYw
        ODI2MTk0MTQ4WjAZMRcwFQYDVQQDDA5vc2NpLXRlc3QtcDM4NDB2MBAGByqGSM49
        AgEGBSuBBAAiA2IABEo5hx+LoDVUkam8eTbdLgEitEpKbsvpQXgiuGfctYCyyWCZ
        4yN2unraAz+J7EtgVUR2HUFFS6DwCVyvpLxf8fVRhERNfnWeEVjVzifXMGi2MjBw
        Dm2wH/0MClJIqAHFg6NTMFEwHQYDVR0OBBYEFO5/887HHDF36WuR8tEfquO9umkC
        MB8GA1UdIwQYMBaAFO5/887HHDF36WuR8tEfquO9umkCMA8GA1UdEwEB/wQFMAMB
        Af8wCgYIKoZIzj0EAwMDaQAwZgIxAPKXQpy75Q9pm0PXK4Y3Z7pAOSI4aSgUFbsQ
        AMb8Q6TL6u5s3EsRSidkBS8u+zXXLgIxAKQnosh8QEYnbMBVwkje3dPiQvjQi/Gm
        pTpiYsnjxLG4vamFvbNv8VB9h9qIjvD7vw==";

    fn decode_cert(b64: &str) -> Vec<u8> {
        use base64::Engine;

        let compact: String = b64.split_whitespace().collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .unwrap()
    }

    #[test]
    fn test_garbage_der_rejected() {
        assert!(verifier_from_certificate(b"not a certificate").is_err());
    }

    #[test]
    fn test_rsa_certificate_key_extraction() {
        let vk = verifier_from_certificate(&decode_cert(RSA_CERT)).unwrap();
        assert!(matches!(vk, VerifierKey::Rsa(_)));
    }

    #[test]
    fn test_p256_certificate_key_extraction() {
        let vk = verifier_from_certificate(&decode_cert(P256_CERT)).unwrap();
        assert!(matches!(vk, VerifierKey::EcP256(_)));
    }

    #[test]
    fn test_p384_certificate_key_extraction() {
        let vk = verifier_from_certificate(&decode_cert(P384_CERT)).unwrap();
        assert!(matches!(vk, VerifierKey::EcP384(_)));
    }

    #[test]
    fn test_key_transport_requires_rsa() {
        assert!(rsa_public_key_from_certificate(&decode_cert(RSA_CERT)).is_ok());
        assert!(rsa_public_key_from_certificate(&decode_cert(P256_CERT)).is_err());
    }
}
