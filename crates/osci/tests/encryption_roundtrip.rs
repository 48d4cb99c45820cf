//! End-to-end content encryption: encrypt a container, serialize, reparse,
//! decrypt, and verify signatures over encrypted children.

use osci::core::algorithm;
use osci::crypto::{keytransport, SignerKey};
use osci::msg::{
    parse_content_container, parse_encrypted_data, parse_encrypted_key, ContainerChild,
    EncryptedData,
};
use osci::{
    check_signature, sign_container, CipherPayload, CipherValue, Content, ContentContainer,
    DialogConfig, EncryptedKey, MessagePart, Role, SessionKey, SoftwareRole,
};
use std::io::Read;

fn encrypted_container(config: &DialogConfig, key: &SessionKey) -> EncryptedData {
    let mut inner = ContentContainer::new("inner");
    inner.add_content(Content::raw("c1", b"confidential".to_vec()));

    let mut ed = EncryptedData::new("ed1", key.cipher.uri(), config).unwrap();
    let mut value = CipherValue::decrypted(CipherPayload::Container(inner));
    value.set_key(key.clone()).unwrap();
    ed.set_cipher_value(value).unwrap();
    ed.encrypt(config).unwrap();
    ed
}

fn decrypt_inner(ed: &EncryptedData, key: &SessionKey, config: &DialogConfig) -> ContentContainer {
    let value = ed.cipher_data().value().unwrap();
    let mut plain = Vec::new();
    value
        .decrypt_reader(key)
        .unwrap()
        .read_to_end(&mut plain)
        .unwrap();
    parse_content_container(std::str::from_utf8(&plain).unwrap(), &[], config).unwrap()
}

#[test]
fn container_encryption_roundtrip() {
    let config = DialogConfig::default();
    let key = SessionKey::generate(algorithm::AES256_GCM, None).unwrap();
    let ed = encrypted_container(&config, &key);

    let mut buf = Vec::new();
    ed.write_canonical(&mut buf).unwrap();
    let parsed = parse_encrypted_data(std::str::from_utf8(&buf).unwrap(), &config).unwrap();
    assert_eq!(parsed.iv_length(), 12);

    let inner = decrypt_inner(&parsed, &key, &config);
    match &inner.children()[0] {
        ContainerChild::Content(c) => match c.payload() {
            osci::msg::ContentPayload::Raw(data) => assert_eq!(data, b"confidential"),
            _ => panic!("expected raw payload"),
        },
        _ => panic!("expected content child"),
    }
}

#[test]
fn legacy_16_byte_gcm_iv_roundtrip() {
    let mut config = DialogConfig::default();
    config.gcm_iv_length = 16;
    let key = SessionKey::generate(algorithm::AES256_GCM, Some(16)).unwrap();
    let ed = encrypted_container(&config, &key);
    assert_eq!(ed.iv_length(), 16);

    let mut buf = Vec::new();
    ed.write_canonical(&mut buf).unwrap();
    let parsed = parse_encrypted_data(std::str::from_utf8(&buf).unwrap(), &config).unwrap();
    assert_eq!(parsed.iv_length(), 16);
    assert!(parsed.iv_length_present());

    let inner = decrypt_inner(&parsed, &key, &config);
    assert_eq!(inner.children().len(), 1);
}

#[test]
fn session_key_transport_through_role() {
    let config = DialogConfig::default();
    let signature_key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let cipher_key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let reader_public = cipher_key.to_public_key();
    let reader = SoftwareRole::new(SignerKey::Rsa(signature_key), b"cert-reader".to_vec())
        .with_cipher_key(cipher_key, b"cipher-cert".to_vec());

    let key = SessionKey::generate(algorithm::AES256_GCM, None).unwrap();
    let wrapped = keytransport::encrypt_session_key(
        &reader_public,
        algorithm::RSA_OAEP_ENC11,
        None,
        &key.key,
    )
    .unwrap();
    let mut ek = EncryptedKey::new("ek1", algorithm::RSA_OAEP_ENC11, wrapped);
    ek.set_key_ref("#reader-cert");
    let mut ek_xml = Vec::new();
    ek.write_canonical(&mut ek_xml).unwrap();

    let ed = encrypted_container(&config, &key);
    let mut buf = Vec::new();
    ed.write_canonical(&mut buf).unwrap();
    let parsed = parse_encrypted_data(std::str::from_utf8(&buf).unwrap(), &config).unwrap();

    // The receiving side unwraps the transported key and reconstructs the
    // session key with the parsed cipher descriptor.
    let ek = parse_encrypted_key(std::str::from_utf8(&ek_xml).unwrap(), &config).unwrap();
    let unwrapped = reader
        .decrypt(ek.wrapped_key(), ek.transport_uri(), None)
        .unwrap();
    let recovered = SessionKey {
        cipher: parsed.sym_cipher().unwrap(),
        key: unwrapped,
    };
    let inner = decrypt_inner(&parsed, &recovered, &config);
    assert_eq!(inner.children().len(), 1);
}

#[test]
fn signature_over_encrypted_child() {
    let config = DialogConfig::default();
    let key = SessionKey::generate(algorithm::AES256_CBC, None).unwrap();
    let signer_key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let signer = SoftwareRole::new(SignerKey::Rsa(signer_key), b"cert-signer".to_vec());

    let mut cc = ContentContainer::new("outer");
    cc.add_encrypted_data(encrypted_container(&config, &key));
    sign_container(&mut cc, &signer, &config, None).unwrap();

    let xml = cc.serialize().unwrap();
    let parsed = parse_content_container(&xml, &[], &config).unwrap();
    assert!(check_signature(&parsed, &signer).unwrap());

    // Tampering with the ciphertext breaks the signature over the
    // serialized encrypted form.
    let marker = "<xenc:CipherValue>";
    let pos = xml.find(marker).unwrap() + marker.len();
    let mut bytes = xml.into_bytes();
    bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(bytes).unwrap();
    let parsed = parse_content_container(&tampered, &[], &config).unwrap();
    assert!(!check_signature(&parsed, &signer).unwrap());
}
