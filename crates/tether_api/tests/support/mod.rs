#![allow(dead_code)]

use common::auth::{JwtAuthTokenProvider, JwtConfig};
use common::memory::InMemoryStore;
use rcgen::{CertificateParams, DnType, KeyPair, SerialNumber};
use std::sync::Arc;
use tether_api::DeviceService;

/// Self-signed DER certificate; issuer CN equals subject CN
pub fn device_certificate(serial: &[u8], issuer_cn: &str) -> Vec<u8> {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.serial_number = Some(SerialNumber::from_slice(serial));
    params.distinguished_name.push(DnType::CommonName, issuer_cn);
    params.self_signed(&key).unwrap().der().to_vec()
}

/// Re-encode the serial INTEGER of a DER certificate with one extra leading
/// zero byte. The signature no longer verifies; parsing does not check it.
pub fn pad_serial_encoding(der: &[u8]) -> Vec<u8> {
    fn read_len(buf: &[u8], at: usize) -> (usize, usize) {
        let first = buf[at] as usize;
        if first < 0x80 {
            return (first, 1);
        }
        let n = first & 0x7f;
        let len = buf[at + 1..at + 1 + n]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        (len, 1 + n)
    }

    fn encode_len(len: usize) -> Vec<u8> {
        if len < 0x80 {
            return vec![len as u8];
        }
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        let mut out = vec![0x80 | bytes.len() as u8];
        out.extend(bytes);
        out
    }

    fn sequence(body: Vec<u8>) -> Vec<u8> {
        let mut out = vec![0x30];
        out.extend(encode_len(body.len()));
        out.extend(body);
        out
    }

    let (cert_len, cert_hdr) = read_len(der, 1);
    let cert_end = 1 + cert_hdr + cert_len;
    let tbs_at = 1 + cert_hdr;
    let (tbs_len, tbs_hdr) = read_len(der, tbs_at + 1);
    let tbs_body = tbs_at + 1 + tbs_hdr;
    let tbs_end = tbs_body + tbs_len;

    // [0] EXPLICIT version precedes the serial in v3 certificates
    assert_eq!(der[tbs_body], 0xA0);
    let (version_len, version_hdr) = read_len(der, tbs_body + 1);
    let serial_at = tbs_body + 1 + version_hdr + version_len;
    assert_eq!(der[serial_at], 0x02);
    let serial_len = der[serial_at + 1] as usize;
    let serial_end = serial_at + 2 + serial_len;

    let mut body = der[tbs_body..serial_at].to_vec();
    body.extend([0x02, serial_len as u8 + 1, 0x00]);
    body.extend(&der[serial_at + 2..serial_end]);
    body.extend(&der[serial_end..tbs_end]);

    let mut cert_body = sequence(body);
    cert_body.extend(&der[tbs_end..cert_end]);
    sequence(cert_body)
}

pub fn service_with_store() -> (Arc<DeviceService>, InMemoryStore) {
    let store = InMemoryStore::new();
    let service = DeviceService::new(Arc::new(store.clone()), Arc::new(store.clone()));
    (Arc::new(service), store)
}

pub fn token_provider() -> JwtAuthTokenProvider {
    JwtAuthTokenProvider::new(JwtConfig::new(
        "integration-test-secret".to_string(),
        3600,
        "tether".to_string(),
    ))
}
