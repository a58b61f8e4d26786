use crate::domain::{DeviceIdentity, DomainError, DomainResult};
use x509_parser::der_parser::asn1_rs::{Any, Tag};
use x509_parser::num_bigint::BigUint;
use x509_parser::prelude::*;

/// DER-encoded leaf certificate presented by the peer of a TLS connection.
///
/// Chain trust, validity period and revocation are the TLS layer's concern;
/// by the time a request carries one of these, the handshake has accepted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCertificate(pub Vec<u8>);

impl PeerCertificate {
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }
}

/// Structural checks on a client certificate: it must be present and parse,
/// and carry a serial number and an issuer common name.
pub fn validate_certificate(certificate: Option<&[u8]>) -> DomainResult<()> {
    let cert = parse_certificate(certificate)?;
    serial_number_of(&cert)?;
    issuer_common_name_of(&cert)?;
    Ok(())
}

/// Derive the device identity from a client certificate.
///
/// The serial number is rendered as uppercase hexadecimal without leading
/// zeros, so numerically equal serials map to the same identity regardless
/// of their DER encoding.
pub fn extract_device_identity(certificate: Option<&[u8]>) -> DomainResult<DeviceIdentity> {
    let cert = parse_certificate(certificate)?;

    Ok(DeviceIdentity {
        serial_number: serial_number_of(&cert)?,
        issuer_common_name: issuer_common_name_of(&cert)?,
    })
}

fn parse_certificate(certificate: Option<&[u8]>) -> DomainResult<X509Certificate<'_>> {
    let der = certificate
        .filter(|der| !der.is_empty())
        .ok_or_else(|| DomainError::InvalidCertificate("certificate is missing".to_string()))?;

    let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
        DomainError::InvalidCertificate(format!("failed to parse certificate: {}", e))
    })?;

    Ok(cert)
}

fn serial_number_of(cert: &X509Certificate<'_>) -> DomainResult<String> {
    if cert.tbs_certificate.raw_serial().is_empty() {
        return Err(DomainError::InvalidCertificate(
            "certificate serial number is missing".to_string(),
        ));
    }
    Ok(format_serial_number(&cert.tbs_certificate.serial))
}

fn issuer_common_name_of(cert: &X509Certificate<'_>) -> DomainResult<String> {
    let common_name = cert
        .tbs_certificate
        .issuer
        .iter_common_name()
        .next()
        .and_then(|cn| attribute_string(cn.attr_value()))
        .unwrap_or_default();
    let common_name = common_name.trim();

    if common_name.is_empty() {
        return Err(DomainError::InvalidCertificate(
            "certificate issuer common name is missing".to_string(),
        ));
    }
    Ok(common_name.to_string())
}

/// Decode a directory string attribute, including the UTF-16 and UTF-32
/// encodings that `as_str` does not cover
fn attribute_string(value: &Any<'_>) -> Option<String> {
    match value.tag() {
        Tag::BmpString => {
            let units = value
                .data
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units).collect::<Result<String, _>>().ok()
        }
        Tag::UniversalString => value
            .data
            .chunks_exact(4)
            .map(|quad| char::from_u32(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]])))
            .collect(),
        _ => std::str::from_utf8(value.data).ok().map(str::to_string),
    }
}

fn format_serial_number(serial: &BigUint) -> String {
    format!("{:X}", serial)
}
