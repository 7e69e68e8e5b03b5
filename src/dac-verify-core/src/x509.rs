//! X.509 handling for the PAA → PAI → DAC chain.
//!
//! Matter attestation certificates are ordinary P-256 X.509v3 certificates
//! with two extra subject attributes carrying the vendor and product IDs as
//! four uppercase hex digits:
//!
//! ```text
//! 1.3.6.1.4.1.37244.2.1  Vendor ID   (UTF8String, e.g. "FFF1")
//! 1.3.6.1.4.1.37244.2.2  Product ID  (UTF8String, e.g. "8000")
//! ```

use const_oid::ObjectIdentifier;
use dac_crypto::{P256PublicKey, P256Signature};
use der::asn1::Utf8StringRef;
use der::{Decode, Header, Reader, SliceReader};
use tracing::debug;
use x509_cert::ext::pkix::{AuthorityKeyIdentifier, BasicConstraints, SubjectKeyIdentifier};
use x509_cert::Certificate;

use crate::cd_keys::KEY_IDENTIFIER_LEN;
use crate::config::CertificateValidityPolicy;
use crate::error::VerifyError;
use crate::result::AttestationVerificationResult;

/// Matter vendor ID subject attribute.
pub const OID_MATTER_VENDOR_ID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.37244.2.1");

/// Matter product ID subject attribute.
pub const OID_MATTER_PRODUCT_ID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.37244.2.2");

const OID_ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// Role of a certificate in the attestation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateRole {
    /// Product Attestation Authority (trust anchor).
    Paa,
    /// Product Attestation Intermediate.
    Pai,
    /// Device Attestation Certificate.
    Dac,
}

impl CertificateRole {
    fn expired(self) -> AttestationVerificationResult {
        match self {
            Self::Paa => AttestationVerificationResult::PaaExpired,
            Self::Pai => AttestationVerificationResult::PaiExpired,
            Self::Dac => AttestationVerificationResult::DacExpired,
        }
    }

    fn signature_invalid(self) -> AttestationVerificationResult {
        match self {
            Self::Paa => AttestationVerificationResult::PaaSignatureInvalid,
            Self::Pai => AttestationVerificationResult::PaiSignatureInvalid,
            Self::Dac => AttestationVerificationResult::DacSignatureInvalid,
        }
    }

    fn format_invalid(self) -> AttestationVerificationResult {
        match self {
            Self::Paa => AttestationVerificationResult::PaaFormatInvalid,
            Self::Pai => AttestationVerificationResult::PaiFormatInvalid,
            Self::Dac => AttestationVerificationResult::DacFormatInvalid,
        }
    }
}

/// Parsed certificate together with its original encoding.
#[derive(Debug, Clone)]
pub struct MatterCertificate {
    der: Vec<u8>,
    cert: Certificate,
}

impl MatterCertificate {
    /// Parse a DER certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, VerifyError> {
        let cert = Certificate::from_der(der)
            .map_err(|e| VerifyError::certificate(format!("DER decode failed: {e}")))?;
        Ok(Self {
            der: der.to_vec(),
            cert,
        })
    }

    /// Original DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Matter vendor ID from the subject.
    ///
    /// `Ok(None)` when the attribute is absent; an error when it is present
    /// but not four uppercase hex digits.
    pub fn vendor_id(&self) -> Result<Option<u16>, VerifyError> {
        self.subject_hex_attribute(OID_MATTER_VENDOR_ID)
    }

    /// Matter product ID from the subject. Same rules as
    /// [`vendor_id`](Self::vendor_id).
    pub fn product_id(&self) -> Result<Option<u16>, VerifyError> {
        self.subject_hex_attribute(OID_MATTER_PRODUCT_ID)
    }

    /// Subject Key Identifier extension.
    #[must_use]
    pub fn subject_key_id(&self) -> Option<[u8; KEY_IDENTIFIER_LEN]> {
        let (_, skid) = self
            .cert
            .tbs_certificate
            .get::<SubjectKeyIdentifier>()
            .ok()
            .flatten()?;
        skid.0.as_bytes().try_into().ok()
    }

    /// Key identifier of the Authority Key Identifier extension.
    #[must_use]
    pub fn authority_key_id(&self) -> Option<[u8; KEY_IDENTIFIER_LEN]> {
        let (_, akid) = self
            .cert
            .tbs_certificate
            .get::<AuthorityKeyIdentifier>()
            .ok()
            .flatten()?;
        akid.key_identifier?.as_bytes().try_into().ok()
    }

    /// Whether Basic Constraints marks this as a CA certificate.
    #[must_use]
    pub fn is_ca(&self) -> bool {
        matches!(
            self.cert.tbs_certificate.get::<BasicConstraints>(),
            Ok(Some((_, BasicConstraints { ca: true, .. })))
        )
    }

    /// Serial number bytes as encoded.
    #[must_use]
    pub fn serial_number(&self) -> &[u8] {
        self.cert.tbs_certificate.serial_number.as_bytes()
    }

    /// `notBefore` as Unix seconds.
    #[must_use]
    pub fn not_before(&self) -> i64 {
        unix_seconds(self.cert.tbs_certificate.validity.not_before)
    }

    /// `notAfter` as Unix seconds.
    #[must_use]
    pub fn not_after(&self) -> i64 {
        unix_seconds(self.cert.tbs_certificate.validity.not_after)
    }

    /// Whether `now` (Unix seconds) falls inside the validity window.
    #[must_use]
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.not_before() <= now && now <= self.not_after()
    }

    /// Subject P-256 public key.
    pub fn public_key(&self) -> Result<P256PublicKey, VerifyError> {
        let spki = &self.cert.tbs_certificate.subject_public_key_info;
        if spki.algorithm.oid != OID_EC_PUBLIC_KEY {
            return Err(VerifyError::certificate(format!(
                "unsupported public key algorithm {}",
                spki.algorithm.oid
            )));
        }
        Ok(P256PublicKey::from_sec1_bytes(
            spki.subject_public_key.raw_bytes(),
        )?)
    }

    /// Check that `issuer`'s key signed this certificate.
    pub fn verify_signed_by(&self, issuer: &MatterCertificate) -> Result<(), VerifyError> {
        if self.cert.signature_algorithm.oid != OID_ECDSA_WITH_SHA256 {
            return Err(VerifyError::certificate(format!(
                "unsupported signature algorithm {}",
                self.cert.signature_algorithm.oid
            )));
        }

        let tbs = raw_tbs_certificate(&self.der)?;
        let signature_der = self
            .cert
            .signature
            .as_bytes()
            .ok_or_else(|| VerifyError::certificate("signature has unused bits"))?;
        let signature = P256Signature::from_der(signature_der)?;

        issuer
            .public_key()?
            .verify_message_signature(tbs, &signature)?;
        Ok(())
    }

    fn subject_hex_attribute(&self, oid: ObjectIdentifier) -> Result<Option<u16>, VerifyError> {
        let Some(value) = self
            .cert
            .tbs_certificate
            .subject
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .find(|atv| atv.oid == oid)
        else {
            return Ok(None);
        };

        let text = value
            .value
            .decode_as::<Utf8StringRef<'_>>()
            .map_err(|e| VerifyError::certificate(format!("{oid} is not a UTF8String: {e}")))?;
        parse_matter_id(text.as_str()).map(Some)
    }
}

/// Parse a four-digit uppercase hex identifier.
fn parse_matter_id(text: &str) -> Result<u16, VerifyError> {
    let well_formed = text.len() == 4
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b));
    if !well_formed {
        debug!(text, "Malformed Matter identifier in subject");
        return Err(VerifyError::certificate(format!(
            "malformed Matter identifier '{text}'"
        )));
    }
    u16::from_str_radix(text, 16)
        .map_err(|e| VerifyError::certificate(format!("malformed Matter identifier: {e}")))
}

fn unix_seconds(time: x509_cert::time::Time) -> i64 {
    i64::try_from(time.to_unix_duration().as_secs()).unwrap_or(i64::MAX)
}

/// The `tbsCertificate` bytes exactly as they appear in `der`.
fn raw_tbs_certificate(der: &[u8]) -> Result<&[u8], VerifyError> {
    first_inner_tlv(der).map_err(|e| VerifyError::certificate(format!("cannot locate TBS: {e}")))
}

fn first_inner_tlv(der: &[u8]) -> der::Result<&[u8]> {
    let mut reader = SliceReader::new(der)?;
    Header::decode(&mut reader)?;
    reader.tlv_bytes()
}

/// Validate the PAA → PAI → DAC chain.
///
/// Checks run in order: CA flags, validity windows (per `policy`, against
/// `now` in Unix seconds), key identifier linkage, then signatures. The first
/// failure is reported with the role it concerns.
pub fn validate_attestation_chain(
    paa: &MatterCertificate,
    pai: &MatterCertificate,
    dac: &MatterCertificate,
    policy: CertificateValidityPolicy,
    now: i64,
) -> Result<(), AttestationVerificationResult> {
    let chain = [
        (CertificateRole::Paa, paa),
        (CertificateRole::Pai, pai),
        (CertificateRole::Dac, dac),
    ];

    for (role, cert) in chain {
        let expect_ca = role != CertificateRole::Dac;
        if cert.is_ca() != expect_ca {
            debug!(?role, "Basic constraints do not fit chain position");
            return Err(role.format_invalid());
        }
    }

    if policy == CertificateValidityPolicy::Enforce {
        for (role, cert) in chain {
            if !cert.is_valid_at(now) {
                debug!(
                    ?role,
                    not_before = cert.not_before(),
                    not_after = cert.not_after(),
                    now,
                    "Certificate outside validity window"
                );
                return Err(role.expired());
            }
        }
    }

    let links = [
        (CertificateRole::Paa, paa, paa),
        (CertificateRole::Pai, pai, paa),
        (CertificateRole::Dac, dac, pai),
    ];

    for (role, subject, issuer) in links {
        let linked = match (subject.authority_key_id(), issuer.subject_key_id()) {
            (Some(akid), Some(skid)) => akid == skid,
            // Self-signed anchors may omit the AKID.
            (None, Some(_)) => role == CertificateRole::Paa,
            _ => false,
        };
        if !linked {
            debug!(?role, "Authority key identifier does not match issuer");
            return Err(role.signature_invalid());
        }

        if let Err(e) = subject.verify_signed_by(issuer) {
            debug!(?role, error = %e, "Certificate signature check failed");
            return Err(role.signature_invalid());
        }
    }

    Ok(())
}
