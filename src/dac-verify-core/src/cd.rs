//! Certification Declaration handling.
//!
//! A Certification Declaration is a TLV payload wrapped in a CMS SignedData
//! envelope (RFC 5652) with a fixed profile:
//!
//! ```text
//! ContentInfo ::= SEQUENCE {
//!   contentType  id-signedData,
//!   content [0] EXPLICIT SEQUENCE {
//!     version            INTEGER (3),
//!     digestAlgorithms   SET { sha256 },
//!     encapContentInfo   SEQUENCE { id-data, [0] EXPLICIT OCTET STRING cd },
//!     signerInfos        SET { SEQUENCE {
//!       version              INTEGER (3),
//!       subjectKeyIdentifier [0] IMPLICIT OCTET STRING,
//!       digestAlgorithm      sha256,
//!       signatureAlgorithm   ecdsa-with-SHA256,
//!       signature            OCTET STRING
//!     } }
//!   }
//! }
//! ```
//!
//! The signature covers the raw TLV payload; there are no signed attributes.

use const_oid::ObjectIdentifier;
use dac_crypto::{constant_time_eq, sha256, P256Signature, P256Signer};
use der::{Decode, Encode, Header, Length, Reader, SliceReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cd_keys::{CdKeysTrustStore, KEY_IDENTIFIER_LEN};
use crate::error::VerifyError;
use crate::info::DeviceInfoForAttestation;
use crate::result::AttestationVerificationResult;
use crate::tlv::{TlvElement, TlvReader, TlvTag, TlvValue, TlvWriter};

/// Maximum number of product IDs in one declaration.
pub const MAX_PRODUCT_IDS: usize = 100;

/// Length of the certificate identifier string.
pub const CERTIFICATE_ID_LEN: usize = 19;

/// Maximum number of entries in the authorized PAA list.
pub const MAX_AUTHORIZED_PAA_LIST: usize = 10;

const DER_INTEGER: u8 = 0x02;
const DER_OCTET_STRING: u8 = 0x04;
const DER_OID: u8 = 0x06;
const DER_SEQUENCE: u8 = 0x30;
const DER_SET: u8 = 0x31;
const DER_CONTEXT_0_PRIMITIVE: u8 = 0x80;
const DER_CONTEXT_0_CONSTRUCTED: u8 = 0xA0;
const CMS_VERSION: u8 = 3;

const OID_PKCS7_SIGNED_DATA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const OID_PKCS7_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const OID_ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

const TAG_FORMAT_VERSION: u8 = 0;
const TAG_VENDOR_ID: u8 = 1;
const TAG_PRODUCT_ID_ARRAY: u8 = 2;
const TAG_DEVICE_TYPE_ID: u8 = 3;
const TAG_CERTIFICATE_ID: u8 = 4;
const TAG_SECURITY_LEVEL: u8 = 5;
const TAG_SECURITY_INFORMATION: u8 = 6;
const TAG_VERSION_NUMBER: u8 = 7;
const TAG_CERTIFICATION_TYPE: u8 = 8;
const TAG_DAC_ORIGIN_VENDOR_ID: u8 = 9;
const TAG_DAC_ORIGIN_PRODUCT_ID: u8 = 10;
const TAG_AUTHORIZED_PAA_LIST: u8 = 11;

/// Certification status asserted by the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CertificationType {
    /// Development and test devices.
    DevelopmentAndTest = 0,
    /// Provisionally certified devices.
    Provisional = 1,
    /// Officially certified devices.
    Official = 2,
}

impl TryFrom<u8> for CertificationType {
    type Error = VerifyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::DevelopmentAndTest),
            1 => Ok(Self::Provisional),
            2 => Ok(Self::Official),
            other => Err(VerifyError::tlv(format!(
                "unknown certification type {other}"
            ))),
        }
    }
}

/// Vendor and product of the device that actually carries the DAC, for
/// declarations issued on behalf of another vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DacOrigin {
    /// Vendor ID the DAC and PAI must carry.
    pub vendor_id: u16,
    /// Product ID the DAC must carry.
    pub product_id: u16,
}

/// Decoded Certification Declaration payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationElements {
    /// Payload format version; only 1 is accepted.
    pub format_version: u16,
    /// Certified vendor.
    pub vendor_id: u16,
    /// Certified products (1 to 100 entries).
    pub product_ids: Vec<u16>,
    /// Primary device type.
    pub device_type_id: u32,
    /// Certificate identifier (19 characters).
    pub certificate_id: String,
    /// Security level (informational).
    pub security_level: u8,
    /// Security information (informational).
    pub security_information: u16,
    /// Declaration version (informational).
    pub version_number: u16,
    /// Certification status.
    pub certification_type: CertificationType,
    /// DAC origin, when the declaration is issued on behalf of another vendor.
    pub dac_origin: Option<DacOrigin>,
    /// PAAs permitted to anchor the device's chain; empty means any.
    pub authorized_paa_list: Vec<[u8; KEY_IDENTIFIER_LEN]>,
}

impl CertificationElements {
    /// Whether `product_id` is one of the certified products.
    #[must_use]
    pub fn covers_product(&self, product_id: u16) -> bool {
        self.product_ids.contains(&product_id)
    }
}

/// Parts of a CMS SignedData envelope, borrowed from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmsSignedData<'a> {
    /// Subject Key Identifier of the signer.
    pub signer_key_id: &'a [u8],
    /// Encapsulated TLV payload.
    pub cd_content: &'a [u8],
    /// DER-encoded ECDSA signature.
    pub signature_der: &'a [u8],
}

/// Split a CMS SignedData envelope into signer, content and signature.
pub fn parse_cms_signed_data(cms_message: &[u8]) -> Result<CmsSignedData<'_>, VerifyError> {
    let mut outer = der_reader(cms_message)?;
    let content_info = read_der(&mut outer, DER_SEQUENCE, "ContentInfo")?;

    let mut reader = der_reader(content_info)?;
    expect_oid(&mut reader, OID_PKCS7_SIGNED_DATA, "contentType")?;
    let explicit = read_der(&mut reader, DER_CONTEXT_0_CONSTRUCTED, "content")?;

    let mut reader = der_reader(explicit)?;
    let signed_data = read_der(&mut reader, DER_SEQUENCE, "SignedData")?;

    let mut reader = der_reader(signed_data)?;
    expect_version(&mut reader, "SignedData")?;
    read_der(&mut reader, DER_SET, "digestAlgorithms")?;
    let encap = read_der(&mut reader, DER_SEQUENCE, "encapContentInfo")?;
    let cd_content = decode_encapsulated_content(encap)?;

    // certificates [0] and crls [1] may precede signerInfos
    let signer_infos = loop {
        let header = peek_header(&reader)?;
        if header.tag.is_context_specific() {
            read_der(&mut reader, header.tag.octet(), "optional SignedData field")?;
            continue;
        }
        break read_der(&mut reader, DER_SET, "signerInfos")?;
    };

    let mut reader = der_reader(signer_infos)?;
    let signer_info = read_der(&mut reader, DER_SEQUENCE, "SignerInfo")?;
    let (signer_key_id, signature_der) = decode_signer_info(signer_info)?;

    Ok(CmsSignedData {
        signer_key_id,
        cd_content,
        signature_der,
    })
}

fn decode_encapsulated_content(encap: &[u8]) -> Result<&[u8], VerifyError> {
    let mut reader = der_reader(encap)?;
    expect_oid(&mut reader, OID_PKCS7_DATA, "eContentType")?;
    let explicit = read_der(&mut reader, DER_CONTEXT_0_CONSTRUCTED, "eContent")?;
    let mut reader = der_reader(explicit)?;
    read_der(&mut reader, DER_OCTET_STRING, "eContent")
}

fn decode_signer_info(signer_info: &[u8]) -> Result<(&[u8], &[u8]), VerifyError> {
    let mut reader = der_reader(signer_info)?;
    expect_version(&mut reader, "SignerInfo")?;

    let kid = read_der(&mut reader, DER_CONTEXT_0_PRIMITIVE, "subjectKeyIdentifier")?;
    if kid.len() != KEY_IDENTIFIER_LEN {
        return Err(VerifyError::cms(format!(
            "subjectKeyIdentifier is {} bytes, expected {KEY_IDENTIFIER_LEN}",
            kid.len()
        )));
    }

    let digest_algorithm = read_der(&mut reader, DER_SEQUENCE, "digestAlgorithm")?;
    expect_oid(&mut der_reader(digest_algorithm)?, OID_SHA256, "digestAlgorithm")?;

    let signature_algorithm = read_der(&mut reader, DER_SEQUENCE, "signatureAlgorithm")?;
    expect_oid(
        &mut der_reader(signature_algorithm)?,
        OID_ECDSA_WITH_SHA256,
        "signatureAlgorithm",
    )?;

    let signature = read_der(&mut reader, DER_OCTET_STRING, "signature")?;
    Ok((kid, signature))
}

/// Wrap `cd_content` in a CMS SignedData envelope signed by `signer`.
pub fn encode_cms_signed_data(
    cd_content: &[u8],
    signer_key_id: &[u8],
    signer: &P256Signer,
) -> Result<Vec<u8>, VerifyError> {
    if signer_key_id.len() != KEY_IDENTIFIER_LEN {
        return Err(VerifyError::invalid_argument(format!(
            "signer key identifier must be {KEY_IDENTIFIER_LEN} bytes"
        )));
    }

    let signature = signer.sign(cd_content)?.to_der()?;
    let version = der_element(DER_INTEGER, &[CMS_VERSION])?;
    let sha256_algorithm = der_element(DER_SEQUENCE, &oid_element(OID_SHA256)?)?;

    let signer_info = der_element(
        DER_SEQUENCE,
        &[
            version.clone(),
            der_element(DER_CONTEXT_0_PRIMITIVE, signer_key_id)?,
            sha256_algorithm.clone(),
            der_element(DER_SEQUENCE, &oid_element(OID_ECDSA_WITH_SHA256)?)?,
            der_element(DER_OCTET_STRING, &signature)?,
        ]
        .concat(),
    )?;

    let encap = der_element(
        DER_SEQUENCE,
        &[
            oid_element(OID_PKCS7_DATA)?,
            der_element(
                DER_CONTEXT_0_CONSTRUCTED,
                &der_element(DER_OCTET_STRING, cd_content)?,
            )?,
        ]
        .concat(),
    )?;

    let signed_data = der_element(
        DER_SEQUENCE,
        &[
            version,
            der_element(DER_SET, &sha256_algorithm)?,
            encap,
            der_element(DER_SET, &signer_info)?,
        ]
        .concat(),
    )?;

    der_element(
        DER_SEQUENCE,
        &[
            oid_element(OID_PKCS7_SIGNED_DATA)?,
            der_element(DER_CONTEXT_0_CONSTRUCTED, &signed_data)?,
        ]
        .concat(),
    )
}

fn der_reader(bytes: &[u8]) -> Result<SliceReader<'_>, VerifyError> {
    SliceReader::new(bytes).map_err(|e| VerifyError::cms(e.to_string()))
}

fn peek_header(reader: &SliceReader<'_>) -> Result<Header, VerifyError> {
    reader
        .peek_header()
        .map_err(|e| VerifyError::cms(format!("truncated SignedData: {e}")))
}

fn read_der<'a>(
    reader: &mut SliceReader<'a>,
    expected_tag: u8,
    what: &str,
) -> Result<&'a [u8], VerifyError> {
    let header =
        Header::decode(reader).map_err(|e| VerifyError::cms(format!("{what}: {e}")))?;
    if header.tag.octet() != expected_tag {
        return Err(VerifyError::cms(format!(
            "{what}: expected tag 0x{expected_tag:02x}, found 0x{:02x}",
            header.tag.octet()
        )));
    }
    reader
        .read_slice(header.length)
        .map_err(|e| VerifyError::cms(format!("{what}: {e}")))
}

fn expect_oid(
    reader: &mut SliceReader<'_>,
    expected: ObjectIdentifier,
    what: &str,
) -> Result<(), VerifyError> {
    let value = read_der(reader, DER_OID, what)?;
    let oid = ObjectIdentifier::from_bytes(value)
        .map_err(|e| VerifyError::cms(format!("{what}: {e}")))?;
    if oid != expected {
        return Err(VerifyError::cms(format!("{what}: unexpected OID {oid}")));
    }
    Ok(())
}

fn expect_version(reader: &mut SliceReader<'_>, what: &str) -> Result<(), VerifyError> {
    let version = read_der(reader, DER_INTEGER, what)?;
    if version != [CMS_VERSION] {
        return Err(VerifyError::cms(format!("{what}: unsupported version")));
    }
    Ok(())
}

fn der_element(tag: u8, content: &[u8]) -> Result<Vec<u8>, VerifyError> {
    let length = Length::try_from(content.len())
        .and_then(|len| len.to_der())
        .map_err(|e| VerifyError::cms(e.to_string()))?;
    let mut out = Vec::with_capacity(1 + length.len() + content.len());
    out.push(tag);
    out.extend_from_slice(&length);
    out.extend_from_slice(content);
    Ok(out)
}

fn oid_element(oid: ObjectIdentifier) -> Result<Vec<u8>, VerifyError> {
    der_element(DER_OID, oid.as_bytes())
}

/// Decode a TLV Certification Declaration payload.
///
/// Tags 0 to 8 are mandatory and in order; 9 and 10 appear together or not
/// at all; 11 is optional.
pub fn decode_certification_elements(
    cd_content: &[u8],
) -> Result<CertificationElements, VerifyError> {
    let mut reader = TlvReader::new(cd_content);
    let start = reader.expect_element()?;
    if start.tag != TlvTag::Anonymous || start.value != TlvValue::Structure {
        return Err(VerifyError::tlv("declaration is not an anonymous structure"));
    }

    let format_version = expect_field(&mut reader, TAG_FORMAT_VERSION)?.as_u16("format_version")?;
    let vendor_id = expect_field(&mut reader, TAG_VENDOR_ID)?.as_u16("vendor_id")?;

    let pid_array = expect_field(&mut reader, TAG_PRODUCT_ID_ARRAY)?;
    if pid_array.value != TlvValue::Array {
        return Err(VerifyError::tlv("product_id_array: expected array"));
    }
    let mut product_ids = Vec::new();
    loop {
        let element = reader.expect_element()?;
        if element.is_end_of_container() {
            break;
        }
        if product_ids.len() == MAX_PRODUCT_IDS {
            return Err(VerifyError::tlv(format!(
                "product_id_array: more than {MAX_PRODUCT_IDS} entries"
            )));
        }
        product_ids.push(element.as_u16("product_id")?);
    }
    if product_ids.is_empty() {
        return Err(VerifyError::tlv("product_id_array: empty"));
    }

    let device_type_id = expect_field(&mut reader, TAG_DEVICE_TYPE_ID)?.as_u32("device_type_id")?;
    let certificate_id = expect_field(&mut reader, TAG_CERTIFICATE_ID)?
        .as_str("certificate_id")?
        .to_owned();
    if certificate_id.len() != CERTIFICATE_ID_LEN {
        return Err(VerifyError::tlv(format!(
            "certificate_id: expected {CERTIFICATE_ID_LEN} bytes, got {}",
            certificate_id.len()
        )));
    }
    let security_level = expect_field(&mut reader, TAG_SECURITY_LEVEL)?.as_u8("security_level")?;
    let security_information =
        expect_field(&mut reader, TAG_SECURITY_INFORMATION)?.as_u16("security_information")?;
    let version_number = expect_field(&mut reader, TAG_VERSION_NUMBER)?.as_u16("version_number")?;
    let certification_type = CertificationType::try_from(
        expect_field(&mut reader, TAG_CERTIFICATION_TYPE)?.as_u8("certification_type")?,
    )?;

    let mut dac_origin_vendor_id = None;
    let mut dac_origin_product_id = None;
    let mut authorized_paa_list = Vec::new();
    let mut last_tag = TAG_CERTIFICATION_TYPE;

    loop {
        let element = reader.expect_element()?;
        if element.is_end_of_container() {
            break;
        }
        let tag = match element.tag {
            TlvTag::Context(tag) if tag > last_tag => tag,
            other => {
                return Err(VerifyError::tlv(format!(
                    "unexpected declaration element {other:?}"
                )))
            },
        };
        last_tag = tag;

        match tag {
            TAG_DAC_ORIGIN_VENDOR_ID => {
                dac_origin_vendor_id = Some(element.as_u16("dac_origin_vendor_id")?);
            },
            TAG_DAC_ORIGIN_PRODUCT_ID => {
                dac_origin_product_id = Some(element.as_u16("dac_origin_product_id")?);
            },
            TAG_AUTHORIZED_PAA_LIST => {
                authorized_paa_list = read_authorized_paa_list(&mut reader, &element)?;
            },
            other => {
                return Err(VerifyError::tlv(format!(
                    "unknown declaration tag {other}"
                )))
            },
        }
    }

    if !reader.is_at_end() {
        return Err(VerifyError::tlv("trailing bytes after declaration"));
    }

    let dac_origin = match (dac_origin_vendor_id, dac_origin_product_id) {
        (Some(vendor_id), Some(product_id)) => Some(DacOrigin {
            vendor_id,
            product_id,
        }),
        (None, None) => None,
        _ => {
            return Err(VerifyError::tlv(
                "dac_origin_vendor_id and dac_origin_product_id must appear together",
            ))
        },
    };

    Ok(CertificationElements {
        format_version,
        vendor_id,
        product_ids,
        device_type_id,
        certificate_id,
        security_level,
        security_information,
        version_number,
        certification_type,
        dac_origin,
        authorized_paa_list,
    })
}

fn expect_field<'a>(reader: &mut TlvReader<'a>, tag: u8) -> Result<TlvElement<'a>, VerifyError> {
    let element = reader.expect_element()?;
    if element.tag != TlvTag::Context(tag) {
        return Err(VerifyError::tlv(format!(
            "declaration tag {tag} missing or out of order"
        )));
    }
    Ok(element)
}

fn read_authorized_paa_list(
    reader: &mut TlvReader<'_>,
    start: &TlvElement<'_>,
) -> Result<Vec<[u8; KEY_IDENTIFIER_LEN]>, VerifyError> {
    if start.value != TlvValue::Array {
        return Err(VerifyError::tlv("authorized_paa_list: expected array"));
    }
    let mut list = Vec::new();
    loop {
        let element = reader.expect_element()?;
        if element.is_end_of_container() {
            return Ok(list);
        }
        if list.len() == MAX_AUTHORIZED_PAA_LIST {
            return Err(VerifyError::tlv(format!(
                "authorized_paa_list: more than {MAX_AUTHORIZED_PAA_LIST} entries"
            )));
        }
        let skid: [u8; KEY_IDENTIFIER_LEN] = element
            .as_bytes("authorized_paa")?
            .try_into()
            .map_err(|_| VerifyError::tlv("authorized_paa: expected 20-byte key identifier"))?;
        list.push(skid);
    }
}

/// Encode a Certification Declaration payload.
pub fn encode_certification_elements(cd: &CertificationElements) -> Result<Vec<u8>, VerifyError> {
    if cd.product_ids.is_empty() || cd.product_ids.len() > MAX_PRODUCT_IDS {
        return Err(VerifyError::invalid_argument(format!(
            "declaration needs 1 to {MAX_PRODUCT_IDS} product IDs"
        )));
    }
    if cd.certificate_id.len() != CERTIFICATE_ID_LEN {
        return Err(VerifyError::invalid_argument(format!(
            "certificate_id must be {CERTIFICATE_ID_LEN} bytes"
        )));
    }
    if cd.authorized_paa_list.len() > MAX_AUTHORIZED_PAA_LIST {
        return Err(VerifyError::invalid_argument(format!(
            "at most {MAX_AUTHORIZED_PAA_LIST} authorized PAAs allowed"
        )));
    }

    let mut writer = TlvWriter::new();
    writer
        .start_structure(TlvTag::Anonymous)
        .put_unsigned(TlvTag::Context(TAG_FORMAT_VERSION), u64::from(cd.format_version))
        .put_unsigned(TlvTag::Context(TAG_VENDOR_ID), u64::from(cd.vendor_id))
        .start_array(TlvTag::Context(TAG_PRODUCT_ID_ARRAY));
    for pid in &cd.product_ids {
        writer.put_unsigned(TlvTag::Anonymous, u64::from(*pid));
    }
    writer
        .end_container()
        .put_unsigned(TlvTag::Context(TAG_DEVICE_TYPE_ID), u64::from(cd.device_type_id))
        .put_utf8(TlvTag::Context(TAG_CERTIFICATE_ID), &cd.certificate_id)
        .put_unsigned(TlvTag::Context(TAG_SECURITY_LEVEL), u64::from(cd.security_level))
        .put_unsigned(
            TlvTag::Context(TAG_SECURITY_INFORMATION),
            u64::from(cd.security_information),
        )
        .put_unsigned(TlvTag::Context(TAG_VERSION_NUMBER), u64::from(cd.version_number))
        .put_unsigned(
            TlvTag::Context(TAG_CERTIFICATION_TYPE),
            cd.certification_type as u64,
        );

    if let Some(origin) = cd.dac_origin {
        writer
            .put_unsigned(TlvTag::Context(TAG_DAC_ORIGIN_VENDOR_ID), u64::from(origin.vendor_id))
            .put_unsigned(
                TlvTag::Context(TAG_DAC_ORIGIN_PRODUCT_ID),
                u64::from(origin.product_id),
            );
    }

    if !cd.authorized_paa_list.is_empty() {
        writer.start_array(TlvTag::Context(TAG_AUTHORIZED_PAA_LIST));
        for skid in &cd.authorized_paa_list {
            writer.put_bytes(TlvTag::Anonymous, skid);
        }
        writer.end_container();
    }

    writer.end_container();
    Ok(writer.into_bytes())
}

/// Verify the envelope signature and return the signed payload.
///
/// The test key is honoured only when `allow_test_key` is set, and never for
/// an `Official` declaration.
pub fn validate_cd_signature<'a>(
    cms_envelope: &'a [u8],
    keys: &dyn CdKeysTrustStore,
    allow_test_key: bool,
) -> Result<&'a [u8], AttestationVerificationResult> {
    let cms = parse_cms_signed_data(cms_envelope).map_err(|e| {
        debug!(error = %e, "CMS envelope not parseable");
        AttestationVerificationResult::CertificationDeclarationNoKeyId
    })?;

    let kid_hex = hex::encode(cms.signer_key_id);
    let public_key = keys.lookup(cms.signer_key_id).ok_or_else(|| {
        warn!(kid = %kid_hex, "No trusted CD signing key for key identifier");
        AttestationVerificationResult::CertificationDeclarationNoCertificateFound
    })?;

    let is_test_key = keys.is_test_key(cms.signer_key_id);
    if is_test_key && !allow_test_key {
        warn!(kid = %kid_hex, "CD signed with test key, which is not allowed");
        return Err(AttestationVerificationResult::CertificationDeclarationNoCertificateFound);
    }

    let signature = P256Signature::from_der(cms.signature_der)
        .map_err(|_| AttestationVerificationResult::CertificationDeclarationInvalidSignature)?;
    public_key
        .verify_message_signature(cms.cd_content, &signature)
        .map_err(|_| AttestationVerificationResult::CertificationDeclarationInvalidSignature)?;

    if is_test_key {
        let cd = decode_certification_elements(cms.cd_content)
            .map_err(|_| AttestationVerificationResult::CertificationDeclarationInvalidFormat)?;
        if cd.certification_type == CertificationType::Official {
            warn!(kid = %kid_hex, "Official CD signed with test key");
            return Err(AttestationVerificationResult::CertificationDeclarationNoCertificateFound);
        }
    }

    debug!(kid = %kid_hex, "CD signature verified");
    Ok(cms.cd_content)
}

/// Cross-reference a decoded declaration with the device's identity.
///
/// `format_version` must be 1. The declaration's vendor must equal the Basic
/// Information vendor and the Basic Information product must be listed.
/// With a DAC origin, DAC and PAI vendor and DAC product must equal the
/// origin; without one, they must match the declaration itself. A PAI
/// product ID, when present, follows the DAC product rule. A non-empty
/// authorized PAA list must contain the chain's PAA.
pub fn validate_cd(
    cd: &CertificationElements,
    device_info: &DeviceInfoForAttestation,
) -> Result<(), AttestationVerificationResult> {
    use AttestationVerificationResult::{
        CertificationDeclarationInvalidFormat as InvalidFormat,
        CertificationDeclarationInvalidPaa as InvalidPaa,
        CertificationDeclarationInvalidProductId as InvalidProductId,
        CertificationDeclarationInvalidVendorId as InvalidVendorId,
    };

    if cd.format_version != 1 {
        return Err(InvalidFormat);
    }
    if cd.vendor_id != device_info.vendor_id {
        return Err(InvalidVendorId);
    }
    if !cd.covers_product(device_info.product_id) {
        return Err(InvalidProductId);
    }

    match cd.dac_origin {
        Some(origin) => {
            if device_info.dac_vendor_id != origin.vendor_id
                || device_info.pai_vendor_id != origin.vendor_id
            {
                return Err(InvalidVendorId);
            }
            if device_info.dac_product_id != origin.product_id {
                return Err(InvalidProductId);
            }
            if device_info
                .pai_product_id
                .is_some_and(|pid| pid != origin.product_id)
            {
                return Err(InvalidProductId);
            }
        },
        None => {
            if device_info.dac_vendor_id != cd.vendor_id
                || device_info.pai_vendor_id != cd.vendor_id
            {
                return Err(InvalidVendorId);
            }
            if !cd.covers_product(device_info.dac_product_id) {
                return Err(InvalidProductId);
            }
            if device_info
                .pai_product_id
                .is_some_and(|pid| !cd.covers_product(pid))
            {
                return Err(InvalidProductId);
            }
        },
    }

    if !cd.authorized_paa_list.is_empty()
        && !cd
            .authorized_paa_list
            .iter()
            .any(|skid| constant_time_eq(skid, &device_info.paa_skid))
    {
        return Err(InvalidPaa);
    }

    Ok(())
}

/// Check reported firmware information against an expected digest.
///
/// Without an expected digest the information is opaque and accepted.
pub fn validate_firmware_information(
    firmware_info: &[u8],
    device_info: &DeviceInfoForAttestation,
) -> Result<(), AttestationVerificationResult> {
    let Some(expected) = device_info.expected_firmware_digest else {
        return Ok(());
    };
    if firmware_info.is_empty() {
        return Err(AttestationVerificationResult::FirmwareInformationMissing);
    }
    if !constant_time_eq(&sha256(firmware_info), &expected) {
        return Err(AttestationVerificationResult::FirmwareInformationMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cd_keys::{CsaCdKeysTrustStore, TEST_CD_KID};

    // Signed with the test CD key: VID 0xFFF1, PIDs [0x8000], no DAC origin.
    const CMS_01: &str = "3081e806092a864886f70d010702a081da3081d7020103310d300b06096086480165030402\
        01304506092a864886f70d010701a0380436152400012501f1ff360205008018250334122c04135a49473230\
        3134315a423333303030312d32342405002406002507942624080018317c307a020103801462fa823359acfa\
        a9963e1cfa140addf504f37160300b0609608648016503040201300a06082a8648ce3d040302044630440220\
        43a63f2b943df33c38b3e02fcaa75fe3532aebbf5e63f5bbdbc0b1f01d3c4f6002204c1abf5f1807b81894b1\
        576c47e4724e4d966c612ed3fa25c118c3f2b3f90369";

    const CD_CONTENT_01: &str = "152400012501f1ff360205008018250334122c04135a494732303134315a4233\
        33303030312d32342405002406002507942624080018";

    const CD_CONTENT_02: &str = "152400012501f2ff360205018005028018250334122c04135a49473230313432\
        5a423333303030322d3234240500240600250794262408002509f1ff250a008018";

    fn bytes(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    fn expected_cd_01() -> CertificationElements {
        CertificationElements {
            format_version: 1,
            vendor_id: 0xFFF1,
            product_ids: vec![0x8000],
            device_type_id: 0x1234,
            certificate_id: "ZIG20141ZB330001-24".to_string(),
            security_level: 0,
            security_information: 0,
            version_number: 0x2694,
            certification_type: CertificationType::DevelopmentAndTest,
            dac_origin: None,
            authorized_paa_list: Vec::new(),
        }
    }

    fn device_info_01() -> DeviceInfoForAttestation {
        DeviceInfoForAttestation {
            vendor_id: 0xFFF1,
            product_id: 0x8000,
            dac_vendor_id: 0xFFF1,
            dac_product_id: 0x8000,
            pai_vendor_id: 0xFFF1,
            ..DeviceInfoForAttestation::default()
        }
    }

    #[test]
    fn test_parse_cms_vector() {
        let cms = bytes(CMS_01);
        let parsed = parse_cms_signed_data(&cms).unwrap();

        assert_eq!(parsed.signer_key_id, &TEST_CD_KID);
        assert_eq!(parsed.cd_content, bytes(CD_CONTENT_01).as_slice());
        assert_eq!(parsed.signature_der[0], 0x30);
    }

    #[test]
    fn test_parse_cms_rejects_garbage() {
        assert!(parse_cms_signed_data(&[]).is_err());
        assert!(parse_cms_signed_data(&[0x30, 0x00]).is_err());
        assert!(parse_cms_signed_data(&bytes(CD_CONTENT_01)).is_err());
    }

    #[test]
    fn test_decode_vectors() {
        assert_eq!(
            decode_certification_elements(&bytes(CD_CONTENT_01)).unwrap(),
            expected_cd_01()
        );

        let cd = decode_certification_elements(&bytes(CD_CONTENT_02)).unwrap();
        assert_eq!(cd.vendor_id, 0xFFF2);
        assert_eq!(cd.product_ids, vec![0x8001, 0x8002]);
        assert_eq!(
            cd.dac_origin,
            Some(DacOrigin {
                vendor_id: 0xFFF1,
                product_id: 0x8000
            })
        );
    }

    #[test]
    fn test_encode_matches_vector() {
        assert_eq!(
            encode_certification_elements(&expected_cd_01()).unwrap(),
            bytes(CD_CONTENT_01)
        );
    }

    #[test]
    fn test_decode_rejects_lone_dac_origin_vendor() {
        let mut content = bytes(CD_CONTENT_02);
        // Drop "250a0080" (tag 10) before the closing 0x18.
        let end = content.len() - 1;
        content.drain(end - 4..end);
        assert!(decode_certification_elements(&content).is_err());
    }

    #[test]
    fn test_signature_with_test_key_allowed() {
        let cms = bytes(CMS_01);
        let keys = CsaCdKeysTrustStore::new();

        let content = validate_cd_signature(&cms, &keys, true).unwrap();
        assert_eq!(content, bytes(CD_CONTENT_01).as_slice());
    }

    #[test]
    fn test_signature_with_test_key_disallowed() {
        let cms = bytes(CMS_01);
        let keys = CsaCdKeysTrustStore::new();

        assert_eq!(
            validate_cd_signature(&cms, &keys, false),
            Err(AttestationVerificationResult::CertificationDeclarationNoCertificateFound)
        );
    }

    #[test]
    fn test_signature_tampered_content() {
        let mut cms = bytes(CMS_01);
        // Last byte of the device type inside the encapsulated content.
        let pos = cms
            .windows(4)
            .position(|w| w == [0x25, 0x03, 0x34, 0x12])
            .unwrap();
        cms[pos + 2] ^= 0x01;

        assert_eq!(
            validate_cd_signature(&cms, &CsaCdKeysTrustStore::new(), true),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidSignature)
        );
    }

    #[test]
    fn test_signature_unparseable_envelope() {
        assert_eq!(
            validate_cd_signature(&[0x01, 0x02], &CsaCdKeysTrustStore::new(), true),
            Err(AttestationVerificationResult::CertificationDeclarationNoKeyId)
        );
    }

    #[test]
    fn test_encode_cms_with_added_key() {
        let signer = P256Signer::random();
        let kid = [0x42u8; KEY_IDENTIFIER_LEN];
        let mut keys = CsaCdKeysTrustStore::new();
        keys.add_trusted_key(&kid, &signer.public_key()).unwrap();

        let mut cd = expected_cd_01();
        cd.certification_type = CertificationType::Official;
        let content = encode_certification_elements(&cd).unwrap();
        let cms = encode_cms_signed_data(&content, &kid, &signer).unwrap();

        let parsed = parse_cms_signed_data(&cms).unwrap();
        assert_eq!(parsed.signer_key_id, &kid);
        assert_eq!(validate_cd_signature(&cms, &keys, false).unwrap(), content.as_slice());
    }

    #[test]
    fn test_unknown_signer() {
        let signer = P256Signer::random();
        let content = encode_certification_elements(&expected_cd_01()).unwrap();
        let cms = encode_cms_signed_data(&content, &[0x11; KEY_IDENTIFIER_LEN], &signer).unwrap();

        assert_eq!(
            validate_cd_signature(&cms, &CsaCdKeysTrustStore::new(), true),
            Err(AttestationVerificationResult::CertificationDeclarationNoCertificateFound)
        );
    }

    #[test]
    fn test_validate_cd_rules() {
        let cd = expected_cd_01();
        assert_eq!(validate_cd(&cd, &device_info_01()), Ok(()));

        let mut info = device_info_01();
        info.vendor_id = 0xFFF2;
        assert_eq!(
            validate_cd(&cd, &info),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidVendorId)
        );

        let mut info = device_info_01();
        info.product_id = 0x8001;
        assert_eq!(
            validate_cd(&cd, &info),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidProductId)
        );

        let mut info = device_info_01();
        info.pai_vendor_id = 0xFFF2;
        assert_eq!(
            validate_cd(&cd, &info),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidVendorId)
        );

        let mut info = device_info_01();
        info.pai_product_id = Some(0x8001);
        assert_eq!(
            validate_cd(&cd, &info),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidProductId)
        );

        let mut bad_version = expected_cd_01();
        bad_version.format_version = 2;
        assert_eq!(
            validate_cd(&bad_version, &device_info_01()),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidFormat)
        );
    }

    #[test]
    fn test_validate_cd_with_dac_origin() {
        let cd = decode_certification_elements(&bytes(CD_CONTENT_02)).unwrap();
        let info = DeviceInfoForAttestation {
            vendor_id: 0xFFF2,
            product_id: 0x8001,
            dac_vendor_id: 0xFFF1,
            dac_product_id: 0x8000,
            pai_vendor_id: 0xFFF1,
            ..DeviceInfoForAttestation::default()
        };
        assert_eq!(validate_cd(&cd, &info), Ok(()));

        let mut wrong = info.clone();
        wrong.dac_vendor_id = 0xFFF2;
        assert_eq!(
            validate_cd(&cd, &wrong),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidVendorId)
        );

        let mut wrong = info;
        wrong.dac_product_id = 0x8001;
        assert_eq!(
            validate_cd(&cd, &wrong),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidProductId)
        );
    }

    #[test]
    fn test_validate_cd_authorized_paa() {
        let mut cd = expected_cd_01();
        cd.authorized_paa_list = vec![[0x01; KEY_IDENTIFIER_LEN], [0x02; KEY_IDENTIFIER_LEN]];

        let mut info = device_info_01();
        info.paa_skid = [0x02; KEY_IDENTIFIER_LEN];
        assert_eq!(validate_cd(&cd, &info), Ok(()));

        info.paa_skid = [0x03; KEY_IDENTIFIER_LEN];
        assert_eq!(
            validate_cd(&cd, &info),
            Err(AttestationVerificationResult::CertificationDeclarationInvalidPaa)
        );

        let encoded = encode_certification_elements(&cd).unwrap();
        assert_eq!(decode_certification_elements(&encoded).unwrap(), cd);
    }

    #[test]
    fn test_firmware_information() {
        let mut info = device_info_01();
        assert_eq!(validate_firmware_information(&[], &info), Ok(()));

        info.expected_firmware_digest = Some(sha256(b"firmware v1"));
        assert_eq!(validate_firmware_information(b"firmware v1", &info), Ok(()));
        assert_eq!(
            validate_firmware_information(&[], &info),
            Err(AttestationVerificationResult::FirmwareInformationMissing)
        );
        assert_eq!(
            validate_firmware_information(b"firmware v2", &info),
            Err(AttestationVerificationResult::FirmwareInformationMismatch)
        );
    }
}
