//! Attestation and NOCSR elements.
//!
//! Both are anonymous TLV structures signed by the device's DAC key:
//!
//! ```text
//! attestation_elements = {
//!     1: certification_declaration   octets
//!     2: attestation_nonce           octets[32]
//!     3: timestamp                   u32
//!     4: firmware_information        octets, optional
//!     <fully-qualified>: vendor data octets, up to 3
//! }
//!
//! nocsr_elements = {
//!     1: csr                         octets
//!     2: csr_nonce                   octets[32]
//!     3..=5: vendor reserved         octets, optional
//! }
//! ```

use crate::error::VerifyError;
use crate::tlv::{TlvReader, TlvTag, TlvValue, TlvWriter};

/// Length of attestation and CSR nonces.
pub const EXPECTED_NONCE_LENGTH: usize = 32;

/// Vendor-reserved entries accepted in one elements structure.
pub const MAX_VENDOR_RESERVED_ELEMENTS: usize = 3;

const TAG_CERTIFICATION_DECLARATION: u8 = 1;
const TAG_ATTESTATION_NONCE: u8 = 2;
const TAG_TIMESTAMP: u8 = 3;
const TAG_FIRMWARE_INFO: u8 = 4;

const TAG_CSR: u8 = 1;
const TAG_CSR_NONCE: u8 = 2;
const TAG_NOCSR_VENDOR_RESERVED_FIRST: u8 = 3;
const TAG_NOCSR_VENDOR_RESERVED_LAST: u8 = 5;

/// Vendor-specific data carried in attestation elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorReservedElement<'a> {
    /// Vendor identifier from the fully-qualified tag.
    pub vendor_id: u16,
    /// Profile number from the fully-qualified tag.
    pub profile_number: u16,
    /// Tag number within the profile.
    pub tag: u32,
    /// Opaque payload.
    pub data: &'a [u8],
}

/// Decoded attestation elements. Slices borrow from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationElements<'a> {
    /// CMS-signed Certification Declaration.
    pub certification_declaration: &'a [u8],
    /// Nonce echoed from the Attestation Request.
    pub attestation_nonce: &'a [u8],
    /// Device timestamp (0 if the device has no clock).
    pub timestamp: u32,
    /// Firmware information, empty when absent.
    pub firmware_info: &'a [u8],
    /// Vendor-reserved entries in encounter order.
    pub vendor_reserved: Vec<VendorReservedElement<'a>>,
}

/// Decoded NOCSR elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NocsrElements<'a> {
    /// DER-encoded PKCS#10 certificate signing request.
    pub csr: &'a [u8],
    /// Nonce echoed from the CSR Request.
    pub csr_nonce: &'a [u8],
    /// Vendor-reserved octet strings (context tags 3 to 5).
    pub vendor_reserved: Vec<&'a [u8]>,
}

/// Split attestation elements into their parts.
pub fn deconstruct_attestation_elements(
    elements: &[u8],
) -> Result<AttestationElements<'_>, VerifyError> {
    let mut reader = TlvReader::new(elements);
    enter_anonymous_structure(&mut reader)?;

    let certification_declaration = expect_context_bytes(
        &mut reader,
        TAG_CERTIFICATION_DECLARATION,
        "certification declaration",
    )?;
    let attestation_nonce =
        expect_context_bytes(&mut reader, TAG_ATTESTATION_NONCE, "attestation nonce")?;
    check_nonce_length(attestation_nonce, "attestation nonce")?;

    let element = reader.expect_element()?;
    if element.tag != TlvTag::Context(TAG_TIMESTAMP) {
        return Err(VerifyError::malformed("timestamp missing or out of order"));
    }
    let timestamp = element.as_u32("timestamp")?;

    let mut firmware_info: &[u8] = &[];
    let mut vendor_reserved = Vec::new();
    let mut seen_vendor_reserved = false;

    loop {
        let element = reader.expect_element()?;
        match element.tag {
            _ if element.is_end_of_container() => break,
            TlvTag::Context(TAG_FIRMWARE_INFO) if !seen_vendor_reserved => {
                if !firmware_info.is_empty() {
                    return Err(VerifyError::malformed("duplicate firmware information"));
                }
                firmware_info = element.as_bytes("firmware information")?;
            },
            TlvTag::FullyQualified {
                vendor_id,
                profile_number,
                tag,
            } => {
                if vendor_reserved.len() == MAX_VENDOR_RESERVED_ELEMENTS {
                    return Err(VerifyError::malformed(format!(
                        "more than {MAX_VENDOR_RESERVED_ELEMENTS} vendor reserved elements"
                    )));
                }
                seen_vendor_reserved = true;
                vendor_reserved.push(VendorReservedElement {
                    vendor_id,
                    profile_number,
                    tag,
                    data: element.as_bytes("vendor reserved element")?,
                });
            },
            other => {
                return Err(VerifyError::malformed(format!(
                    "unexpected element with tag {other:?}"
                )))
            },
        }
    }

    expect_end_of_input(&reader)?;

    Ok(AttestationElements {
        certification_declaration,
        attestation_nonce,
        timestamp,
        firmware_info,
        vendor_reserved,
    })
}

/// Encode attestation elements. An empty `firmware_info` is omitted.
pub fn construct_attestation_elements(
    certification_declaration: &[u8],
    attestation_nonce: &[u8],
    timestamp: u32,
    firmware_info: &[u8],
    vendor_reserved: &[VendorReservedElement<'_>],
) -> Result<Vec<u8>, VerifyError> {
    if certification_declaration.is_empty() {
        return Err(VerifyError::invalid_argument(
            "certification declaration must not be empty",
        ));
    }
    check_nonce_length(attestation_nonce, "attestation nonce")
        .map_err(|_| VerifyError::invalid_argument("attestation nonce must be 32 bytes"))?;
    if vendor_reserved.len() > MAX_VENDOR_RESERVED_ELEMENTS {
        return Err(VerifyError::invalid_argument(format!(
            "at most {MAX_VENDOR_RESERVED_ELEMENTS} vendor reserved elements allowed"
        )));
    }

    let mut writer = TlvWriter::new();
    writer
        .start_structure(TlvTag::Anonymous)
        .put_bytes(
            TlvTag::Context(TAG_CERTIFICATION_DECLARATION),
            certification_declaration,
        )
        .put_bytes(TlvTag::Context(TAG_ATTESTATION_NONCE), attestation_nonce)
        .put_unsigned(TlvTag::Context(TAG_TIMESTAMP), u64::from(timestamp));

    if !firmware_info.is_empty() {
        writer.put_bytes(TlvTag::Context(TAG_FIRMWARE_INFO), firmware_info);
    }

    for entry in vendor_reserved {
        writer.put_bytes(
            TlvTag::FullyQualified {
                vendor_id: entry.vendor_id,
                profile_number: entry.profile_number,
                tag: entry.tag,
            },
            entry.data,
        );
    }

    writer.end_container();
    Ok(writer.into_bytes())
}

/// Split NOCSR elements into their parts.
pub fn deconstruct_nocsr_elements(elements: &[u8]) -> Result<NocsrElements<'_>, VerifyError> {
    let mut reader = TlvReader::new(elements);
    enter_anonymous_structure(&mut reader)?;

    let csr = expect_context_bytes(&mut reader, TAG_CSR, "csr")?;
    let csr_nonce = expect_context_bytes(&mut reader, TAG_CSR_NONCE, "csr nonce")?;
    check_nonce_length(csr_nonce, "csr nonce")?;

    let mut vendor_reserved = Vec::new();
    let mut last_tag = TAG_CSR_NONCE;

    loop {
        let element = reader.expect_element()?;
        if element.is_end_of_container() {
            break;
        }
        match element.tag {
            TlvTag::Context(n)
                if (TAG_NOCSR_VENDOR_RESERVED_FIRST..=TAG_NOCSR_VENDOR_RESERVED_LAST)
                    .contains(&n)
                    && n > last_tag =>
            {
                last_tag = n;
                vendor_reserved.push(element.as_bytes("vendor reserved element")?);
            },
            other => {
                return Err(VerifyError::malformed(format!(
                    "unexpected NOCSR element with tag {other:?}"
                )))
            },
        }
    }

    expect_end_of_input(&reader)?;

    Ok(NocsrElements {
        csr,
        csr_nonce,
        vendor_reserved,
    })
}

/// Encode NOCSR elements.
pub fn construct_nocsr_elements(
    csr: &[u8],
    csr_nonce: &[u8],
    vendor_reserved: &[&[u8]],
) -> Result<Vec<u8>, VerifyError> {
    if csr.is_empty() {
        return Err(VerifyError::invalid_argument("csr must not be empty"));
    }
    check_nonce_length(csr_nonce, "csr nonce")
        .map_err(|_| VerifyError::invalid_argument("csr nonce must be 32 bytes"))?;
    if vendor_reserved.len() > MAX_VENDOR_RESERVED_ELEMENTS {
        return Err(VerifyError::invalid_argument(format!(
            "at most {MAX_VENDOR_RESERVED_ELEMENTS} vendor reserved elements allowed"
        )));
    }

    let mut writer = TlvWriter::new();
    writer
        .start_structure(TlvTag::Anonymous)
        .put_bytes(TlvTag::Context(TAG_CSR), csr)
        .put_bytes(TlvTag::Context(TAG_CSR_NONCE), csr_nonce);

    for (tag, data) in (TAG_NOCSR_VENDOR_RESERVED_FIRST..).zip(vendor_reserved) {
        writer.put_bytes(TlvTag::Context(tag), data);
    }

    writer.end_container();
    Ok(writer.into_bytes())
}

fn enter_anonymous_structure(reader: &mut TlvReader<'_>) -> Result<(), VerifyError> {
    let element = reader.expect_element()?;
    if element.tag != TlvTag::Anonymous || element.value != TlvValue::Structure {
        return Err(VerifyError::malformed("expected anonymous structure"));
    }
    Ok(())
}

fn expect_context_bytes<'a>(
    reader: &mut TlvReader<'a>,
    tag: u8,
    what: &str,
) -> Result<&'a [u8], VerifyError> {
    let element = reader.expect_element()?;
    if element.tag != TlvTag::Context(tag) {
        return Err(VerifyError::malformed(format!(
            "{what} missing or out of order"
        )));
    }
    element.as_bytes(what)
}

fn check_nonce_length(nonce: &[u8], what: &str) -> Result<(), VerifyError> {
    if nonce.len() != EXPECTED_NONCE_LENGTH {
        return Err(VerifyError::malformed(format!(
            "{what} is {} bytes, expected {EXPECTED_NONCE_LENGTH}",
            nonce.len()
        )));
    }
    Ok(())
}

fn expect_end_of_input(reader: &TlvReader<'_>) -> Result<(), VerifyError> {
    if !reader.is_at_end() {
        return Err(VerifyError::malformed("trailing bytes after elements"));
    }
    Ok(())
}
