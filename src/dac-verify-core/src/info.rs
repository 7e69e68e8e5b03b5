//! Attestation inputs and the owned per-attempt device snapshot.

use dac_crypto::SHA256_HASH_LENGTH;
use tracing::debug;

use crate::buffer::OwnedBuffer;
use crate::cd_keys::KEY_IDENTIFIER_LEN;
use crate::elements::deconstruct_attestation_elements;

/// Everything a commissioner collected from the device for one attestation
/// attempt. All spans are borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub struct AttestationInfo<'a> {
    /// Device Attestation Certificate, DER.
    pub dac_der: &'a [u8],
    /// Product Attestation Intermediate certificate, DER.
    pub pai_der: &'a [u8],
    /// TLV attestation elements returned in the Attestation Response.
    pub attestation_elements: &'a [u8],
    /// Session-derived attestation challenge.
    pub attestation_challenge: &'a [u8],
    /// Raw r||s signature over elements and challenge.
    pub attestation_signature: &'a [u8],
    /// Nonce the commissioner sent in the Attestation Request.
    pub attestation_nonce: &'a [u8],
    /// Vendor ID read from the Basic Information cluster.
    pub vendor_id: u16,
    /// Product ID read from the Basic Information cluster.
    pub product_id: u16,
}

/// Owned copies of the device's certificates and Certification Declaration.
///
/// Built once per attempt and never shared. Construction never fails: an
/// allocation failure or undecodable elements leave the affected buffer empty.
#[derive(Debug, Clone, Default)]
pub struct AttestationDeviceInfo {
    pai_der: OwnedBuffer,
    dac_der: OwnedBuffer,
    cd: OwnedBuffer,
    vendor_id: u16,
    product_id: u16,
}

impl AttestationDeviceInfo {
    /// Snapshot the parts of `info` needed after the borrowed spans go away.
    #[must_use]
    pub fn new(info: &AttestationInfo<'_>) -> Self {
        let pai_der = OwnedBuffer::copy_from(info.pai_der);
        let dac_der = OwnedBuffer::copy_from(info.dac_der);

        let cd = match deconstruct_attestation_elements(info.attestation_elements) {
            Ok(elements) => OwnedBuffer::copy_from(elements.certification_declaration),
            Err(e) => {
                debug!(error = %e, "Attestation elements not decodable, no CD captured");
                OwnedBuffer::default()
            },
        };

        Self {
            pai_der,
            dac_der,
            cd,
            vendor_id: info.vendor_id,
            product_id: info.product_id,
        }
    }

    /// PAI certificate bytes.
    #[must_use]
    pub fn pai_der_buffer(&self) -> &[u8] {
        self.pai_der.as_slice()
    }

    /// DAC certificate bytes.
    #[must_use]
    pub fn dac_der_buffer(&self) -> &[u8] {
        self.dac_der.as_slice()
    }

    /// Certification Declaration bytes, empty when none was captured.
    #[must_use]
    pub fn cd_buffer(&self) -> &[u8] {
        self.cd.as_slice()
    }

    /// Whether a Certification Declaration was captured.
    #[must_use]
    pub fn has_cd(&self) -> bool {
        !self.cd.is_empty()
    }

    /// Basic Information vendor ID.
    #[must_use]
    pub fn basic_information_vendor_id(&self) -> u16 {
        self.vendor_id
    }

    /// Basic Information product ID.
    #[must_use]
    pub fn basic_information_product_id(&self) -> u16 {
        self.product_id
    }
}

/// Identity facts cross-checked against a Certification Declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfoForAttestation {
    /// Vendor ID from the Basic Information cluster.
    pub vendor_id: u16,
    /// Product ID from the Basic Information cluster.
    pub product_id: u16,
    /// Vendor ID in the DAC subject.
    pub dac_vendor_id: u16,
    /// Product ID in the DAC subject.
    pub dac_product_id: u16,
    /// Vendor ID in the PAI subject.
    pub pai_vendor_id: u16,
    /// Product ID in the PAI subject, if the PAI is product-scoped.
    pub pai_product_id: Option<u16>,
    /// Vendor ID in the PAA subject, if the PAA is vendor-scoped.
    pub paa_vendor_id: Option<u16>,
    /// Subject Key Identifier of the PAA that anchors the chain.
    pub paa_skid: [u8; KEY_IDENTIFIER_LEN],
    /// SHA-256 of the firmware the device is expected to report.
    pub expected_firmware_digest: Option<[u8; SHA256_HASH_LENGTH]>,
}
