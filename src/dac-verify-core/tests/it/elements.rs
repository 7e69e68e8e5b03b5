//! Property tests for attestation elements and the device info snapshot.

use dac_verify_core::tlv::TlvReader;
use dac_verify_core::{deconstruct_attestation_elements, AttestationDeviceInfo};
use proptest::prelude::*;

use crate::support::{cms_cd, Fixture, NONCE, TIMESTAMP};

/// Strategy for arbitrary byte payloads.
fn byte_payload() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Decoder Robustness
    // ========================================================================

    /// Arbitrary bytes never panic the elements decoder.
    #[test]
    fn arbitrary_bytes_never_panic(data in byte_payload()) {
        let _ = deconstruct_attestation_elements(&data);
    }

    /// Arbitrary bytes never panic the TLV reader.
    #[test]
    fn tlv_reader_terminates(data in byte_payload()) {
        let mut reader = TlvReader::new(&data);
        let mut steps = 0usize;
        while let Ok(Some(_)) = reader.next_element() {
            steps += 1;
            prop_assert!(steps <= data.len());
        }
    }

    /// Every strict prefix of valid elements is rejected.
    #[test]
    fn truncated_elements_rejected(cut in any::<prop::sample::Index>()) {
        let fixture = Fixture::new();
        let len = cut.index(fixture.elements.len());
        prop_assert!(deconstruct_attestation_elements(&fixture.elements[..len]).is_err());
    }

    // ========================================================================
    // Device Info Snapshot
    // ========================================================================

    /// Malformed elements leave the CD empty but keep both certificates.
    #[test]
    fn malformed_elements_give_empty_cd(cut in any::<prop::sample::Index>()) {
        let mut fixture = Fixture::new();
        let len = cut.index(fixture.elements.len());
        fixture.elements.truncate(len);

        let device = AttestationDeviceInfo::new(&fixture.info());
        prop_assert!(!device.has_cd());
        prop_assert_eq!(device.dac_der_buffer(), fixture.dac.as_slice());
        prop_assert_eq!(device.pai_der_buffer(), fixture.pai.as_slice());
        prop_assert_eq!(device.basic_information_vendor_id(), 0xFFF1);
    }
}

#[test]
fn well_formed_elements_expose_cd() {
    let fixture = Fixture::new();
    let elements = deconstruct_attestation_elements(&fixture.elements).unwrap();

    assert_eq!(elements.certification_declaration, cms_cd().as_slice());
    assert_eq!(elements.attestation_nonce, NONCE.as_slice());
    assert_eq!(elements.timestamp, TIMESTAMP);
    assert!(elements.firmware_info.is_empty());

    let device = AttestationDeviceInfo::new(&fixture.info());
    assert_eq!(device.cd_buffer(), cms_cd().as_slice());
}
