//! Property tests for the verification result taxonomy.

use std::collections::HashSet;

use dac_verify_core::result::{describe_code, NO_DESCRIPTION};
use dac_verify_core::AttestationVerificationResult;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    // ========================================================================
    // Description Lookup
    // ========================================================================

    /// Every code has a non-empty description; unknown codes get the fallback.
    #[test]
    fn every_code_has_a_description(code in any::<u16>()) {
        let description = describe_code(code);
        prop_assert!(!description.is_empty());

        match AttestationVerificationResult::from_code(code) {
            Some(result) => {
                prop_assert_eq!(description, result.description());
                prop_assert_ne!(description, NO_DESCRIPTION);
            },
            None => prop_assert_eq!(description, NO_DESCRIPTION),
        }
    }

    /// Known codes survive a code round trip.
    #[test]
    fn known_codes_roundtrip(index in any::<prop::sample::Index>()) {
        let all = AttestationVerificationResult::ALL;
        let result = all[index.index(all.len())];
        prop_assert_eq!(AttestationVerificationResult::from_code(result.code()), Some(result));
    }
}

#[test]
fn descriptions_are_distinct() {
    let descriptions: HashSet<_> = AttestationVerificationResult::ALL
        .iter()
        .map(|r| r.description())
        .collect();
    assert_eq!(descriptions.len(), AttestationVerificationResult::ALL.len());
}

#[test]
fn results_serialize_by_name() {
    let json = serde_json::to_string(&AttestationVerificationResult::PaaNotFound).unwrap();
    assert_eq!(json, "\"PaaNotFound\"");
}
