//! # dac-verify-core
//!
//! Device attestation verification for Matter commissioners: decides whether
//! a candidate device's identity chain and Certification Declaration are
//! acceptable before it is admitted to a fabric.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    VerifierContext                          │
//! │          Arc<dyn DeviceAttestationVerifier>                 │
//! │                           │                                 │
//! │                           ▼                                 │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │              DefaultDacVerifier                   │      │
//! │  │                                                   │      │
//! │  │  ┌──────────────┐ ┌──────────────┐ ┌───────────┐ │      │
//! │  │  │ PAA trust    │ │ CD key trust │ │ Revocation│ │      │
//! │  │  │ store        │ │ store        │ │ delegate  │ │      │
//! │  │  └──────────────┘ └──────────────┘ └───────────┘ │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                 │
//! │                           ▼                                 │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │  x509 chain  │  elements (TLV)  │  CD (CMS+TLV)   │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                 │
//! │                           ▼                                 │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │   dac-crypto: SHA-256 stream, ECDSA P-256 verify  │      │
//! │  └──────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every outcome is reported as one [`AttestationVerificationResult`],
//! delivered through a single-use [`VerificationCompleter`].
//!
//! ## Security Properties
//!
//! - **Fail-closed**: a verifier asked for a revocation check it does not
//!   implement terminates the process
//! - **Constant-time**: nonces and firmware digests are compared with
//!   [`dac_crypto::constant_time_eq`]
//! - **No masking**: crypto primitive errors are returned unchanged

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::missing_panics_doc)] // Panic documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod buffer;
pub mod cd;
pub mod cd_keys;
pub mod completion;
pub mod config;
pub mod default_verifier;
pub mod elements;
pub mod error;
pub mod info;
pub mod registry;
pub mod result;
pub mod revocation;
pub mod signature;
pub mod tlv;
pub mod trust_store;
pub mod verifier;
pub mod x509;

pub use buffer::OwnedBuffer;
pub use cd::{
    decode_certification_elements, encode_certification_elements, encode_cms_signed_data,
    parse_cms_signed_data, validate_cd, validate_cd_signature, CertificationElements,
    CertificationType, CmsSignedData, DacOrigin,
};
pub use cd_keys::{CdKeysTrustStore, CsaCdKeysTrustStore, KEY_IDENTIFIER_LEN, TEST_CD_KID};
pub use completion::{verification_channel, VerificationCompleter, VerificationHandle};
pub use config::{CertificateValidityPolicy, VerifierConfig};
pub use default_verifier::DefaultDacVerifier;
pub use elements::{
    construct_attestation_elements, construct_nocsr_elements, deconstruct_attestation_elements,
    deconstruct_nocsr_elements, AttestationElements, NocsrElements, VendorReservedElement,
};
pub use error::VerifyError;
pub use info::{AttestationDeviceInfo, AttestationInfo, DeviceInfoForAttestation};
pub use registry::{
    get_device_attestation_verifier, global_with_config, set_device_attestation_verifier,
    VerifierContext,
};
pub use result::AttestationVerificationResult;
pub use revocation::{
    DacRevocationDelegate, InMemoryRevocationSet, RevocationQuery, RevocationStatus,
};
pub use signature::validate_attestation_signature;
pub use trust_store::{ArrayAttestationTrustStore, AttestationTrustStore};
pub use verifier::{DeviceAttestationVerifier, UnimplementedDacVerifier};
pub use x509::{validate_attestation_chain, MatterCertificate};
