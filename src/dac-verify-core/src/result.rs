//! Attestation verification result taxonomy.
//!
//! Every stage of device attestation reports exactly one
//! [`AttestationVerificationResult`]. Numeric codes are stable and grouped by
//! certificate role: 1xx PAA, 2xx PAI, 3xx DAC, 4xx firmware, 5xx attestation
//! payload, 6xx certification declaration, then cross-cutting outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Description returned for codes that do not name a result.
pub const NO_DESCRIPTION: &str = "<AttestationVerificationResult does not have a description!>";

/// Outcome of one device attestation verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum AttestationVerificationResult {
    /// Verification succeeded.
    Success = 0,

    /// PAA is untrusted (obsolete).
    PaaUntrusted = 100,
    /// PAA not found in the trust store.
    PaaNotFound = 101,
    /// PAA is expired.
    PaaExpired = 102,
    /// PAA signature is invalid.
    PaaSignatureInvalid = 103,
    /// PAA is revoked.
    PaaRevoked = 104,
    /// PAA format is invalid.
    PaaFormatInvalid = 105,
    /// PAA argument rejected by the X.509 backend.
    PaaArgumentInvalid = 106,

    /// PAI is expired.
    PaiExpired = 200,
    /// PAI signature is invalid.
    PaiSignatureInvalid = 201,
    /// PAI is revoked.
    PaiRevoked = 202,
    /// PAI format is invalid.
    PaiFormatInvalid = 203,
    /// PAI argument rejected by the X.509 backend.
    PaiArgumentInvalid = 204,
    /// PAI vendor ID does not match the PAA.
    PaiVendorIdMismatch = 205,
    /// PAI authority not found (obsolete).
    PaiAuthorityNotFound = 206,
    /// PAI missing from the attestation information.
    PaiMissing = 207,
    /// Both PAI and DAC are revoked.
    PaiAndDacRevoked = 208,

    /// DAC is expired.
    DacExpired = 300,
    /// DAC signature is invalid.
    DacSignatureInvalid = 301,
    /// DAC is revoked.
    DacRevoked = 302,
    /// DAC format is invalid.
    DacFormatInvalid = 303,
    /// DAC argument rejected by the X.509 backend.
    DacArgumentInvalid = 304,
    /// DAC vendor ID mismatch.
    DacVendorIdMismatch = 305,
    /// DAC product ID mismatch.
    DacProductIdMismatch = 306,
    /// DAC authority not found (obsolete).
    DacAuthorityNotFound = 307,

    /// Firmware information does not match.
    FirmwareInformationMismatch = 400,
    /// Firmware information missing.
    FirmwareInformationMissing = 401,

    /// Attestation signature does not verify against the DAC public key.
    AttestationSignatureInvalid = 500,
    /// Attestation elements payload is malformed.
    AttestationElementsMalformed = 501,
    /// Attestation nonce differs from the one in the request.
    AttestationNonceMismatch = 502,
    /// Attestation signature has the wrong format.
    AttestationSignatureInvalidFormat = 503,

    /// CMS envelope has no signer key identifier.
    CertificationDeclarationNoKeyId = 600,
    /// No trusted verification key for the signer key identifier.
    CertificationDeclarationNoCertificateFound = 601,
    /// CD signature does not verify.
    CertificationDeclarationInvalidSignature = 602,
    /// CD payload format is invalid.
    CertificationDeclarationInvalidFormat = 603,
    /// CD vendor ID cross-reference failed.
    CertificationDeclarationInvalidVendorId = 604,
    /// CD product ID cross-reference failed.
    CertificationDeclarationInvalidProductId = 605,
    /// CD authorized PAA list excludes the chain's PAA.
    CertificationDeclarationInvalidPaa = 606,

    /// Allocation failed.
    NoMemory = 700,
    /// Unexpected invalid argument.
    InvalidArgument = 800,
    /// Internal error.
    InternalError = 900,
    /// Reached an unimplemented part of the procedure.
    NotImplemented = 0xFFFF,
}

impl AttestationVerificationResult {
    /// Every result value, in code order.
    pub const ALL: [Self; 42] = [
        Self::Success,
        Self::PaaUntrusted,
        Self::PaaNotFound,
        Self::PaaExpired,
        Self::PaaSignatureInvalid,
        Self::PaaRevoked,
        Self::PaaFormatInvalid,
        Self::PaaArgumentInvalid,
        Self::PaiExpired,
        Self::PaiSignatureInvalid,
        Self::PaiRevoked,
        Self::PaiFormatInvalid,
        Self::PaiArgumentInvalid,
        Self::PaiVendorIdMismatch,
        Self::PaiAuthorityNotFound,
        Self::PaiMissing,
        Self::PaiAndDacRevoked,
        Self::DacExpired,
        Self::DacSignatureInvalid,
        Self::DacRevoked,
        Self::DacFormatInvalid,
        Self::DacArgumentInvalid,
        Self::DacVendorIdMismatch,
        Self::DacProductIdMismatch,
        Self::DacAuthorityNotFound,
        Self::FirmwareInformationMismatch,
        Self::FirmwareInformationMissing,
        Self::AttestationSignatureInvalid,
        Self::AttestationElementsMalformed,
        Self::AttestationNonceMismatch,
        Self::AttestationSignatureInvalidFormat,
        Self::CertificationDeclarationNoKeyId,
        Self::CertificationDeclarationNoCertificateFound,
        Self::CertificationDeclarationInvalidSignature,
        Self::CertificationDeclarationInvalidFormat,
        Self::CertificationDeclarationInvalidVendorId,
        Self::CertificationDeclarationInvalidProductId,
        Self::CertificationDeclarationInvalidPaa,
        Self::NoMemory,
        Self::InvalidArgument,
        Self::InternalError,
        Self::NotImplemented,
    ];

    /// Numeric code of this result.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Look up a result by its numeric code.
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    /// Whether this is [`Success`](Self::Success).
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Collapse a step outcome into a single result value.
    #[must_use]
    pub fn from_outcome(outcome: Result<(), Self>) -> Self {
        outcome.err().unwrap_or(Self::Success)
    }

    /// Convert into a step outcome: `Ok(())` for success, `Err(self)` otherwise.
    pub fn into_outcome(self) -> Result<(), Self> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Short group label (`paa`, `pai`, `dac`, `firmware`, `attestation`,
    /// `certification_declaration`, `general`).
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self.code() {
            0 => "success",
            100..=199 => "paa",
            200..=299 => "pai",
            300..=399 => "dac",
            400..=499 => "firmware",
            500..=599 => "attestation",
            600..=699 => "certification_declaration",
            _ => "general",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::PaaUntrusted => "PAA is untrusted (OBSOLETE: consider using a different error)",
            Self::PaaNotFound => "PAA not found in DCL and/or local PAA trust store",
            Self::PaaExpired => "PAA is expired",
            Self::PaaSignatureInvalid => "PAA signature is invalid",
            Self::PaaRevoked => "PAA is revoked (consider removing from DCL or PAA trust store!)",
            Self::PaaFormatInvalid => "PAA format is invalid",
            Self::PaaArgumentInvalid => {
                "PAA argument is invalid in some way according to X.509 backend"
            },
            Self::PaiExpired => "PAI is expired",
            Self::PaiSignatureInvalid => "PAI signature is invalid",
            Self::PaiRevoked => "PAI is revoked",
            Self::PaiFormatInvalid => "PAI format is invalid",
            Self::PaiArgumentInvalid => {
                "PAI argument is invalid in some way according to X.509 backend"
            },
            Self::PaiVendorIdMismatch => "PAI vendor ID mismatch (did not match VID present in PAA)",
            Self::PaiAuthorityNotFound => {
                "PAI authority not found (OBSOLETE: consider using a different error)"
            },
            Self::PaiMissing => "PAI is missing/empty from attestation information data",
            Self::PaiAndDacRevoked => "Both PAI and DAC are revoked",
            Self::DacExpired => "DAC is expired",
            Self::DacSignatureInvalid => "DAC signature is invalid",
            Self::DacRevoked => "DAC is revoked",
            Self::DacFormatInvalid => "DAC format is invalid",
            Self::DacArgumentInvalid => "DAC is invalid in some way according to X.509 backend",
            Self::DacVendorIdMismatch => {
                "DAC vendor ID mismatch (either between DAC and PAI, or between DAC and Basic \
                 Information cluster)"
            },
            Self::DacProductIdMismatch => {
                "DAC product ID mismatch (either between DAC and PAI, or between DAC and Basic \
                 Information cluster)"
            },
            Self::DacAuthorityNotFound => {
                "DAC authority not found (OBSOLETE: consider using a different error)"
            },
            Self::FirmwareInformationMismatch => "Firmware information mismatch",
            Self::FirmwareInformationMissing => "Firmware information missing",
            Self::AttestationSignatureInvalid => {
                "Attestation signature failed to validate against DAC subject public key"
            },
            Self::AttestationElementsMalformed => "Attestation elements payload is malformed",
            Self::AttestationNonceMismatch => {
                "Attestation nonce does not match the one from Attestation Request"
            },
            Self::AttestationSignatureInvalidFormat => {
                "Attestation signature format is invalid (likely wrong signature algorithm in \
                 certificate)"
            },
            Self::CertificationDeclarationNoKeyId => {
                "Certification declaration missing the required key ID in CMS envelope"
            },
            Self::CertificationDeclarationNoCertificateFound => {
                "Could not find matching trusted verification certificate for the certification \
                 declaration's key ID"
            },
            Self::CertificationDeclarationInvalidSignature => {
                "Certification declaration signature failed to validate against the verification \
                 certificate"
            },
            Self::CertificationDeclarationInvalidFormat => {
                "Certification declaration format is invalid"
            },
            Self::CertificationDeclarationInvalidVendorId => {
                "Certification declaration vendor ID failed to cross-reference with DAC and/or PAI \
                 and/or Basic Information cluster"
            },
            Self::CertificationDeclarationInvalidProductId => {
                "Certification declaration product ID failed to cross-reference with DAC and/or \
                 PAI and/or Basic Information cluster"
            },
            Self::CertificationDeclarationInvalidPaa => {
                "Certification declaration required a fixed allowed PAA which does not match the \
                 final PAA found"
            },
            Self::NoMemory => "Failed to allocate memory to process attestation verification",
            Self::InvalidArgument => {
                "Some unexpected invalid argument was provided internally to the device \
                 attestation procedure (likely malformed input data from candidate device)"
            },
            Self::InternalError => {
                "An internal error arose in the device attestation procedure (likely malformed \
                 input data from candidate device)"
            },
            Self::NotImplemented => {
                "Reached a critical-but-unimplemented part of the device attestation procedure!"
            },
        }
    }
}

/// Describe a raw result code, falling back to [`NO_DESCRIPTION`].
#[must_use]
pub fn describe_code(code: u16) -> &'static str {
    AttestationVerificationResult::from_code(code)
        .map_or(NO_DESCRIPTION, AttestationVerificationResult::description)
}

impl fmt::Display for AttestationVerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl From<AttestationVerificationResult> for u16 {
    fn from(result: AttestationVerificationResult) -> Self {
        result.code()
    }
}

impl TryFrom<u16> for AttestationVerificationResult {
    type Error = u16;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}
