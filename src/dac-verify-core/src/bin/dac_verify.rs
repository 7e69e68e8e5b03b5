//! dac-verify CLI - Matter device attestation verification.
//!
//! Runs the default verifier against certificates and attestation payloads
//! captured from a device, inspects Certification Declarations and lists the
//! result taxonomy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dac_verify_core::result::describe_code;
use dac_verify_core::{
    decode_certification_elements, validate_cd_signature, ArrayAttestationTrustStore,
    AttestationInfo, AttestationVerificationResult, CertificateValidityPolicy,
    CertificationElements, CsaCdKeysTrustStore, DefaultDacVerifier, DeviceAttestationVerifier,
    VerifierConfig,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// dac-verify - Matter device attestation verification.
///
/// Checks a device's PAA → PAI → DAC chain, its attestation signature and its
/// Certification Declaration the way a commissioner does before admitting
/// the device to a fabric.
#[derive(Parser)]
#[command(name = "dac-verify")]
#[command(version = VERSION)]
#[command(about = "Matter device attestation verification")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List verification results, or describe one code
    Results {
        /// Numeric result code
        #[arg(long)]
        code: Option<u16>,
    },

    /// Verify captured attestation information
    Verify {
        /// Directory of trusted PAA certificates (*.der)
        #[arg(long)]
        paa_dir: PathBuf,

        /// PAI certificate (DER)
        #[arg(long)]
        pai: PathBuf,

        /// DAC certificate (DER)
        #[arg(long)]
        dac: PathBuf,

        /// Attestation elements (TLV)
        #[arg(long)]
        elements: PathBuf,

        /// Attestation challenge (hex)
        #[arg(long)]
        challenge: String,

        /// Attestation signature (raw r||s)
        #[arg(long)]
        signature: PathBuf,

        /// Attestation nonce sent to the device (hex)
        #[arg(long)]
        nonce: String,

        /// Basic Information vendor ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_id)]
        vid: u16,

        /// Basic Information product ID (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_id)]
        pid: u16,

        /// Accept declarations signed with the CSA test key
        #[arg(long)]
        allow_test_cd: bool,

        /// Skip certificate expiry checks
        #[arg(long)]
        ignore_expiry: bool,
    },

    /// Validate a Certification Declaration and show its contents
    Cd {
        /// CMS-signed declaration (DER)
        #[arg(long)]
        cms: PathBuf,

        /// Accept declarations signed with the CSA test key
        #[arg(long)]
        allow_test_cd: bool,
    },
}

fn parse_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_digits) => u16::from_str_radix(hex_digits, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid identifier '{s}': {e}"))
}

fn read_file(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

fn decode_hex(what: &str, value: &str) -> Result<Vec<u8>, String> {
    hex::decode(value).map_err(|e| format!("invalid {what} hex: {e}"))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn show_results(code: Option<u16>, json: bool) -> bool {
    match code {
        Some(code) => {
            let known = AttestationVerificationResult::from_code(code).is_some();
            let description = describe_code(code);
            if json {
                print_json(&serde_json::json!({
                    "code": code,
                    "known": known,
                    "description": description,
                }));
            } else {
                println!("{code:>5}  {description}");
            }
            known
        },
        None => {
            if json {
                let all: Vec<_> = AttestationVerificationResult::ALL
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "code": r.code(),
                            "name": format!("{r:?}"),
                            "category": r.category(),
                            "description": r.description(),
                        })
                    })
                    .collect();
                print_json(&serde_json::Value::Array(all));
            } else {
                println!("\nVERIFICATION RESULTS");
                println!("====================\n");
                for result in AttestationVerificationResult::ALL {
                    println!("{:>5}  {:<10} {}", result.code(), result.category(), result);
                }
            }
            true
        },
    }
}

struct VerifyArgs {
    paa_dir: PathBuf,
    pai: PathBuf,
    dac: PathBuf,
    elements: PathBuf,
    challenge: String,
    signature: PathBuf,
    nonce: String,
    vid: u16,
    pid: u16,
    allow_test_cd: bool,
    ignore_expiry: bool,
}

async fn run_verify(args: VerifyArgs, json: bool) -> Result<bool, String> {
    let paa_store = ArrayAttestationTrustStore::from_directory(&args.paa_dir)
        .map_err(|e| format!("cannot load PAA store: {e}"))?;
    let pai = read_file(&args.pai)?;
    let dac = read_file(&args.dac)?;
    let elements = read_file(&args.elements)?;
    let signature = read_file(&args.signature)?;
    let challenge = decode_hex("challenge", &args.challenge)?;
    let nonce = decode_hex("nonce", &args.nonce)?;

    let config = VerifierConfig {
        allow_test_cd_signing_key: args.allow_test_cd,
        validity_policy: if args.ignore_expiry {
            CertificateValidityPolicy::IgnoreExpiry
        } else {
            CertificateValidityPolicy::Enforce
        },
        ..VerifierConfig::default()
    };
    let trusted_paas = paa_store.len();
    let verifier = DefaultDacVerifier::new(Arc::new(paa_store), config);

    let info = AttestationInfo {
        dac_der: &dac,
        pai_der: &pai,
        attestation_elements: &elements,
        attestation_challenge: &challenge,
        attestation_signature: &signature,
        attestation_nonce: &nonce,
        vendor_id: args.vid,
        product_id: args.pid,
    };

    let result = verifier
        .verify_attestation(&info)
        .await
        .unwrap_or(AttestationVerificationResult::InternalError);

    if json {
        print_json(&serde_json::json!({
            "code": result.code(),
            "name": format!("{result:?}"),
            "success": result.is_success(),
            "description": result.description(),
            "trusted_paas": trusted_paas,
        }));
    } else {
        println!("\nDEVICE ATTESTATION");
        println!("==================\n");
        println!("  Vendor ID:    0x{:04X}", args.vid);
        println!("  Product ID:   0x{:04X}", args.pid);
        println!("  Trusted PAAs: {trusted_paas}");
        println!();
        let color = if result.is_success() { "\x1b[32m" } else { "\x1b[31m" };
        println!("Result: {color}{result}\x1b[0m (code {})", result.code());
    }

    Ok(result.is_success())
}

fn print_cd(cd: &CertificationElements) {
    println!("  Format version:     {}", cd.format_version);
    println!("  Vendor ID:          0x{:04X}", cd.vendor_id);
    let pids: Vec<String> = cd.product_ids.iter().map(|p| format!("0x{p:04X}")).collect();
    println!("  Product IDs:        {}", pids.join(", "));
    println!("  Device type:        0x{:08X}", cd.device_type_id);
    println!("  Certificate ID:     {}", cd.certificate_id);
    println!("  Security level:     {}", cd.security_level);
    println!("  Security info:      {}", cd.security_information);
    println!("  Version number:     {}", cd.version_number);
    println!("  Certification type: {:?}", cd.certification_type);
    if let Some(origin) = cd.dac_origin {
        println!(
            "  DAC origin:         0x{:04X}/0x{:04X}",
            origin.vendor_id, origin.product_id
        );
    }
    for skid in &cd.authorized_paa_list {
        println!("  Authorized PAA:     {}", hex::encode(skid));
    }
}

fn run_cd(cms_path: &Path, allow_test_cd: bool, json: bool) -> Result<bool, String> {
    let cms = read_file(cms_path)?;
    let keys = CsaCdKeysTrustStore::new();

    let payload = match validate_cd_signature(&cms, &keys, allow_test_cd) {
        Ok(payload) => payload,
        Err(result) => {
            if json {
                print_json(&serde_json::json!({
                    "signature_valid": false,
                    "code": result.code(),
                    "description": result.description(),
                }));
            } else {
                println!("Signature: \x1b[31m{result}\x1b[0m");
            }
            return Ok(false);
        },
    };

    let cd = decode_certification_elements(payload)
        .map_err(|e| format!("declaration payload not decodable: {e}"))?;

    if json {
        print_json(&serde_json::json!({
            "signature_valid": true,
            "format_version": cd.format_version,
            "vendor_id": cd.vendor_id,
            "product_ids": cd.product_ids,
            "device_type_id": cd.device_type_id,
            "certificate_id": cd.certificate_id,
            "security_level": cd.security_level,
            "security_information": cd.security_information,
            "version_number": cd.version_number,
            "certification_type": cd.certification_type,
            "dac_origin": cd.dac_origin,
            "authorized_paa_list": cd.authorized_paa_list.iter().map(hex::encode).collect::<Vec<_>>(),
        }));
    } else {
        println!("\nCERTIFICATION DECLARATION");
        println!("=========================\n");
        println!("Signature: \x1b[32mvalid\x1b[0m\n");
        print_cd(&cd);
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let json_output = cli.format == "json";

    if json_output {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .init();
    }

    let outcome = match cli.command {
        Commands::Results { code } => Ok(show_results(code, json_output)),
        Commands::Verify {
            paa_dir,
            pai,
            dac,
            elements,
            challenge,
            signature,
            nonce,
            vid,
            pid,
            allow_test_cd,
            ignore_expiry,
        } => {
            let args = VerifyArgs {
                paa_dir,
                pai,
                dac,
                elements,
                challenge,
                signature,
                nonce,
                vid,
                pid,
                allow_test_cd,
                ignore_expiry,
            };
            run_verify(args, json_output).await
        },
        Commands::Cd { cms, allow_test_cd } => run_cd(&cms, allow_test_cd, json_output),
    };

    match outcome {
        Ok(true) => {},
        Ok(false) => std::process::exit(1),
        Err(message) => {
            eprintln!("error: {message}");
            std::process::exit(2);
        },
    }
}
