//! TLS session and certificate diagnostics
//!
//! Everything in here is pure data analysis: the session layer hands over
//! the negotiated parameters and the DER chain captured from the handshake,
//! and this module turns them into a [`TlsReport`] a human can act on.

use std::fmt::{self, Display, Formatter};

use x509_parser::prelude::{FromDer, GeneralName, X509Certificate};
use x509_parser::public_key::PublicKey;

use crate::client::TlsVersion;

/// Negotiated TLS session parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConnectionInfo {
    /// Protocol version the handshake settled on
    pub version: TlsVersion,
    /// Negotiated cipher suite, as named by the TLS registry
    pub cipher_suite: String,
    /// Rough quality classification of the cipher suite
    pub cipher_strength: CipherStrength,
    /// The server name the certificate was checked against
    pub server_name: String,
}

/// Coarse cipher suite classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherStrength {
    /// AEAD suites (GCM, ChaCha20-Poly1305)
    Strong,
    /// CBC-mode suites without known breaks
    Medium,
    /// RC4, DES/3DES, export or NULL suites
    Weak,
}

impl CipherStrength {
    pub(crate) fn classify(suite: &str) -> CipherStrength {
        let upper = suite.to_ascii_uppercase();
        const WEAK_MARKERS: &[&str] = &["RC4", "3DES", "_DES_", "NULL", "EXPORT", "ANON"];
        if WEAK_MARKERS.iter().any(|m| upper.contains(m)) {
            CipherStrength::Weak
        } else if upper.contains("GCM") || upper.contains("CHACHA20") {
            CipherStrength::Strong
        } else {
            CipherStrength::Medium
        }
    }
}

/// One certificate out of the chain the server presented
///
/// Validity bounds are unix timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Full subject distinguished name
    pub subject: String,
    /// Subject common name, when one is present
    pub common_name: Option<String>,
    /// Full issuer distinguished name
    pub issuer: String,
    /// Serial number as colon-separated hex
    pub serial_number: String,
    /// Start of the validity window
    pub not_before: i64,
    /// End of the validity window
    pub not_after: i64,
    /// DNS names from the subject alternative name extension
    pub san_dns_names: Vec<String>,
    /// Human readable signature algorithm name
    pub signature_algorithm: String,
    /// Human readable public key algorithm name
    pub public_key_algorithm: String,
    /// Public key size in bits, when it could be determined
    pub public_key_bits: Option<u32>,
    /// Key usage flags, as named by RFC 5280
    pub key_usage: Vec<String>,
    /// Extended key usage purposes
    pub ext_key_usage: Vec<String>,
    /// Basic constraints CA flag
    pub is_ca: bool,
    /// Subject and issuer are identical
    pub is_self_signed: bool,
    /// Verdict for this certificate within the analyzed chain
    pub status: VerificationStatus,
}

impl CertificateInfo {
    /// Whether this certificate covers `server_name`
    ///
    /// SAN DNS entries take precedence; the common name is only consulted
    /// when the certificate carries no SAN extension.
    pub fn matches_hostname(&self, server_name: &str) -> bool {
        if !self.san_dns_names.is_empty() {
            self.san_dns_names
                .iter()
                .any(|pattern| hostname_matches(pattern, server_name))
        } else {
            self.common_name
                .as_deref()
                .is_some_and(|cn| hostname_matches(cn, server_name))
        }
    }
}

/// Matches a certificate name pattern against a hostname
///
/// A `*` wildcard is only honored as the complete left-most label and only
/// spans a single label, per RFC 6125.
fn hostname_matches(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    if let Some(suffix) = pattern.strip_prefix("*.") {
        match name.split_once('.') {
            Some((first_label, rest)) => !first_label.is_empty() && rest == suffix,
            None => false,
        }
    } else {
        pattern == name
    }
}

/// Overall verdict on the presented certificate chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Within its validity window, matching the hostname, anchored in the
    /// trust roots
    Valid,
    /// The leaf validity window has ended
    Expired,
    /// The leaf validity window has not started yet
    NotYetValid,
    /// The leaf does not cover the requested server name
    HostnameMismatch,
    /// The leaf is its own issuer and anchors nowhere
    SelfSigned,
    /// The chain does not lead to a trusted root
    UnknownAuthority,
    /// No verdict could be formed, typically because the chain did not parse
    Unverified,
}

impl Display for VerificationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::Expired => "expired",
            VerificationStatus::NotYetValid => "not yet valid",
            VerificationStatus::HostnameMismatch => "hostname mismatch",
            VerificationStatus::SelfSigned => "self-signed",
            VerificationStatus::UnknownAuthority => "unknown authority",
            VerificationStatus::Unverified => "unverified",
        })
    }
}

/// What a diagnostic warning is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningCategory {
    Expiry,
    Hostname,
    Trust,
    KeyStrength,
    SignatureAlgorithm,
    Cipher,
    Protocol,
}

/// How urgent a diagnostic warning is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WarningSeverity {
    /// Worth knowing, not in itself a problem
    Info,
    /// Should be acted on
    Warning,
}

/// A single actionable finding about the TLS setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub category: WarningCategory,
    pub severity: WarningSeverity,
    pub message: String,
}

/// Everything learned about the TLS layer of a session
#[derive(Debug, Clone)]
pub struct TlsReport {
    /// Negotiated session parameters
    pub connection: TlsConnectionInfo,
    /// Presented certificates, leaf first
    pub chain: Vec<CertificateInfo>,
    /// Verdict on the leaf certificate
    pub verification: VerificationStatus,
    /// Findings, ordered as generated
    pub warnings: Vec<Warning>,
}

const EXPIRY_HEADS_UP_SECS: i64 = 30 * 24 * 3600;
const MIN_RSA_BITS: u32 = 2048;
const MIN_EC_BITS: u32 = 256;

/// Builds the full report from raw handshake output
///
/// `trusted` carries the trust-root verdict when one is available: strict
/// handshakes that completed imply `Some(true)`, a capturing verifier
/// reports what it observed, and `None` means no verdict exists.
pub(crate) fn analyze(
    version: TlsVersion,
    cipher_suite: String,
    chain_der: &[Vec<u8>],
    server_name: &str,
    now: i64,
    trusted: Option<bool>,
) -> TlsReport {
    let cipher_strength = CipherStrength::classify(&cipher_suite);
    let connection = TlsConnectionInfo {
        version,
        cipher_suite,
        cipher_strength,
        server_name: server_name.to_owned(),
    };

    let mut chain = Vec::with_capacity(chain_der.len());
    let mut parse_failed = false;
    for der in chain_der {
        match parse_certificate(der) {
            Some(info) => chain.push(info),
            None => parse_failed = true,
        }
    }

    let count = chain.len();
    let statuses: Vec<VerificationStatus> = chain
        .iter()
        .enumerate()
        .map(|(i, cert)| {
            if i == 0 {
                classify(cert, server_name, now, trusted)
            } else {
                classify_issuer(cert, now, i + 1 == count, trusted)
            }
        })
        .collect();
    for (cert, status) in chain.iter_mut().zip(statuses) {
        cert.status = status;
    }

    let verification = match chain.first() {
        Some(leaf) if !parse_failed => leaf.status,
        _ => VerificationStatus::Unverified,
    };

    let mut warnings = connection_warnings(&connection);
    if let Some(leaf) = chain.first() {
        warnings.extend(certificate_warnings(leaf, now));
    }
    warnings.extend(verification_warnings(verification, server_name));
    if parse_failed {
        warnings.push(Warning {
            category: WarningCategory::Trust,
            severity: WarningSeverity::Warning,
            message: "one or more presented certificates could not be parsed".to_owned(),
        });
    }

    TlsReport {
        connection,
        chain,
        verification,
        warnings,
    }
}

/// Classifies the leaf certificate
///
/// Checks run in a fixed priority order so one status captures the most
/// severe problem: expiry before hostname, hostname before trust.
pub(crate) fn classify(
    leaf: &CertificateInfo,
    server_name: &str,
    now: i64,
    trusted: Option<bool>,
) -> VerificationStatus {
    if now >= leaf.not_after {
        return VerificationStatus::Expired;
    }
    if now < leaf.not_before {
        return VerificationStatus::NotYetValid;
    }
    if !leaf.matches_hostname(server_name) {
        return VerificationStatus::HostnameMismatch;
    }
    match trusted {
        Some(true) => VerificationStatus::Valid,
        Some(false) if leaf.is_self_signed => VerificationStatus::SelfSigned,
        Some(false) => VerificationStatus::UnknownAuthority,
        None => VerificationStatus::Unverified,
    }
}

/// Classifies a non-leaf certificate; hostname and trust anchoring only
/// apply to the leaf
fn classify_issuer(
    cert: &CertificateInfo,
    now: i64,
    is_last: bool,
    trusted: Option<bool>,
) -> VerificationStatus {
    if now >= cert.not_after {
        return VerificationStatus::Expired;
    }
    if now < cert.not_before {
        return VerificationStatus::NotYetValid;
    }
    if is_last && cert.is_self_signed && trusted == Some(false) {
        return VerificationStatus::SelfSigned;
    }
    match trusted {
        Some(_) => VerificationStatus::Valid,
        None => VerificationStatus::Unverified,
    }
}

fn connection_warnings(connection: &TlsConnectionInfo) -> Vec<Warning> {
    let mut warnings = Vec::new();
    if connection.version < TlsVersion::Tlsv12 {
        warnings.push(Warning {
            category: WarningCategory::Protocol,
            severity: WarningSeverity::Warning,
            message: format!("{} is deprecated, expect at least TLS 1.2", connection.version),
        });
    }
    match connection.cipher_strength {
        CipherStrength::Weak => warnings.push(Warning {
            category: WarningCategory::Cipher,
            severity: WarningSeverity::Warning,
            message: format!("weak cipher suite {}", connection.cipher_suite),
        }),
        CipherStrength::Medium => warnings.push(Warning {
            category: WarningCategory::Cipher,
            severity: WarningSeverity::Info,
            message: format!(
                "cipher suite {} is not an AEAD suite",
                connection.cipher_suite
            ),
        }),
        CipherStrength::Strong => {}
    }
    warnings
}

fn certificate_warnings(leaf: &CertificateInfo, now: i64) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if now >= leaf.not_after {
        warnings.push(Warning {
            category: WarningCategory::Expiry,
            severity: WarningSeverity::Warning,
            message: "certificate has expired".to_owned(),
        });
    } else if leaf.not_after - now <= EXPIRY_HEADS_UP_SECS {
        let days = (leaf.not_after - now) / (24 * 3600);
        warnings.push(Warning {
            category: WarningCategory::Expiry,
            severity: WarningSeverity::Warning,
            message: format!("certificate expires in {days} days"),
        });
    }
    if now < leaf.not_before {
        warnings.push(Warning {
            category: WarningCategory::Expiry,
            severity: WarningSeverity::Warning,
            message: "certificate is not yet valid".to_owned(),
        });
    }

    let sig = leaf.signature_algorithm.to_ascii_uppercase();
    if sig.contains("SHA1") || sig.contains("SHA-1") || sig.contains("MD5") {
        warnings.push(Warning {
            category: WarningCategory::SignatureAlgorithm,
            severity: WarningSeverity::Warning,
            message: format!(
                "certificate uses deprecated signature algorithm {}",
                leaf.signature_algorithm
            ),
        });
    }

    if let Some(bits) = leaf.public_key_bits {
        let minimum = match leaf.public_key_algorithm.as_str() {
            "RSA" => Some(MIN_RSA_BITS),
            "EC" => Some(MIN_EC_BITS),
            _ => None,
        };
        if let Some(minimum) = minimum {
            if bits < minimum {
                warnings.push(Warning {
                    category: WarningCategory::KeyStrength,
                    severity: WarningSeverity::Warning,
                    message: format!(
                        "{} key of {bits} bits is below the recommended {minimum}",
                        leaf.public_key_algorithm
                    ),
                });
            }
        }
    }

    warnings
}

fn verification_warnings(status: VerificationStatus, server_name: &str) -> Vec<Warning> {
    match status {
        VerificationStatus::HostnameMismatch => vec![Warning {
            category: WarningCategory::Hostname,
            severity: WarningSeverity::Warning,
            message: format!("certificate does not cover {server_name}"),
        }],
        VerificationStatus::SelfSigned => vec![Warning {
            category: WarningCategory::Trust,
            severity: WarningSeverity::Info,
            message: "certificate is self-signed".to_owned(),
        }],
        VerificationStatus::UnknownAuthority => vec![Warning {
            category: WarningCategory::Trust,
            severity: WarningSeverity::Warning,
            message: "certificate chain does not lead to a trusted root".to_owned(),
        }],
        _ => Vec::new(),
    }
}

/// Extracts the report fields from one DER certificate
///
/// Returns `None` when the certificate does not parse; the caller folds
/// that into a warning instead of failing the whole report.
pub(crate) fn parse_certificate(der: &[u8]) -> Option<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der).ok()?;

    let subject = cert.subject().to_string();
    let issuer = cert.issuer().to_string();
    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_owned);

    let san_dns_names = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .map(|san| {
            san.value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some((*dns).to_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    let is_ca = cert
        .basic_constraints()
        .ok()
        .flatten()
        .map(|bc| bc.value.ca)
        .unwrap_or(false);

    let spki = cert.public_key();
    let (public_key_algorithm, public_key_bits) = describe_public_key(spki);

    Some(CertificateInfo {
        is_self_signed: subject == issuer,
        subject,
        common_name,
        issuer,
        serial_number: cert.raw_serial_as_string(),
        not_before: cert.validity().not_before.timestamp(),
        not_after: cert.validity().not_after.timestamp(),
        san_dns_names,
        signature_algorithm: signature_algorithm_name(
            &cert.signature_algorithm.algorithm.to_id_string(),
        ),
        public_key_algorithm,
        public_key_bits,
        key_usage: key_usage_names(&cert),
        ext_key_usage: ext_key_usage_names(&cert),
        is_ca,
        status: VerificationStatus::Unverified,
    })
}

fn key_usage_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let Ok(Some(extension)) = cert.key_usage() else {
        return Vec::new();
    };
    let usage = extension.value;
    let flags: &[(&str, bool)] = &[
        ("digitalSignature", usage.digital_signature()),
        ("nonRepudiation", usage.non_repudiation()),
        ("keyEncipherment", usage.key_encipherment()),
        ("dataEncipherment", usage.data_encipherment()),
        ("keyAgreement", usage.key_agreement()),
        ("keyCertSign", usage.key_cert_sign()),
        ("cRLSign", usage.crl_sign()),
    ];
    flags
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| (*name).to_owned())
        .collect()
}

fn ext_key_usage_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let Ok(Some(extension)) = cert.extended_key_usage() else {
        return Vec::new();
    };
    let usage = extension.value;
    let purposes: &[(&str, bool)] = &[
        ("serverAuth", usage.server_auth),
        ("clientAuth", usage.client_auth),
        ("codeSigning", usage.code_signing),
        ("emailProtection", usage.email_protection),
        ("timeStamping", usage.time_stamping),
        ("OCSPSigning", usage.ocsp_signing),
        ("anyExtendedKeyUsage", usage.any),
    ];
    purposes
        .iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| (*name).to_owned())
        .collect()
}

fn signature_algorithm_name(oid: &str) -> String {
    match oid {
        "1.2.840.113549.1.1.4" => "md5WithRSAEncryption".to_owned(),
        "1.2.840.113549.1.1.5" => "sha1WithRSAEncryption".to_owned(),
        "1.2.840.113549.1.1.11" => "sha256WithRSAEncryption".to_owned(),
        "1.2.840.113549.1.1.12" => "sha384WithRSAEncryption".to_owned(),
        "1.2.840.113549.1.1.13" => "sha512WithRSAEncryption".to_owned(),
        "1.2.840.10045.4.1" => "ecdsa-with-SHA1".to_owned(),
        "1.2.840.10045.4.3.2" => "ecdsa-with-SHA256".to_owned(),
        "1.2.840.10045.4.3.3" => "ecdsa-with-SHA384".to_owned(),
        "1.2.840.10045.4.3.4" => "ecdsa-with-SHA512".to_owned(),
        "1.3.101.112" => "Ed25519".to_owned(),
        other => other.to_owned(),
    }
}

fn describe_public_key(
    spki: &x509_parser::x509::SubjectPublicKeyInfo<'_>,
) -> (String, Option<u32>) {
    match spki.parsed() {
        Ok(PublicKey::RSA(rsa)) => ("RSA".to_owned(), Some(modulus_bits(rsa.modulus))),
        Ok(PublicKey::EC(point)) => {
            // An uncompressed point is a 0x04 tag followed by two coordinates
            let data = point.data();
            let bits = if data.first() == Some(&0x04) && data.len() > 1 {
                Some(((data.len() as u32 - 1) / 2) * 8)
            } else {
                None
            };
            ("EC".to_owned(), bits)
        }
        _ => match spki.algorithm.algorithm.to_id_string().as_str() {
            "1.3.101.112" => ("Ed25519".to_owned(), Some(256)),
            oid => (oid.to_owned(), None),
        },
    }
}

fn modulus_bits(modulus: &[u8]) -> u32 {
    let stripped: &[u8] = match modulus.iter().position(|&b| b != 0) {
        Some(first) => &modulus[first..],
        None => return 0,
    };
    (stripped.len() as u32) * 8 - stripped[0].leading_zeros()
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn leaf() -> CertificateInfo {
        CertificateInfo {
            subject: "CN=mail.example.com".to_owned(),
            common_name: Some("mail.example.com".to_owned()),
            issuer: "CN=Example CA".to_owned(),
            serial_number: "0a:1b:2c".to_owned(),
            not_before: 1_600_000_000,
            not_after: 1_900_000_000,
            san_dns_names: vec!["mail.example.com".to_owned(), "*.example.org".to_owned()],
            signature_algorithm: "sha256WithRSAEncryption".to_owned(),
            public_key_algorithm: "RSA".to_owned(),
            public_key_bits: Some(2048),
            key_usage: vec!["digitalSignature".to_owned(), "keyEncipherment".to_owned()],
            ext_key_usage: vec!["serverAuth".to_owned()],
            is_ca: false,
            is_self_signed: false,
            status: VerificationStatus::Unverified,
        }
    }

    #[test]
    fn test_hostname_matching() {
        let cert = leaf();
        assert!(cert.matches_hostname("mail.example.com"));
        assert!(cert.matches_hostname("MAIL.EXAMPLE.COM"));
        assert!(cert.matches_hostname("smtp.example.org"));
        // Wildcard spans exactly one label
        assert!(!cert.matches_hostname("example.org"));
        assert!(!cert.matches_hostname("a.b.example.org"));
        assert!(!cert.matches_hostname("smtp.example.com"));
    }

    #[test]
    fn test_common_name_only_as_fallback() {
        let mut cert = leaf();
        cert.common_name = Some("other.example.net".to_owned());
        // SAN present, CN ignored
        assert!(!cert.matches_hostname("other.example.net"));

        cert.san_dns_names.clear();
        assert!(cert.matches_hostname("other.example.net"));
    }

    #[test]
    fn test_classify_hostname_mismatch_wins_over_trust() {
        let cert = leaf();
        let status = classify(&cert, "smtp.example.com", 1_700_000_000, Some(false));
        assert_eq!(status, VerificationStatus::HostnameMismatch);
    }

    #[test]
    fn test_hostname_mismatch_also_emits_warning() {
        let cert = leaf();
        let status = classify(&cert, "smtp.example.com", 1_700_000_000, Some(true));
        assert_eq!(status, VerificationStatus::HostnameMismatch);

        let warnings = verification_warnings(status, "smtp.example.com");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].category, WarningCategory::Hostname);
        assert_eq!(warnings[0].severity, WarningSeverity::Warning);
        assert!(warnings[0].message.contains("smtp.example.com"));
    }

    #[test]
    fn test_verification_warning_severities() {
        let self_signed = verification_warnings(VerificationStatus::SelfSigned, "x");
        assert_eq!(self_signed[0].category, WarningCategory::Trust);
        assert_eq!(self_signed[0].severity, WarningSeverity::Info);

        let untrusted = verification_warnings(VerificationStatus::UnknownAuthority, "x");
        assert_eq!(untrusted[0].category, WarningCategory::Trust);
        assert_eq!(untrusted[0].severity, WarningSeverity::Warning);

        assert!(verification_warnings(VerificationStatus::Valid, "x").is_empty());
    }

    #[test]
    fn test_classify_expiry_boundary() {
        let cert = leaf();
        // The instant not_after is reached the certificate counts as expired
        assert_eq!(
            classify(&cert, "mail.example.com", cert.not_after, Some(true)),
            VerificationStatus::Expired
        );
        assert_eq!(
            classify(&cert, "mail.example.com", cert.not_after - 1, Some(true)),
            VerificationStatus::Valid
        );
    }

    #[test]
    fn test_classify_not_yet_valid() {
        let cert = leaf();
        assert_eq!(
            classify(&cert, "mail.example.com", cert.not_before - 1, Some(true)),
            VerificationStatus::NotYetValid
        );
    }

    #[test]
    fn test_classify_trust_outcomes() {
        let mut cert = leaf();
        let now = 1_700_000_000;
        assert_eq!(
            classify(&cert, "mail.example.com", now, Some(true)),
            VerificationStatus::Valid
        );
        assert_eq!(
            classify(&cert, "mail.example.com", now, Some(false)),
            VerificationStatus::UnknownAuthority
        );
        assert_eq!(
            classify(&cert, "mail.example.com", now, None),
            VerificationStatus::Unverified
        );

        cert.issuer = cert.subject.clone();
        cert.is_self_signed = true;
        assert_eq!(
            classify(&cert, "mail.example.com", now, Some(false)),
            VerificationStatus::SelfSigned
        );
    }

    #[test]
    fn test_rsa_key_strength_boundary() {
        let mut cert = leaf();
        let now = 1_700_000_000;
        assert!(certificate_warnings(&cert, now)
            .iter()
            .all(|w| w.category != WarningCategory::KeyStrength));

        cert.public_key_bits = Some(2047);
        let warnings = certificate_warnings(&cert, now);
        let key_warning = warnings
            .iter()
            .find(|w| w.category == WarningCategory::KeyStrength)
            .unwrap();
        assert_eq!(key_warning.severity, WarningSeverity::Warning);
        assert!(key_warning.message.contains("2047"));
    }

    #[test]
    fn test_expiry_heads_up_window() {
        let cert = leaf();
        let now = cert.not_after - 10 * 24 * 3600;
        let warnings = certificate_warnings(&cert, now);
        let expiry = warnings
            .iter()
            .find(|w| w.category == WarningCategory::Expiry)
            .unwrap();
        assert_eq!(expiry.severity, WarningSeverity::Warning);
        assert!(expiry.message.contains("10 days"));
    }

    #[test]
    fn test_deprecated_signature_warns() {
        let mut cert = leaf();
        cert.signature_algorithm = "sha1WithRSAEncryption".to_owned();
        let warnings = certificate_warnings(&cert, 1_700_000_000);
        assert!(warnings
            .iter()
            .any(|w| w.category == WarningCategory::SignatureAlgorithm));
    }

    #[test]
    fn test_cipher_classification() {
        assert_eq!(
            CipherStrength::classify("TLS13_AES_256_GCM_SHA384"),
            CipherStrength::Strong
        );
        assert_eq!(
            CipherStrength::classify("TLS13_CHACHA20_POLY1305_SHA256"),
            CipherStrength::Strong
        );
        assert_eq!(
            CipherStrength::classify("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384"),
            CipherStrength::Medium
        );
        assert_eq!(
            CipherStrength::classify("TLS_RSA_WITH_RC4_128_SHA"),
            CipherStrength::Weak
        );
    }

    #[test]
    fn test_analyze_without_certificates() {
        let report = analyze(
            TlsVersion::Tlsv13,
            "TLS13_AES_128_GCM_SHA256".to_owned(),
            &[],
            "mail.example.com",
            1_700_000_000,
            Some(true),
        );
        assert_eq!(report.verification, VerificationStatus::Unverified);
        assert!(report.chain.is_empty());
        assert_eq!(report.connection.cipher_strength, CipherStrength::Strong);
    }

    #[test]
    fn test_modulus_bits() {
        assert_eq!(modulus_bits(&[0x00, 0x80, 0x00]), 16);
        assert_eq!(modulus_bits(&[0x01; 256]), 2041);
        let mut modulus = vec![0xff];
        modulus.extend(std::iter::repeat(0x00).take(255));
        assert_eq!(modulus_bits(&modulus), 2048);
    }
}
