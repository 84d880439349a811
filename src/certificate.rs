//! Self-signed TLS certificate generation
//!
//! Used by the OAuth callback listener when the registered redirect URL is
//! https. The browser will warn about the self-signed cert on first redirect;
//! that is expected for a localhost-only, single-use listener.

use anyhow::{Context, Result};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

/// A freshly generated key/certificate pair, PEM-encoded.
pub struct GeneratedCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generate a self-signed certificate for `domain` (plus `*.domain`).
pub fn generate(
    domain: &str,
    organization: &str,
    validity_days: u32,
) -> Result<GeneratedCertificate> {
    let subject_alt_names = vec![domain.to_string(), format!("*.{domain}")];
    let mut params = CertificateParams::new(subject_alt_names)
        .context("Invalid certificate subject names")?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, domain);
    dn.push(DnType::OrganizationName, organization);
    params.distinguished_name = dn;

    let now = time::OffsetDateTime::now_utc();
    params.not_before = now;
    params.not_after = now + time::Duration::days(i64::from(validity_days));

    let key_pair = KeyPair::generate().context("Failed to generate certificate key pair")?;
    let cert = params
        .self_signed(&key_pair)
        .context("Failed to self-sign certificate")?;

    Ok(GeneratedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}
