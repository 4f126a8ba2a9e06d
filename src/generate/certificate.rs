//! X.509 certificate issuance via `rcgen`.
//!
//! Keys come from the `rsa` crate so certificates honour the requested
//! key length; `rcgen` only signs. To sign with an existing CA the issuer
//! is rebuilt from its PEM and private key: same subject, same key, so
//! leaves chain to the stored CA certificate.

use std::net::IpAddr;

use chrono::{DateTime, Datelike, Days, TimeZone, Utc};
use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, SanType, SerialNumber,
};

use super::keypair::new_key_pair;
use super::SigningAuthority;
use crate::credential::CertificateParameters;
use crate::errors::{CredVaultError, Result};

/// PEM certificate and key plus the expiry written into the certificate.
#[derive(Debug, Clone)]
pub struct Issued {
    pub certificate: String,
    pub private_key: String,
    pub expiry_date: DateTime<Utc>,
}

/// X.509 times cannot encode later years.
const MAX_EXPIRY_YEAR: i32 = 9999;

fn gen_err(what: &str) -> impl Fn(rcgen::Error) -> CredVaultError + '_ {
    move |e| CredVaultError::GenerationFailed(format!("{what}: {e}"))
}

/// Issue a certificate. Self-signed when `signer` is `None`.
pub fn issue(params: &CertificateParameters, signer: Option<&SigningAuthority>) -> Result<Issued> {
    if params.common_name.is_empty() {
        return Err(CredVaultError::GenerationFailed(
            "certificate common name cannot be empty".into(),
        ));
    }
    if params.duration_days == 0 {
        return Err(CredVaultError::GenerationFailed(
            "certificate duration must be at least one day".into(),
        ));
    }

    let mut cert_params = CertificateParams::default();
    cert_params.distinguished_name = distinguished_name(params);
    cert_params.subject_alt_names = alternative_names(&params.alternative_names)?;
    cert_params.serial_number = Some(random_serial());

    if params.is_ca {
        cert_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        cert_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
    } else {
        cert_params.is_ca = IsCa::NoCa;
        cert_params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
    }

    // Validity runs in whole days, midnight UTC.
    let today = Utc::now().date_naive();
    let expiry = today
        .checked_add_days(Days::new(u64::from(params.duration_days)))
        .filter(|date| date.year() <= MAX_EXPIRY_YEAR)
        .ok_or_else(|| {
            CredVaultError::GenerationFailed(format!(
                "certificate duration of {} days ends after year {MAX_EXPIRY_YEAR}",
                params.duration_days
            ))
        })?;
    cert_params.not_before =
        rcgen::date_time_ymd(today.year(), today.month() as u8, today.day() as u8);
    cert_params.not_after =
        rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);
    let expiry_date = Utc
        .with_ymd_and_hms(expiry.year(), expiry.month(), expiry.day(), 0, 0, 0)
        .single()
        .ok_or_else(|| CredVaultError::GenerationFailed("invalid expiry date".into()))?;

    let pair = new_key_pair(params.key_length)?;
    let key = KeyPair::from_pem(&pair.private_key).map_err(gen_err("load generated key"))?;

    let certificate = match signer {
        None => cert_params
            .self_signed(&key)
            .map_err(gen_err("self-signing"))?,
        Some(ca) => {
            let ca_key = KeyPair::from_pem(&ca.private_key).map_err(gen_err("load CA key"))?;
            let ca_cert = CertificateParams::from_ca_cert_pem(&ca.certificate)
                .map_err(gen_err("parse CA certificate"))?
                .self_signed(&ca_key)
                .map_err(gen_err("rebuild CA certificate"))?;
            cert_params
                .signed_by(&key, &ca_cert, &ca_key)
                .map_err(gen_err("signing"))?
        }
    };

    Ok(Issued {
        certificate: certificate.pem(),
        private_key: pair.private_key,
        expiry_date,
    })
}

fn distinguished_name(params: &CertificateParameters) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, params.common_name.as_str());
    let optional = [
        (DnType::OrganizationName, &params.organization),
        (DnType::OrganizationalUnitName, &params.organization_unit),
        (DnType::LocalityName, &params.locality),
        (DnType::StateOrProvinceName, &params.state),
        (DnType::CountryName, &params.country),
    ];
    for (kind, value) in optional {
        if let Some(value) = value {
            dn.push(kind, value.as_str());
        }
    }
    dn
}

/// IP addresses become IP SANs, everything else a DNS name.
fn alternative_names(names: &[String]) -> Result<Vec<SanType>> {
    names
        .iter()
        .map(|name| match name.parse::<IpAddr>() {
            Ok(ip) => Ok(SanType::IpAddress(ip)),
            Err(_) => name.clone().try_into().map(SanType::DnsName).map_err(|e| {
                CredVaultError::GenerationFailed(format!("invalid DNS name '{name}': {e}"))
            }),
        })
        .collect()
}

/// 16 random bytes: positive, with a non-zero leading byte.
fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes[0] &= 0x7f;
    bytes[0] |= 0x01;
    SerialNumber::from_slice(&bytes)
}
