//! Credential generation.
//!
//! The core only knows the [`CredentialGenerator`] trait; the bundled
//! [`StandardGenerator`] produces passwords, users, RSA and SSH key pairs
//! and X.509 certificates.

pub mod certificate;
pub mod keypair;
pub mod password;

use chrono::{DateTime, Utc};

use crate::credential::{
    CertificateValue, CredentialType, CredentialValue, GenerationParameters, UserParameters,
    UserValue,
};
use crate::errors::{CredVaultError, Result};

/// What to generate, and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub name: String,
    pub parameters: GenerationParameters,
}

impl GenerateRequest {
    pub fn new(name: impl Into<String>, parameters: GenerationParameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    pub fn credential_type(&self) -> CredentialType {
        match self.parameters {
            GenerationParameters::Password(_) => CredentialType::Password,
            GenerationParameters::User(_) => CredentialType::User,
            GenerationParameters::Rsa(_) => CredentialType::Rsa,
            GenerationParameters::Ssh(_) => CredentialType::Ssh,
            GenerationParameters::Certificate(_) => CredentialType::Certificate,
        }
    }
}

/// The CA a certificate is signed with: the resolved version's public
/// certificate and private key.
#[derive(Clone)]
pub struct SigningAuthority {
    pub name: String,
    pub certificate: String,
    pub private_key: String,
}

impl std::fmt::Debug for SigningAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningAuthority")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Output of one generation.
#[derive(Debug, Clone)]
pub struct Generated {
    pub value: CredentialValue,
    /// Parameters to store with the version. Differs from the request when
    /// the generator filled something in (a generated username).
    pub parameters: GenerationParameters,
    /// Certificates only.
    pub expiry_date: Option<DateTime<Utc>>,
}

pub trait CredentialGenerator: Send + Sync {
    /// Generate a value for `request`.
    ///
    /// `signer` is set exactly when the request is a certificate naming a CA.
    fn generate(
        &self,
        request: &GenerateRequest,
        signer: Option<&SigningAuthority>,
    ) -> Result<Generated>;
}

/// Generator backed by the OS random source, `rsa` and `rcgen`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardGenerator;

impl CredentialGenerator for StandardGenerator {
    fn generate(
        &self,
        request: &GenerateRequest,
        signer: Option<&SigningAuthority>,
    ) -> Result<Generated> {
        let mut expiry_date = None;
        let mut parameters = request.parameters.clone();

        let value = match &mut parameters {
            GenerationParameters::Password(params) => {
                CredentialValue::Password(password::generate(params)?)
            }
            GenerationParameters::User(UserParameters {
                username,
                password: password_params,
            }) => {
                let username = username
                    .get_or_insert_with(password::generate_username)
                    .clone();
                CredentialValue::User(UserValue {
                    username,
                    password: password::generate(password_params)?,
                })
            }
            GenerationParameters::Rsa(params) => {
                CredentialValue::Rsa(keypair::generate_rsa(params.key_length)?)
            }
            GenerationParameters::Ssh(params) => CredentialValue::Ssh(keypair::generate_ssh(
                params.key_length,
                params.ssh_comment.as_deref(),
            )?),
            GenerationParameters::Certificate(params) => {
                if params.ca.is_some() && signer.is_none() {
                    return Err(CredVaultError::SigningCaMissing(
                        params.ca.clone().unwrap_or_default(),
                    ));
                }
                let issued = certificate::issue(params, signer)?;
                expiry_date = Some(issued.expiry_date);
                CredentialValue::Certificate(CertificateValue {
                    ca: None,
                    certificate: issued.certificate,
                    private_key: issued.private_key,
                })
            }
        };

        Ok(Generated {
            value,
            parameters,
            expiry_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::PasswordParameters;

    #[test]
    fn user_without_username_records_the_generated_one() {
        let request = GenerateRequest::new(
            "/svc",
            GenerationParameters::User(UserParameters {
                username: None,
                password: PasswordParameters::default(),
            }),
        );
        let generated = StandardGenerator.generate(&request, None).unwrap();

        let CredentialValue::User(user) = &generated.value else {
            panic!("expected a user value");
        };
        match &generated.parameters {
            GenerationParameters::User(params) => {
                assert_eq!(params.username.as_deref(), Some(user.username.as_str()));
            }
            other => panic!("unexpected parameters {other:?}"),
        }
        assert_eq!(user.password.len(), 30);
    }

    #[test]
    fn signed_certificate_needs_a_signer() {
        let mut params = crate::credential::CertificateParameters::new("leaf");
        params.ca = Some("/ca".into());
        let request = GenerateRequest::new("/leaf", GenerationParameters::Certificate(params));

        match StandardGenerator.generate(&request, None) {
            Err(CredVaultError::SigningCaMissing(name)) => assert_eq!(name, "/ca"),
            other => panic!("expected SigningCaMissing, got {other:?}"),
        }
    }

    #[test]
    fn request_reports_its_type() {
        let request = GenerateRequest::new(
            "/p",
            GenerationParameters::Password(PasswordParameters::default()),
        );
        assert_eq!(request.credential_type(), CredentialType::Password);
    }
}
