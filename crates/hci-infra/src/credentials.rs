use std::panic::{self, AssertUnwindSafe};

use compute_api::SshPublicKey;
use rand_core::{CryptoRngCore, OsRng};
use ssh_key::private::RsaKeypair;
use ssh_key::public::KeyData;
use ssh_key::PublicKey;

use crate::{DEFAULT_USER_NAME, Error, Result};

pub const RSA_KEY_BITS: usize = 2048;

/// Path the guest agent installs public keys to.
pub fn authorized_keys_path() -> String {
    format!("/home/{DEFAULT_USER_NAME}/.ssh/authorized_keys")
}

/// Public keys to provision for the initial login.
///
/// Caller-supplied keys pass through unchanged. With none supplied a fresh
/// RSA key pair is generated and only its public half is returned.
pub fn ssh_public_keys(supplied: &[String]) -> Result<Vec<SshPublicKey>> {
    let key_data = if supplied.is_empty() {
        vec![generate_authorized_key()?]
    } else {
        supplied.to_vec()
    };

    let path = authorized_keys_path();
    Ok(key_data
        .into_iter()
        .map(|key_data| SshPublicKey {
            path: path.clone(),
            key_data,
        })
        .collect())
}

/// Generate an RSA key pair and return the public key as an
/// `authorized_keys` line. The private key is dropped before returning.
pub fn generate_authorized_key() -> Result<String> {
    generate_authorized_key_with(&mut OsRng)
}

pub(crate) fn generate_authorized_key_with(rng: &mut impl CryptoRngCore) -> Result<String> {
    let mut probe = [0u8; 32];
    rng.try_fill_bytes(&mut probe)
        .map_err(|e| Error::CredentialGenerationFailed(format!("random source: {e}")))?;

    // the infallible RngCore methods panic when the source fails mid-generation
    let keypair = panic::catch_unwind(AssertUnwindSafe(|| RsaKeypair::random(rng, RSA_KEY_BITS)))
        .map_err(|_| Error::CredentialGenerationFailed("random source failed".into()))?
        .map_err(|e| Error::CredentialGenerationFailed(format!("generate private key: {e}")))?;

    let public = PublicKey::from(KeyData::Rsa(keypair.public.clone()));
    drop(keypair);

    public
        .to_openssh()
        .map_err(|e| Error::CredentialGenerationFailed(format!("encode public key: {e}")))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use rand_core::{CryptoRng, RngCore};

    use super::*;

    /// Fails every fallible read; `healthy_probe` lets the first one through
    /// so generation itself hits the failure.
    struct FailingRng {
        healthy_probe: bool,
    }

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            panic!("entropy source exhausted")
        }

        fn next_u64(&mut self) -> u64 {
            panic!("entropy source exhausted")
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {
            panic!("entropy source exhausted")
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            if self.healthy_probe {
                self.healthy_probe = false;
                dest.fill(0x5a);
                return Ok(());
            }
            Err(rand_core::Error::from(
                NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap(),
            ))
        }
    }

    impl CryptoRng for FailingRng {}

    #[test]
    fn exhausted_randomness_is_fatal() {
        let err = generate_authorized_key_with(&mut FailingRng {
            healthy_probe: false,
        })
        .unwrap_err();
        assert!(matches!(err, Error::CredentialGenerationFailed(_)), "{err:?}");

        let err = generate_authorized_key_with(&mut FailingRng {
            healthy_probe: true,
        })
        .unwrap_err();
        match err {
            Error::CredentialGenerationFailed(msg) => assert_eq!(msg, "random source failed"),
            other => panic!("expected CredentialGenerationFailed, got {other:?}"),
        }
    }

    #[test]
    fn supplied_keys_pass_through() {
        let supplied = vec![
            "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIA operator@jumpbox".to_string(),
            "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQ ci@build".to_string(),
        ];

        let keys = ssh_public_keys(&supplied).unwrap();
        assert_eq!(keys.len(), 2);
        for (key, data) in keys.iter().zip(&supplied) {
            assert_eq!(&key.key_data, data);
            assert_eq!(key.path, "/home/clouduser/.ssh/authorized_keys");
        }
    }

    #[test]
    fn generates_one_rsa_key_when_none_supplied() {
        let keys = ssh_public_keys(&[]).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].path, authorized_keys_path());

        assert!(keys[0].key_data.starts_with("ssh-rsa "), "{}", keys[0].key_data);
        let parsed = PublicKey::from_openssh(&keys[0].key_data).unwrap();
        assert!(matches!(parsed.key_data(), KeyData::Rsa(_)));
        assert!(!keys[0].key_data.contains("PRIVATE"));
    }
}
