use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::types::OsType;
use crate::{Error, Result};

pub const COMPUTER_NAME_PREFIX: &str = "moc-";

/// Target computer name length. Windows caps NetBIOS names at 15 characters.
pub const COMPUTER_NAME_LENGTH: usize = 15;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a computer name valid on every supported guest OS:
/// `<prefix><os code><random alphanumerics>`, padded to `COMPUTER_NAME_LENGTH`.
pub fn generate_computer_name(os: OsType) -> Result<String> {
    generate_computer_name_with(os, &mut OsRng)
}

pub(crate) fn generate_computer_name_with<R: TryRngCore>(os: OsType, rng: &mut R) -> Result<String> {
    let mut name = String::from(COMPUTER_NAME_PREFIX);
    name.push(os_code(os));

    if name.len() < COMPUTER_NAME_LENGTH {
        let suffix = random_alphanumeric(COMPUTER_NAME_LENGTH - name.len(), rng)?;
        name.push_str(&suffix);
    }

    Ok(name)
}

fn os_code(os: OsType) -> char {
    match os {
        OsType::Windows | OsType::Windows2022 => 'w',
        OsType::Linux => 'l',
        OsType::Unknown => 'u',
    }
}

/// Lowercase alphanumeric string of length `n` drawn from `rng`.
pub(crate) fn random_alphanumeric<R: TryRngCore>(n: usize, rng: &mut R) -> Result<String> {
    // largest multiple of the charset size that fits in a byte; rejecting
    // anything above it keeps every character equally likely
    let limit = (256 / CHARSET.len() * CHARSET.len()) as u8;

    let mut out = String::with_capacity(n);
    let mut buf = [0u8; 32];
    while out.len() < n {
        rng.try_fill_bytes(&mut buf)
            .map_err(|e| Error::NameGenerationFailed(e.to_string()))?;
        for &b in buf.iter().filter(|&&b| b < limit) {
            if out.len() == n {
                break;
            }
            out.push(CHARSET[b as usize % CHARSET.len()] as char);
        }
    }

    Ok(out)
}
