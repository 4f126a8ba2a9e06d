//! Random passwords and usernames.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::credential::PasswordParameters;
use crate::errors::{CredVaultError, Result};

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SPECIAL: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

pub const MIN_LENGTH: usize = 4;
pub const MAX_LENGTH: usize = 200;

const USERNAME_LENGTH: usize = 20;

/// Generate a password.
///
/// Every enabled character class appears at least once.
pub fn generate(params: &PasswordParameters) -> Result<String> {
    if !(MIN_LENGTH..=MAX_LENGTH).contains(&params.length) {
        return Err(CredVaultError::GenerationFailed(format!(
            "password length must be between {MIN_LENGTH} and {MAX_LENGTH} (got {})",
            params.length
        )));
    }

    let mut classes: Vec<&[u8]> = Vec::with_capacity(4);
    if !params.exclude_upper {
        classes.push(UPPER);
    }
    if !params.exclude_lower {
        classes.push(LOWER);
    }
    if !params.exclude_number {
        classes.push(DIGITS);
    }
    if params.include_special {
        classes.push(SPECIAL);
    }
    if classes.is_empty() {
        return Err(CredVaultError::GenerationFailed(
            "every character class is excluded".into(),
        ));
    }

    let alphabet: Vec<u8> = classes.concat();
    let mut rng = rand::rng();

    let mut out: Vec<u8> = classes
        .iter()
        .map(|class| class[rng.random_range(0..class.len())])
        .collect();
    while out.len() < params.length {
        out.push(alphabet[rng.random_range(0..alphabet.len())]);
    }
    out.shuffle(&mut rng);

    // All bytes come from ASCII tables.
    Ok(out.into_iter().map(char::from).collect())
}

/// Random lowercase username, used when a user is generated without one.
pub fn generate_username() -> String {
    let mut rng = rand::rng();
    (0..USERNAME_LENGTH)
        .map(|_| char::from(LOWER[rng.random_range(0..LOWER.len())]))
        .collect()
}
