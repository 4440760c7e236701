//! Document key generators.
//!
//! Both generators draw from the operating system's secure random source.
//! A failing draw is retried a few times; if the source keeps failing the
//! whole call fails, so a key is never shorter than requested.

mod phonetic;
mod random;

pub use phonetic::PhoneticKeyGenerator;
pub use random::RandomKeyGenerator;

use crate::ports::KeyGenerator;
use rand::TryRngCore;
use shared::config::KeyGeneratorKind;
use shared::{Error, Result};
use std::sync::Arc;

/// Attempts per draw before the call is failed
pub const MAX_DRAW_ATTEMPTS: usize = 3;

/// Builds the generator selected in configuration.
pub fn from_config(kind: KeyGeneratorKind, key_space: &str) -> Result<Arc<dyn KeyGenerator>> {
    match kind {
        KeyGeneratorKind::Random => Ok(Arc::new(RandomKeyGenerator::new(key_space)?)),
        KeyGeneratorKind::Phonetic => Ok(Arc::new(PhoneticKeyGenerator::new())),
    }
}

fn next_u32<R: TryRngCore>(rng: &mut R) -> Result<u32> {
    let mut last_error = String::new();
    for _ in 0..MAX_DRAW_ATTEMPTS {
        match rng.try_next_u32() {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(Error::KeyGeneration(format!(
        "random source failed {MAX_DRAW_ATTEMPTS} times in a row: {last_error}"
    )))
}

/// Uniform index in `[0, bound)`. Draws above the largest multiple of
/// `bound` are rejected so no index is favoured.
pub(crate) fn draw_index<R: TryRngCore>(rng: &mut R, bound: usize) -> Result<usize> {
    let bound = u32::try_from(bound)
        .ok()
        .filter(|b| *b > 0)
        .ok_or_else(|| Error::KeyGeneration(format!("invalid sample bound {bound}")))?;

    let zone = u32::MAX - (u32::MAX - bound + 1) % bound;
    loop {
        let value = next_u32(rng)?;
        if value <= zone {
            return Ok((value % bound) as usize);
        }
    }
}

pub(crate) fn draw_char<R: TryRngCore>(rng: &mut R, set: &[char]) -> Result<char> {
    Ok(set[draw_index(rng, set.len())?])
}
