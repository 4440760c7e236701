use super::draw_char;
use crate::ports::KeyGenerator;
use rand::TryRngCore;
use rand::rngs::OsRng;
use shared::{Error, Result};

const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz";

/// Uniform random keys over a configurable alphabet
#[derive(Clone, Debug)]
pub struct RandomKeyGenerator {
    alphabet: Vec<char>,
}

impl RandomKeyGenerator {
    /// An empty alphabet selects `a`-`z`. Characters must be URL-safe
    /// (ASCII letters, digits, `-`, `_`); duplicates are dropped.
    pub fn new(alphabet: &str) -> Result<Self> {
        let source = if alphabet.is_empty() {
            DEFAULT_ALPHABET
        } else {
            alphabet
        };

        let mut chars: Vec<char> = Vec::with_capacity(source.len());
        for c in source.chars() {
            if !(c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                return Err(Error::Config(format!(
                    "key space character '{c}' is not URL-safe"
                )));
            }
            if !chars.contains(&c) {
                chars.push(c);
            }
        }

        Ok(Self { alphabet: chars })
    }

    pub fn alphabet(&self) -> String {
        self.alphabet.iter().collect()
    }

    pub fn generate_with<R: TryRngCore>(&self, rng: &mut R, length: usize) -> Result<String> {
        let mut key = String::with_capacity(length);
        for _ in 0..length {
            key.push(draw_char(rng, &self.alphabet)?);
        }
        Ok(key)
    }
}

impl Default for RandomKeyGenerator {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.chars().collect(),
        }
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self, length: usize) -> Result<String> {
        self.generate_with(&mut OsRng, length)
    }
}
