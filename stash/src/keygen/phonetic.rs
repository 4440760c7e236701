use super::{draw_char, draw_index};
use crate::ports::KeyGenerator;
use rand::TryRngCore;
use rand::rngs::OsRng;
use shared::Result;

const VOWELS: [char; 5] = ['a', 'e', 'i', 'o', 'u'];
const CONSONANTS: [char; 21] = [
    'b', 'c', 'd', 'f', 'g', 'h', 'j', 'k', 'l', 'm', 'n', 'p', 'q', 'r', 's', 't', 'v', 'w', 'x',
    'y', 'z',
];

/// Pronounceable keys alternating consonants and vowels. Whether a key
/// starts with a consonant or a vowel is drawn per call.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhoneticKeyGenerator;

impl PhoneticKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_with<R: TryRngCore>(&self, rng: &mut R, length: usize) -> Result<String> {
        let consonant_parity = draw_index(rng, 2)?;

        let mut key = String::with_capacity(length);
        for i in 0..length {
            let set: &[char] = if i % 2 == consonant_parity {
                &CONSONANTS
            } else {
                &VOWELS
            };
            key.push(draw_char(rng, set)?);
        }
        Ok(key)
    }
}

impl KeyGenerator for PhoneticKeyGenerator {
    fn generate(&self, length: usize) -> Result<String> {
        self.generate_with(&mut OsRng, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::MAX_DRAW_ATTEMPTS;
    use crate::keygen::test_support::FlakyRng;

    fn alternates(key: &str) -> bool {
        let classes: Vec<bool> = key.chars().map(|c| VOWELS.contains(&c)).collect();
        classes.windows(2).all(|w| w[0] != w[1])
    }

    #[test]
    fn test_generate_length() {
        let kg = PhoneticKeyGenerator::new();
        for length in [0, 1, 2, 10, 257] {
            assert_eq!(kg.generate(length).unwrap().chars().count(), length);
        }
    }

    #[test]
    fn test_generate_alternates_classes() {
        let kg = PhoneticKeyGenerator::new();
        for _ in 0..100 {
            let key = kg.generate(16).unwrap();
            assert!(alternates(&key), "{key} does not alternate");
            assert!(
                key.chars()
                    .all(|c| VOWELS.contains(&c) || CONSONANTS.contains(&c))
            );
        }
    }

    #[test]
    fn test_both_starting_classes_occur() {
        let kg = PhoneticKeyGenerator::new();
        let mut vowel_first = false;
        let mut consonant_first = false;

        for _ in 0..200 {
            let first = kg.generate(1).unwrap().chars().next().unwrap();
            if VOWELS.contains(&first) {
                vowel_first = true;
            } else {
                consonant_first = true;
            }
        }

        assert!(vowel_first && consonant_first);
    }

    #[test]
    fn test_deterministic_source() {
        // Parity draw 0 puts a consonant first, then indices 1, 2, 3 follow
        let mut rng = FlakyRng::failing(0);
        let key = PhoneticKeyGenerator::new().generate_with(&mut rng, 3).unwrap();
        assert_eq!(key, "cif");
    }

    #[test]
    fn test_failing_source() {
        let mut rng = FlakyRng::failing(MAX_DRAW_ATTEMPTS);
        assert!(
            PhoneticKeyGenerator::new()
                .generate_with(&mut rng, 4)
                .is_err()
        );
    }
}
