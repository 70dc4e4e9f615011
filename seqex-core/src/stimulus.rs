use rand::Rng;
use serde::{Deserialize, Serialize};

/// Keys drawn from when a block asks for random sequences.
pub const DEFAULT_ALPHABET: &str = "12345";

/// The character sequence a subject is asked to type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceSpec {
    Fixed(String),
    /// A fresh sequence of `length` keys for every trial.
    Random { length: usize },
}

impl SequenceSpec {
    /// Sequence shown before any trial starts; random blocks have none.
    pub fn display(&self) -> Option<&str> {
        match self {
            SequenceSpec::Fixed(seq) => Some(seq),
            SequenceSpec::Random { .. } => None,
        }
    }

    /// Produces the target sequence for the next trial.
    pub fn next_sequence<R: Rng>(&self, rng: &mut R, alphabet: &str) -> String {
        match self {
            SequenceSpec::Fixed(seq) => seq.clone(),
            SequenceSpec::Random { length } => {
                let keys: Vec<char> = alphabet.chars().collect();
                let keys = if keys.is_empty() {
                    DEFAULT_ALPHABET.chars().collect()
                } else {
                    keys
                };
                (0..*length)
                    .map(|_| keys[rng.random_range(0..keys.len())])
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fixed_sequence_is_repeated() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = SequenceSpec::Fixed("41324".into());
        assert_eq!(spec.next_sequence(&mut rng, DEFAULT_ALPHABET), "41324");
        assert_eq!(spec.next_sequence(&mut rng, DEFAULT_ALPHABET), "41324");
        assert_eq!(spec.display(), Some("41324"));
    }

    #[test]
    fn random_sequence_uses_alphabet_and_length() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = SequenceSpec::Random { length: 6 };
        for _ in 0..20 {
            let seq = spec.next_sequence(&mut rng, "ab");
            assert_eq!(seq.chars().count(), 6);
            assert!(seq.chars().all(|c| c == 'a' || c == 'b'));
        }
        assert_eq!(spec.display(), None);
    }

    #[test]
    fn empty_alphabet_falls_back_to_default() {
        let mut rng = StdRng::seed_from_u64(1);
        let seq = SequenceSpec::Random { length: 4 }.next_sequence(&mut rng, "");
        assert!(seq.chars().all(|c| DEFAULT_ALPHABET.contains(c)));
    }
}
