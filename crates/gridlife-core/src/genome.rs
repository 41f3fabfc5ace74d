//! Fixed-width genetic strings and the traits they encode.
//!
//! A genome is a string of [`GENOME_LEN`] ASCII digits. Each position is a
//! locus with its own legal range; decoding is purely positional.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of digits in a genetic string.
pub const GENOME_LEN: usize = 14;

/// Errors raised when a genetic string does not match the schema.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenomeError {
    #[error("genetic string must be {expected} digits, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("position {index} holds non-digit {found:?}")]
    NonDigit { index: usize, found: char },
    #[error("position {index} ({trait_name}) value {value} is out of range")]
    OutOfRange {
        index: usize,
        trait_name: &'static str,
        value: u8,
    },
}

struct Locus {
    name: &'static str,
    min: u8,
    max: u8,
    /// Values a mutation may write into this position.
    mutation: &'static [u8],
}

const DIGITS: &[u8] = &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
const BINARY: &[u8] = &[0, 1];

const fn locus(name: &'static str, min: u8, max: u8, mutation: &'static [u8]) -> Locus {
    Locus {
        name,
        min,
        max,
        mutation,
    }
}

static SCHEMA: [Locus; GENOME_LEN] = [
    locus("vision", 0, 9, &[0, 1, 2, 3]),
    locus("smell", 0, 2, &[0, 1, 2]),
    locus("speed", 1, 1, &[1]),
    locus("aggression", 0, 1, BINARY),
    locus("sleep", 0, 1, BINARY),
    locus("color", 0, 9, DIGITS),
    locus("energy_tens", 0, 9, DIGITS),
    locus("energy_ones", 0, 9, DIGITS),
    locus("jump", 0, 1, BINARY),
    locus("swim", 0, 1, BINARY),
    locus("fly", 0, 1, BINARY),
    locus("scavenge", 0, 1, BINARY),
    locus("sickness", 0, 1, BINARY),
    locus("resistance", 0, 9, DIGITS),
];

/// Legal mutation values for `index`, or an empty slice past the end.
#[must_use]
pub fn mutation_set(index: usize) -> &'static [u8] {
    match SCHEMA.get(index) {
        Some(locus) => locus.mutation,
        None => &[],
    }
}

/// When an agent is awake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SleepPhase {
    #[default]
    Diurnal,
    Nocturnal,
}

/// Traits decoded from a genome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentTraits {
    pub vision: u8,
    pub smell: u8,
    /// Reserved; always 1.
    pub speed: u8,
    pub aggressive: bool,
    pub sleep: SleepPhase,
    pub color: u8,
    pub initial_energy: i32,
    pub jump: bool,
    pub swim: bool,
    pub fly: bool,
    pub scavenge: bool,
    /// Agent is born sick.
    pub sick: bool,
    pub resistance: u8,
}

/// Validated genetic string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Genome {
    digits: [u8; GENOME_LEN],
}

impl Genome {
    /// Build a genome from raw digit values, validating each locus.
    pub fn from_digits(digits: [u8; GENOME_LEN]) -> Result<Self, GenomeError> {
        for (index, (value, locus)) in digits.iter().zip(SCHEMA.iter()).enumerate() {
            if *value < locus.min || *value > locus.max {
                return Err(GenomeError::OutOfRange {
                    index,
                    trait_name: locus.name,
                    value: *value,
                });
            }
        }
        Ok(Self { digits })
    }

    #[must_use]
    pub const fn digits(&self) -> &[u8; GENOME_LEN] {
        &self.digits
    }

    /// Decode the positional traits.
    #[must_use]
    pub fn traits(&self) -> AgentTraits {
        let d = &self.digits;
        AgentTraits {
            vision: d[0],
            smell: d[1],
            speed: d[2],
            aggressive: d[3] == 1,
            sleep: if d[4] == 1 {
                SleepPhase::Nocturnal
            } else {
                SleepPhase::Diurnal
            },
            color: d[5],
            initial_energy: i32::from(d[6]) * 10 + i32::from(d[7]),
            jump: d[8] == 1,
            swim: d[9] == 1,
            fly: d[10] == 1,
            scavenge: d[11] == 1,
            sick: d[12] == 1,
            resistance: d[13],
        }
    }

    /// Change exactly one mutable position to a different legal value.
    #[must_use]
    pub fn mutate<R: Rng>(&self, rng: &mut R) -> Genome {
        let mutable: Vec<usize> = (0..GENOME_LEN)
            .filter(|&i| SCHEMA[i].mutation.len() > 1)
            .collect();
        let index = mutable[rng.random_range(0..mutable.len())];
        let current = self.digits[index];
        let choices: Vec<u8> = SCHEMA[index]
            .mutation
            .iter()
            .copied()
            .filter(|&v| v != current)
            .collect();
        let mut digits = self.digits;
        digits[index] = choices[rng.random_range(0..choices.len())];
        Genome { digits }
    }

    /// Parity interleave: even positions from `a`, odd positions from `b`.
    #[must_use]
    pub fn interleave(a: &Genome, b: &Genome) -> Genome {
        let mut digits = [0; GENOME_LEN];
        for (i, slot) in digits.iter_mut().enumerate() {
            *slot = if i % 2 == 0 { a.digits[i] } else { b.digits[i] };
        }
        Genome { digits }
    }

    /// Interleave two parents and mutate the child once.
    #[must_use]
    pub fn crossover<R: Rng>(a: &Genome, b: &Genome, rng: &mut R) -> Genome {
        Self::interleave(a, b).mutate(rng)
    }
}

impl FromStr for Genome {
    type Err = GenomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let actual = s.chars().count();
        if actual != GENOME_LEN {
            return Err(GenomeError::WrongLength {
                expected: GENOME_LEN,
                actual,
            });
        }
        let mut digits = [0u8; GENOME_LEN];
        for (index, ch) in s.chars().enumerate() {
            let value = ch
                .to_digit(10)
                .ok_or(GenomeError::NonDigit { index, found: ch })?;
            digits[index] = value as u8;
        }
        Self::from_digits(digits)
    }
}

impl TryFrom<String> for Genome {
    type Error = GenomeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Genome> for String {
    fn from(genome: Genome) -> Self {
        genome.to_string()
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.digits {
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Genome({self})")
    }
}

/// Decode a genetic string into traits.
pub fn decode(s: &str) -> Result<AgentTraits, GenomeError> {
    Ok(s.parse::<Genome>()?.traits())
}

/// String-level mutation.
pub fn mutate_str<R: Rng>(s: &str, rng: &mut R) -> Result<String, GenomeError> {
    Ok(s.parse::<Genome>()?.mutate(rng).to_string())
}

/// String-level crossover followed by mutation.
pub fn crossover_str<R: Rng>(
    a: &str,
    b: &str,
    rng: &mut R,
) -> Result<String, GenomeError> {
    let a = a.parse::<Genome>()?;
    let b = b.parse::<Genome>()?;
    Ok(Genome::crossover(&a, &b, rng).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    const SAMPLE: &str = "21101345011009";
    const OTHER: &str = "30110798100102";

    #[test]
    fn decodes_positional_traits() {
        let traits = decode(SAMPLE).expect("valid genome");
        assert_eq!(traits.vision, 2);
        assert_eq!(traits.smell, 1);
        assert_eq!(traits.speed, 1);
        assert!(!traits.aggressive);
        assert_eq!(traits.sleep, SleepPhase::Nocturnal);
        assert_eq!(traits.color, 3);
        assert_eq!(traits.initial_energy, 45);
        assert!(!traits.jump);
        assert!(traits.swim);
        assert!(traits.fly);
        assert!(!traits.scavenge);
        assert!(!traits.sick);
        assert_eq!(traits.resistance, 9);
    }

    #[test]
    fn malformed_strings_fail_fast() {
        assert_eq!(
            decode("2110134501101"),
            Err(GenomeError::WrongLength {
                expected: GENOME_LEN,
                actual: 13
            })
        );
        assert_eq!(
            decode("2110134501101x"),
            Err(GenomeError::NonDigit {
                index: 13,
                found: 'x'
            })
        );
        assert_eq!(
            decode("23101345011019"),
            Err(GenomeError::OutOfRange {
                index: 1,
                trait_name: "smell",
                value: 3
            })
        );
        assert!(matches!(
            decode("21001345011019"),
            Err(GenomeError::OutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn mutation_changes_exactly_one_legal_position() {
        let mut rng = SmallRng::seed_from_u64(0xA11CE);
        let genome: Genome = SAMPLE.parse().expect("genome");
        for _ in 0..500 {
            let mutated = genome.mutate(&mut rng);
            let changed: Vec<usize> = (0..GENOME_LEN)
                .filter(|&i| mutated.digits()[i] != genome.digits()[i])
                .collect();
            assert_eq!(changed.len(), 1, "mutation touched {changed:?}");
            let index = changed[0];
            assert!(mutation_set(index).contains(&mutated.digits()[index]));
            assert_ne!(index, 2, "speed is fixed");
        }
    }

    #[test]
    fn vision_mutations_stay_in_low_range() {
        let mut rng = SmallRng::seed_from_u64(3);
        let genome: Genome = "91101345011019".parse().expect("genome");
        let mut seen_vision = false;
        for _ in 0..500 {
            let mutated = genome.mutate(&mut rng);
            if mutated.digits()[0] != 9 {
                seen_vision = true;
                assert!(mutated.digits()[0] <= 3);
            }
        }
        assert!(seen_vision);
    }

    #[test]
    fn interleave_takes_even_from_first_and_odd_from_second() {
        let a: Genome = SAMPLE.parse().expect("a");
        let b: Genome = OTHER.parse().expect("b");
        let child = Genome::interleave(&a, &b).to_string();
        let expected: String = SAMPLE
            .chars()
            .zip(OTHER.chars())
            .enumerate()
            .map(|(i, (x, y))| if i % 2 == 0 { x } else { y })
            .collect();
        assert_eq!(child, expected);
    }

    #[test]
    fn crossover_is_interleave_plus_one_mutation() {
        let mut rng = SmallRng::seed_from_u64(99);
        let a: Genome = SAMPLE.parse().expect("a");
        let b: Genome = OTHER.parse().expect("b");
        let base = Genome::interleave(&a, &b);
        let child = Genome::crossover(&a, &b, &mut rng);
        let diffs = (0..GENOME_LEN)
            .filter(|&i| base.digits()[i] != child.digits()[i])
            .count();
        assert_eq!(diffs, 1);
        let text = crossover_str(SAMPLE, OTHER, &mut rng).expect("crossover");
        assert!(text.parse::<Genome>().is_ok());
    }

    #[test]
    fn serde_uses_the_wire_string() {
        let genome: Genome = SAMPLE.parse().expect("genome");
        let json = serde_json::to_string(&genome).expect("serialize");
        assert_eq!(json, format!("\"{SAMPLE}\""));
        let bad: Result<Genome, _> = serde_json::from_str("\"123\"");
        assert!(bad.is_err());
    }
}
