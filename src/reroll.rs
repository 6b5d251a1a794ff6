//! The reroll transition table: `P(end | start, keep_mask)` for every (252, 32, 252)
//! triple, built from the full multinomial reconstruction of the rerolled dice —
//! never the simplified per-die `1/6` product, which fails the row-sum invariant
//! for any mask that rerolls more than one die.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::dice::{DiceCodec, Hand, NUM_DICE, NUM_FACES, NUM_HANDS, hand_to_counts};
use crate::error::{Result, YumError};
use crate::persist;

pub const NUM_MASKS: usize = 32;
const MAGIC: u32 = 0x50524F42; // "PROB"

const fn factorial(n: usize) -> u64 {
    let mut result = 1u64;
    let mut i = 2usize;
    while i <= n {
        result *= i as u64;
        i += 1;
    }
    result
}

/// Probability that rerolling the dice not covered by `kept` (a per-face count of
/// retained values) lands on `end`'s per-face counts.
fn transition_probability(kept: &[u8; NUM_FACES], end: &[u8; NUM_FACES]) -> f64 {
    let mut to_reroll = [0u8; NUM_FACES];
    let mut n_to_reroll: u32 = 0;
    for face in 0..NUM_FACES {
        if end[face] < kept[face] {
            return 0.0;
        }
        to_reroll[face] = end[face] - kept[face];
        n_to_reroll += to_reroll[face] as u32;
    }
    let mut denominator = 1u64;
    for &count in &to_reroll {
        denominator *= factorial(count as usize);
    }
    denominator *= (NUM_FACES as u64).pow(n_to_reroll);
    let numerator = factorial(n_to_reroll as usize);
    numerator as f64 / denominator as f64
}

fn kept_counts(hand: &Hand, mask: u8) -> [u8; NUM_FACES] {
    let mut counts = [0u8; NUM_FACES];
    for (i, &value) in hand.iter().enumerate() {
        if mask & (1 << i) != 0 {
            counts[(value - 1) as usize] += 1;
        }
    }
    counts
}

/// The full 252x32x252 transition table, row-major in `start -> mask -> end` order.
pub struct RerollTable {
    probabilities: Vec<f64>,
}

impl RerollTable {
    fn index(start: usize, mask: usize, end: usize) -> usize {
        (start * NUM_MASKS + mask) * NUM_HANDS + end
    }

    /// Builds the table from scratch using the dice codec's canonical hand ordering.
    pub fn build(codec: &DiceCodec) -> Result<RerollTable> {
        let mut probabilities = vec![0.0f64; NUM_HANDS * NUM_MASKS * NUM_HANDS];
        for start_idx in 0..NUM_HANDS {
            let start_hand = codec.decode(crate::dice::DiceIndex(start_idx as u8))?;
            for mask in 0..NUM_MASKS {
                let kept = kept_counts(&start_hand, mask as u8);
                for end_idx in 0..NUM_HANDS {
                    let end_hand = codec.decode(crate::dice::DiceIndex(end_idx as u8))?;
                    let end_counts = hand_to_counts(&end_hand);
                    let p = transition_probability(&kept, &end_counts);
                    probabilities[Self::index(start_idx, mask, end_idx)] = p;
                }
            }
        }
        Ok(RerollTable { probabilities })
    }

    pub fn get(&self, start: crate::dice::DiceIndex, mask: u8, end: crate::dice::DiceIndex) -> f64 {
        self.probabilities[Self::index(start.get(), mask as usize, end.get())]
    }

    /// All 252 end-probabilities for a given (start, mask) pair, in end-index order.
    pub fn row(&self, start: crate::dice::DiceIndex, mask: u8) -> &[f64] {
        let base = Self::index(start.get(), mask as usize, 0);
        &self.probabilities[base..base + NUM_HANDS]
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);
        persist::write_u32(&mut w, MAGIC)?;
        persist::write_u32(&mut w, NUM_HANDS as u32)?;
        persist::write_u32(&mut w, NUM_MASKS as u32)?;
        for &p in &self.probabilities {
            persist::write_f64(&mut w, p)?;
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<RerollTable> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            YumError::MissingInput(format!("{}: {e}", path.display()))
        })?;
        let mut r = BufReader::new(file);
        let magic = persist::read_u32(&mut r)?;
        let n_dice = persist::read_u32(&mut r)?;
        let n_mask = persist::read_u32(&mut r)?;
        if magic != MAGIC || n_dice as usize != NUM_HANDS || n_mask as usize != NUM_MASKS {
            return Err(YumError::InvalidTable(format!(
                "header mismatch: magic={magic:#x} dice={n_dice} mask={n_mask}"
            )));
        }
        let mut probabilities = Vec::with_capacity(NUM_HANDS * NUM_MASKS * NUM_HANDS);
        for _ in 0..(NUM_HANDS * NUM_MASKS * NUM_HANDS) {
            probabilities.push(persist::read_f64(&mut r)?);
        }
        let table = RerollTable { probabilities };
        table.check_row_sums(path)?;
        Ok(table)
    }

    /// Re-checks the row-sum-to-one invariant after reading from disk: a
    /// header-valid but corrupted file would otherwise silently yield wrong
    /// EVs downstream with no detection.
    fn check_row_sums(&self, path: &Path) -> Result<()> {
        const ROW_SUM_TOLERANCE: f64 = 1e-6;
        for start in 0..NUM_HANDS {
            for mask in 0..NUM_MASKS {
                let base = Self::index(start, mask, 0);
                let sum: f64 = self.probabilities[base..base + NUM_HANDS].iter().sum();
                if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                    return Err(YumError::InvariantViolation(format!(
                        "{}: row (start={start}, mask={mask}) sums to {sum}, expected 1.0",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::DiceIndex;

    fn table() -> RerollTable {
        RerollTable::build(&DiceCodec::new()).unwrap()
    }

    #[test]
    fn rows_sum_to_one() {
        let t = table();
        for start in 0..NUM_HANDS {
            for mask in 0..NUM_MASKS {
                let sum: f64 = t.row(DiceIndex(start as u8), mask as u8).iter().sum();
                assert!(
                    (sum - 1.0).abs() < 1e-9,
                    "start={start} mask={mask} sum={sum}"
                );
            }
        }
    }

    #[test]
    fn s4_keep_all_is_identity() {
        let codec = DiceCodec::new();
        let t = table();
        for start in 0..NUM_HANDS {
            for end in 0..NUM_HANDS {
                let p = t.get(DiceIndex(start as u8), 0b11111, DiceIndex(end as u8));
                if start == end {
                    assert!((p - 1.0).abs() < 1e-12);
                } else {
                    assert_eq!(p, 0.0);
                }
            }
        }
        let _ = codec;
    }

    #[test]
    fn s5_reroll_all_is_uniform_and_start_independent() {
        let codec = DiceCodec::new();
        let t = table();
        let all_ones = codec.encode(&[1, 1, 1, 1, 1]).unwrap();
        let distinct = codec.encode(&[1, 2, 3, 4, 5]).unwrap();

        let p_all_ones = t.get(DiceIndex(0), 0, all_ones);
        let p_distinct = t.get(DiceIndex(0), 0, distinct);
        assert!((p_all_ones - 1.0 / 7776.0).abs() < 1e-9);
        assert!((p_distinct - 120.0 / 7776.0).abs() < 1e-9);

        // P(end | start, mask=0) does not depend on start.
        for start in [5u8, 100, 251] {
            assert!((t.get(DiceIndex(start), 0, all_ones) - p_all_ones).abs() < 1e-9);
            assert!((t.get(DiceIndex(start), 0, distinct) - p_distinct).abs() < 1e-9);
        }
    }

    #[test]
    fn nonnegative_everywhere() {
        let t = table();
        assert!(t.probabilities.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn save_then_load_roundtrips() {
        let t = table();
        let path = std::env::temp_dir()
            .join(format!("yum_solver_reroll_roundtrip_{}.dat", std::process::id()));
        t.save(&path).unwrap();
        let loaded = RerollTable::load(&path).unwrap();
        assert_eq!(loaded.probabilities, t.probabilities);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_rejects_a_header_valid_but_corrupted_table() {
        let path = std::env::temp_dir()
            .join(format!("yum_solver_reroll_corrupt_{}.dat", std::process::id()));
        {
            let file = File::create(&path).unwrap();
            let mut w = BufWriter::new(file);
            persist::write_u32(&mut w, MAGIC).unwrap();
            persist::write_u32(&mut w, NUM_HANDS as u32).unwrap();
            persist::write_u32(&mut w, NUM_MASKS as u32).unwrap();
            // Every row sums to zero instead of one.
            for _ in 0..(NUM_HANDS * NUM_MASKS * NUM_HANDS) {
                persist::write_f64(&mut w, 0.0).unwrap();
            }
        }
        let err = RerollTable::load(&path).unwrap_err();
        assert!(matches!(err, YumError::InvariantViolation(_)));
        let _ = std::fs::remove_file(&path);
    }
}
