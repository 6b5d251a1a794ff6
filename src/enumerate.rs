//! Enumerates every distinguishable packed game state as the Cartesian product of
//! three independent factors: which upper categories are filled (and the resulting
//! bonus-remaining), which of Low/High Score is filled (and the score anchor), and
//! which of the four remaining categories (straights, full house, Yum) are filled.

use crate::category::Category;
use crate::state::{BONUS_SHIFT, SCORE_SHIFT, StateKey, UPPER_BONUS_THRESHOLD};

pub const NUM_BONUS_STATES: usize = 1851;
pub const NUM_SCORE_STATES: usize = 54;
pub const NUM_REMAINING_STATES: usize = 16;

/// All distinct (upper-filled-bits, bonus-remaining) combinations.
pub fn bonus_states() -> Vec<StateKey> {
    let mut out = Vec::with_capacity(NUM_BONUS_STATES);
    // 6 means "unfilled"; 0..=5 means "filled, contributing that many copies of
    // the category's face value".
    for c0 in 0..=6u32 {
        for c1 in 0..=6u32 {
            for c2 in 0..=6u32 {
                for c3 in 0..=6u32 {
                    for c4 in 0..=6u32 {
                        for c5 in 0..=6u32 {
                            let counts = [c0, c1, c2, c3, c4, c5];
                            let mut current_bonus: u32 = 0;
                            let mut max_unfilled: u32 = 0;
                            let mut bits: u32 = 0;
                            for (i, &count) in counts.iter().enumerate() {
                                let face = (i + 1) as u32;
                                if count != 6 {
                                    current_bonus += count * face;
                                    bits |= 1 << i;
                                } else {
                                    max_unfilled += 5 * face;
                                }
                            }
                            let threshold = UPPER_BONUS_THRESHOLD as u32;
                            let bonus_remaining: u32 = if current_bonus >= threshold {
                                0
                            } else if current_bonus + max_unfilled < threshold {
                                0
                            } else {
                                threshold - current_bonus
                            };
                            out.push(StateKey(bits | (bonus_remaining << BONUS_SHIFT)));
                        }
                    }
                }
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

/// All distinct (Low/High Score filled bits, score anchor) combinations.
pub fn score_states() -> Vec<StateKey> {
    let mut out = Vec::with_capacity(NUM_SCORE_STATES);
    let low_bit = 1u32 << (Category::LowScore as u32);
    let high_bit = 1u32 << (Category::HighScore as u32);
    for low in [0u32, 1] {
        for high in [0u32, 1] {
            let bits = low * low_bit + high * high_bit;
            if low == high {
                out.push(StateKey(bits));
            } else {
                for anchor in 5u32..=30 {
                    out.push(StateKey(bits | (anchor << SCORE_SHIFT)));
                }
            }
        }
    }
    out
}

/// All 16 combinations of the straight/full-house/Yum filled bits.
pub fn remaining_states() -> Vec<StateKey> {
    let categories = [
        Category::LowStraight,
        Category::HighStraight,
        Category::FullHouse,
        Category::Yum,
    ];
    (0u32..NUM_REMAINING_STATES as u32)
        .map(|mask| {
            let mut bits = 0u32;
            for (i, &c) in categories.iter().enumerate() {
                if mask & (1 << i) != 0 {
                    bits |= 1 << (c as u32);
                }
            }
            StateKey(bits)
        })
        .collect()
}

/// The full, deduplicated set of reachable packed states.
pub fn all_states() -> Vec<StateKey> {
    let bonus = bonus_states();
    let score = score_states();
    let remaining = remaining_states();
    let mut out = Vec::with_capacity(bonus.len() * score.len() * remaining.len());
    for &b in &bonus {
        for &s in &score {
            for &r in &remaining {
                out.push(StateKey(b.0 | s.0 | r.0));
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_counts_match_reference() {
        assert_eq!(bonus_states().len(), NUM_BONUS_STATES);
        assert_eq!(score_states().len(), NUM_SCORE_STATES);
        assert_eq!(remaining_states().len(), NUM_REMAINING_STATES);
    }

    #[test]
    fn all_states_is_nonempty_and_deduplicated() {
        let states = all_states();
        let mut sorted = states.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(states.len(), sorted.len());
        assert!(!states.is_empty());
    }

    #[test]
    fn empty_state_is_present() {
        let states = all_states();
        assert!(states.contains(&StateKey::EMPTY));
    }
}
