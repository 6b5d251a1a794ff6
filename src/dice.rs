//! Canonical dice-hand codec: a bijection between sorted five-die hands and a dense
//! index 0..251, built the same way the teacher's `combinatorics` module ranks roll
//! counts — stars-and-bars over per-face counts, computed once at compile time.

use std::collections::HashMap;

use crate::error::{Result, YumError};

pub const NUM_DICE: usize = 5;
pub const NUM_FACES: usize = 6;
pub const NUM_HANDS: usize = 252;

/// A sorted five-die hand, faces 1..=6, non-decreasing.
pub type Hand = [u8; NUM_DICE];

/// Dense index into the 252 canonical sorted hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiceIndex(pub u8);

impl DiceIndex {
    pub fn get(self) -> usize {
        self.0 as usize
    }
}

const BINOM_ROWS: usize = NUM_DICE + NUM_FACES + 1;

const fn make_binom() -> [[usize; BINOM_ROWS]; BINOM_ROWS] {
    let mut binom = [[0usize; BINOM_ROWS]; BINOM_ROWS];
    let mut i = 0;
    while i < BINOM_ROWS {
        binom[i][0] = 1;
        binom[i][i] = 1;
        let mut j = 1;
        while j < i {
            binom[i][j] = binom[i - 1][j - 1] + binom[i - 1][j];
            j += 1;
        }
        i += 1;
    }
    binom
}

const BINOM: [[usize; BINOM_ROWS]; BINOM_ROWS] = make_binom();

/// Lexicographic rank of a per-face count vector among the 252 sorted five-die
/// hands, matching spec's `d1 <= d2 <= ... <= d5` enumeration order (so
/// `[1,1,1,1,1]` ranks 0 and `[6,6,6,6,6]` ranks 251). Only the first
/// `NUM_FACES - 1` faces need to be consumed: the last face's count is implied
/// by the dice total.
///
/// The inner stars-and-bars sum counts, face by face, how many sorted hands
/// are lexicographically *at or before* the tied prefix built so far; that
/// running total ranks hands with more low faces last, so the raw sum is
/// subtracted from `NUM_HANDS - 1` to recover ascending lexicographic order.
const fn rank_counts(counts: &[u8; NUM_FACES]) -> usize {
    let mut rank = 0usize;
    let mut dice_remaining = NUM_DICE;
    let mut face = 0usize;
    while face < NUM_FACES - 1 {
        let count = counts[face] as usize;
        let mut i = 0;
        while i < count {
            let dice_left = dice_remaining - i;
            let faces_left = NUM_FACES - face - 1;
            rank += BINOM[dice_left + faces_left - 1][faces_left - 1];
            i += 1;
        }
        dice_remaining -= count;
        face += 1;
    }
    NUM_HANDS - 1 - rank
}

const fn counts_to_hand(counts: &[u8; NUM_FACES]) -> Hand {
    let mut hand = [0u8; NUM_DICE];
    let mut pos = 0usize;
    let mut face = 0usize;
    while face < NUM_FACES {
        let mut i = 0;
        while i < counts[face] {
            hand[pos] = (face + 1) as u8;
            pos += 1;
            i += 1;
        }
        face += 1;
    }
    hand
}

/// Per-face counts for a sorted hand, indexed 0..NUM_FACES by `face - 1`.
pub const fn hand_to_counts(hand: &Hand) -> [u8; NUM_FACES] {
    let mut counts = [0u8; NUM_FACES];
    let mut i = 0;
    while i < NUM_DICE {
        counts[(hand[i] - 1) as usize] += 1;
        i += 1;
    }
    counts
}

const fn make_index_to_hand() -> [Hand; NUM_HANDS] {
    let mut table = [[0u8; NUM_DICE]; NUM_HANDS];
    let mut c0 = 0u8;
    while c0 <= NUM_DICE as u8 {
        let mut c1 = 0u8;
        while c0 + c1 <= NUM_DICE as u8 {
            let mut c2 = 0u8;
            while c0 + c1 + c2 <= NUM_DICE as u8 {
                let mut c3 = 0u8;
                while c0 + c1 + c2 + c3 <= NUM_DICE as u8 {
                    let mut c4 = 0u8;
                    while c0 + c1 + c2 + c3 + c4 <= NUM_DICE as u8 {
                        let c5 = NUM_DICE as u8 - c0 - c1 - c2 - c3 - c4;
                        let counts = [c0, c1, c2, c3, c4, c5];
                        let rank = rank_counts(&counts);
                        table[rank] = counts_to_hand(&counts);
                        c4 += 1;
                    }
                    c3 += 1;
                }
                c2 += 1;
            }
            c1 += 1;
        }
        c0 += 1;
    }
    table
}

/// The canonical hand at each dense index, computed once at compile time.
pub const INDEX_TO_HAND: [Hand; NUM_HANDS] = make_index_to_hand();

/// Encodes and decodes between dice hands and their dense index.
pub struct DiceCodec {
    hand_to_index: HashMap<Hand, u8>,
}

impl DiceCodec {
    pub fn new() -> Self {
        let mut hand_to_index = HashMap::with_capacity(NUM_HANDS);
        for (idx, hand) in INDEX_TO_HAND.iter().enumerate() {
            hand_to_index.insert(*hand, idx as u8);
        }
        Self { hand_to_index }
    }

    /// Sorts `dice` and returns its dense index. Fails if any face is outside 1..=6.
    pub fn encode(&self, dice: &[u8; NUM_DICE]) -> Result<DiceIndex> {
        let mut sorted = *dice;
        sorted.sort_unstable();
        for &face in &sorted {
            if !(1..=6).contains(&face) {
                return Err(YumError::InvalidDice(format!(
                    "face {face} out of range 1..=6"
                )));
            }
        }
        let index = self.hand_to_index.get(&sorted).copied().ok_or_else(|| {
            YumError::InvalidDice(format!("hand {sorted:?} is not a canonical five-die hand"))
        })?;
        Ok(DiceIndex(index))
    }

    /// Returns the sorted hand at `index`.
    pub fn decode(&self, index: DiceIndex) -> Result<Hand> {
        INDEX_TO_HAND
            .get(index.get())
            .copied()
            .ok_or_else(|| YumError::InvalidIndex(format!("dice index {} out of range", index.0)))
    }
}

impl Default for DiceCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_to_hand_is_sorted_and_in_range() {
        for hand in INDEX_TO_HAND.iter() {
            let mut sorted = *hand;
            sorted.sort_unstable();
            assert_eq!(&sorted, hand, "hand {hand:?} is not sorted");
            for &face in hand {
                assert!((1..=6).contains(&face));
            }
        }
    }

    #[test]
    fn index_order_is_ascending_lexicographic() {
        let codec = DiceCodec::new();
        assert_eq!(codec.decode(DiceIndex(0)).unwrap(), [1, 1, 1, 1, 1]);
        assert_eq!(codec.decode(DiceIndex(251)).unwrap(), [6, 6, 6, 6, 6]);
    }

    #[test]
    fn codec_roundtrips_every_index() {
        let codec = DiceCodec::new();
        for i in 0..NUM_HANDS as u8 {
            let hand = codec.decode(DiceIndex(i)).unwrap();
            let back = codec.encode(&hand).unwrap();
            assert_eq!(back, DiceIndex(i));
        }
    }

    #[test]
    fn codec_sorts_before_encoding() {
        let codec = DiceCodec::new();
        let a = codec.encode(&[3, 1, 4, 1, 5]).unwrap();
        let b = codec.encode(&[1, 1, 3, 4, 5]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn codec_rejects_out_of_range_face() {
        let codec = DiceCodec::new();
        assert!(codec.encode(&[0, 1, 2, 3, 4]).is_err());
        assert!(codec.encode(&[1, 2, 3, 4, 7]).is_err());
    }

    #[test]
    fn decode_rejects_out_of_range_index() {
        let codec = DiceCodec::new();
        assert!(codec.decode(DiceIndex(252)).is_err());
    }
}
