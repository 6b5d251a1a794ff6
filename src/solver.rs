//! Backward-induction DP solver: per-round expected-value and action computation,
//! parallelized across states within a round the way `pure-chance-greed`'s
//! `DpSolver::solve_normal_states` parallelizes its own per-order fan-out — a
//! `par_iter().map(...).collect()` pass followed by sequential insertion, so no
//! mutable state is shared while states are being solved concurrently.

use std::marker::PhantomData;

use enum_map::Enum;
use rayon::prelude::*;
use strum::IntoEnumIterator;

use crate::category::{self, Category};
use crate::dice::{DiceCodec, DiceIndex, NUM_HANDS};
use crate::error::{Result, YumError};
use crate::reroll::{NUM_MASKS, RerollTable};
use crate::state::StateKey;
use crate::state_map::StateIndexMap;

pub const NUM_CATEGORIES: usize = category::NUM_CATEGORIES;
pub const TURNS_PER_ROUND: usize = 3;

/// Bounds on `V(s, d, t)` per the testable-properties invariant: 12 categories at
/// ~30 points each plus the 35-point upper-section bonus.
const EV_MIN: f32 = 0.0;
const EV_MAX: f32 = 375.0;

/// Rejects an expected value outside `[EV_MIN, EV_MAX]` as an invariant violation
/// rather than letting a corrupted or mis-derived EV propagate silently.
fn check_ev(ev: f32) -> Result<f32> {
    if !(EV_MIN..=EV_MAX).contains(&ev) {
        return Err(YumError::InvariantViolation(format!(
            "expected value {ev} outside [{EV_MIN}, {EV_MAX}]"
        )));
    }
    Ok(ev)
}

/// Maps a key type onto a dense `0..max_index()` range, the way the teacher's
/// `IndexKey` trait does for its dice-state memo tables.
pub trait IndexKey {
    fn to_index(&self) -> usize;
    fn max_index() -> usize;
}

/// A lookup table keyed by an `IndexKey`.
pub trait Memo<K: IndexKey, V: Clone> {
    fn get(&self, key: &K) -> Option<V>;
    fn set(&mut self, key: &K, value: V);
}

/// Dense `Vec`-backed memo, generalized from the teacher's `VecMemo<K, V>`.
pub struct VecMemo<K, V> {
    data: Vec<Option<V>>,
    _marker: PhantomData<K>,
}

impl<K: IndexKey, V: Clone> VecMemo<K, V> {
    pub fn new() -> Self {
        Self { data: vec![None; K::max_index()], _marker: PhantomData }
    }
}

impl<K: IndexKey, V: Clone> Memo<K, V> for VecMemo<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        self.data[key.to_index()].clone()
    }

    fn set(&mut self, key: &K, value: V) {
        self.data[key.to_index()] = Some(value);
    }
}

impl IndexKey for DiceIndex {
    fn to_index(&self) -> usize {
        self.get()
    }

    fn max_index() -> usize {
        NUM_HANDS
    }
}

/// Either a reroll keep-mask or a category selection. The top bit of the encoded
/// byte distinguishes the two so a consumer can decode without also tracking
/// which turn produced the byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reroll(u8),
    Score(Category),
}

const SCORE_TAG: u8 = 0x80;
const MASK_BITS: u8 = 0x1F;
const CATEGORY_BITS: u8 = 0x0F;

impl Action {
    pub fn encode(self) -> u8 {
        match self {
            Action::Reroll(mask) => mask & MASK_BITS,
            Action::Score(category) => SCORE_TAG | ((category as u8) & CATEGORY_BITS),
        }
    }

    pub fn decode(byte: u8) -> Result<Action> {
        if byte & SCORE_TAG != 0 {
            let idx = (byte & CATEGORY_BITS) as usize;
            if idx >= <Category as Enum>::LENGTH {
                return Err(YumError::InvariantViolation(format!("bad category index {idx}")));
            }
            Ok(Action::Score(Category::from_usize(idx)))
        } else {
            Ok(Action::Reroll(byte & MASK_BITS))
        }
    }
}

/// One state's full turn-3/2/1 result: 252 dice outcomes x 3 turns, flattened as
/// `dice_index * 3 + turn`.
pub struct StateResult {
    pub state_index: u32,
    pub evs: Vec<f32>,
    pub actions: Vec<u8>,
}

fn cell(dice_index: usize, turn: usize) -> usize {
    dice_index * TURNS_PER_ROUND + turn
}

/// Solves every (dice, turn) cell for one state, given the already-solved future
/// vector `W(s') = E_d[V(s', d, 1)]` for next-round successor states.
fn solve_state(
    state: StateKey,
    state_index: u32,
    codec: &DiceCodec,
    reroll: &RerollTable,
    state_map: &StateIndexMap,
    future: &[f32],
) -> Result<StateResult> {
    let mut evs = vec![0.0f32; NUM_HANDS * TURNS_PER_ROUND];
    let mut actions = vec![0u8; NUM_HANDS * TURNS_PER_ROUND];

    // Turn 3: must score.
    let mut turn3_ev = VecMemo::<DiceIndex, f32>::new();
    for d in 0..NUM_HANDS {
        let dice_index = DiceIndex(d as u8);
        let hand = codec.decode(dice_index)?;

        let mut best: Option<(f32, Category)> = None;
        for cat in Category::iter() {
            if !state.is_valid(cat, &hand) {
                continue;
            }
            let points = category::score(&hand, cat) as f32;
            let successor = state.apply(cat, &hand);
            let succ_index = state_map.get_index(successor).ok_or_else(|| {
                YumError::InvariantViolation(format!(
                    "successor state {:#x} is not reachable",
                    successor.0
                ))
            })?;
            let ev = points + future[succ_index as usize];
            if best.is_none_or(|(best_ev, _)| ev > best_ev) {
                best = Some((ev, cat));
            }
        }

        // Every round processes states with exactly one more category to fill
        // than the round number; at round 1 that's a single unfilled category.
        // If the Low/High Score ordering constraint rejects it, the category
        // is still the only legal box left to fill, so it is forced through
        // at its natural score (a scratch, in effect, when the constraint
        // would otherwise have blocked it).
        let (ev, action) = match best {
            Some((ev, cat)) => (ev, cat),
            None => {
                let remaining = Category::iter().find(|&c| !state.is_filled(c)).ok_or_else(|| {
                    YumError::InvariantViolation(
                        "turn-3 state has no unfilled category".to_string(),
                    )
                })?;
                let points = category::score(&hand, remaining) as f32;
                let successor = state.apply(remaining, &hand);
                let succ_index = state_map.get_index(successor).ok_or_else(|| {
                    YumError::InvariantViolation(format!(
                        "successor state {:#x} is not reachable",
                        successor.0
                    ))
                })?;
                (points + future[succ_index as usize], remaining)
            }
        };
        let ev = check_ev(ev)?;

        turn3_ev.set(&dice_index, ev);
        let idx = cell(d, 2);
        evs[idx] = ev;
        actions[idx] = Action::Score(action).encode();
    }

    // Turns 2 and 1: choose a keep-mask to maximize the expectation over the
    // reroll table's row for that (dice, mask) pair.
    let mut prior = turn3_ev;
    for turn in [1usize, 0usize] {
        let mut current = VecMemo::<DiceIndex, f32>::new();
        for d in 0..NUM_HANDS {
            let dice_index = DiceIndex(d as u8);
            let mut best_ev = -1.0f32;
            let mut best_mask = 0u8;
            for mask in 0..NUM_MASKS as u8 {
                let row = reroll.row(dice_index, mask);
                let mut ev = 0.0f64;
                for (end_idx, &p) in row.iter().enumerate() {
                    if p > 1e-10 {
                        let next_ev = prior
                            .get(&DiceIndex(end_idx as u8))
                            .expect("turn memo fully populated before being read");
                        ev += p * next_ev as f64;
                    }
                }
                let ev = ev as f32;
                if ev > best_ev {
                    best_ev = ev;
                    best_mask = mask;
                }
            }
            let best_ev = check_ev(best_ev)?;
            current.set(&dice_index, best_ev);
            let idx = cell(d, turn);
            evs[idx] = best_ev;
            actions[idx] = Action::Reroll(best_mask).encode();
        }
        prior = current;
    }

    Ok(StateResult { state_index, evs, actions })
}

/// Solves every state whose filled-category count is `categories_filled`, in
/// parallel, then returns the results in ascending state-index order.
pub fn solve_round(
    categories_filled: u32,
    codec: &DiceCodec,
    reroll: &RerollTable,
    state_map: &StateIndexMap,
    future: &[f32],
) -> Result<Vec<StateResult>> {
    let state_indices: Vec<u32> = (0..state_map.num_states() as u32)
        .filter(|&i| {
            state_map
                .get_state(i)
                .map(|s| s.filled_count() == categories_filled)
                .unwrap_or(false)
        })
        .collect();

    let mut results: Vec<StateResult> = state_indices
        .into_par_iter()
        .map(|state_index| {
            let state = state_map.get_state(state_index)?;
            solve_state(state, state_index, codec, reroll, state_map, future)
        })
        .collect::<Result<Vec<_>>>()?;

    results.sort_by_key(|r| r.state_index);
    Ok(results)
}

/// Condenses a round's turn-1 values into the scalar `W(s) = E_d[V(s, d, 1)]`
/// consulted by the previous round's turn-3 equation, and writes it into `future`.
pub fn update_future(future: &mut [f32], reroll: &RerollTable, results: &[StateResult]) {
    let fresh_roll = reroll.row(DiceIndex(0), 0);
    for result in results {
        let mut w = 0.0f64;
        for d in 0..NUM_HANDS {
            let p = fresh_roll[d];
            if p > 1e-10 {
                w += p * result.evs[cell(d, 0)] as f64;
            }
        }
        future[result.state_index as usize] = w as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_roundtrips() {
        for mask in 0..32u8 {
            let a = Action::Reroll(mask);
            assert_eq!(Action::decode(a.encode()).unwrap(), a);
        }
        for cat in Category::iter() {
            let a = Action::Score(cat);
            assert_eq!(Action::decode(a.encode()).unwrap(), a);
        }
    }

    #[test]
    fn solving_the_final_round_matches_terminal_scoring() {
        let codec = DiceCodec::new();
        let reroll = RerollTable::build(&codec).unwrap();
        let state_map = StateIndexMap::generate();
        let future = vec![0.0f32; state_map.num_states()];

        let mut state = StateKey::EMPTY;
        for c in Category::iter().filter(|&c| c != Category::Yum) {
            state = state.apply(c, &[1, 2, 3, 4, 5]);
        }
        let state_index = state_map.get_index(state).unwrap();

        let results = solve_round(11, &codec, &reroll, &state_map, &future).unwrap();
        let result = results.iter().find(|r| r.state_index == state_index).unwrap();

        let yum_hand = codec.encode(&[6, 6, 6, 6, 6]).unwrap();
        assert_eq!(result.evs[cell(yum_hand.get(), 2)], 30.0);
        assert_eq!(
            Action::decode(result.actions[cell(yum_hand.get(), 2)]).unwrap(),
            Action::Score(Category::Yum)
        );
    }

    /// DESIGN.md open-question decision 4: when the sole unfilled category is
    /// High Score and the Low/High ordering invariant blocks every possible
    /// hand (here, Low Score already anchored at the maximum of 30, so no
    /// hand can ever sum higher), the only legal box left is forced through
    /// at its natural score rather than leaving the cell without an action.
    #[test]
    fn forced_scratch_on_blocked_high_score() {
        let codec = DiceCodec::new();
        let reroll = RerollTable::build(&codec).unwrap();
        let state_map = StateIndexMap::generate();
        let future = vec![0.0f32; state_map.num_states()];

        let mut state = StateKey::EMPTY;
        for c in Category::iter().filter(|&c| c != Category::HighScore) {
            state = state.apply(c, &[6, 6, 6, 6, 6]);
        }
        assert_eq!(state.score_anchor(), 30);
        // Every hand sums to at most 30, so High Score is never valid here.
        for d in 0..NUM_HANDS {
            let hand = codec.decode(DiceIndex(d as u8)).unwrap();
            assert!(!state.is_valid(Category::HighScore, &hand));
        }
        let state_index = state_map.get_index(state).unwrap();

        let results = solve_round(11, &codec, &reroll, &state_map, &future).unwrap();
        let result = results.iter().find(|r| r.state_index == state_index).unwrap();

        let low_hand = codec.encode(&[1, 1, 1, 1, 1]).unwrap();
        assert_eq!(result.evs[cell(low_hand.get(), 2)], 5.0);
        assert_eq!(
            Action::decode(result.actions[cell(low_hand.get(), 2)]).unwrap(),
            Action::Score(Category::HighScore)
        );

        let high_hand = codec.encode(&[6, 6, 6, 6, 6]).unwrap();
        assert_eq!(result.evs[cell(high_hand.get(), 2)], 30.0);
        assert_eq!(
            Action::decode(result.actions[cell(high_hand.get(), 2)]).unwrap(),
            Action::Score(Category::HighScore)
        );
    }
}
