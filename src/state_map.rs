//! Bidirectional mapping between packed state keys and the dense index space the
//! solver actually indexes by.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use crate::enumerate;
use crate::error::{Result, YumError};
use crate::persist;
use crate::state::StateKey;

pub struct StateIndexMap {
    index_to_key: Vec<StateKey>,
    key_to_index: HashMap<StateKey, u32>,
}

impl StateIndexMap {
    /// Enumerates every reachable state and assigns each a dense index in
    /// ascending key order.
    pub fn generate() -> StateIndexMap {
        let mut index_to_key = enumerate::all_states();
        index_to_key.sort_unstable();
        index_to_key.dedup();
        let key_to_index = index_to_key
            .iter()
            .enumerate()
            .map(|(i, &key)| (key, i as u32))
            .collect();
        StateIndexMap { index_to_key, key_to_index }
    }

    pub fn num_states(&self) -> usize {
        self.index_to_key.len()
    }

    pub fn get_index(&self, key: StateKey) -> Option<u32> {
        self.key_to_index.get(&key).copied()
    }

    pub fn get_state(&self, index: u32) -> Result<StateKey> {
        self.index_to_key.get(index as usize).copied().ok_or_else(|| {
            YumError::InvalidIndex(format!("state index {index} out of range"))
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);
        persist::write_u32(&mut w, self.index_to_key.len() as u32)?;
        for key in &self.index_to_key {
            persist::write_u32(&mut w, key.0)?;
        }
        Ok(())
    }

    /// Largest state count the enumerator can ever produce: the bonus/score/
    /// remaining factor product before deduplication (§4.5). A persisted map
    /// claiming more states than this is corrupt or truncated, not merely
    /// stale.
    const MAX_STATES: u32 = (enumerate::NUM_BONUS_STATES
        * enumerate::NUM_SCORE_STATES
        * enumerate::NUM_REMAINING_STATES) as u32;

    pub fn load(path: impl AsRef<Path>) -> Result<StateIndexMap> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| YumError::MissingInput(format!("{}: {e}", path.display())))?;
        let mut r = BufReader::new(file);
        let n = persist::read_u32(&mut r).map_err(|e| {
            YumError::InvalidMap(format!("{}: truncated header: {e}", path.display()))
        })?;
        if n == 0 || n > Self::MAX_STATES {
            return Err(YumError::InvalidMap(format!(
                "{}: state count {n} out of expected range 1..={}",
                path.display(),
                Self::MAX_STATES
            )));
        }

        let mut index_to_key = Vec::with_capacity(n as usize);
        for i in 0..n {
            let bits = persist::read_u32(&mut r).map_err(|e| {
                YumError::InvalidMap(format!(
                    "{}: truncated at key {i} of {n}: {e}",
                    path.display()
                ))
            })?;
            index_to_key.push(StateKey(bits));
        }

        let mut trailing = [0u8; 1];
        let extra = r
            .read(&mut trailing)
            .map_err(|e| YumError::InvalidMap(format!("{}: {e}", path.display())))?;
        if extra != 0 {
            return Err(YumError::InvalidMap(format!(
                "{}: trailing bytes after {n} keys",
                path.display()
            )));
        }

        if !index_to_key.windows(2).all(|w| w[0] < w[1]) {
            return Err(YumError::InvalidMap(format!(
                "{}: keys are not in strictly ascending order",
                path.display()
            )));
        }

        let key_to_index = index_to_key
            .iter()
            .enumerate()
            .map(|(i, &key)| (key, i as u32))
            .collect();
        Ok(StateIndexMap { index_to_key, key_to_index })
    }
}
