//! Checkpointed state
//!
//! External collaborators (tokens) hold state the engine changes through
//! transfers, mints and burns. An operation that fails must leave no trace in
//! them, so every such collaborator is checkpointed when the operation starts
//! and either committed or reverted when it ends.
//!
//! A checkpoint costs nothing up front. Each write records the value it
//! replaced, so reverting touches only the slots the operation wrote.

use std::collections::HashMap;
use std::hash::Hash;

/// State that can be rolled back to the last checkpoint
pub trait Journaled {
    /// Remember the current state. Checkpoints nest.
    fn checkpoint(&self);
    /// Drop the most recent checkpoint, keeping the current state.
    fn commit(&self);
    /// Restore the state saved by the most recent checkpoint.
    fn revert(&self);
}

/// Keyed store with an undo log per open checkpoint
///
/// Slots holding `V::default()` are not stored.
#[derive(Debug, Clone)]
pub struct Journal<K, V> {
    current: HashMap<K, V>,
    undo: Vec<Vec<(K, V)>>,
}

impl<K, V> Default for Journal<K, V> {
    fn default() -> Self {
        Self {
            current: HashMap::new(),
            undo: Vec::new(),
        }
    }
}

impl<K, V> Journal<K, V>
where
    K: Eq + Hash + Copy,
    V: Copy + Default + PartialEq,
{
    pub fn get(&self, key: K) -> V {
        self.current.get(&key).copied().unwrap_or_default()
    }

    pub fn set(&mut self, key: K, value: V) {
        let previous = self.write(key, value);
        if let Some(frame) = self.undo.last_mut() {
            frame.push((key, previous));
        }
    }

    pub fn checkpoint(&mut self) {
        self.undo.push(Vec::new());
    }

    /// An inner commit hands its undo entries to the enclosing checkpoint.
    pub fn commit(&mut self) {
        if let Some(frame) = self.undo.pop() {
            if let Some(parent) = self.undo.last_mut() {
                parent.extend(frame);
            }
        }
    }

    /// No-op without an open checkpoint.
    pub fn revert(&mut self) {
        if let Some(frame) = self.undo.pop() {
            for (key, previous) in frame.into_iter().rev() {
                self.write(key, previous);
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.undo.len()
    }

    /// Undo entries held by the innermost checkpoint
    pub fn pending_writes(&self) -> usize {
        self.undo.last().map_or(0, Vec::len)
    }

    fn write(&mut self, key: K, value: V) -> V {
        let previous = if value == V::default() {
            self.current.remove(&key)
        } else {
            self.current.insert(key, value)
        };
        previous.unwrap_or_default()
    }
}
