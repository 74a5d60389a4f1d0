// Copyright 2025. The Utreexo Forest Developers
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use croaring::Bitmap;
use log::*;

use crate::{
    backend::{NodeStore, VectorBackend},
    common::{child_many, detect_row, merge_sorted, parent, subtree_moves, tree_tops},
    error::ForestError,
    hash::node_hash,
    store, Hash, NULL_HASH,
};

const LOG_TARGET: &str = "utreexo::forest";

/// The tallest forest this implementation supports. Node positions are tracked in a `u32` bitmap,
/// so the layout is capped at `2^32 - 1` slots; a height-31 forest already summarizes two billion
/// leaves.
pub const MAX_FOREST_HEIGHT: u8 = 31;

/// One sub-tree root of the forest: the digest that commits to every leaf below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRoot {
    pub height: u8,
    pub position: u64,
    pub hash: Hash,
}

/// Drop digest pairs that appear in both batches. A digest that is created and spent within the
/// same batch cancels out and must not reach [`Forest::modify`], which expects `adds` to be new
/// and `deletes` to be present.
pub fn cancel_opposing(adds: &mut Vec<Hash>, deletes: &mut Vec<Hash>) {
    let mut a = adds.len();
    while a > 0 {
        a -= 1;
        if let Some(d) = deletes.iter().position(|del| *del == adds[a]) {
            adds.remove(a);
            deletes.remove(d);
        }
    }
}

/// An accumulator forest of perfect binary hash-trees over 32-byte leaf digests.
///
/// The forest owns a dense positional node store, a leaf digest → position index and a dirty-bit
/// set, all guarded by one exclusive lock; every public entry point holds the lock for its entire
/// duration. The handle is cheap to share behind an [`std::sync::Arc`].
pub struct Forest<B = VectorBackend> {
    state: RwLock<ForestState<B>>,
    path: PathBuf,
}

impl Forest<VectorBackend> {
    /// Open the forest persisted under `path` (the file lives at `<path>.dat`), or create an
    /// empty one if nothing has been committed yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Forest<VectorBackend>, ForestError> {
        Forest::with_backend(VectorBackend::default(), path)
    }
}

impl<B: NodeStore> Forest<B> {
    /// Open the forest on a caller-supplied node store.
    pub fn with_backend<P: AsRef<Path>>(backend: B, path: P) -> Result<Forest<B>, ForestError> {
        let path = path.as_ref().to_path_buf();
        let mut state = ForestState::new(backend)?;
        if let Some(leaves) = store::read_leaves(&path)? {
            debug!(target: LOG_TARGET, "Loading {} leaves from {}", leaves.len(), path.display());
            state.load_leaves(leaves)?;
        }
        Ok(Forest {
            state: RwLock::new(state),
            path,
        })
    }

    /// Apply one batch of mutations: delete `deletes`, append `adds`, rebuild the affected
    /// interior digests.
    ///
    /// Every digest in `deletes` must currently be a leaf of the forest, and no digest in `adds`
    /// may already be one; a digest appearing in both batches must be cancelled by the caller
    /// first (see [`cancel_opposing`]). Passing the same digest twice within `adds` is undefined:
    /// the later copy takes over the index entry. A request that deletes an unknown leaf fails
    /// with [`ForestError::UnknownLeaf`] before anything is mutated.
    pub fn modify(&self, adds: &[Hash], deletes: &[Hash]) -> Result<(), ForestError> {
        let mut state = self.write_access()?;
        state.check_usable()?;
        let del_positions = state.translate_deletes(deletes)?;
        let target = (state.num_leaves + adds.len() as u64).saturating_sub(deletes.len() as u64);
        while target > state.capacity() {
            let next = state.height + 1;
            state.remap(next)?;
        }
        debug!(
            target: LOG_TARGET,
            "Modify: {} adds, {} deletes against {} leaves (height {})",
            adds.len(),
            deletes.len(),
            state.num_leaves,
            state.height
        );
        if let Err(e) = state.apply_modify(adds, del_positions) {
            state.poisoned = true;
            error!(target: LOG_TARGET, "Modify failed midway, forest poisoned: {}", e);
            return Err(e);
        }
        Ok(())
    }

    /// Flush the leaf row to `<path>.dat`: written to a random-suffixed temp file, fsynced, then
    /// renamed into place.
    pub fn commit(&self) -> Result<(), ForestError> {
        let state = self.write_access()?;
        state.check_usable()?;
        let mut leaves = Vec::with_capacity((state.num_leaves as usize) * 32);
        for pos in 0..state.num_leaves {
            leaves.extend_from_slice(&state.store.get(pos)?);
        }
        debug!(
            target: LOG_TARGET,
            "Committing {} leaves ({} bytes) to {}",
            state.num_leaves,
            leaves.len(),
            self.path.display()
        );
        store::write_leaves(&self.path, &leaves)
    }

    /// Truncate the persisted state and reinitialize to an empty forest of height zero. This also
    /// recovers a poisoned forest.
    pub fn empty(&self) -> Result<(), ForestError> {
        let mut state = self.write_access()?;
        debug!(target: LOG_TARGET, "Emptying the forest and truncating {}", self.path.display());
        state.reset()?;
        store::write_leaves(&self.path, &[])
    }

    /// Number of leaves currently summarized by the forest.
    pub fn num_leaves(&self) -> Result<u64, ForestError> {
        Ok(self.read_access()?.num_leaves)
    }

    /// Height of the enclosing layout. Grows on demand and never shrinks.
    pub fn height(&self) -> Result<u8, ForestError> {
        Ok(self.read_access()?.height)
    }

    pub fn is_empty(&self) -> Result<bool, ForestError> {
        Ok(self.read_access()?.num_leaves == 0)
    }

    /// Whether `leaf` is currently a member of the forest.
    pub fn contains(&self, leaf: &Hash) -> Result<bool, ForestError> {
        Ok(self.read_access()?.leaf_index.contains_key(leaf))
    }

    /// The row-0 position currently holding `leaf`, if any. Deletions shuffle surviving leaves,
    /// so positions are only stable between mutations.
    pub fn leaf_position(&self, leaf: &Hash) -> Result<Option<u64>, ForestError> {
        Ok(self.read_access()?.leaf_index.get(leaf).copied())
    }

    /// The current sub-tree roots, ordered from the shortest tree to the tallest. Their digests
    /// are the forest's whole commitment to its leaf set.
    pub fn roots(&self) -> Result<Vec<TreeRoot>, ForestError> {
        self.read_access()?.roots()
    }

    /// Check the forest invariants: top layout against the leaf count, leaf index bijection,
    /// interior digests against their children, and an empty dirty set.
    pub fn validate(&self) -> Result<(), ForestError> {
        self.read_access()?.validate()
    }

    fn read_access(&self) -> Result<RwLockReadGuard<'_, ForestState<B>>, ForestError> {
        self.state.read().map_err(|e| {
            error!(target: LOG_TARGET, "An attempt to get a read lock on the forest failed. {:?}", e);
            ForestError::AccessError("Read lock on the forest failed".into())
        })
    }

    fn write_access(&self) -> Result<RwLockWriteGuard<'_, ForestState<B>>, ForestError> {
        self.state.write().map_err(|e| {
            error!(target: LOG_TARGET, "An attempt to get a write lock on the forest failed. {:?}", e);
            ForestError::AccessError("Write lock on the forest failed".into())
        })
    }
}

/// The lock-guarded innards of a [`Forest`].
pub(crate) struct ForestState<B> {
    pub(crate) store: B,
    pub(crate) height: u8,
    pub(crate) num_leaves: u64,
    pub(crate) leaf_index: HashMap<Hash, u64>,
    pub(crate) dirty: Bitmap,
    pub(crate) poisoned: bool,
}

impl<B: NodeStore> ForestState<B> {
    pub(crate) fn new(backend: B) -> Result<ForestState<B>, ForestError> {
        let mut state = ForestState {
            store: backend,
            height: 0,
            num_leaves: 0,
            leaf_index: HashMap::new(),
            dirty: Bitmap::create(),
            poisoned: false,
        };
        state.store.clear()?;
        state.store.resize(1)?;
        Ok(state)
    }

    /// Leaf capacity of the current layout.
    pub(crate) fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    pub(crate) fn check_usable(&self) -> Result<(), ForestError> {
        if self.poisoned {
            return Err(ForestError::Poisoned);
        }
        Ok(())
    }

    pub(crate) fn mark_dirty(&mut self, pos: u64) {
        self.dirty.add(pos as u32);
    }

    pub(crate) fn is_dirty(&self, pos: u64) -> bool {
        self.dirty.contains(pos as u32)
    }

    pub(crate) fn clear_dirty(&mut self, pos: u64) {
        self.dirty.remove(pos as u32);
    }

    /// Map delete requests to their current leaf positions without touching any state, so an
    /// unknown digest aborts the batch before mutation starts.
    pub(crate) fn translate_deletes(&self, deletes: &[Hash]) -> Result<Vec<u64>, ForestError> {
        deletes
            .iter()
            .map(|d| {
                self.leaf_index
                    .get(d)
                    .copied()
                    .ok_or(ForestError::UnknownLeaf(*d))
            })
            .collect()
    }

    pub(crate) fn apply_modify(&mut self, adds: &[Hash], del_positions: Vec<u64>) -> Result<(), ForestError> {
        self.delete_batch(del_positions)?;
        self.add_batch(adds)?;
        self.rehash()
    }

    /// Append each leaf at the next free row-0 slot, index it and mark it dirty.
    pub(crate) fn add_batch(&mut self, adds: &[Hash]) -> Result<(), ForestError> {
        for add in adds {
            let pos = self.num_leaves;
            self.store.set(pos, *add)?;
            self.leaf_index.insert(*add, pos);
            self.mark_dirty(pos);
            self.num_leaves += 1;
        }
        Ok(())
    }

    /// Grow the layout by one row, relocating every interior row to its position in the larger
    /// layout and keeping dirty bits attached to the digests they describe.
    pub(crate) fn remap(&mut self, new_height: u8) -> Result<(), ForestError> {
        if new_height <= self.height || new_height - self.height > 1 {
            return Err(ForestError::UnsupportedRemap {
                from: self.height,
                to: new_height,
            });
        }
        if new_height > MAX_FOREST_HEIGHT {
            return Err(ForestError::MaximumSizeReached);
        }
        debug!(target: LOG_TARGET, "Growing the forest to height {}", new_height);
        self.store.resize((2u64 << new_height) - 1)?;

        // Walk the interior rows bottom-up. The new row `r` starts at twice the old row `r`
        // offset, so each occupant of the old row is copied to `new_row_start + x`.
        let mut pos = 1u64 << new_height;
        let mut reach = pos >> 1;
        for _row in 1..new_height {
            let run_length = reach >> 1;
            for x in 0..run_length {
                let old = (pos >> 1) + x;
                let new = pos + x;
                let value = self.store.get(old)?;
                if value != NULL_HASH {
                    self.store.set(new, value)?;
                }
                if self.is_dirty(old) {
                    self.mark_dirty(new);
                }
            }
            pos += reach;
            reach >>= 1;
        }

        // The old interior region now belongs to the widened leaf row; vacate it.
        for x in (1u64 << self.height)..(1u64 << new_height) {
            self.store.set(x, NULL_HASH)?;
            self.clear_dirty(x);
        }
        self.height = new_height;
        Ok(())
    }

    /// Rebuild the interior digests above every dirty position, bottom-up, carrying freshly
    /// written parents into the next row and stopping at sub-tree tops.
    pub(crate) fn rehash(&mut self) -> Result<(), ForestError> {
        if self.height == 0 {
            self.dirty = Bitmap::create();
            return Ok(());
        }
        let tops = tree_tops(self.num_leaves, self.height);

        let mut by_row: Vec<Vec<u64>> = vec![Vec::new(); self.height as usize];
        let mut remaining = 0usize;
        for pos in self.dirty.iter() {
            let pos = u64::from(pos);
            let row = detect_row(pos, self.height);
            // a dirty top on the highest row has no parent to rebuild
            if row < self.height {
                by_row[row as usize].push(pos);
                remaining += 1;
            }
        }

        let mut current: Vec<u64> = Vec::new();
        let mut top_cursor = 0usize;
        for row in 0..self.height {
            current = merge_sorted(&current, &by_row[row as usize]);
            remaining -= by_row[row as usize].len();
            if remaining == 0 && current.is_empty() {
                break;
            }
            let mut next = Vec::with_capacity(current.len());
            for (i, &pos) in current.iter().enumerate() {
                if current.get(i + 1) == Some(&(pos | 1)) {
                    // sibling pair: hashed once, when the right member comes up
                    continue;
                }
                if top_cursor < tops.len() && pos == tops[top_cursor].position {
                    // tops are the committed digests themselves
                    continue;
                }
                let right = pos | 1;
                let left = right ^ 1;
                let parent_pos = parent(left, self.height);
                let digest = node_hash(&self.store.get(left)?, &self.store.get(right)?);
                self.store.set(parent_pos, digest)?;
                next.push(parent_pos);
            }
            if top_cursor < tops.len() && tops[top_cursor].height == row {
                top_cursor += 1;
            }
            current = next;
        }
        self.dirty = Bitmap::create();
        Ok(())
    }

    /// Rebuild in-memory state from a persisted leaf row: place the digests, grow the layout to
    /// fit, then re-hash everything above them.
    pub(crate) fn load_leaves(&mut self, leaves: Vec<Hash>) -> Result<(), ForestError> {
        let count = leaves.len() as u64;
        if count == 0 {
            return Ok(());
        }
        while count > self.capacity() {
            let next = self.height + 1;
            self.remap(next)?;
        }
        for (i, leaf) in leaves.into_iter().enumerate() {
            let pos = i as u64;
            self.store.set(pos, leaf)?;
            self.leaf_index.insert(leaf, pos);
            self.mark_dirty(pos);
        }
        self.num_leaves = count;
        self.rehash()
    }

    pub(crate) fn reset(&mut self) -> Result<(), ForestError> {
        self.store.clear()?;
        self.store.resize(1)?;
        self.height = 0;
        self.num_leaves = 0;
        self.leaf_index = HashMap::new();
        self.dirty = Bitmap::create();
        self.poisoned = false;
        Ok(())
    }

    pub(crate) fn roots(&self) -> Result<Vec<TreeRoot>, ForestError> {
        tree_tops(self.num_leaves, self.height)
            .into_iter()
            .map(|top| {
                Ok(TreeRoot {
                    height: top.height,
                    position: top.position,
                    hash: self.store.get(top.position)?,
                })
            })
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<(), ForestError> {
        if self.num_leaves > self.capacity() {
            return Err(ForestError::InvalidMerkleTree(format!(
                "{} leaves exceed the capacity {} of a height-{} forest",
                self.num_leaves,
                self.capacity(),
                self.height
            )));
        }
        if !self.dirty.is_empty() {
            return Err(ForestError::InvalidMerkleTree(format!(
                "{} positions are still awaiting a re-hash",
                self.dirty.cardinality()
            )));
        }
        if self.leaf_index.len() as u64 != self.num_leaves {
            return Err(ForestError::InvalidMerkleTree(format!(
                "leaf index holds {} entries for {} leaves",
                self.leaf_index.len(),
                self.num_leaves
            )));
        }
        for top in tree_tops(self.num_leaves, self.height) {
            let moves = subtree_moves(top.position, top.position, self.height);
            let bottom = 1usize << top.height;
            for (i, m) in moves.iter().enumerate() {
                let value = self.store.get(m.from)?;
                if value == NULL_HASH {
                    return Err(ForestError::InvalidMerkleTree(format!(
                        "vacant slot {} inside the tree topped at {}",
                        m.from, top.position
                    )));
                }
                if i < bottom {
                    if self.leaf_index.get(&value) != Some(&m.from) {
                        return Err(ForestError::InvalidMerkleTree(format!(
                            "leaf index does not point back at position {}",
                            m.from
                        )));
                    }
                } else {
                    let left = child_many(m.from, 1, self.height);
                    let right = left | 1;
                    let expected = node_hash(&self.store.get(left)?, &self.store.get(right)?);
                    if value != expected {
                        return Err(ForestError::InvalidMerkleTree(format!(
                            "interior digest at {} does not match its children",
                            m.from
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
