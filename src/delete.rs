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

//! The per-row deletion pipeline.
//!
//! Deletions climb the forest one row at a time. On each row the condemned positions are sorted
//! and vacated, sibling pairs ("twins") collapse onto their parent, remaining holes are filled by
//! swapping in the rightmost orphan's surviving sibling sub-tree, and at most one leftover either
//! trades places with the row's standing top or promotes its sibling into a new top. Sub-trees
//! displaced by top reshuffling are stashed and written into the post-deletion top layout once
//! the climb finishes.

use std::{collections::BTreeMap, mem};

use log::*;

use crate::{
    backend::NodeStore,
    common::{detect_row, extract_twins, parent, subtree_moves, tree_tops},
    error::ForestError,
    forest::ForestState,
    Hash, NULL_HASH,
};

const LOG_TARGET: &str = "utreexo::forest::delete";

/// A sub-tree captured during the climb: digests in bottom-up enumeration order, plus the
/// enumeration indices that were dirty at capture time so the bits can be re-applied wherever the
/// stash lands.
pub(crate) struct RootStash {
    values: Vec<Hash>,
    dirties: Vec<usize>,
}

/// What the root phase handed back for one row.
struct RootOutcome {
    up_del: Option<u64>,
    stash: Option<RootStash>,
}

impl<B: NodeStore> ForestState<B> {
    /// Remove the leaves at `dels` (row-0 positions) and reshape the forest in place.
    pub(crate) fn delete_batch(&mut self, mut dels: Vec<u64>) -> Result<(), ForestError> {
        if dels.is_empty() {
            return Ok(());
        }
        let num_deleted = dels.len() as u64;
        let remaining_leaves = self.num_leaves.checked_sub(num_deleted).ok_or_else(|| {
            ForestError::InternalInvariantBroken(format!(
                "{} deletions against {} leaves",
                num_deleted, self.num_leaves
            ))
        })?;

        // Standing tops by height, and the top layout the shrunken forest will have. Stashed
        // sub-trees are written into the latter once the climb is done.
        let mut root_pos: BTreeMap<u8, u64> = tree_tops(self.num_leaves, self.height)
            .into_iter()
            .map(|top| (top.height, top.position))
            .collect();
        let next_root_pos: BTreeMap<u8, u64> = tree_tops(remaining_leaves, self.height)
            .into_iter()
            .map(|top| (top.height, top.position))
            .collect();
        let mut stash_map: BTreeMap<u8, RootStash> = BTreeMap::new();
        let mut up1_dels: Vec<u64> = Vec::new();

        for row in 0..=self.height {
            if dels.is_empty() {
                break;
            }
            dels.sort_unstable();
            trace!(target: LOG_TARGET, "Row {}: {} deletions", row, dels.len());

            // Vacate every condemned slot. On the leaf row this is also where the digests leave
            // the leaf index.
            for &del in &dels {
                if row == 0 {
                    let leaf = self.store.get(del)?;
                    self.leaf_index.remove(&leaf);
                }
                self.store.set(del, NULL_HASH)?;
            }

            // A condemned top can only be the rightmost entry of its row; it simply disappears.
            if let Some(&top) = root_pos.get(&row) {
                if dels.last() == Some(&top) {
                    dels.pop();
                    root_pos.remove(&row);
                }
            }

            // Twins collapse onto their parent: nothing on this row has to move for them.
            let (twins, only_children) = extract_twins(&dels);
            dels = only_children;
            for twin in twins {
                up1_dels.push(parent(twin, self.height));
            }

            // Fill the leftmost hole with the rightmost orphan's surviving sibling sub-tree. The
            // filled slot gets a dirty mark; the drained orphan condemns its parent.
            while dels.len() > 1 {
                let (a, b) = (dels[0], dels[1]);
                self.move_subtree(b ^ 1, a)?;
                self.mark_dirty(a);
                up1_dels.push(parent(b, self.height));
                dels.drain(..2);
            }

            let del_pos = dels.first().copied();
            let top_pos = root_pos.get(&row).copied();
            let outcome = self.root_phase(del_pos, top_pos)?;
            if let Some(up) = outcome.up_del {
                up1_dels.push(up);
            }
            if let Some(stash) = outcome.stash {
                stash_map.insert(row, stash);
            }

            dels = mem::take(&mut up1_dels);
        }

        if !dels.is_empty() {
            return Err(ForestError::InternalInvariantBroken(format!(
                "deletion climb finished with {} positions unprocessed",
                dels.len()
            )));
        }

        for (height, stash) in stash_map {
            let dest = next_root_pos.get(&height).copied().ok_or_else(|| {
                ForestError::InternalInvariantBroken(format!(
                    "a stashed sub-tree has no destination top at height {}",
                    height
                ))
            })?;
            self.write_subtree(stash, dest)?;
        }
        self.num_leaves = remaining_leaves;
        Ok(())
    }

    /// Settle the at-most-one leftover deletion of a row against the row's standing top.
    ///
    /// Four cases: nothing to do; *derooting* (top sub-tree fills the hole); *rooting* (the
    /// orphan's surviving sibling is captured to become this height's top); *stashing* (the
    /// standing top is captured, since it will collapse leftward in the shrunken layout).
    fn root_phase(&mut self, del_pos: Option<u64>, top_pos: Option<u64>) -> Result<RootOutcome, ForestError> {
        match (del_pos, top_pos) {
            (None, None) => Ok(RootOutcome {
                up_del: None,
                stash: None,
            }),
            (Some(del), Some(top)) => {
                self.move_subtree(top, del)?;
                // either sibling of the filled hole works as the re-hash trigger; `| 1` keeps the
                // mark position non-zero on every row
                self.mark_dirty(del | 1);
                Ok(RootOutcome {
                    up_del: None,
                    stash: None,
                })
            },
            (Some(del), None) => {
                let stash_pos = del ^ 1;
                // the parent dies even when the promoted sub-tree never has to move
                let up_del = parent(stash_pos, self.height);
                let stash = self.get_subtree(stash_pos, true)?;
                Ok(RootOutcome {
                    up_del: Some(up_del),
                    stash: Some(stash),
                })
            },
            (None, Some(top)) => {
                let stash = self.get_subtree(top, true)?;
                Ok(RootOutcome {
                    up_del: None,
                    stash: Some(stash),
                })
            },
        }
    }

    /// Move a sub-tree and everything below it to a same-row destination, vacating the source
    /// and dragging leaf index entries and dirty bits along.
    pub(crate) fn move_subtree(&mut self, from: u64, to: u64) -> Result<(), ForestError> {
        let from_row = detect_row(from, self.height);
        let to_row = detect_row(to, self.height);
        if from_row != to_row {
            return Err(ForestError::HeightMismatch {
                expected: u64::from(to_row),
                actual: u64::from(from_row),
            });
        }
        let moves = subtree_moves(from, to, self.height);
        let bottom = 1usize << from_row;
        for (i, m) in moves.iter().enumerate() {
            let value = self.store.get(m.from)?;
            if value == NULL_HASH {
                return Err(ForestError::EmptyMove(m.from));
            }
            self.store.set(m.to, value)?;
            if i < bottom {
                self.leaf_index.insert(value, m.to);
            }
            self.store.set(m.from, NULL_HASH)?;
            if self.is_dirty(m.from) {
                self.clear_dirty(m.from);
                self.mark_dirty(m.to);
            }
        }
        Ok(())
    }

    /// Read the sub-tree rooted at `src` into a stash, optionally deleting it from the forest as
    /// it is read.
    pub(crate) fn get_subtree(&mut self, src: u64, del: bool) -> Result<RootStash, ForestError> {
        if src >= self.store.len() || self.store.get(src)? == NULL_HASH {
            return Err(ForestError::NotInForest(src));
        }
        let moves = subtree_moves(src, src, self.height);
        let mut values = Vec::with_capacity(moves.len());
        // dirty offsets come out in ascending enumeration order by construction
        let mut dirties = Vec::new();
        for (i, m) in moves.iter().enumerate() {
            values.push(self.store.get(m.from)?);
            if self.is_dirty(m.from) {
                dirties.push(i);
                if del {
                    self.clear_dirty(m.from);
                }
            }
            if del {
                self.store.set(m.from, NULL_HASH)?;
            }
        }
        Ok(RootStash { values, dirties })
    }

    /// Write a stashed sub-tree into the tree topped at `dest`, indexing its bottom row and
    /// re-applying the recorded dirty offsets.
    pub(crate) fn write_subtree(&mut self, stash: RootStash, dest: u64) -> Result<(), ForestError> {
        let sub_height = detect_row(dest, self.height);
        let expected = (2u64 << sub_height) - 1;
        if stash.values.len() as u64 != expected {
            return Err(ForestError::HeightMismatch {
                expected,
                actual: stash.values.len() as u64,
            });
        }
        let moves = subtree_moves(dest, dest, self.height);
        let bottom = 1usize << sub_height;
        let mut next_dirty = 0usize;
        for (i, m) in moves.iter().enumerate() {
            self.store.set(m.to, stash.values[i])?;
            if i < bottom {
                self.leaf_index.insert(stash.values[i], m.to);
            }
            if next_dirty < stash.dirties.len() && stash.dirties[next_dirty] == i {
                self.mark_dirty(m.to);
                next_dirty += 1;
            }
        }
        Ok(())
    }
}
