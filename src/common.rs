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

//! Position arithmetic for the flat forest layout.
//!
//! All functions here are pure and take the current forest height as an argument. A forest of
//! height `H` reserves `2^(H+1) - 1` node slots. Row 0 holds the leaves (positions `0..2^H`) and
//! row `r` starts at offset `(2 - 2^(1-r)) * 2^H`, which is why a parent is always found at
//! `(p >> 1) | (1 << H)`. The row of any position can be read off its high bits alone.

use std::cmp::Ordering;

/// A sub-tree root position paired with the height of the tree it caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeTop {
    pub position: u64,
    pub height: u8,
}

/// A single node relocation produced by [`subtree_moves`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub from: u64,
    pub to: u64,
}

/// Bit mask covering every valid node position of a forest with the given height.
#[inline(always)]
pub fn node_mask(forest_height: u8) -> u64 {
    (2u64 << forest_height) - 1
}

/// Position of the parent of `position`.
#[inline(always)]
pub fn parent(position: u64, forest_height: u8) -> u64 {
    (position >> 1) | (1u64 << forest_height)
}

/// Position `rise` rows above `position`. `parent_many(p, 0, h)` is `p` itself.
pub fn parent_many(position: u64, rise: u8, forest_height: u8) -> u64 {
    let mask = node_mask(forest_height);
    let shift = u32::from(forest_height) + 1 - u32::from(rise);
    ((position >> rise) | (mask << shift)) & mask
}

/// Leftmost descendant `drop` rows below `position`.
#[inline(always)]
pub fn child_many(position: u64, drop: u8, forest_height: u8) -> u64 {
    (position << drop) & node_mask(forest_height)
}

/// The row a position sits on, read from its leading row-marker bits. Leaves are row 0.
pub fn detect_row(position: u64, forest_height: u8) -> u8 {
    let mut marker = 1u64 << forest_height;
    let mut row = 0;
    while position & marker != 0 {
        row += 1;
        marker >>= 1;
    }
    row
}

/// The sub-tree tops of a forest holding `num_leaves` leaves, ordered from the shortest
/// (rightmost) to the tallest (leftmost) tree. Bit `k` of `num_leaves` contributes exactly one
/// top of height `k`.
pub fn tree_tops(num_leaves: u64, forest_height: u8) -> Vec<TreeTop> {
    let mut tops = Vec::with_capacity(num_leaves.count_ones() as usize);
    let mut position = 0u64;
    for height in (0..=forest_height).rev() {
        if num_leaves & (1u64 << height) != 0 {
            tops.push(TreeTop {
                position: parent_many(position, height, forest_height),
                height,
            });
            position += 1u64 << height;
        }
        if position >= num_leaves {
            break;
        }
    }
    tops.reverse();
    tops
}

/// Split a sorted position list into twin pairs and only-children.
///
/// Adjacent entries that differ only in the LSB are siblings that are both condemned; the pair
/// collapses onto its parent, so only the even member is reported and nothing on this row needs
/// to move for it. Everything else is an only-child whose sibling survives.
pub fn extract_twins(nodes: &[u64]) -> (Vec<u64>, Vec<u64>) {
    let mut twins = Vec::new();
    let mut only_children = Vec::new();
    let mut i = 0;
    while i < nodes.len() {
        if i + 1 < nodes.len() && (nodes[i] | 1) == nodes[i + 1] {
            twins.push(nodes[i]);
            i += 2;
        } else {
            only_children.push(nodes[i]);
            i += 1;
        }
    }
    (twins, only_children)
}

/// Enumerate every node of the perfect sub-tree rooted at `subroot`, bottom row first and left to
/// right within each row, paired with its destination when the root relocates to `move_to`. The
/// per-row translation is the root delta scaled by `1 << depth`. Passing `move_to == subroot`
/// enumerates the sub-tree in place. The result holds `2^(h+1) - 1` moves for a sub-root on row
/// `h`.
pub fn subtree_moves(subroot: u64, move_to: u64, forest_height: u8) -> Vec<Move> {
    let sub_height = detect_row(subroot, forest_height);
    let root_delta = move_to as i64 - subroot as i64;
    let mut moves = Vec::with_capacity((2usize << sub_height) - 1);
    for height in 0..=sub_height {
        let depth = sub_height - height;
        let leftmost = child_many(subroot, depth, forest_height);
        let row_delta = root_delta << depth;
        for i in 0..(1u64 << depth) {
            let from = leftmost + i;
            moves.push(Move {
                from,
                to: (from as i64 + row_delta) as u64,
            });
        }
    }
    moves
}

/// Merge two sorted position lists into one sorted list, eliding duplicates.
pub fn merge_sorted(a: &[u64], b: &[u64]) -> Vec<u64> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let (mut ia, mut ib) = (0usize, 0usize);
    while ia < a.len() && ib < b.len() {
        match a[ia].cmp(&b[ib]) {
            Ordering::Less => {
                merged.push(a[ia]);
                ia += 1;
            },
            Ordering::Greater => {
                merged.push(b[ib]);
                ib += 1;
            },
            Ordering::Equal => {
                merged.push(a[ia]);
                ia += 1;
                ib += 1;
            },
        }
    }
    merged.extend_from_slice(&a[ia..]);
    merged.extend_from_slice(&b[ib..]);
    merged
}
