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

//! # Utreexo forest
//!
//! An accumulator for a dynamic set of 32-byte digests, held as a *forest* of perfect binary
//! hash-trees in one flat positional array. The intended use is summarizing a UTXO set: leaves
//! are outpoint hashes, a block's spent outputs are deleted and its new outputs are appended in
//! one batch, and the handful of sub-tree root digests ("tops") commit to the entire set.
//!
//! A forest of height `H` reserves `2^(H+1) - 1` slots. Row 0 holds the leaves and each row
//! above holds the parents of the row below, so for height 2 the positions are laid out as:
//!
//! ```plaintext
//! row 2:          06
//!               /    \
//! row 1:      04      05
//!            /  \    /  \
//! row 0:    00  01  02  03
//! ```
//!
//! The parent of position `p` is always `(p >> 1) | (1 << H)`, which is what makes the flat
//! layout navigable with shifts and masks alone (see [`common`]).
//!
//! The populated slots always form perfect trees whose count and heights follow the binary
//! representation of the leaf count: bit `k` set means one top of height `k`. Five leaves in a
//! height-3 layout look like this, with tops at positions 12 and 4:
//!
//! ```plaintext
//!                     12
//!                 /        \
//!               08          09
//!              /  \        /  \
//!            00    01    02    03    04
//! ```
//!
//! Deleting leaves runs a per-row pipeline that vacates the condemned slots, collapses deleted
//! sibling pairs onto their parents, compacts the survivors by moving whole sub-trees, and
//! reconciles each row against its standing top; a final pass re-hashes only the interior
//! positions that were disturbed. The layout grows a row at a time as leaves are appended and
//! never shrinks.
//!
//! ```no_run
//! use utreexo_forest::{Forest, Hash};
//!
//! # fn main() -> Result<(), utreexo_forest::ForestError> {
//! let forest = Forest::new("/tmp/utreexo")?;
//! let outputs: Vec<Hash> = vec![[1u8; 32], [2u8; 32]];
//! forest.modify(&outputs, &[])?;
//! forest.modify(&[], &outputs[..1])?;
//! for root in forest.roots()? {
//!     println!("height {} top: {}", root.height, hex::encode(root.hash));
//! }
//! forest.commit()?;
//! # Ok(())
//! # }
//! ```

/// A node digest. The all-zero digest marks a vacant slot and must never be supplied as a leaf.
pub type Hash = [u8; 32];

/// The vacant-slot marker.
pub const NULL_HASH: Hash = [0u8; 32];

mod backend;
mod delete;
mod error;
mod forest;
mod hash;
mod store;

// Less commonly used exports
pub mod common;

// Commonly used exports
pub use backend::{NodeStore, VectorBackend};
pub use error::ForestError;
pub use forest::{cancel_opposing, Forest, TreeRoot, MAX_FOREST_HEIGHT};
pub use hash::node_hash;
