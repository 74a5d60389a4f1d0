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

use thiserror::Error;

use crate::Hash;

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("Tried to delete leaf {}, but it is not tracked by the forest", hex::encode(.0))]
    UnknownLeaf(Hash),
    #[error("Cannot remap the forest from height {from} to height {to}; only single-step growth is supported")]
    UnsupportedRemap { from: u8, to: u8 },
    #[error("The forest has reached its maximum height")]
    MaximumSizeReached,
    #[error("Sub-tree height mismatch: expected {expected}, got {actual}")]
    HeightMismatch { expected: u64, actual: u64 },
    #[error("Tried to move the sub-tree node at position {0}, but the slot is vacant")]
    EmptyMove(u64),
    #[error("No sub-tree is rooted at position {0}")]
    NotInForest(u64),
    #[error("Position {pos} is beyond the {len} allocated node slots")]
    OutOfBounds { pos: u64, len: u64 },
    #[error("The deletion climb left the forest inconsistent: {0}")]
    InternalInvariantBroken(String),
    #[error("The forest is not internally consistent: {0}")]
    InvalidMerkleTree(String),
    #[error("A previous mutation failed midway; only `empty` can recover the forest")]
    Poisoned,
    #[error("A problem has been encountered with the forest lock: {0}")]
    AccessError(String),
    #[error("Persisted leaf file is corrupt: {len} bytes is not a whole number of 32-byte digests")]
    CorruptLeafFile { len: u64 },
    #[error("Persistence I/O failed: {0}")]
    IoError(#[from] std::io::Error),
}
