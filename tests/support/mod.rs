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

use std::ops::Range;

use sha2::{Digest, Sha256};
use tempfile::TempDir;
use utreexo_forest::{Forest, Hash};

/// The leaf digest for integer `i`: sha256 over its decimal string.
pub fn leaf(i: u64) -> Hash {
    Sha256::digest(i.to_string().as_bytes()).into()
}

pub fn leaves(range: Range<u64>) -> Vec<Hash> {
    range.map(leaf).collect()
}

/// A fresh forest persisted under a scratch directory. Keep the [`TempDir`] alive for as long as
/// the forest is in use.
pub fn new_forest() -> (Forest, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let forest = Forest::new(dir.path().join("utreexo")).unwrap();
    (forest, dir)
}

/// A forest pre-populated with the leaves for `0..count`.
pub fn forest_with_leaves(count: u64) -> (Forest, TempDir) {
    let (forest, dir) = new_forest();
    if count > 0 {
        forest.modify(&leaves(0..count), &[]).unwrap();
    }
    (forest, dir)
}

/// The current top digests, shortest tree first.
pub fn top_hashes(forest: &Forest) -> Vec<Hash> {
    forest.roots().unwrap().iter().map(|r| r.hash).collect()
}
