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

use crate::{error::ForestError, Hash, NULL_HASH};

/// A dense, positionally indexed store of node digests, without imposing any specific details on
/// how the storage is actually done. Vacant slots hold [`NULL_HASH`].
pub trait NodeStore {
    /// Number of node slots currently allocated.
    fn len(&self) -> u64;

    /// Whether no slots are allocated at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The digest stored at `pos`. Reads past the allocated slots fail with
    /// [`ForestError::OutOfBounds`].
    fn get(&self, pos: u64) -> Result<Hash, ForestError>;

    /// Replace the digest at `pos`.
    fn set(&mut self, pos: u64, hash: Hash) -> Result<(), ForestError>;

    /// Grow the store to `new_len` slots. Existing entries keep their positions; new slots are
    /// vacant.
    fn resize(&mut self, new_len: u64) -> Result<(), ForestError>;

    /// Drop every slot.
    fn clear(&mut self) -> Result<(), ForestError>;
}

/// A [`std::vec::Vec`]-based node store. Useful for testing or ephemeral forests.
pub struct VectorBackend {
    nodes: Vec<Hash>,
}

impl VectorBackend {
    pub fn new(nodes: Vec<Hash>) -> VectorBackend {
        VectorBackend { nodes }
    }
}

impl Default for VectorBackend {
    fn default() -> VectorBackend {
        VectorBackend {
            nodes: Vec::with_capacity(512),
        }
    }
}

impl NodeStore for VectorBackend {
    #[inline(always)]
    fn len(&self) -> u64 {
        self.nodes.len() as u64
    }

    fn get(&self, pos: u64) -> Result<Hash, ForestError> {
        self.nodes
            .get(pos as usize)
            .copied()
            .ok_or(ForestError::OutOfBounds { pos, len: self.len() })
    }

    fn set(&mut self, pos: u64, hash: Hash) -> Result<(), ForestError> {
        let len = self.len();
        match self.nodes.get_mut(pos as usize) {
            Some(slot) => {
                *slot = hash;
                Ok(())
            },
            None => Err(ForestError::OutOfBounds { pos, len }),
        }
    }

    fn resize(&mut self, new_len: u64) -> Result<(), ForestError> {
        self.nodes.resize(new_len as usize, NULL_HASH);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ForestError> {
        self.nodes.clear();
        Ok(())
    }
}
