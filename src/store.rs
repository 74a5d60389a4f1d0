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

//! Flat-file persistence of the leaf row.
//!
//! The committed format is the bare concatenation of the row-0 digests in position order, 32
//! bytes each, no header. Interior digests are derived state and are rebuilt on load.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use rand::{thread_rng, Rng};

use crate::{error::ForestError, Hash};

/// The committed data file for a forest opened with the given path prefix.
pub(crate) fn data_file(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".dat");
    PathBuf::from(name)
}

fn tmp_file(prefix: &Path, suffix: u16) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{:04x}.tmp", suffix));
    PathBuf::from(name)
}

/// Atomically replace the committed leaf file: write a random-suffixed temp file, fsync it, then
/// rename it over the data file.
pub(crate) fn write_leaves(prefix: &Path, leaves: &[u8]) -> Result<(), ForestError> {
    let suffix: u16 = thread_rng().gen();
    let tmp = tmp_file(prefix, suffix);
    let mut file = File::create(&tmp)?;
    file.write_all(leaves)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, data_file(prefix))?;
    Ok(())
}

/// Read the committed leaf row, if a data file exists. The file length must be a whole number of
/// 32-byte digests.
pub(crate) fn read_leaves(prefix: &Path) -> Result<Option<Vec<Hash>>, ForestError> {
    let bytes = match fs::read(data_file(prefix)) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if bytes.len() % 32 != 0 {
        return Err(ForestError::CorruptLeafFile {
            len: bytes.len() as u64,
        });
    }
    let leaves = bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(chunk);
            hash
        })
        .collect();
    Ok(Some(leaves))
}
