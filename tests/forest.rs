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

mod support;

use rand::{rngs::StdRng, Rng, SeedableRng};
use support::{forest_with_leaves, leaf, leaves, new_forest, top_hashes};
use utreexo_forest::{node_hash, Forest, ForestError, Hash};

#[test]
fn empty_modify_is_a_noop() {
    let (forest, _dir) = new_forest();
    forest.modify(&[], &[]).unwrap();
    assert!(forest.is_empty().unwrap());
    assert_eq!(forest.height().unwrap(), 0);
    assert!(forest.roots().unwrap().is_empty());
    forest.validate().unwrap();

    let (forest, _dir) = forest_with_leaves(3);
    let roots = forest.roots().unwrap();
    forest.modify(&[], &[]).unwrap();
    assert_eq!(forest.roots().unwrap(), roots);
    forest.validate().unwrap();
}

#[test]
fn growth_from_empty() {
    // expected layout height after appending 1..=5 leaves one at a time
    let expected_heights = [0u8, 1, 2, 2, 3];
    let (forest, _dir) = new_forest();
    for i in 0..5u64 {
        forest.modify(&[leaf(i)], &[]).unwrap();
        assert_eq!(forest.num_leaves().unwrap(), i + 1);
        assert_eq!(forest.height().unwrap(), expected_heights[i as usize]);
        assert_eq!(forest.roots().unwrap().len() as u32, (i + 1).count_ones());
        forest.validate().unwrap();
    }
}

#[test]
fn single_tree_grows_one_leaf_at_a_time() {
    let (forest, _dir) = new_forest();

    forest.modify(&[leaf(0)], &[]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 1);
    assert_eq!(forest.height().unwrap(), 0);
    assert_eq!(top_hashes(&forest), vec![leaf(0)]);

    forest.modify(&[leaf(1)], &[]).unwrap();
    let roots = forest.roots().unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 2);
    assert_eq!(forest.height().unwrap(), 1);
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].position, 2);
    assert_eq!(roots[0].hash, node_hash(&leaf(0), &leaf(1)));

    forest.modify(&leaves(2..4), &[]).unwrap();
    let roots = forest.roots().unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 4);
    assert_eq!(forest.height().unwrap(), 2);
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].position, 6);
    assert_eq!(
        roots[0].hash,
        node_hash(&node_hash(&leaf(0), &leaf(1)), &node_hash(&leaf(2), &leaf(3)))
    );
    forest.validate().unwrap();
}

#[test]
fn deleting_the_sole_leaf() {
    let (forest, _dir) = forest_with_leaves(1);
    forest.modify(&[], &[leaf(0)]).unwrap();
    assert!(forest.is_empty().unwrap());
    assert_eq!(forest.height().unwrap(), 0);
    assert!(forest.roots().unwrap().is_empty());
    assert!(!forest.contains(&leaf(0)).unwrap());
    forest.validate().unwrap();
}

#[test]
fn deleting_an_orphan_promotes_its_sibling() {
    // from [L0 L1 L2 L3], deleting L1 leaves L0 as a lone top and L2||L3 as the next one
    let (forest, _dir) = forest_with_leaves(4);
    forest.modify(&[], &[leaf(1)]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 3);
    assert_eq!(forest.height().unwrap(), 2);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 2);
    assert_eq!((roots[0].height, roots[0].position, roots[0].hash), (0, 2, leaf(0)));
    assert_eq!(
        (roots[1].height, roots[1].position, roots[1].hash),
        (1, 4, node_hash(&leaf(2), &leaf(3)))
    );
    assert_eq!(forest.leaf_position(&leaf(0)).unwrap(), Some(2));
    forest.validate().unwrap();
}

#[test]
fn deleting_the_outer_pair_compacts_the_survivors() {
    // deleting L0 and L3 swaps L2 (the rightmost orphan's sibling) into the leftmost hole, so
    // the surviving pair commits in L2, L1 order
    let (forest, _dir) = forest_with_leaves(4);
    forest.modify(&[], &[leaf(0), leaf(3)]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 2);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].height, 1);
    assert_eq!(roots[0].position, 4);
    assert_eq!(roots[0].hash, node_hash(&leaf(2), &leaf(1)));
    assert_eq!(forest.leaf_position(&leaf(2)).unwrap(), Some(0));
    assert_eq!(forest.leaf_position(&leaf(1)).unwrap(), Some(1));
    forest.validate().unwrap();
}

#[test]
fn deleting_twins_collapses_their_parent() {
    // both children of the left row-0 pair go: no swap may run, the pair's parent is condemned
    let (forest, _dir) = forest_with_leaves(4);
    forest.modify(&[], &[leaf(0), leaf(1)]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 2);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].position, 4);
    assert_eq!(roots[0].hash, node_hash(&leaf(2), &leaf(3)));
    forest.validate().unwrap();
}

#[test]
fn derooting_fills_the_hole_with_the_standing_top() {
    // three leaves: L2 is the height-0 top; deleting L0 pulls it down into the hole
    let (forest, _dir) = forest_with_leaves(3);
    forest.modify(&[], &[leaf(0)]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 2);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].position, 4);
    assert_eq!(roots[0].hash, node_hash(&leaf(2), &leaf(1)));
    assert_eq!(forest.leaf_position(&leaf(2)).unwrap(), Some(0));
    forest.validate().unwrap();
}

#[test]
fn standing_top_is_stashed_when_its_row_shrinks() {
    // deleting the whole height-2 tree of a five-leaf forest leaves L4 alone; it must collapse
    // leftward into the height-0 top slot of the single-leaf layout
    let (forest, _dir) = forest_with_leaves(5);
    forest.modify(&[], &leaves(0..4)).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 1);
    assert_eq!(forest.height().unwrap(), 3);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!((roots[0].height, roots[0].position, roots[0].hash), (0, 0, leaf(4)));
    forest.validate().unwrap();
}

#[test]
fn deleting_a_whole_top_removes_it_outright() {
    let (forest, _dir) = forest_with_leaves(5);
    forest.modify(&[], &[leaf(4)]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 4);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].height, 2);
    assert_eq!(roots[0].position, 12);
    assert_eq!(
        roots[0].hash,
        node_hash(&node_hash(&leaf(0), &leaf(1)), &node_hash(&leaf(2), &leaf(3)))
    );
    forest.validate().unwrap();
}

#[test]
fn full_turnover_in_one_batch() {
    let (forest, _dir) = forest_with_leaves(4);
    forest.modify(&leaves(4..8), &leaves(0..4)).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 4);
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(
        roots[0].hash,
        node_hash(&node_hash(&leaf(4), &leaf(5)), &node_hash(&leaf(6), &leaf(7)))
    );
    for i in 0..4 {
        assert!(!forest.contains(&leaf(i)).unwrap());
        assert!(forest.contains(&leaf(i + 4)).unwrap());
    }
    forest.validate().unwrap();
}

#[test]
fn duplicate_add_hands_the_index_to_the_later_copy() {
    // passing the same digest twice within one `adds` batch is undefined for callers; the
    // documented outcome is that both slots are filled and the later copy takes over the index
    // entry, leaving the index short one entry until the stale slot is shuffled out
    let (forest, _dir) = new_forest();
    let dup = leaf(7);
    forest.modify(&[dup, dup], &[]).unwrap();
    assert_eq!(forest.num_leaves().unwrap(), 2);
    assert_eq!(forest.leaf_position(&dup).unwrap(), Some(1));
    let roots = forest.roots().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].hash, node_hash(&dup, &dup));
    // the index now covers one of two occupied slots, which validate must surface
    assert!(matches!(forest.validate(), Err(ForestError::InvalidMerkleTree(_))));
}

#[test]
fn unknown_leaf_rejected_without_mutation() {
    let (forest, _dir) = forest_with_leaves(3);
    let roots = forest.roots().unwrap();
    let err = forest.modify(&[], &[leaf(0), leaf(99)]).unwrap_err();
    assert!(matches!(err, ForestError::UnknownLeaf(h) if h == leaf(99)));
    assert_eq!(forest.roots().unwrap(), roots);
    assert_eq!(forest.num_leaves().unwrap(), 3);
    forest.validate().unwrap();
    // the failure must not poison the forest
    forest.modify(&[], &[leaf(0)]).unwrap();
    forest.validate().unwrap();
}

/// Tops as (tree height, digest) pairs. Top positions are not part of the commitment: they move
/// when the layout grows, since the layout never shrinks back.
fn top_summary(forest: &Forest) -> Vec<(u8, Hash)> {
    forest.roots().unwrap().iter().map(|r| (r.height, r.hash)).collect()
}

#[test]
fn add_then_delete_batch_restores_the_tops() {
    for base in [0u64, 1, 2, 3, 5, 8, 12] {
        for batch in [1u64, 2, 3, 7] {
            let (forest, _dir) = forest_with_leaves(base);
            let before = top_summary(&forest);
            let extra = leaves(100..100 + batch);
            forest.modify(&extra, &[]).unwrap();
            forest.validate().unwrap();
            forest.modify(&[], &extra).unwrap();
            forest.validate().unwrap();
            assert_eq!(
                top_summary(&forest),
                before,
                "tops diverged for base {} batch {}",
                base,
                batch
            );
        }
    }
}

#[test]
fn batch_order_does_not_change_the_net_result() {
    // the forest commits to leaf order, so permuting a batch changes digests while it is
    // resident; the shape stays identical, and deleting the batch restores the common baseline
    let base = leaves(0..5);
    let batch = leaves(50..54);
    let mut reversed = batch.clone();
    reversed.reverse();

    let (straight, _d1) = new_forest();
    straight.modify(&base, &[]).unwrap();
    let baseline = top_summary(&straight);
    let (permuted, _d2) = new_forest();
    permuted.modify(&base, &[]).unwrap();

    straight.modify(&batch, &[]).unwrap();
    permuted.modify(&reversed, &[]).unwrap();
    assert_eq!(straight.num_leaves().unwrap(), permuted.num_leaves().unwrap());
    assert_eq!(straight.height().unwrap(), permuted.height().unwrap());
    let heights = |f: &Forest| f.roots().unwrap().iter().map(|r| r.height).collect::<Vec<_>>();
    assert_eq!(heights(&straight), heights(&permuted));

    // delete the batch from each side in a different order
    straight.modify(&[], &reversed).unwrap();
    permuted.modify(&[], &batch).unwrap();
    assert_eq!(top_summary(&straight), baseline);
    assert_eq!(top_summary(&permuted), baseline);
    straight.validate().unwrap();
    permuted.validate().unwrap();
}

#[test]
fn commit_and_reload_round_trip() {
    let (forest, dir) = new_forest();
    forest.modify(&leaves(0..6), &[]).unwrap();
    forest.modify(&[], &[leaf(2)]).unwrap();
    forest.commit().unwrap();
    let committed = forest.roots().unwrap();
    let count = forest.num_leaves().unwrap();
    drop(forest);

    let reloaded = Forest::new(dir.path().join("utreexo")).unwrap();
    assert_eq!(reloaded.num_leaves().unwrap(), count);
    assert_eq!(reloaded.roots().unwrap(), committed);
    reloaded.validate().unwrap();

    // the reloaded forest keeps working
    reloaded.modify(&leaves(10..13), &[leaf(0)]).unwrap();
    reloaded.validate().unwrap();
}

#[test]
fn commit_replaces_the_previous_snapshot() {
    let (forest, dir) = new_forest();
    forest.modify(&leaves(0..2), &[]).unwrap();
    forest.commit().unwrap();
    forest.modify(&leaves(2..5), &[leaf(0)]).unwrap();
    forest.commit().unwrap();
    let latest = forest.roots().unwrap();
    drop(forest);

    let reloaded = Forest::new(dir.path().join("utreexo")).unwrap();
    assert_eq!(reloaded.num_leaves().unwrap(), 4);
    assert_eq!(reloaded.roots().unwrap(), latest);
    reloaded.validate().unwrap();
}

#[test]
fn empty_truncates_memory_and_disk() {
    let (forest, dir) = new_forest();
    forest.modify(&leaves(0..5), &[]).unwrap();
    forest.commit().unwrap();
    forest.empty().unwrap();
    assert!(forest.is_empty().unwrap());
    assert_eq!(forest.height().unwrap(), 0);
    assert!(forest.roots().unwrap().is_empty());
    forest.validate().unwrap();
    drop(forest);

    let reloaded = Forest::new(dir.path().join("utreexo")).unwrap();
    assert!(reloaded.is_empty().unwrap());
    assert_eq!(std::fs::metadata(dir.path().join("utreexo.dat")).unwrap().len(), 0);
}

#[test]
fn loading_rejects_a_ragged_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("utreexo.dat"), [7u8; 65]).unwrap();
    let err = Forest::new(dir.path().join("utreexo")).unwrap_err();
    assert!(matches!(err, ForestError::CorruptLeafFile { len: 65 }));
}

#[test]
fn random_churn_stays_consistent() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let (forest, _dir) = new_forest();
    let mut live: Vec<Hash> = Vec::new();
    let mut counter = 0u64;

    for _round in 0..40 {
        let n_add = rng.gen_range(0..6usize);
        let n_del = if live.is_empty() {
            0
        } else {
            rng.gen_range(0..=live.len().min(4))
        };
        let adds: Vec<Hash> = (0..n_add)
            .map(|_| {
                counter += 1;
                leaf(1_000 + counter)
            })
            .collect();
        let mut deletes = Vec::with_capacity(n_del);
        let mut picked = rand::seq::index::sample(&mut rng, live.len(), n_del).into_vec();
        picked.sort_unstable();
        for idx in picked.into_iter().rev() {
            deletes.push(live.swap_remove(idx));
        }

        forest.modify(&adds, &deletes).unwrap();
        live.extend_from_slice(&adds);
        forest.validate().unwrap();
        assert_eq!(forest.num_leaves().unwrap(), live.len() as u64);
        for gone in &deletes {
            assert!(!forest.contains(gone).unwrap());
        }
        for kept in live.iter().take(3) {
            assert!(forest.contains(kept).unwrap());
        }
    }
}
