//! A Hudson-style coalescent simulator with recombination and
//! population structure, producing a [``TableCollection``] suitable as
//! input to [``crate::simplifier::simplify``].
//!
//! New relative to `forrustts` (whose scope is recording and
//! simplifying ancestry, not generating it), but built from the same
//! [``SegmentPool``]/[``OutputBuilder``] machinery the simplifier uses,
//! and grounded in the same Hudson-algorithm shape as
//! `other_examples/.../diploid.rs`-style Wright-Fisher simulations
//! (sample nodes first, then repeated pairwise merges of ancestry
//! segment chains) and in `original_source/msprime/trees.py` for the
//! coalescence/recombination/migration event-rate bookkeeping.

use crate::demography::DemographicModel;
use crate::node_flags::NodeFlags;
use crate::output::OutputBuilder;
use crate::segment_pool::{SegmentId, SegmentPool};
use crate::tables::{Node, TableCollection};
use crate::tsdef::{IdType, Position, Time, TsInt};
use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// `check_or_record_node` keys its "already recorded as a sample"
/// lookup by input-table id; the simulator has no input table; this
/// sentinel is guaranteed never to collide with a recorded sample id
/// (those start at `0`).
const NOT_AN_INPUT_ID: IdType = -1;

/// Configuration and demographic model for a single simulation run.
pub struct Simulator {
    demography: DemographicModel,
    sequence_length: Position,
    recombination_rate: f64,
    samples_per_population: Vec<usize>,
}

struct Lineage {
    head: SegmentId,
    population: TsInt,
    /// Total length of ancestral material carried by this lineage,
    /// kept in sync incrementally rather than resummed every event.
    span: Position,
}

impl Simulator {
    pub fn new(
        demography: DemographicModel,
        sequence_length: Position,
        recombination_rate: f64,
        samples_per_population: Vec<usize>,
    ) -> Self {
        Simulator {
            demography,
            sequence_length,
            recombination_rate,
            samples_per_population,
        }
    }

    /// Run the coalescent process to completion (a single remaining
    /// lineage per position) and return the resulting tables.
    pub fn run<R: Rng>(&self, rng: &mut R) -> TableCollection {
        let mut pool = SegmentPool::new();
        let mut output = OutputBuilder::new();
        let mut demography = self.demography.clone();
        let mut lineages: Vec<Lineage> = Vec::new();
        let mut time: Time = 0;

        let mut sample_id: IdType = 0;
        for (pop, &count) in self.samples_per_population.iter().enumerate() {
            for _ in 0..count {
                let output_id = output.record_sample_node(sample_id, 0, pop as TsInt);
                let head = pool.alloc(0, self.sequence_length, output_id);
                lineages.push(Lineage {
                    head,
                    population: pop as TsInt,
                    span: self.sequence_length,
                });
                sample_id += 1;
            }
        }
        debug!("simulation starting with {} lineages", lineages.len());

        while lineages.len() > 1 {
            let num_pops = demography.num_populations();
            let mut coalescence_rates = vec![0.0; num_pops];
            let mut counts = vec![0usize; num_pops];
            for l in &lineages {
                counts[l.population as usize] += 1;
            }
            for pop in 0..num_pops {
                let k = counts[pop] as f64;
                if k >= 2.0 {
                    let n = demography.population_size(pop as TsInt, time);
                    coalescence_rates[pop] = k * (k - 1.0) / (2.0 * n);
                }
            }
            let total_span: Position = lineages.iter().map(|l| l.span).sum();
            let recombination_total_rate = self.recombination_rate * total_span as f64;

            let mut migration_rates = Vec::new();
            for src in 0..num_pops {
                for dst in 0..num_pops {
                    if src == dst {
                        continue;
                    }
                    let rate =
                        demography.migration_rate(src as TsInt, dst as TsInt) * counts[src] as f64;
                    if rate > 0.0 {
                        migration_rates.push((src as TsInt, dst as TsInt, rate));
                    }
                }
            }

            let total_rate: f64 = coalescence_rates.iter().sum::<f64>()
                + recombination_total_rate
                + migration_rates.iter().map(|(_, _, r)| r).sum::<f64>();

            let next_event_time = demography.next_event_time(time);
            let waiting_time = if total_rate > 0.0 {
                let exp = Exp::new(total_rate).expect("rate is strictly positive");
                Some(exp.sample(rng))
            } else {
                None
            };

            match (next_event_time, waiting_time) {
                (None, None) => {
                    // No rate left and no scheduled event: nothing more can
                    // happen. Every remaining interval has already coalesced
                    // within its own population (can occur with >1 isolated,
                    // zero-migration populations). Stop to avoid looping
                    // forever.
                    break;
                }
                (Some(et), Some(wt)) if (et as f64) < time as f64 + wt => {
                    time = et;
                    apply_demographic_events(&mut demography, &mut lineages, time, rng);
                }
                (Some(et), None) => {
                    time = et;
                    apply_demographic_events(&mut demography, &mut lineages, time, rng);
                }
                (_, Some(wt)) => {
                    time += wt.round() as Time;
                    let draw = rng.gen_range(0.0..total_rate);
                    let mut acc = 0.0;
                    let mut handled = false;
                    for pop in 0..num_pops {
                        acc += coalescence_rates[pop];
                        if draw < acc {
                            coalesce_one_pair(&mut pool, &mut output, &mut lineages, pop, time, rng);
                            handled = true;
                            break;
                        }
                    }
                    if !handled {
                        acc += recombination_total_rate;
                        if draw < acc {
                            recombine_one(&mut pool, &mut lineages, rng);
                        } else {
                            for (src, dst, rate) in &migration_rates {
                                acc += rate;
                                if draw < acc {
                                    migrate_one(&mut lineages, *src, *dst, rng);
                                    break;
                                }
                            }
                        }
                    }
                }
                _ => unreachable!("either a scheduled time or a positive rate was available"),
            }
        }

        output.finalize(self.sequence_length)
    }
}

/// Apply every demographic event scheduled at `time`, including
/// `MassMigration`s (each extant lineage in `source` moves to `dest`
/// independently with probability `proportion`).
fn apply_demographic_events<R: Rng>(
    demography: &mut DemographicModel,
    lineages: &mut [Lineage],
    time: Time,
    rng: &mut R,
) {
    let mass_migrations = demography.apply_events_at(time);
    for (source, dest, proportion) in mass_migrations {
        for l in lineages.iter_mut() {
            if l.population == source && rng.gen_bool(proportion) {
                l.population = dest;
            }
        }
    }
}

fn migrate_one<R: Rng>(lineages: &mut [Lineage], source: TsInt, dest: TsInt, rng: &mut R) {
    let candidates: Vec<usize> = lineages
        .iter()
        .enumerate()
        .filter(|(_, l)| l.population == source)
        .map(|(i, _)| i)
        .collect();
    if let Some(&i) = candidates.get(rng.gen_range(0..candidates.len())) {
        lineages[i].population = dest;
    }
}

/// Split a random lineage's ancestry at a random breakpoint into two
/// independent lineages in the same population. Mirrors the same
/// "no new node recorded" convention as the rest of a tree sequence's
/// recombination handling: only coalescence creates edges.
fn recombine_one<R: Rng>(pool: &mut SegmentPool, lineages: &mut Vec<Lineage>, rng: &mut R) {
    let total_span: Position = lineages.iter().map(|l| l.span).sum();
    if total_span <= 0 {
        return;
    }
    let mut draw = rng.gen_range(0..total_span);
    let mut idx = 0;
    while draw >= lineages[idx].span {
        draw -= lineages[idx].span;
        idx += 1;
    }
    let lineage = &lineages[idx];
    let first_left = pool.get(lineage.head).expect("lineage head is valid").left;
    let breakpoint = first_left + draw;

    // Walk to the segment straddling (or following) the breakpoint.
    let mut cur = Some(lineage.head);
    let mut prev: Option<SegmentId> = None;
    while let Some(id) = cur {
        let s = *pool.get(id).expect("segment id is always valid");
        if s.right > breakpoint {
            break;
        }
        prev = Some(id);
        cur = s.next;
    }
    let right_head = match cur {
        Some(id) => {
            let s = *pool.get(id).expect("segment id is always valid");
            if s.left < breakpoint {
                // Split this segment in two at the breakpoint.
                let new_id = pool.alloc(breakpoint, s.right, s.node);
                pool.get_mut(new_id).expect("just allocated").next = s.next;
                let old = pool.get_mut(id).expect("segment id is always valid");
                old.right = breakpoint;
                old.next = None;
                new_id
            } else {
                // Breakpoint falls exactly between two segments.
                if let Some(p) = prev {
                    pool.get_mut(p).expect("segment id is always valid").next = None;
                }
                id
            }
        }
        None => return, // breakpoint at/after the lineage's end: nothing to split.
    };
    pool.get_mut(right_head).expect("just resolved").prev = None;

    let mut right_span = 0;
    let mut cur = Some(right_head);
    while let Some(id) = cur {
        let s = pool.get(id).expect("segment id is always valid");
        right_span += s.right - s.left;
        cur = s.next;
    }
    let left_span = lineages[idx].span - right_span;
    if left_span <= 0 {
        // Nothing left on the original lineage's side; this is a no-op
        // recombination (breakpoint outside its ancestral material).
        return;
    }
    lineages[idx].span = left_span;
    let population = lineages[idx].population;
    lineages.push(Lineage {
        head: right_head,
        population,
        span: right_span,
    });
}

/// Pick two random lineages from `population` and coalesce them into a
/// single new lineage with a freshly recorded internal node at `time`.
fn coalesce_one_pair<R: Rng>(
    pool: &mut SegmentPool,
    output: &mut OutputBuilder,
    lineages: &mut Vec<Lineage>,
    population: usize,
    time: Time,
    rng: &mut R,
) {
    let candidates: Vec<usize> = lineages
        .iter()
        .enumerate()
        .filter(|(_, l)| l.population as usize == population)
        .map(|(i, _)| i)
        .collect();
    let i = candidates[rng.gen_range(0..candidates.len())];
    let mut j = candidates[rng.gen_range(0..candidates.len())];
    while j == i {
        j = candidates[rng.gen_range(0..candidates.len())];
    }

    let parent_output_id = output.check_or_record_node(
        NOT_AN_INPUT_ID,
        Node {
            flags: NodeFlags::empty(),
            time,
            population: population as TsInt,
        },
    );

    let (hi, lo) = if i > j { (i, j) } else { (j, i) };
    let a = lineages.swap_remove(hi);
    let b = lineages.swap_remove(lo);
    let new_head = merge_two_lineages(pool, output, a.head, b.head, parent_output_id);
    let span = chain_span(pool, new_head);
    lineages.push(Lineage {
        head: new_head,
        population: population as TsInt,
        span,
    });
}

fn chain_span(pool: &SegmentPool, head: SegmentId) -> Position {
    let mut total = 0;
    let mut cur = Some(head);
    while let Some(id) = cur {
        let s = pool.get(id).expect("segment id is always valid");
        total += s.right - s.left;
        cur = s.next;
    }
    total
}

fn flatten(pool: &mut SegmentPool, head: SegmentId) -> Vec<(Position, Position, IdType)> {
    let mut v = Vec::new();
    let mut cur = Some(head);
    while let Some(id) = cur {
        let s = *pool.get(id).expect("segment id is always valid");
        v.push((s.left, s.right, s.node));
        cur = s.next;
    }
    let mut cur = Some(head);
    while let Some(id) = cur {
        let next = pool.get(id).expect("segment id is always valid").next;
        pool.free(id).expect("chain segments are each freed exactly once");
        cur = next;
    }
    v
}

fn cover(segs: &[(Position, Position, IdType)], lo: Position, hi: Position) -> Option<IdType> {
    segs.iter()
        .find(|&&(l, r, _)| l <= lo && hi <= r)
        .map(|&(_, _, n)| n)
}

/// Merge two ancestry segment chains into one new lineage rooted at
/// `parent_output_id`, recording an edgeset for every maximal
/// constant-coverage sub-interval of their union (spec-adjacent to
/// `Simplifier::merge_labeled_ancestors`, specialized to exactly two
/// inputs and without the "stop at the sample set's MRCA" cutoff,
/// since the simulator keeps building ancestry until only one global
/// lineage remains).
fn merge_two_lineages(
    pool: &mut SegmentPool,
    output: &mut OutputBuilder,
    a: SegmentId,
    b: SegmentId,
    parent_output_id: IdType,
) -> SegmentId {
    let a_segs = flatten(pool, a);
    let b_segs = flatten(pool, b);

    let mut breakpoints: Vec<Position> = Vec::new();
    for &(l, r, _) in a_segs.iter().chain(b_segs.iter()) {
        breakpoints.push(l);
        breakpoints.push(r);
    }
    breakpoints.sort_unstable();
    breakpoints.dedup();

    let mut runs: Vec<(Position, Position)> = Vec::new();
    for w in breakpoints.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        if lo >= hi {
            continue;
        }
        let ca = cover(&a_segs, lo, hi);
        let cb = cover(&b_segs, lo, hi);
        let mut children = Vec::new();
        if let Some(n) = ca {
            children.push(n);
        }
        if let Some(n) = cb {
            children.push(n);
        }
        if children.is_empty() {
            continue;
        }
        children.sort_unstable();
        output.record_edgeset(lo, hi, parent_output_id, children);

        match runs.last_mut() {
            Some((_, last_hi)) if *last_hi == lo => *last_hi = hi,
            _ => runs.push((lo, hi)),
        }
    }

    let mut head: Option<SegmentId> = None;
    let mut tail: Option<SegmentId> = None;
    for (lo, hi) in runs {
        let id = pool.alloc(lo, hi, parent_output_id);
        match tail {
            Some(t) => {
                pool.get_mut(t).expect("just allocated").next = Some(id);
                pool.get_mut(id).expect("just allocated").prev = Some(t);
            }
            None => head = Some(id),
        }
        tail = Some(id);
    }
    head.expect("two non-empty chains always share at least one covered interval")
}

#[cfg(test)]
mod test_simulator {
    use super::*;
    use crate::input::InputTreeSequence;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_single_population_reaches_one_root() {
        let demography = DemographicModel::new(1, 100.0);
        let sim = Simulator::new(demography, 1000, 1e-4, vec![6]);
        let mut rng = StdRng::seed_from_u64(12345);
        let tables = sim.run(&mut rng);

        assert!(tables.num_nodes() > 6);
        assert!(tables.num_edgesets() > 0);
        for e in tables.edgesets() {
            assert!(e.left < e.right);
            assert!(!e.children.is_empty());
        }
    }

    #[test]
    fn test_output_is_a_valid_input_tree_sequence() {
        let demography = DemographicModel::new(1, 50.0);
        let sim = Simulator::new(demography, 200, 1e-3, vec![4]);
        let mut rng = StdRng::seed_from_u64(7);
        let tables = sim.run(&mut rng);
        let samples = InputTreeSequence::samples(&tables);
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn test_two_population_split_with_migration() {
        let mut demography = DemographicModel::new(2, 50.0);
        demography.set_migration_rate(0, 1, 0.01);
        demography.set_migration_rate(1, 0, 0.01);
        let sim = Simulator::new(demography, 100, 1e-3, vec![3, 3]);
        let mut rng = StdRng::seed_from_u64(99);
        let tables = sim.run(&mut rng);
        assert_eq!(InputTreeSequence::samples(&tables).len(), 6);
    }
}
