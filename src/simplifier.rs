//! The simplifier sweep (spec §4.5): a priority-queue sweep over
//! ordered linked segment chains with interval splitting, overlap
//! counting via an ordered map, node dedup, and output-record
//! squashing.
//!
//! This is a direct, idiomatic-Rust transliteration of the `Simplifier`
//! class in the original Python reference implementation, restructured
//! around an arena of segments (spec §9) and a `BinaryHeap` min-heap
//! instead of Python object references and `heapq`.

use crate::ancestry_map::AncestryMap;
use crate::error::TsCoalError;
use crate::input::{InputTreeSequence, SiteView};
use crate::output::OutputBuilder;
use crate::overlap_map::OverlapMap;
use crate::segment_pool::{SegmentId, SegmentPool};
use crate::tables::{Edgeset, TableCollection};
use crate::tsdef::{IdType, Position};
use log::debug;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Simplify `input` down to the ancestry of `sample`, returning a new
/// tree sequence (spec §6: the crate's single entry point).
pub fn simplify<T: InputTreeSequence>(
    input: &T,
    sample: &[IdType],
) -> Result<TableCollection, TsCoalError> {
    validate_sample(input, sample)?;
    validate_edgesets(input)?;
    let mut simplifier = Simplifier::new(input, sample);
    simplifier.run()?;
    simplifier.finalize()
}

fn validate_sample<T: InputTreeSequence>(input: &T, sample: &[IdType]) -> Result<(), TsCoalError> {
    let mut seen = HashSet::new();
    for &id in sample {
        if !seen.insert(id) {
            return Err(TsCoalError::duplicate_sample(id));
        }
        if id < 0 || id as usize >= input.num_nodes() {
            return Err(TsCoalError::sample_out_of_range(id, input.num_nodes()));
        }
    }
    Ok(())
}

fn validate_edgesets<T: InputTreeSequence>(input: &T) -> Result<(), TsCoalError> {
    for e in input.edgesets() {
        if e.right <= e.left {
            return Err(TsCoalError::bad_edgeset(e.left, e.right));
        }
        if e.children.is_empty() {
            return Err(TsCoalError::empty_children(e.parent));
        }
    }
    Ok(())
}

struct Simplifier<'a, T: InputTreeSequence> {
    input: &'a T,
    sample: Vec<IdType>,
    n: i64,
    m: Position,
    pool: SegmentPool,
    ancestry: AncestryMap,
    overlap: OverlapMap,
    output: OutputBuilder,
    input_sites: Vec<SiteView>,
    site_index_by_position: HashMap<Position, usize>,
}

impl<'a, T: InputTreeSequence> Simplifier<'a, T> {
    fn new(input: &'a T, sample: &[IdType]) -> Self {
        let m = input.sequence_length();
        let n = sample.len() as i64;
        let input_sites = input.sites();
        let mut site_index_by_position = HashMap::new();
        for (i, s) in input_sites.iter().enumerate() {
            site_index_by_position.insert(s.position, i);
        }

        let mut simplifier = Simplifier {
            input,
            sample: sample.to_vec(),
            n,
            m,
            pool: SegmentPool::new(),
            ancestry: AncestryMap::new(),
            overlap: OverlapMap::new(n, m),
            output: OutputBuilder::new(),
            input_sites,
            site_index_by_position,
        };
        simplifier.init_samples();
        simplifier
    }

    fn init_samples(&mut self) {
        for &sample_id in &self.sample.clone() {
            let node = self.input.node(sample_id);
            let output_id = self.output.record_sample_node(sample_id, node.time, node.population);
            let seg = self.pool.alloc(0, self.m, output_id);
            self.ancestry.set(sample_id, seg);
            self.output
                .record_mutations(sample_id, 0, self.m, output_id, &self.input_sites);
        }
    }

    fn run(&mut self) -> Result<(), TsCoalError> {
        let mut parents: Vec<(Position, IdType)> = self
            .input
            .nodes()
            .iter()
            .map(|(id, node)| (node.time as Position, *id))
            .collect();
        parents.sort();

        for (_, input_id) in parents {
            if self.ancestry.is_empty() {
                break;
            }
            let edgesets: Vec<&Edgeset> = self
                .input
                .edgesets()
                .iter()
                .filter(|e| e.parent == input_id)
                .collect();
            if !edgesets.is_empty() {
                debug!("processing parent {} with {} edgesets", input_id, edgesets.len());
                let h = self.remove_ancestry(&edgesets)?;
                self.merge_labeled_ancestors(h, input_id)?;
            }
        }
        Ok(())
    }

    fn finalize(self) -> Result<TableCollection, TsCoalError> {
        let outstanding = self.pool.outstanding();
        if outstanding != 0 {
            return Err(TsCoalError::leaked_segments(outstanding));
        }
        Ok(self.output.finalize(self.m))
    }

    /// Remove (in place) and return the subset of ancestors lying
    /// within the children intervals of each edgeset, as a min-heap of
    /// `(left, head)` pairs ready to be merged under the new parent
    /// (spec §4.5.3).
    fn remove_ancestry(
        &mut self,
        edgesets: &[&Edgeset],
    ) -> Result<BinaryHeap<Reverse<(Position, SegmentId)>>, TsCoalError> {
        let mut h: BinaryHeap<Reverse<(Position, SegmentId)>> = BinaryHeap::new();
        for edgeset in edgesets {
            for &child in &edgeset.children {
                if !self.ancestry.contains(child) {
                    continue;
                }
                let mut x = self.ancestry.get(child);
                let mut y: Option<SegmentId> = None;

                // Phase 1: segments strictly left of edgeset.left.
                while let Some(xid) = x {
                    let (xleft, xright, xnode, xnext) = {
                        let s = self.pool.get(xid).expect("segment id is always valid");
                        (s.left, s.right, s.node, s.next)
                    };
                    if xleft >= edgeset.left {
                        break;
                    }
                    y = Some(xid);
                    if xright > edgeset.left {
                        let new_id = self.pool.alloc(edgeset.left, xright, xnode);
                        self.pool
                            .get_mut(new_id)
                            .expect("just allocated")
                            .next = xnext;
                        let yseg = self.pool.get_mut(xid).expect("segment id is always valid");
                        yseg.right = edgeset.left;
                        yseg.next = None;
                        x = Some(new_id);
                    } else {
                        x = xnext;
                    }
                }

                // Phase 2: segments inside [edgeset.left, edgeset.right).
                let mut w: Option<SegmentId> = None;
                while let Some(xid) = x {
                    let (xleft, xright, xnode, xnext) = {
                        let s = self.pool.get(xid).expect("segment id is always valid");
                        (s.left, s.right, s.node, s.next)
                    };
                    if xleft >= edgeset.right {
                        break;
                    }
                    let out_right = std::cmp::min(edgeset.right, xright);
                    let next_w = self.pool.alloc(xleft, out_right, xnode);
                    match w {
                        None => h.push(Reverse((xleft, next_w))),
                        Some(wid) => {
                            self.pool.get_mut(wid).expect("just built").next = Some(next_w)
                        }
                    }
                    self.pool.get_mut(next_w).expect("just allocated").prev = w;
                    w = Some(next_w);
                    if xright <= out_right {
                        self.pool.free(xid)?;
                        x = xnext;
                    } else {
                        self.pool.get_mut(xid).expect("segment id is always valid").left =
                            edgeset.right;
                        x = Some(xid);
                        break;
                    }
                }

                // Phase 3: stitch the surviving chain back together.
                if w.is_some() {
                    if let Some(yid) = y {
                        self.pool.get_mut(yid).expect("segment id is always valid").next = x;
                    }
                    if let Some(xid) = x {
                        self.pool.get_mut(xid).expect("segment id is always valid").prev = y;
                    }
                    if y.is_none() {
                        match x {
                            None => self.ancestry.remove(child),
                            Some(xid) => self.ancestry.set(child, xid),
                        }
                    }
                }
            }
        }
        Ok(h)
    }

    /// Coalesce everything in `h` under a new parent for `input_id`
    /// (spec §4.5.4).
    fn merge_labeled_ancestors(
        &mut self,
        mut h: BinaryHeap<Reverse<(Position, SegmentId)>>,
        input_id: IdType,
    ) -> Result<(), TsCoalError> {
        let mut coalescence = false;
        let mut u: Option<IdType> = None;
        let mut z: Option<SegmentId> = None;

        while let Some(&Reverse((l, _))) = h.peek() {
            let mut x_list: Vec<SegmentId> = Vec::new();
            let mut r_max = self.m + 1;
            while let Some(&Reverse((left, _))) = h.peek() {
                if left != l {
                    break;
                }
                let Reverse((_, xid)) = h.pop().expect("just peeked");
                let xright = self.pool.get(xid).expect("segment id is always valid").right;
                r_max = r_max.min(xright);
                x_list.push(xid);
            }
            if let Some(&Reverse((next_left, _))) = h.peek() {
                r_max = r_max.min(next_left);
            }

            let alpha: Option<SegmentId>;
            if x_list.len() == 1 {
                let xid = x_list[0];
                let (xleft, xright, xnode, xnext) = {
                    let s = self.pool.get(xid).expect("segment id is always valid");
                    (s.left, s.right, s.node, s.next)
                };
                let next_left = h.peek().map(|&Reverse((nl, _))| nl);
                if let Some(nl) = next_left {
                    if nl < xright {
                        let split = self.pool.alloc(xleft, nl, xnode);
                        self.pool.get_mut(xid).expect("segment id is always valid").left = nl;
                        h.push(Reverse((nl, xid)));
                        alpha = Some(split);
                        continue_tail(self, alpha, input_id, &mut z)?;
                        continue;
                    }
                }
                if let Some(nxt) = xnext {
                    let nxt_left = self.pool.get(nxt).expect("segment id is always valid").left;
                    h.push(Reverse((nxt_left, nxt)));
                }
                self.pool.get_mut(xid).expect("segment id is always valid").next = None;
                alpha = Some(xid);
            } else {
                if !coalescence {
                    coalescence = true;
                    let node = self.input.node(input_id);
                    u = Some(self.output.check_or_record_node(input_id, node));
                }
                let u_id = u.expect("coalescence flag implies u is set");

                if !self.overlap.contains(l) {
                    let j = self.overlap.floor_key(l);
                    let v = self.overlap.get(j).expect("floor_key returns a stored key");
                    self.overlap.set(l, v);
                }
                if !self.overlap.contains(r_max) {
                    let j = self.overlap.floor_key(r_max);
                    let v = self.overlap.get(j).expect("floor_key returns a stored key");
                    self.overlap.set(r_max, v);
                }

                let x_count = x_list.len() as i64;
                let r;
                if self.overlap.get(l).expect("just ensured present") == x_count {
                    self.overlap.set(l, 0);
                    r = self.overlap.succ_key(l);
                    self.update_ancestral_state(input_id, l, r);
                    alpha = None;
                } else {
                    let mut rr = l;
                    while rr < r_max
                        && self.overlap.get(rr).expect("present by loop invariant") != x_count
                    {
                        let v = self.overlap.get(rr).expect("present by loop invariant");
                        self.overlap.set(rr, v - (x_count - 1));
                        rr = self.overlap.succ_key(rr);
                    }
                    r = rr;
                    alpha = Some(self.pool.alloc(l, r, u_id));
                }

                let mut children = Vec::new();
                for &xid in &x_list {
                    let xnode = self.pool.get(xid).expect("segment id is always valid").node;
                    if xnode != u_id {
                        children.push(xnode);
                    }
                }
                for &xid in &x_list {
                    let (xright, xnext) = {
                        let s = self.pool.get(xid).expect("segment id is always valid");
                        (s.right, s.next)
                    };
                    if xright == r {
                        self.pool.free(xid)?;
                        if let Some(nxt) = xnext {
                            let nxt_left =
                                self.pool.get(nxt).expect("segment id is always valid").left;
                            h.push(Reverse((nxt_left, nxt)));
                        }
                    } else {
                        self.pool.get_mut(xid).expect("segment id is always valid").left = r;
                        h.push(Reverse((r, xid)));
                    }
                }
                self.output.record_edgeset(l, r, u_id, children);
            }

            continue_tail(self, alpha, input_id, &mut z)?;
        }
        Ok(())
    }

    /// Propagate a newly-discovered universal MRCA's allele at every
    /// already-recorded site in `[left, right)` (spec §4.7).
    fn update_ancestral_state(&mut self, input_id: IdType, left: Position, right: Position) {
        let input = self.input;
        let input_sites = &self.input_sites;
        let site_index_by_position = &self.site_index_by_position;
        self.output.update_ancestral_states(left, right, |pos| {
            let idx = site_index_by_position[&pos];
            input.allele_of_node_at_site(input_id, pos, &input_sites[idx])
        });
    }
}

/// Tail of the merge loop body (spec §4.5.4): integrate `alpha` into
/// `input_id`'s own output chain and copy over its mutations. Pulled
/// out of the main loop body only because of an early `continue` in
/// the singleton/split case above.
fn continue_tail<'a, T: InputTreeSequence>(
    s: &mut Simplifier<'a, T>,
    alpha: Option<SegmentId>,
    input_id: IdType,
    z: &mut Option<SegmentId>,
) -> Result<(), TsCoalError> {
    if let Some(aid) = alpha {
        match *z {
            None => s.ancestry.set(input_id, aid),
            Some(zid) => {
                s.pool.get_mut(zid).expect("segment id is always valid").next = Some(aid)
            }
        }
        s.pool.get_mut(aid).expect("segment id is always valid").prev = *z;
        *z = Some(aid);
        let (aleft, aright, anode) = {
            let seg = s.pool.get(aid).expect("segment id is always valid");
            (seg.left, seg.right, seg.node)
        };
        s.output
            .record_mutations(input_id, aleft, aright, anode, &s.input_sites);
    }
    Ok(())
}
