//! Output node/edgeset/site/mutation accumulation: dedup of parent
//! nodes, one-slot edgeset squashing, and site/mutation remapping
//! (spec §4.6, §4.7).

use crate::input::SiteView;
use crate::node_flags::NodeFlags;
use crate::tables::{Node, TableCollection};
use crate::tsdef::{IdType, Position, Time, TsInt};
use std::collections::{BTreeMap, HashMap};

struct SiteAccum {
    ancestral_state: i8,
    /// `(output node, derived_state)` pairs, in the order recorded.
    mutations: Vec<(IdType, i8)>,
}

type PendingEdgeset = (Position, Position, IdType, Vec<IdType>);

/// Accumulates the output of a simplification run.
pub struct OutputBuilder {
    nodes: Vec<Node>,
    edgesets: Vec<(Position, Position, IdType, Vec<IdType>)>,
    pending: Option<PendingEdgeset>,
    sites: BTreeMap<Position, SiteAccum>,
    sample_output_id: HashMap<IdType, IdType>,
}

impl OutputBuilder {
    pub fn new() -> Self {
        OutputBuilder {
            nodes: Vec::new(),
            edgesets: Vec::new(),
            pending: None,
            sites: BTreeMap::new(),
            sample_output_id: HashMap::new(),
        }
    }

    /// Record a sample node for `input_id`, copying `time` and
    /// `population` and keeping only the `IS_SAMPLE` bit of `flags`.
    /// Sample output ids are assigned `0, 1, ..., n-1` in the order
    /// this is called (spec §4.5.1).
    pub fn record_sample_node(&mut self, input_id: IdType, time: Time, population: TsInt) -> IdType {
        let output_id = self.nodes.len() as IdType;
        self.nodes.push(Node {
            flags: NodeFlags::IS_SAMPLE,
            time,
            population,
        });
        self.sample_output_id.insert(input_id, output_id);
        output_id
    }

    /// Return the output id for `input_id`, allocating a new node row
    /// (with the sample bit cleared) unless `input_id` is already a
    /// recorded sample, in which case its existing output id is
    /// returned without adding a row (spec §4.6, Open Question #1/#4).
    pub fn check_or_record_node(&mut self, input_id: IdType, node: Node) -> IdType {
        if let Some(&output_id) = self.sample_output_id.get(&input_id) {
            return output_id;
        }
        let output_id = self.nodes.len() as IdType;
        self.nodes.push(Node {
            flags: node.flags & !NodeFlags::IS_SAMPLE,
            time: node.time,
            population: node.population,
        });
        output_id
    }

    /// Record an edgeset, squashing it into the pending buffer when it
    /// abuts a previous edgeset with identical `(parent, children)`
    /// (spec §4.6).
    pub fn record_edgeset(
        &mut self,
        left: Position,
        right: Position,
        parent: IdType,
        mut children: Vec<IdType>,
    ) {
        children.sort_unstable();
        children.dedup();
        match &mut self.pending {
            None => self.pending = Some((left, right, parent, children)),
            Some((pl, pr, pp, pc)) => {
                if *pp == parent && *pc == children && *pr == left {
                    *pr = right;
                } else {
                    self.edgesets.push((*pl, *pr, *pp, std::mem::take(pc)));
                    self.pending = Some((left, right, parent, children));
                }
            }
        }
    }

    /// For every mutation on `input_id` whose site lies in
    /// `[left, right)`, record it against `output_id` (spec §4.7).
    pub fn record_mutations(
        &mut self,
        input_id: IdType,
        left: Position,
        right: Position,
        output_id: IdType,
        input_sites: &[SiteView],
    ) {
        for site in input_sites {
            if site.position < left || site.position >= right {
                continue;
            }
            for &(mnode, derived) in &site.mutations {
                if mnode == input_id {
                    let entry = self.sites.entry(site.position).or_insert_with(|| SiteAccum {
                        ancestral_state: site.ancestral_state,
                        mutations: Vec::new(),
                    });
                    entry.mutations.push((output_id, derived));
                }
            }
        }
    }

    /// Update the ancestral state of every already-recorded site in
    /// `[left, right)`, using `f(position)` to compute the new allele
    /// (spec §4.7: called when `input_id` becomes the universal MRCA
    /// over that interval).
    pub fn update_ancestral_states<F>(&mut self, left: Position, right: Position, mut f: F)
    where
        F: FnMut(Position) -> i8,
    {
        for (&pos, site) in self.sites.range_mut(left..right) {
            site.ancestral_state = f(pos);
        }
    }

    /// Flush the pending edgeset buffer, assign final site indices in
    /// position order, and assemble the output [``TableCollection``].
    pub fn finalize(mut self, sequence_length: Position) -> TableCollection {
        if let Some((l, r, p, c)) = self.pending.take() {
            self.edgesets.push((l, r, p, c));
        }

        let mut tables = TableCollection::new(sequence_length)
            .expect("sequence_length was already validated by the input tree sequence");
        tables.nodes_ = self.nodes;
        for (l, r, p, c) in self.edgesets {
            tables
                .add_edgeset(l, r, p, c)
                .expect("edgesets recorded by the simplifier are always canonical");
        }
        for (pos, site) in self.sites {
            let site_idx = tables
                .add_site(pos, site.ancestral_state)
                .expect("site positions were already validated against sequence_length");
            for (node, derived) in site.mutations {
                tables
                    .add_mutation(node, site_idx, derived)
                    .expect("mutation node ids are always valid output ids");
            }
        }
        tables
    }
}

impl Default for OutputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test_output_builder {
    use super::*;

    #[test]
    fn test_squashing_adjacent_identical_edgesets() {
        let mut b = OutputBuilder::new();
        b.record_edgeset(0, 5, 4, vec![0, 1]);
        b.record_edgeset(5, 10, 4, vec![1, 0]);
        let tables = b.finalize(10);
        assert_eq!(tables.edgesets().len(), 1);
        let e = &tables.edgesets()[0];
        assert_eq!((e.left, e.right, e.parent), (0, 10, 4));
        assert_eq!(e.children, vec![0, 1]);
    }

    #[test]
    fn test_non_adjacent_edgesets_not_squashed() {
        let mut b = OutputBuilder::new();
        b.record_edgeset(0, 5, 4, vec![0, 1]);
        b.record_edgeset(6, 10, 4, vec![0, 1]);
        let tables = b.finalize(10);
        assert_eq!(tables.edgesets().len(), 2);
    }

    #[test]
    fn test_different_children_not_squashed() {
        let mut b = OutputBuilder::new();
        b.record_edgeset(0, 5, 4, vec![0, 1]);
        b.record_edgeset(5, 10, 4, vec![0, 2]);
        let tables = b.finalize(10);
        assert_eq!(tables.edgesets().len(), 2);
    }

    #[test]
    fn test_sample_nodes_assigned_in_order() {
        let mut b = OutputBuilder::new();
        let o0 = b.record_sample_node(7, 0, 0);
        let o1 = b.record_sample_node(3, 0, 0);
        assert_eq!(o0, 0);
        assert_eq!(o1, 1);
        let node = Node {
            flags: NodeFlags::empty(),
            time: 1,
            population: 0,
        };
        // input_id 7 is a recorded sample: no new row, existing id returned.
        assert_eq!(b.check_or_record_node(7, node), 0);
        // a fresh internal node gets the next id, sample bit cleared.
        let new_id = b.check_or_record_node(99, node);
        assert_eq!(new_id, 2);
    }
}
