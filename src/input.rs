//! The read-only view the simplifier consumes.
//!
//! `InputTreeSequence` is the one trait boundary this crate introduces
//! that is not literally present in `forrustts` (which consumes
//! `&TableCollection` directly): the simplifier is generic over
//! anything satisfying this contract, with
//! [``TableCollection``](crate::tables::TableCollection) as the sole
//! concrete implementation shipped here.

use crate::node_flags::NodeFlags;
use crate::tables::{Edgeset, Node, TableCollection};
use crate::tsdef::{IdType, Position};

/// A single site together with its mutations, as seen by the simplifier.
#[derive(Clone, Debug)]
pub struct SiteView {
    pub position: Position,
    pub ancestral_state: i8,
    /// `(node, derived_state)` pairs, in table order.
    pub mutations: Vec<(IdType, i8)>,
}

/// The read-only contract the simplifier consumes (spec §4.3).
pub trait InputTreeSequence {
    fn num_nodes(&self) -> usize;
    fn sequence_length(&self) -> Position;
    /// Sample ids as recorded by the source of this tree sequence
    /// (distinct from the `sample` argument passed to `simplify`,
    /// which may be any subset).
    fn samples(&self) -> Vec<IdType>;
    fn node(&self, id: IdType) -> Node;
    /// `(id, node)` pairs in id order.
    fn nodes(&self) -> Vec<(IdType, Node)>;
    fn edgesets(&self) -> &[Edgeset];
    fn sites(&self) -> Vec<SiteView>;

    /// The parent of `child` at `position`, if any edgeset covers it.
    fn parent_at(&self, child: IdType, position: Position) -> Option<IdType> {
        for e in self.edgesets() {
            if e.left <= position
                && position < e.right
                && e.children.binary_search(&child).is_ok()
            {
                return Some(e.parent);
            }
        }
        None
    }

    /// The allele carried by `node` at `position` for the site whose
    /// mutations are given by `site`: walk from `node` up through its
    /// ancestors at `position`, taking the first mutation encountered
    /// (i.e. the one closest to `node`); fall back to the site's
    /// ancestral state if no mutation lies on that path. Resolves
    /// spec's Open Question #2/#3 (§9).
    fn allele_of_node_at_site(&self, node: IdType, position: Position, site: &SiteView) -> i8 {
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some((_, derived)) = site.mutations.iter().find(|(mnode, _)| *mnode == n) {
                return *derived;
            }
            current = self.parent_at(n, position);
        }
        site.ancestral_state
    }
}

impl InputTreeSequence for TableCollection {
    fn num_nodes(&self) -> usize {
        TableCollection::num_nodes(self)
    }

    fn sequence_length(&self) -> Position {
        self.genome_length()
    }

    fn samples(&self) -> Vec<IdType> {
        self.nodes()
            .iter()
            .enumerate()
            .filter(|(_, n)| n.flags.contains(NodeFlags::IS_SAMPLE))
            .map(|(i, _)| i as IdType)
            .collect()
    }

    fn node(&self, id: IdType) -> Node {
        *TableCollection::node(self, id)
    }

    fn nodes(&self) -> Vec<(IdType, Node)> {
        TableCollection::nodes(self)
            .iter()
            .enumerate()
            .map(|(i, n)| (i as IdType, *n))
            .collect()
    }

    fn edgesets(&self) -> &[Edgeset] {
        TableCollection::edgesets(self)
    }

    fn sites(&self) -> Vec<SiteView> {
        TableCollection::sites(self)
            .iter()
            .enumerate()
            .map(|(i, s)| SiteView {
                position: s.position,
                ancestral_state: s.ancestral_state,
                mutations: TableCollection::mutations(self)
                    .iter()
                    .filter(|m| m.site == i)
                    .map(|m| (m.node, m.derived_state))
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod test_input {
    use super::*;

    fn sample_node() -> NodeFlags {
        NodeFlags::IS_SAMPLE
    }

    #[test]
    fn test_samples_and_parent_at() {
        let mut tables = TableCollection::new(10).unwrap();
        let n0 = tables.add_node(sample_node(), 0, 0).unwrap();
        let n1 = tables.add_node(sample_node(), 0, 0).unwrap();
        let n2 = tables.add_node(NodeFlags::empty(), 1, 0).unwrap();
        tables.add_edgeset(0, 10, n2, vec![n0, n1]).unwrap();

        let samples = InputTreeSequence::samples(&tables);
        assert_eq!(samples, vec![n0, n1]);
        assert_eq!(
            InputTreeSequence::parent_at(&tables, n0, 5),
            Some(n2)
        );
        assert_eq!(InputTreeSequence::parent_at(&tables, n2, 5), None);
    }

    #[test]
    fn test_allele_walks_to_nearest_mutation() {
        let mut tables = TableCollection::new(10).unwrap();
        let n0 = tables.add_node(sample_node(), 0, 0).unwrap();
        let n1 = tables.add_node(NodeFlags::empty(), 1, 0).unwrap();
        let n2 = tables.add_node(NodeFlags::empty(), 2, 0).unwrap();
        tables.add_edgeset(0, 10, n1, vec![n0]).unwrap();
        tables.add_edgeset(0, 10, n2, vec![n1]).unwrap();
        let site_idx = tables.add_site(3, 0).unwrap();
        tables.add_mutation(n1, site_idx, 1).unwrap();

        let sites = InputTreeSequence::sites(&tables);
        let site = &sites[0];
        assert_eq!(
            InputTreeSequence::allele_of_node_at_site(&tables, n0, 3, site),
            1
        );
        assert_eq!(
            InputTreeSequence::allele_of_node_at_site(&tables, n2, 3, site),
            0
        );
    }
}
