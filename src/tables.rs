//! Node, edgeset, site, and mutation tables.
//!
//! Adapted from `forrustts::tables`, generalized from a single-child
//! `Edge` row to a multi-child `Edgeset` row (`(left, right, parent,
//! children[])`), because this crate's simplifier sweeps over edgesets
//! rather than tskit's modern one-child-per-row edge table (spec §3).

use crate::node_flags::NodeFlags;
use crate::tsdef::{IdType, Position, Time, TsInt};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TablesError {
    #[error("invalid genome length")]
    InvalidGenomeLength,
    #[error("invalid node: {found:?}")]
    InvalidNodeValue { found: IdType },
    #[error("invalid value for position: {found:?}")]
    InvalidPosition { found: Position },
    #[error("invalid position range: {found:?}")]
    InvalidLeftRight { found: (Position, Position) },
    #[error("invalid value for time: {found:?}")]
    InvalidTime { found: Time },
    #[error("invalid value for deme: {found:?}")]
    InvalidDeme { found: TsInt },
    #[error("edgeset has no children")]
    EmptyChildren,
    #[error("edgeset children {found:?} are not sorted and duplicate-free")]
    UnsortedChildren { found: Vec<IdType> },
    #[error("edgeset parent {parent} is listed among its own children")]
    ParentAmongChildren { parent: IdType },
}

/// Result type for operations on tables.
pub type TablesResult<T> = std::result::Result<T, TablesError>;

/// A node of a tree sequence.
#[derive(Clone, Copy, Debug)]
pub struct Node {
    /// Flag bits, e.g. [``NodeFlags::IS_SAMPLE``].
    pub flags: NodeFlags,
    /// Birth time.
    pub time: Time,
    /// Population (deme) of the node.
    pub population: TsInt,
}

/// An Edgeset records that `parent` is the immediate ancestor of each
/// of `children` over the half-open interval `[left, right)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edgeset {
    pub left: Position,
    pub right: Position,
    pub parent: IdType,
    pub children: Vec<IdType>,
}

/// A Site is the location and ancestral state of zero or more mutations.
#[derive(Clone, Debug)]
pub struct Site {
    pub position: Position,
    pub ancestral_state: i8,
}

/// A Mutation is the minimal information needed to track a single
/// state change on a tree sequence.
#[derive(Clone, Copy, Debug)]
pub struct Mutation {
    pub node: IdType,
    pub site: usize,
    pub derived_state: i8,
}

pub type NodeTable = Vec<Node>;
pub type EdgesetTable = Vec<Edgeset>;
pub type SiteTable = Vec<Site>;
pub type MutationTable = Vec<Mutation>;

fn position_non_negative(x: Position) -> TablesResult<()> {
    if x < 0 {
        return Err(TablesError::InvalidPosition { found: x });
    }
    Ok(())
}

fn node_non_negative(x: IdType) -> TablesResult<()> {
    if x < 0 {
        return Err(TablesError::InvalidNodeValue { found: x });
    }
    Ok(())
}

fn time_non_negative(x: Time) -> TablesResult<()> {
    if x < 0 {
        return Err(TablesError::InvalidTime { found: x });
    }
    Ok(())
}

fn deme_non_negative(x: TsInt) -> TablesResult<()> {
    if x < 0 {
        return Err(TablesError::InvalidDeme { found: x });
    }
    Ok(())
}

fn validate_children(parent: IdType, children: &[IdType]) -> TablesResult<()> {
    if children.is_empty() {
        return Err(TablesError::EmptyChildren);
    }
    if children.iter().any(|&c| c == parent) {
        return Err(TablesError::ParentAmongChildren { parent });
    }
    let sorted = children.windows(2).all(|w| w[0] < w[1]);
    if !sorted {
        return Err(TablesError::UnsortedChildren {
            found: children.to_vec(),
        });
    }
    Ok(())
}

pub fn edgeset_table_add_row(
    edgesets: &mut EdgesetTable,
    left: Position,
    right: Position,
    parent: IdType,
    children: Vec<IdType>,
) -> TablesResult<usize> {
    if right <= left {
        return Err(TablesError::InvalidLeftRight {
            found: (left, right),
        });
    }
    position_non_negative(left)?;
    position_non_negative(right)?;
    node_non_negative(parent)?;
    for &c in &children {
        node_non_negative(c)?;
    }
    validate_children(parent, &children)?;

    edgesets.push(Edgeset {
        left,
        right,
        parent,
        children,
    });

    Ok(edgesets.len())
}

pub fn node_table_add_row(
    nodes: &mut NodeTable,
    flags: NodeFlags,
    time: Time,
    population: TsInt,
) -> TablesResult<IdType> {
    time_non_negative(time)?;
    deme_non_negative(population)?;
    nodes.push(Node {
        flags,
        time,
        population,
    });
    Ok((nodes.len() - 1) as IdType)
}

pub fn site_table_add_row(
    sites: &mut SiteTable,
    position: Position,
    ancestral_state: i8,
) -> TablesResult<usize> {
    position_non_negative(position)?;
    sites.push(Site {
        position,
        ancestral_state,
    });
    Ok(sites.len() - 1)
}

pub fn mutation_table_add_row(
    mutations: &mut MutationTable,
    node: IdType,
    site: usize,
    derived_state: i8,
) -> TablesResult<usize> {
    node_non_negative(node)?;
    mutations.push(Mutation {
        node,
        site,
        derived_state,
    });
    Ok(mutations.len() - 1)
}

fn sort_edgeset_table(nodes: &NodeTable, edgesets: &mut EdgesetTable) {
    edgesets.sort_by(|a, b| {
        let ta = nodes[a.parent as usize].time;
        let tb = nodes[b.parent as usize].time;
        tb.cmp(&ta)
            .then_with(|| a.parent.cmp(&b.parent))
            .then_with(|| a.left.cmp(&b.left))
    });
}

fn sort_mutation_table(sites: &SiteTable, mutations: &mut MutationTable) {
    mutations.sort_by(|a, b| sites[a.site].position.cmp(&sites[b.site].position));
}

/// A collection of node, edgeset, site, and mutation tables: the unit
/// of data exchanged between the simulator and the simplifier.
pub struct TableCollection {
    length_: Position,

    pub(crate) nodes_: NodeTable,
    pub(crate) edgesets_: EdgesetTable,
    pub(crate) sites_: SiteTable,
    pub(crate) mutations_: MutationTable,
}

impl TableCollection {
    pub fn new(genome_length: Position) -> TablesResult<TableCollection> {
        if genome_length < 1 {
            return Err(TablesError::InvalidGenomeLength);
        }

        Ok(TableCollection {
            length_: genome_length,
            nodes_: NodeTable::new(),
            edgesets_: EdgesetTable::new(),
            sites_: SiteTable::new(),
            mutations_: MutationTable::new(),
        })
    }

    pub fn add_node(
        &mut self,
        flags: NodeFlags,
        time: Time,
        population: TsInt,
    ) -> TablesResult<IdType> {
        node_table_add_row(&mut self.nodes_, flags, time, population)
    }

    /// Add an Edgeset.
    pub fn add_edgeset(
        &mut self,
        left: Position,
        right: Position,
        parent: IdType,
        children: Vec<IdType>,
    ) -> TablesResult<usize> {
        edgeset_table_add_row(&mut self.edgesets_, left, right, parent, children)
    }

    pub fn add_site(&mut self, position: Position, ancestral_state: i8) -> TablesResult<usize> {
        if position >= self.length_ {
            return Err(TablesError::InvalidPosition { found: position });
        }
        site_table_add_row(&mut self.sites_, position, ancestral_state)
    }

    pub fn add_mutation(
        &mut self,
        node: IdType,
        site: usize,
        derived_state: i8,
    ) -> TablesResult<usize> {
        mutation_table_add_row(&mut self.mutations_, node, site, derived_state)
    }

    pub fn genome_length(&self) -> Position {
        self.length_
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes_.len()
    }

    pub fn num_edgesets(&self) -> usize {
        self.edgesets_.len()
    }

    pub fn node(&self, id: IdType) -> &Node {
        &self.nodes_[id as usize]
    }

    /// Return immutable reference to the [mutation table](type.MutationTable.html)
    pub fn mutations(&self) -> &MutationTable {
        &self.mutations_
    }

    /// Return immutable reference to the [edgeset table](type.EdgesetTable.html)
    pub fn edgesets(&self) -> &EdgesetTable {
        &self.edgesets_
    }

    /// Return immutable reference to [node table](type.NodeTable.html)
    pub fn nodes(&self) -> &NodeTable {
        &self.nodes_
    }

    /// Return immutable reference to [site table](type.SiteTable.html)
    pub fn sites(&self) -> &SiteTable {
        &self.sites_
    }

    /// Sort edgesets by descending parent time (ties broken by parent
    /// id, then by left coordinate) and mutations by site position.
    /// Required before the tables are fed to the simulator's
    /// edge-buffer-based simplification path.
    pub fn sort_tables_for_simplification(&mut self) {
        sort_edgeset_table(&self.nodes_, &mut self.edgesets_);
        sort_mutation_table(&self.sites_, &mut self.mutations_);
    }
}

#[cfg(test)]
mod test_tables {

    use super::*;

    #[test]
    fn test_bad_genome_length() {
        let _ = TableCollection::new(0).map_or_else(
            |x: TablesError| assert_eq!(x, TablesError::InvalidGenomeLength),
            |_| panic!("expected an error"),
        );
    }

    #[test]
    fn test_add_edgeset() {
        let mut tables = TableCollection::new(10).unwrap();

        let _ = tables.add_edgeset(0, 1, 2, vec![0, 1]).unwrap();

        assert_eq!(1, tables.edgesets().len());
        assert_eq!(1, tables.num_edgesets());
    }

    #[test]
    fn test_add_edgeset_bad_positions() {
        let mut tables = TableCollection::new(10).unwrap();

        let _ = tables.add_edgeset(-1, 1, 1, vec![2]).map_or_else(
            |x: TablesError| assert_eq!(x, TablesError::InvalidPosition { found: -1 }),
            |_| panic!("expected an error"),
        );

        let _ = tables.add_edgeset(1, -1, 1, vec![2]).map_or_else(
            |x: TablesError| assert_eq!(x, TablesError::InvalidLeftRight { found: (1, -1) }),
            |_| panic!("expected an error"),
        );
    }

    #[test]
    fn test_add_edgeset_bad_nodes() {
        let mut tables = TableCollection::new(10).unwrap();

        let _ = tables.add_edgeset(0, 1, -1, vec![2]).map_or_else(
            |x: TablesError| assert_eq!(x, TablesError::InvalidNodeValue { found: -1 }),
            |_| panic!("expected an error"),
        );
    }

    #[test]
    fn test_add_edgeset_empty_children() {
        let mut tables = TableCollection::new(10).unwrap();
        let _ = tables.add_edgeset(0, 1, 0, vec![]).map_or_else(
            |x: TablesError| assert_eq!(x, TablesError::EmptyChildren),
            |_| panic!("expected an error"),
        );
    }

    #[test]
    fn test_add_edgeset_unsorted_children() {
        let mut tables = TableCollection::new(10).unwrap();
        let _ = tables.add_edgeset(0, 1, 0, vec![2, 1]).map_or_else(
            |x: TablesError| {
                assert_eq!(
                    x,
                    TablesError::UnsortedChildren {
                        found: vec![2, 1]
                    }
                )
            },
            |_| panic!("expected an error"),
        );
    }

    #[test]
    fn test_add_edgeset_parent_among_children() {
        let mut tables = TableCollection::new(10).unwrap();
        let _ = tables.add_edgeset(0, 1, 1, vec![1, 2]).map_or_else(
            |x: TablesError| assert_eq!(x, TablesError::ParentAmongChildren { parent: 1 }),
            |_| panic!("expected an error"),
        );
    }
}
