//! Node flag bits.

use bitflags::bitflags;

bitflags! {
    /// Flags carried by a row of the node table.
    ///
    /// Only the sample bit is interpreted by this crate; any other
    /// bits the caller sets on input nodes are passed through
    /// unmodified by [``crate::output::OutputBuilder::check_or_record_node``],
    /// except that the sample bit itself is always cleared on
    /// non-sample output rows (spec Open Question #4: sample rows
    /// keep *only* `IS_SAMPLE`; non-sample rows keep everything
    /// *except* `IS_SAMPLE`).
    pub struct NodeFlags: u32 {
        /// The node is a sample.
        const IS_SAMPLE = 1 << 0;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        NodeFlags::empty()
    }
}
