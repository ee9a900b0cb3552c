//! Runtime options for a data tree.

/// Options controlling how a [`DataTree`](crate::DataTree) reports and stores changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataTreeOptions {
    /// Hold listener events until the outermost computation bracket closes.
    pub batch_events: bool,
    /// A write of an equal value does not bump the version or raise anything.
    pub skip_unchanged_writes: bool,
}

impl Default for DataTreeOptions {
    fn default() -> Self {
        Self {
            batch_events: true,
            skip_unchanged_writes: true,
        }
    }
}

impl DataTreeOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_events(mut self, enabled: bool) -> Self {
        self.batch_events = enabled;
        self
    }

    pub fn skip_unchanged_writes(mut self, enabled: bool) -> Self {
        self.skip_unchanged_writes = enabled;
        self
    }
}
