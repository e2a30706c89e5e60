// Dataset trait — unified interface for any indexed source of items

use ember_core::{bail, Result};

/// An indexed collection of items.
///
/// Implementations must be `Send + Sync` so a loader can read from several
/// threads.
pub trait Dataset: Send + Sync {
    /// What one sample looks like (a tensor, a labelled pair, ...).
    type Item;

    /// Total number of items in the dataset.
    fn len(&self) -> usize;

    /// Whether the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retrieve the item at position `index`. Out-of-range indices are an
    /// error, never a panic.
    fn get(&self, index: usize) -> Result<Self::Item>;

    /// Optional human-readable name.
    fn name(&self) -> &str {
        "dataset"
    }
}

/// Shared bounds check for `Dataset::get` implementations.
pub(crate) fn check_index(name: &str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        bail!("{name}: index {index} out of range for {len} items");
    }
    Ok(())
}
