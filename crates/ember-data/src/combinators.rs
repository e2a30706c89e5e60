// Dataset Combinators — in-memory datasets, subsets and train/test splits

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use ember_core::{bail, Error, Result};

use crate::dataset::{check_index, Dataset};

/// Tolerance when checking that split fractions sum to at most 1.
const EPS: f64 = 1e-5;

// VecDataset — items held in memory

/// A dataset over a vector of items; `get` hands out clones.
#[derive(Debug, Clone)]
pub struct VecDataset<T> {
    items: Vec<T>,
    name: String,
}

impl<T> VecDataset<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            name: "vec".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Clone + Send + Sync> Dataset for VecDataset<T> {
    type Item = T;

    fn len(&self) -> usize {
        self.items.len()
    }

    fn get(&self, index: usize) -> Result<T> {
        check_index(&self.name, index, self.items.len())?;
        Ok(self.items[index].clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// SubsetDataset — view of selected indices

/// A dataset that exposes only the items at the given indices of `inner`.
#[derive(Debug, Clone)]
pub struct SubsetDataset<D: Dataset> {
    inner: D,
    indices: Vec<usize>,
}

impl<D: Dataset> SubsetDataset<D> {
    /// Subset of `inner` at `indices`. Every index must be in range.
    pub fn new(inner: D, indices: Vec<usize>) -> Result<Self> {
        let len = inner.len();
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::msg(format!(
                "subset index {bad} out of range for {} with {len} items",
                inner.name()
            )));
        }
        Ok(Self { inner, indices })
    }

    /// The items of `inner` in a random order fixed by `seed`.
    pub fn shuffled(inner: D, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..inner.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        Self { inner, indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Dataset> Dataset for SubsetDataset<D> {
    type Item = D::Item;

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn get(&self, index: usize) -> Result<D::Item> {
        check_index(self.inner.name(), index, self.indices.len())?;
        self.inner.get(self.indices[index])
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// Train/test splitting

/// The first `train` items and the `test` items after them.
///
/// ```ignore
/// let (train, test) = train_test_split_absolute(dataset, 80, 20)?;
/// ```
pub fn train_test_split_absolute<D>(
    dataset: D,
    train: usize,
    test: usize,
) -> Result<(SubsetDataset<D>, SubsetDataset<D>)>
where
    D: Dataset + Clone,
{
    let n = dataset.len();
    let total = train.checked_add(test).filter(|&t| t <= n);
    let Some(total) = total else {
        return Err(Error::msg(format!(
            "train_test_split: train size {train} plus test size {test} exceeds {n} items"
        )));
    };
    log::debug!(
        "splitting {} ({n} items) into {train} train / {test} test",
        dataset.name()
    );
    let test_set = SubsetDataset::new(dataset.clone(), (train..total).collect())?;
    let train_set = SubsetDataset::new(dataset, (0..train).collect())?;
    Ok((train_set, test_set))
}

/// Like [`train_test_split_absolute`] with sizes given as fractions of the
/// dataset (rounded down). Both fractions must lie in `[0, 1]` and sum to at
/// most 1.
pub fn train_test_split_relative<D>(
    dataset: D,
    train_fraction: f64,
    test_fraction: f64,
) -> Result<(SubsetDataset<D>, SubsetDataset<D>)>
where
    D: Dataset + Clone,
{
    for (what, f) in [("train", train_fraction), ("test", test_fraction)] {
        if !(0.0..=1.0).contains(&f) {
            bail!("train_test_split: {what} fraction {f} is not in [0, 1]");
        }
    }
    if train_fraction + test_fraction > 1.0 + EPS {
        bail!("train_test_split: fractions {train_fraction} + {test_fraction} exceed 1");
    }
    let n = dataset.len();
    let train = ((n as f64 * train_fraction).floor() as usize).min(n);
    let test = ((n as f64 * test_fraction).floor() as usize).min(n - train);
    train_test_split_absolute(dataset, train, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(n: usize) -> VecDataset<usize> {
        VecDataset::new((0..n).collect()).with_name("numbers")
    }

    #[test]
    fn test_subset_maps_indices() {
        let s = SubsetDataset::new(numbers(10), vec![7, 2, 5]).unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.get(0).unwrap(), 7);
        assert_eq!(s.get(2).unwrap(), 5);
        assert!(s.get(3).is_err());
        assert!(SubsetDataset::new(numbers(3), vec![3]).is_err());
    }

    #[test]
    fn test_shuffled_is_a_permutation() {
        let s = SubsetDataset::shuffled(numbers(20), 42);
        let mut seen = s.indices().to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert_eq!(s.indices(), SubsetDataset::shuffled(numbers(20), 42).indices());
    }

    #[test]
    fn test_split_absolute_is_contiguous() {
        let (train, test) = train_test_split_absolute(numbers(10), 6, 3).unwrap();
        assert_eq!(train.indices(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(test.indices(), &[6, 7, 8]);
        assert_eq!(test.name(), "numbers");
    }

    #[test]
    fn test_split_absolute_too_large() {
        assert!(train_test_split_absolute(numbers(10), 8, 3).is_err());
        assert!(train_test_split_absolute(numbers(10), usize::MAX, 1).is_err());
    }

    #[test]
    fn test_split_relative() {
        let (train, test) = train_test_split_relative(numbers(100), 0.8, 0.2).unwrap();
        assert_eq!((train.len(), test.len()), (80, 20));
        let (train, test) = train_test_split_relative(numbers(7), 0.5, 0.25).unwrap();
        assert_eq!((train.len(), test.len()), (3, 1));
    }

    #[test]
    fn test_split_relative_rejects_bad_fractions() {
        assert!(train_test_split_relative(numbers(10), 1.2, 0.0).is_err());
        assert!(train_test_split_relative(numbers(10), 0.5, -0.1).is_err());
        assert!(train_test_split_relative(numbers(10), 0.7, 0.4).is_err());
    }
}
