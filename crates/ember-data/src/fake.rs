use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ember_core::{Engine, Error, Result, Shape, Tensor};

use crate::collate::{collate, Collate};
use crate::dataset::{check_index, Dataset};

// FakeDataset — random labelled samples for smoke tests
//
// Item i is a pair of an I32 scalar label in [0, categories) and an F64
// random tensor of `item_shape`. Labels are a pure function of (seed, i), so
// reading the same index twice gives the same label; the data is drawn from
// the engine's generator on every read.

/// One labelled sample.
#[derive(Debug)]
pub struct FakeEntry<E: Engine> {
    pub label: Tensor<E>,
    pub data: Tensor<E>,
}

impl<E: Engine> Collate for FakeEntry<E> {
    fn collate(items: Vec<Self>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let (labels, data): (Vec<_>, Vec<_>) =
            items.into_iter().map(|e| (e.label, e.data)).unzip();
        Ok(FakeEntry {
            label: collate(labels)?,
            data: collate(data)?,
        })
    }
}

/// A dataset of random samples with random labels.
#[derive(Debug, Clone)]
pub struct FakeDataset<E: Engine> {
    engine: E,
    categories: usize,
    item_shape: Shape,
    len: usize,
    seed: u64,
}

impl<E: Engine> FakeDataset<E> {
    pub fn new(engine: &E, categories: usize, item_shape: impl Into<Shape>, len: usize) -> Result<Self> {
        if categories == 0 || categories > i32::MAX as usize {
            return Err(Error::msg(format!(
                "fake dataset needs between 1 and {} categories, got {categories}",
                i32::MAX
            )));
        }
        Ok(Self {
            engine: engine.clone(),
            categories,
            item_shape: Shape::checked(item_shape.into().into_dims())?,
            len,
            seed: rand::random(),
        })
    }

    /// Fix the labels to a reproducible sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn categories(&self) -> usize {
        self.categories
    }

    pub fn item_shape(&self) -> &Shape {
        &self.item_shape
    }

    fn label(&self, index: usize) -> i32 {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));
        rng.gen_range(0..self.categories) as i32
    }
}

impl<E: Engine> Dataset for FakeDataset<E> {
    type Item = FakeEntry<E>;

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Result<FakeEntry<E>> {
        check_index(self.name(), index, self.len)?;
        Ok(FakeEntry {
            label: Tensor::scalar(&self.engine, self.label(index)),
            data: Tensor::random(&self.engine, self.item_shape.clone())?,
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

impl<E: Engine> fmt::Display for FakeDataset<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FakeDataset ({}) with {} items", self.name(), self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::DType;
    use ember_cpu::CpuEngine;

    #[test]
    fn test_labels_are_stable_and_in_range() {
        let e = CpuEngine::new();
        let ds = FakeDataset::new(&e, 3, (2, 2), 50).unwrap().with_seed(9);
        for i in 0..ds.len() {
            let a = ds.get(i).unwrap().label.as_scalar().unwrap();
            let b = ds.get(i).unwrap().label.as_scalar().unwrap();
            assert_eq!(a, b);
            assert!((0..3).contains(&a.get::<i32>()));
        }
        assert!(ds.get(50).is_err());
    }

    #[test]
    fn test_item_types() {
        let e = CpuEngine::new();
        let ds = FakeDataset::new(&e, 10, (4, 3), 2).unwrap();
        let item = ds.get(1).unwrap();
        assert_eq!(item.label.dtype(), DType::I32);
        assert_eq!(item.data.dtype(), DType::F64);
        assert_eq!(item.data.shape().dims(), &[4, 3]);
        assert_eq!(ds.to_string(), "FakeDataset (fake) with 2 items");
    }

    #[test]
    fn test_rejects_zero_categories() {
        let e = CpuEngine::new();
        assert!(FakeDataset::new(&e, 0, 3, 1).is_err());
    }
}
