//! # ember-data
//!
//! Datasets and batching for Ember tensors.
//!
//! This crate provides:
//! - [`Dataset`] trait — unified interface for any indexed source of items
//! - [`collate`] / [`Collate`] — stack items along a new batch dimension
//! - [`FakeDataset`] — random labelled samples
//! - [`VecDataset`] / [`SubsetDataset`] — in-memory items and index views
//! - [`train_test_split_absolute`] / [`train_test_split_relative`] — contiguous splits

pub mod collate;
pub mod combinators;
pub mod dataset;
pub mod fake;

pub use collate::{collate, Collate};
pub use combinators::{
    train_test_split_absolute, train_test_split_relative, SubsetDataset, VecDataset,
};
pub use dataset::Dataset;
pub use fake::{FakeDataset, FakeEntry};
