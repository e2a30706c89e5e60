use ember_core::{Engine, Error, Result, Tensor};

// Collation — batching dataset items into one tensor
//
// Every item of shape S is reshaped to [1, ..S] and the results are
// concatenated along axis 0, giving one tensor of shape [n, ..S]. Adjacent
// pairs are joined round by round, so the concat graph is log2(n) deep
// rather than n. The items are consumed: their nodes are released once the
// batch node holds them.

/// Types that know how to batch a list of themselves.
pub trait Collate: Sized {
    /// Combine `items` into one batched value. Zero items is `EmptyBatch`.
    fn collate(items: Vec<Self>) -> Result<Self>;
}

impl<E: Engine> Collate for Tensor<E> {
    fn collate(items: Vec<Self>) -> Result<Self> {
        collate(items)
    }
}

/// Stack `items` along a new leading batch dimension.
pub fn collate<E: Engine>(items: Vec<Tensor<E>>) -> Result<Tensor<E>> {
    let first = items.first().ok_or(Error::EmptyBatch)?;
    let shape = first.shape();
    // all shapes are checked before the first node is built
    for item in &items[1..] {
        let other = item.shape();
        if other != shape {
            return Err(Error::ShapeMismatch {
                op: "collate",
                lhs: shape,
                rhs: other,
            });
        }
    }

    let mut batch_dims = Vec::with_capacity(shape.rank() + 1);
    batch_dims.push(1);
    batch_dims.extend_from_slice(shape.dims());

    let n = items.len();
    let mut level = items
        .into_iter()
        .map(|item| item.reshape(batch_dims.clone()))
        .collect::<Result<Vec<_>>>()?;
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        let mut pairs = level.into_iter();
        while let Some(a) = pairs.next() {
            next.push(match pairs.next() {
                Some(b) => a.concat(&b, 0)?,
                None => a,
            });
        }
        level = next;
    }
    let batch = level.pop().ok_or(Error::EmptyBatch)?;
    log::debug!("collated {n} items of shape {shape} into {}", batch.shape());
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_cpu::CpuEngine;

    #[test]
    fn test_empty_batch() {
        let items: Vec<Tensor<CpuEngine>> = Vec::new();
        assert_eq!(collate(items).unwrap_err(), Error::EmptyBatch);
    }

    #[test]
    fn test_single_item_gets_batch_dim() {
        let e = CpuEngine::new();
        let t = Tensor::from_vec(&e, vec![1i32, 2, 3], 3).unwrap();
        let b = Tensor::collate(vec![t]).unwrap();
        assert_eq!(b.shape().dims(), &[1, 3]);
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_odd_count_keeps_order() {
        let e = CpuEngine::new();
        let items = (0..5i64)
            .map(|i| Tensor::from_vec(&e, vec![i, 10 * i], 2))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        let b = collate(items).unwrap();
        assert_eq!(b.shape().dims(), &[5, 2]);
        assert_eq!(
            b.to_vec::<i64>().unwrap(),
            vec![0, 0, 1, 10, 2, 20, 3, 30, 4, 40]
        );
    }

    #[test]
    fn test_shape_mismatch_builds_nothing() {
        let e = CpuEngine::new();
        let a = Tensor::from_vec(&e, vec![1.0f64, 2.0], 2).unwrap();
        let b = Tensor::from_vec(&e, vec![1.0f64, 2.0, 3.0], 3).unwrap();
        let err = collate(vec![a, b]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { op: "collate", .. }));
        assert_eq!(e.live_nodes().unwrap(), 0);
    }
}
