//! # Batching Data Loader

use super::{collate, epoch_order, fetch, DataError, Dataset};
use crate::tensor::Tensor;
use std::fmt;
use std::sync::Arc;

/// Iterates a dataset in batches of `batch_size`; the final batch may be
/// smaller. With `shuffle`, each call to [`DataLoader::iter`] draws a new
/// permutation from the calling thread's RNG. With `num_workers > 1`, samples of
/// a batch are fetched on a dedicated pool of that many threads.
pub struct DataLoader {
    dataset: Arc<dyn Dataset>,
    batch_size: usize,
    shuffle: bool,
    num_workers: usize,
    pool: Option<rayon::ThreadPool>,
}

impl DataLoader {
    pub fn new(
        dataset: Arc<dyn Dataset>,
        batch_size: usize,
        shuffle: bool,
        num_workers: usize,
    ) -> Result<Self, DataError> {
        if batch_size == 0 {
            return Err(DataError::ZeroBatchSize);
        }
        let pool = if num_workers > 1 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(num_workers)
                    .thread_name(|i| format!("data-loader-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        Ok(DataLoader {
            dataset,
            batch_size,
            shuffle,
            num_workers,
            pool,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn dataset(&self) -> &Arc<dyn Dataset> {
        &self.dataset
    }

    /// Number of batches per pass.
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a pass over the dataset.
    pub fn iter(&self) -> Batches<'_> {
        Batches {
            loader: self,
            order: epoch_order(self.dataset.len(), self.shuffle),
            cursor: 0,
        }
    }
}

impl fmt::Debug for DataLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataLoader")
            .field("dataset", &self.dataset)
            .field("batch_size", &self.batch_size)
            .field("shuffle", &self.shuffle)
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

impl<'a> IntoIterator for &'a DataLoader {
    type Item = Result<(Tensor, Tensor), DataError>;
    type IntoIter = Batches<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass of `(input, target)` batches.
pub struct Batches<'a> {
    loader: &'a DataLoader,
    order: Vec<usize>,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<(Tensor, Tensor), DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let batch = fetch(self.loader.dataset.as_ref(), indices, self.loader.pool.as_ref())
            .and_then(|samples| collate(&samples));
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TensorDataset;
    use crate::utils::random::set_seed;
    use ndarray::{Array1, Array2};

    fn dataset(n: usize) -> Arc<dyn Dataset> {
        let inputs = Array2::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f32).into_dyn();
        let targets = Array1::from_shape_fn(n, |i| i as f32).into_dyn();
        Arc::new(TensorDataset::new(inputs, targets).unwrap())
    }

    fn targets_in_order(loader: &DataLoader) -> Vec<f32> {
        loader
            .iter()
            .flat_map(|batch| batch.unwrap().1.to_vec().unwrap())
            .collect()
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            DataLoader::new(dataset(3), 0, false, 0),
            Err(DataError::ZeroBatchSize)
        ));
    }

    #[test]
    fn last_batch_holds_the_remainder() {
        let loader = DataLoader::new(dataset(10), 4, false, 0).unwrap();
        let sizes: Vec<usize> = loader.iter().map(|b| b.unwrap().0.shape()[0]).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.iter().len(), 3);
    }

    #[test]
    fn unshuffled_order_is_sequential() {
        let loader = DataLoader::new(dataset(7), 3, false, 0).unwrap();
        assert_eq!(targets_in_order(&loader), (0..7).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_is_a_permutation_and_follows_the_seed() {
        let loader = DataLoader::new(dataset(50), 8, true, 0).unwrap();

        set_seed(11);
        let first = targets_in_order(&loader);
        set_seed(11);
        let second = targets_in_order(&loader);
        assert_eq!(first, second);

        let mut sorted = first.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, (0..50).map(|i| i as f32).collect::<Vec<_>>());
        assert_ne!(first, sorted);
    }

    #[test]
    fn worker_pool_gives_same_batches() {
        let serial = DataLoader::new(dataset(20), 6, false, 0).unwrap();
        let pooled = DataLoader::new(dataset(20), 6, false, 3).unwrap();
        for (a, b) in serial.iter().zip(pooled.iter()) {
            let (xa, ya) = a.unwrap();
            let (xb, yb) = b.unwrap();
            assert_eq!(xa.to_vec().unwrap(), xb.to_vec().unwrap());
            assert_eq!(ya.to_vec().unwrap(), yb.to_vec().unwrap());
        }
    }
}
