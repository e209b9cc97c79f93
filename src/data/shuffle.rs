use burn::data::dataset::Dataset;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;

/// Shuffled view over a dataset, drawn through a bounded buffer.
///
/// Reproduces streaming-shuffle sampling with a fixed-capacity buffer:
/// the buffer starts with the first `buffer_size` indices, every draw
/// picks a random occupant and replaces it with the next unread index.
/// The whole order is precomputed, so `get` is O(1) and the view stays
/// restartable. Capacities of 0 or 1 degenerate to the source order.
pub struct ShuffleBufferDataset<D, I> {
    dataset: D,
    indices: Vec<usize>,
    input: PhantomData<I>,
}

impl<D, I> ShuffleBufferDataset<D, I>
where
    D: Dataset<I>,
{
    pub fn new(dataset: D, buffer_size: usize, rng: &mut StdRng) -> Self {
        let len = dataset.len();
        let capacity = buffer_size.max(1).min(len);
        let mut buffer: Vec<usize> = (0..capacity).collect();
        let mut indices = Vec::with_capacity(len);
        let mut next = capacity;

        while !buffer.is_empty() {
            let slot = rng.random_range(0..buffer.len());
            if next < len {
                indices.push(std::mem::replace(&mut buffer[slot], next));
                next += 1;
            } else {
                indices.push(buffer.swap_remove(slot));
            }
        }

        Self {
            dataset,
            indices,
            input: PhantomData,
        }
    }

    pub fn with_seed(dataset: D, buffer_size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new(dataset, buffer_size, &mut rng)
    }
}

impl<D, I> Dataset<I> for ShuffleBufferDataset<D, I>
where
    D: Dataset<I>,
    I: Clone + Send + Sync,
{
    fn get(&self, index: usize) -> Option<I> {
        let index = self.indices.get(index)?;
        self.dataset.get(*index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::InMemDataset;

    fn source(len: usize) -> InMemDataset<usize> {
        InMemDataset::new((0..len).collect())
    }

    fn order(dataset: &ShuffleBufferDataset<InMemDataset<usize>, usize>) -> Vec<usize> {
        (0..dataset.len()).map(|i| dataset.get(i).unwrap()).collect()
    }

    #[test]
    fn emits_a_permutation() {
        let shuffled = ShuffleBufferDataset::with_seed(source(100), 10, 42);
        let mut items = order(&shuffled);
        items.sort_unstable();
        assert_eq!(items, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_order() {
        let a = order(&ShuffleBufferDataset::with_seed(source(50), 8, 7));
        let b = order(&ShuffleBufferDataset::with_seed(source(50), 8, 7));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = order(&ShuffleBufferDataset::with_seed(source(50), 8, 7));
        let b = order(&ShuffleBufferDataset::with_seed(source(50), 8, 8));
        assert_ne!(a, b);
    }

    #[test]
    fn never_draws_ahead_of_the_buffer() {
        let capacity = 5;
        let items = order(&ShuffleBufferDataset::with_seed(source(200), capacity, 3));
        // Index `i` only enters the buffer once `i - capacity + 1` draws
        // happened, so it can never appear earlier than that position.
        for (position, item) in items.iter().enumerate() {
            assert!(*item <= position + capacity - 1);
        }
    }

    #[test]
    fn unit_buffer_keeps_source_order() {
        let items = order(&ShuffleBufferDataset::with_seed(source(20), 1, 9));
        assert_eq!(items, (0..20).collect::<Vec<_>>());

        let items = order(&ShuffleBufferDataset::with_seed(source(20), 0, 9));
        assert_eq!(items, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn oversized_buffer_still_covers_everything() {
        let shuffled = ShuffleBufferDataset::with_seed(source(10), 1000, 1);
        let mut items = order(&shuffled);
        items.sort_unstable();
        assert_eq!(items, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn empty_dataset_stays_empty() {
        let shuffled = ShuffleBufferDataset::with_seed(source(0), 10, 1);
        assert_eq!(shuffled.len(), 0);
        assert!(shuffled.get(0).is_none());
    }
}
