//! Batch sizing.

/// Fixed number of questions requested per generation call.
pub const BATCH_SIZE: usize = 5;

/// Default ceiling on the questions a single request may ask for.
pub const MAX_QUESTIONS: usize = 100;

/// Ordered batch sizes covering a requested total.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchPlan {
    sizes: Vec<usize>,
}

impl BatchPlan {
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn total(&self) -> usize {
        self.sizes.iter().sum()
    }
}

impl IntoIterator for BatchPlan {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.sizes.into_iter()
    }
}

/// Number of batches needed for `total` questions.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total.div_ceil(batch_size)
}

/// Tile `total` into batches of `batch_size`, the last one possibly smaller.
pub fn plan(total: usize, batch_size: usize) -> BatchPlan {
    let mut sizes = Vec::with_capacity(batch_count(total, batch_size));
    let mut planned = 0;
    while planned < total && batch_size > 0 {
        let size = next_batch_size(total, planned, batch_size);
        sizes.push(size);
        planned += size;
    }
    BatchPlan { sizes }
}

/// Size of the next batch given how many questions are already accepted.
pub fn next_batch_size(total: usize, accepted: usize, batch_size: usize) -> usize {
    batch_size.min(total.saturating_sub(accepted))
}
