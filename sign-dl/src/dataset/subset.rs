use super::RandomAccessDataset;
use crate::common::*;

/// A partition view over an underlying dataset.
#[derive(Debug)]
pub struct Subset {
    dataset: Arc<dyn RandomAccessDataset>,
    indices: Vec<usize>,
}

impl Subset {
    pub fn new(dataset: Arc<dyn RandomAccessDataset>, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    /// The underlying indices this partition maps to.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl RandomAccessDataset for Subset {
    fn num_records(&self) -> usize {
        self.indices.len()
    }

    fn nth(&self, index: usize) -> Result<(Tensor, i64)> {
        let mapped = *self
            .indices
            .get(index)
            .ok_or_else(|| format_err!("record index {} out of range", index))?;
        self.dataset.nth(mapped)
    }
}

/// Split a dataset into fixed-size disjoint partitions by a single
/// random shuffle of its indices. The sizes must sum to the dataset
/// length.
pub fn random_split(
    dataset: Arc<dyn RandomAccessDataset>,
    lengths: &[usize],
    rng: &mut impl Rng,
) -> Result<Vec<Subset>> {
    let total: usize = lengths.iter().sum();
    ensure!(
        total == dataset.num_records(),
        "split sizes {:?} do not sum to dataset length {}",
        lengths,
        dataset.num_records()
    );

    let mut indices: Vec<usize> = (0..total).collect();
    indices.shuffle(rng);

    let subsets = lengths
        .iter()
        .scan(0, |offset, &len| {
            let start = *offset;
            *offset += len;
            Some(Subset::new(
                dataset.clone(),
                indices[start..start + len].to_vec(),
            ))
        })
        .collect();

    Ok(subsets)
}
