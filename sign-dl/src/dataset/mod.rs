//! Traffic sign dataset loading.

mod gtsrb;
mod index;
mod subset;

pub use gtsrb::*;
pub use index::*;
pub use subset::*;

use crate::common::*;

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: Debug + Send + Sync,
{
    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth sample, an image tensor with its class label.
    fn nth(&self, index: usize) -> Result<(Tensor, i64)>;
}
