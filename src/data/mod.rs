//! Data management: ingestion, partitioning and preprocessing
//!
//! A [`DataFrame`] holds raw columns; [`Dataset::from_frame`] splits it into
//! learn/valid/test subsets and fits the optional min-max scaling and
//! principal component transform on learn rows only.

mod dataset;
mod frame;
mod split;
mod transform;

pub use dataset::{DataOptions, Dataset, Subset, SubsetKind};
pub use frame::{Assignment, DataFrame};
pub use split::{partition_by_assignment, partition_by_fraction, split_sizes, Partition};
pub use transform::{MinMaxScaler, Pca, Preprocessor, DEFAULT_VARIANCE_KEPT};

use crate::error::Result;
use std::path::Path;

/// Read a CSV source and build a dataset from it
pub fn load_csv<P: AsRef<Path>>(path: P, options: &DataOptions) -> Result<Dataset> {
    let path = path.as_ref();
    let frame = DataFrame::from_csv(path)?;
    Dataset::from_frame(&frame, options, &path.display().to_string())
}
