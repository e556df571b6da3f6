//! Immutable, split and preprocessed dataset

use super::frame::DataFrame;
use super::split::{partition_by_assignment, partition_by_fraction, Partition};
use super::transform::Preprocessor;
use crate::config::{validate_split, Config};
use crate::error::{Error, Result};
use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Options controlling how a frame becomes a [`Dataset`]
#[derive(Debug, Clone, PartialEq)]
pub struct DataOptions {
    pub normalize: bool,
    /// Shuffle rows before splitting instead of honoring pinned assignments
    pub random: bool,
    pub split: [f64; 3],
    pub transform: bool,
    pub transform_components: Option<usize>,
    pub seed: u64,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DataOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            normalize: config.normalize,
            random: config.random,
            split: config.split,
            transform: config.transform,
            transform_components: config.transform_components,
            seed: config.seed,
        }
    }

    pub fn with_split(mut self, split: [f64; 3]) -> Self {
        self.split = split;
        self
    }

    pub fn with_random(mut self, random: bool) -> Self {
        self.random = random;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_transform(mut self, transform: bool) -> Self {
        self.transform = transform;
        self
    }
}

/// Which rows of a dataset to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetKind {
    Learn,
    Valid,
    Test,
    /// Learn followed by valid
    Train,
    /// Learn, valid, then test
    All,
}

/// Rows of one subset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subset {
    pub ids: Vec<String>,
    pub inputs: Array2<f32>,
    pub targets: Array2<f32>,
}

impl Subset {
    fn select(frame: &DataFrame, rows: &[usize], inputs: &Array2<f32>) -> Self {
        Self {
            ids: rows.iter().map(|&r| frame.ids[r].clone()).collect(),
            inputs: inputs.select(Axis(0), rows),
            targets: frame.targets.select(Axis(0), rows),
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn concat(parts: &[&Subset]) -> Self {
        let ids = parts.iter().flat_map(|s| s.ids.iter().cloned()).collect();
        let inputs: Vec<_> = parts.iter().map(|s| s.inputs.view()).collect();
        let targets: Vec<_> = parts.iter().map(|s| s.targets.view()).collect();
        // widths are shared by construction
        Self {
            ids,
            inputs: concatenate(Axis(0), &inputs).unwrap_or_default(),
            targets: concatenate(Axis(0), &targets).unwrap_or_default(),
        }
    }
}

/// Split and preprocessed data shared read-only by every training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Where the rows came from, recorded in the project manifest
    pub source: String,
    pub input_names: Vec<String>,
    pub target_names: Vec<String>,
    pub learn: Subset,
    pub valid: Subset,
    pub test: Subset,
    pub preprocessor: Preprocessor,
}

impl Dataset {
    /// Split a frame and fit preprocessing on its learn rows
    pub fn from_frame(frame: &DataFrame, options: &DataOptions, source: &str) -> Result<Self> {
        validate_split(options.split).map_err(|e| Error::Data(e.to_string()))?;
        if frame.is_empty() {
            return Err(Error::Data("cannot build a dataset from zero rows".to_string()));
        }

        let partition: Partition = match (&frame.assignments, options.random) {
            (Some(assignments), false) => partition_by_assignment(assignments),
            (_, random) => {
                partition_by_fraction(frame.len(), options.split, random.then_some(options.seed))
            }
        };
        if partition.learn.is_empty() {
            return Err(Error::Data("learn subset is empty".to_string()));
        }

        let learn_raw = frame.inputs.select(Axis(0), &partition.learn);
        let preprocessor = Preprocessor::fit(
            &learn_raw,
            options.normalize,
            options.transform,
            options.transform_components,
        )?;
        let inputs = preprocessor.apply(&frame.inputs)?;

        log::info!(
            "Loaded {} rows from {} (learn {}, valid {}, test {})",
            frame.len(),
            source,
            partition.learn.len(),
            partition.valid.len(),
            partition.test.len()
        );

        Ok(Self {
            source: source.to_string(),
            input_names: preprocessor.output_names(&frame.input_names),
            target_names: frame.target_names.clone(),
            learn: Subset::select(frame, &partition.learn, &inputs),
            valid: Subset::select(frame, &partition.valid, &inputs),
            test: Subset::select(frame, &partition.test, &inputs),
            preprocessor,
        })
    }

    /// Total rows across learn, valid and test
    pub fn len(&self) -> usize {
        self.learn.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_inputs(&self) -> usize {
        self.input_names.len()
    }

    pub fn n_targets(&self) -> usize {
        self.target_names.len()
    }

    /// Rows of the requested subset; composite kinds are concatenated
    pub fn subset(&self, kind: SubsetKind) -> Subset {
        match kind {
            SubsetKind::Learn => self.learn.clone(),
            SubsetKind::Valid => self.valid.clone(),
            SubsetKind::Test => self.test.clone(),
            SubsetKind::Train => Subset::concat(&[&self.learn, &self.valid]),
            SubsetKind::All => Subset::concat(&[&self.learn, &self.valid, &self.test]),
        }
    }

    /// Validation rows, or learn rows when no validation rows exist
    pub fn selection_subset(&self) -> &Subset {
        if self.valid.is_empty() {
            &self.learn
        } else {
            &self.valid
        }
    }

    /// Map a raw frame through this dataset's preprocessing
    pub fn prepare_inputs(&self, frame: &DataFrame) -> Result<Array2<f32>> {
        self.preprocessor.apply(&frame.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Assignment;
    use ndarray::Array2;

    fn frame(rows: usize, inputs: usize) -> DataFrame {
        let x = Array2::from_shape_fn((rows, inputs), |(r, c)| (r * (c + 1)) as f32);
        let y = Array2::from_shape_fn((rows, 1), |(r, _)| r as f32 * 0.5);
        let names = (0..inputs).map(|i| format!("x{i}")).collect();
        DataFrame::new(names, vec!["y".into()], x, y).unwrap()
    }

    #[test]
    fn test_subsets_share_width_and_cover_rows() {
        let ds = Dataset::from_frame(&frame(482, 3), &DataOptions::default(), "mem").unwrap();
        assert_eq!(ds.len(), 482);
        assert_eq!(ds.learn.len(), 337);
        assert_eq!(ds.valid.len(), 96);
        assert_eq!(ds.test.len(), 49);
        for s in [&ds.learn, &ds.valid, &ds.test] {
            assert_eq!(s.inputs.ncols(), 3);
            assert_eq!(s.targets.ncols(), 1);
        }
    }

    #[test]
    fn test_bad_split_is_data_error() {
        let opts = DataOptions::default().with_split([0.7, 0.7, 0.1]);
        assert!(matches!(
            Dataset::from_frame(&frame(10, 2), &opts, "mem"),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn test_transform_names_components_consistently() {
        let opts = DataOptions::default()
            .with_normalize(true)
            .with_random(true)
            .with_transform(true);
        let ds = Dataset::from_frame(&frame(60, 4), &opts, "mem").unwrap();
        assert!(ds.input_names.iter().all(|n| n.starts_with("PC")));
        let width = ds.n_inputs();
        assert_eq!(ds.learn.inputs.ncols(), width);
        assert_eq!(ds.valid.inputs.ncols(), width);
        assert_eq!(ds.test.inputs.ncols(), width);
    }

    #[test]
    fn test_normalization_fit_on_learn_only() {
        let opts = DataOptions::default().with_normalize(true);
        let ds = Dataset::from_frame(&frame(10, 1), &opts, "mem").unwrap();
        // sequential split: learn rows 0..7 define the range, later rows exceed it
        let learn_max = ds.learn.inputs.iter().copied().fold(f32::MIN, f32::max);
        let test_max = ds.test.inputs.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(learn_max, 1.0);
        assert!(test_max > 1.0);
    }

    #[test]
    fn test_pinned_assignments_respected_unless_random() {
        use Assignment::*;
        let f = frame(4, 1)
            .with_assignments(vec![Test, Learn, Valid, Learn])
            .unwrap();
        let ds = Dataset::from_frame(&f, &DataOptions::default(), "mem").unwrap();
        assert_eq!(ds.learn.ids, vec!["1", "3"]);
        assert_eq!(ds.valid.ids, vec!["2"]);
        assert_eq!(ds.test.ids, vec!["0"]);

        let shuffled =
            Dataset::from_frame(&f, &DataOptions::default().with_random(true), "mem").unwrap();
        assert_eq!(shuffled.len(), 4);
    }

    #[test]
    fn test_all_subset_orders_learn_valid_test() {
        let ds = Dataset::from_frame(&frame(10, 1), &DataOptions::default(), "mem").unwrap();
        let all = ds.subset(SubsetKind::All);
        assert_eq!(all.len(), 10);
        assert_eq!(all.ids[0], ds.learn.ids[0]);
        assert_eq!(all.ids[9], ds.test.ids[ds.test.len() - 1]);
        assert_eq!(ds.subset(SubsetKind::Train).len(), ds.learn.len() + ds.valid.len());
    }

    #[test]
    fn test_selection_subset_falls_back_to_learn() {
        let opts = DataOptions::default().with_split([0.9, 0.0, 0.1]);
        let ds = Dataset::from_frame(&frame(10, 1), &opts, "mem").unwrap();
        assert!(ds.valid.is_empty());
        assert_eq!(ds.selection_subset().len(), ds.learn.len());
    }

    #[test]
    fn test_prepare_inputs_checks_width() {
        let ds = Dataset::from_frame(&frame(10, 2), &DataOptions::default(), "mem").unwrap();
        assert!(ds.prepare_inputs(&frame(3, 2)).is_ok());
        assert!(matches!(ds.prepare_inputs(&frame(3, 5)), Err(Error::Data(_))));
    }
}
