//! Tabular data frame and its CSV reader
//!
//! The CSV layout carries two header rows: the first declares the kind of
//! every column, the second its name.
//!
//! ```text
//! DATAID,ASSIGNMENT,STRING,INPUT,INPUT,TARGET
//! id,split,smiles,mw,logp,cn
//! m0,L,CCO,46.07,-0.31,8.2
//! ```

use crate::error::{Error, Result};
use csv::ReaderBuilder;
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Subset a row is pinned to by an `ASSIGNMENT` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Learn,
    Valid,
    Test,
}

impl Assignment {
    fn parse(cell: &str) -> Option<Self> {
        match cell.trim().to_ascii_uppercase().as_str() {
            "L" | "LEARN" => Some(Assignment::Learn),
            "V" | "VALID" => Some(Assignment::Valid),
            "T" | "TEST" => Some(Assignment::Test),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Id,
    Assignment,
    Input,
    Target,
    Ignored,
}

impl ColumnKind {
    fn parse(cell: &str) -> Self {
        match cell.trim().to_ascii_uppercase().as_str() {
            "DATAID" => ColumnKind::Id,
            "ASSIGNMENT" => ColumnKind::Assignment,
            "INPUT" => ColumnKind::Input,
            "TARGET" => ColumnKind::Target,
            _ => ColumnKind::Ignored,
        }
    }
}

/// Raw, unsplit table of input and target columns
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub ids: Vec<String>,
    pub input_names: Vec<String>,
    pub target_names: Vec<String>,
    /// `rows x inputs`
    pub inputs: Array2<f32>,
    /// `rows x targets`
    pub targets: Array2<f32>,
    /// Present when the source pinned rows to subsets
    pub assignments: Option<Vec<Assignment>>,
}

impl DataFrame {
    /// Build a frame from in-memory columns
    pub fn new(
        input_names: Vec<String>,
        target_names: Vec<String>,
        inputs: Array2<f32>,
        targets: Array2<f32>,
    ) -> Result<Self> {
        if inputs.nrows() != targets.nrows() {
            return Err(Error::Data(format!(
                "{} input rows but {} target rows",
                inputs.nrows(),
                targets.nrows()
            )));
        }
        if inputs.ncols() != input_names.len() || targets.ncols() != target_names.len() {
            return Err(Error::Data(
                "column names do not match matrix widths".to_string(),
            ));
        }
        if input_names.is_empty() || target_names.is_empty() {
            return Err(Error::Data(
                "at least one input and one target column are required".to_string(),
            ));
        }
        let ids = (0..inputs.nrows()).map(|i| i.to_string()).collect();
        Ok(Self {
            ids,
            input_names,
            target_names,
            inputs,
            targets,
            assignments: None,
        })
    }

    /// Pin every row to a subset
    pub fn with_assignments(mut self, assignments: Vec<Assignment>) -> Result<Self> {
        if assignments.len() != self.len() {
            return Err(Error::Data(format!(
                "{} assignments for {} rows",
                assignments.len(),
                self.len()
            )));
        }
        self.assignments = Some(assignments);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a two-header CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::Data(format!("cannot open {}: {e}", path.display())))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read a two-header CSV document from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = reader.records();
        let kinds: Vec<ColumnKind> = match records.next() {
            Some(row) => row
                .map_err(|e| Error::Data(format!("malformed kind header: {e}")))?
                .iter()
                .map(ColumnKind::parse)
                .collect(),
            None => return Err(Error::Data("source is empty".to_string())),
        };
        let names: Vec<String> = match records.next() {
            Some(row) => row
                .map_err(|e| Error::Data(format!("malformed name header: {e}")))?
                .iter()
                .map(str::to_string)
                .collect(),
            None => return Err(Error::Data("missing column name header".to_string())),
        };
        if names.len() != kinds.len() {
            return Err(Error::Data(format!(
                "{} column kinds but {} column names",
                kinds.len(),
                names.len()
            )));
        }

        let pick = |kind: ColumnKind| -> Vec<usize> {
            kinds
                .iter()
                .enumerate()
                .filter(|(_, k)| **k == kind)
                .map(|(i, _)| i)
                .collect()
        };
        let input_cols = pick(ColumnKind::Input);
        let target_cols = pick(ColumnKind::Target);
        let id_col = pick(ColumnKind::Id).first().copied();
        let assignment_col = pick(ColumnKind::Assignment).first().copied();

        if input_cols.is_empty() || target_cols.is_empty() {
            return Err(Error::Data(
                "source must declare at least one INPUT and one TARGET column".to_string(),
            ));
        }

        let mut ids = Vec::new();
        let mut assignments = Vec::new();
        let mut input_values = Vec::new();
        let mut target_values = Vec::new();

        for (row_idx, record) in records.enumerate() {
            let record =
                record.map_err(|e| Error::Data(format!("malformed row {}: {e}", row_idx + 3)))?;
            if record.len() != kinds.len() {
                return Err(Error::Data(format!(
                    "row {} has {} cells, expected {}",
                    row_idx + 3,
                    record.len(),
                    kinds.len()
                )));
            }

            let cell = |col: usize| -> Result<f32> {
                record[col].parse::<f32>().map_err(|_| {
                    Error::Data(format!(
                        "row {}, column '{}': '{}' is not a number",
                        row_idx + 3,
                        names[col],
                        &record[col]
                    ))
                })
            };
            for &col in &input_cols {
                input_values.push(cell(col)?);
            }
            for &col in &target_cols {
                target_values.push(cell(col)?);
            }

            ids.push(match id_col {
                Some(col) => record[col].to_string(),
                None => row_idx.to_string(),
            });
            if let Some(col) = assignment_col {
                let assignment = Assignment::parse(&record[col]).ok_or_else(|| {
                    Error::Data(format!(
                        "row {}: unknown assignment '{}'",
                        row_idx + 3,
                        &record[col]
                    ))
                })?;
                assignments.push(assignment);
            }
        }

        let rows = ids.len();
        if rows == 0 {
            return Err(Error::Data("source has no data rows".to_string()));
        }

        let inputs = Array2::from_shape_vec((rows, input_cols.len()), input_values)
            .map_err(|e| Error::Data(e.to_string()))?;
        let targets = Array2::from_shape_vec((rows, target_cols.len()), target_values)
            .map_err(|e| Error::Data(e.to_string()))?;

        Ok(Self {
            ids,
            input_names: input_cols.iter().map(|&c| names[c].clone()).collect(),
            target_names: target_cols.iter().map(|&c| names[c].clone()).collect(),
            inputs,
            targets,
            assignments: assignment_col.map(|_| assignments),
        })
    }
}
