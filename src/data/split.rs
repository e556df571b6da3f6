//! Learn/valid/test partitioning

use super::frame::Assignment;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of each subset, in the order rows will appear
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub learn: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.learn.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subset sizes for `rows` under `split`
///
/// Learn and valid are rounded to the nearest row; test takes the remainder
/// so the sizes always sum to `rows`.
pub fn split_sizes(rows: usize, split: [f64; 3]) -> (usize, usize, usize) {
    let learn = ((rows as f64) * split[0]).round() as usize;
    let learn = learn.min(rows);
    let valid = ((rows as f64) * split[1]).round() as usize;
    let valid = valid.min(rows - learn);
    (learn, valid, rows - learn - valid)
}

/// Partition `rows` by fractions, optionally shuffling first
pub fn partition_by_fraction(rows: usize, split: [f64; 3], shuffle: Option<u64>) -> Partition {
    let mut order: Vec<usize> = (0..rows).collect();
    if let Some(seed) = shuffle {
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
    }
    let (learn, valid, _) = split_sizes(rows, split);
    let test = order.split_off(learn + valid);
    let valid = order.split_off(learn);
    Partition {
        learn: order,
        valid,
        test,
    }
}

/// Partition rows by their pinned assignments
pub fn partition_by_assignment(assignments: &[Assignment]) -> Partition {
    let mut partition = Partition::default();
    for (idx, assignment) in assignments.iter().enumerate() {
        match assignment {
            Assignment::Learn => partition.learn.push(idx),
            Assignment::Valid => partition.valid.push(idx),
            Assignment::Test => partition.test.push(idx),
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_482_rows_default_split() {
        let (l, v, t) = split_sizes(482, [0.7, 0.2, 0.1]);
        assert_eq!((l, v, t), (337, 96, 49));
        assert_eq!(l + v + t, 482);
    }

    #[test]
    fn test_sequential_partition_keeps_order() {
        let p = partition_by_fraction(10, [0.6, 0.2, 0.2], None);
        assert_eq!(p.learn, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(p.valid, vec![6, 7]);
        assert_eq!(p.test, vec![8, 9]);
    }

    #[test]
    fn test_shuffled_partition_is_seeded() {
        let a = partition_by_fraction(50, [0.7, 0.2, 0.1], Some(3));
        let b = partition_by_fraction(50, [0.7, 0.2, 0.1], Some(3));
        let c = partition_by_fraction(50, [0.7, 0.2, 0.1], Some(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_assignment_partition() {
        use Assignment::*;
        let p = partition_by_assignment(&[Learn, Test, Valid, Learn]);
        assert_eq!(p.learn, vec![0, 3]);
        assert_eq!(p.valid, vec![2]);
        assert_eq!(p.test, vec![1]);
    }

    proptest! {
        #[test]
        fn prop_partition_covers_every_row_once(
            rows in 1usize..2000,
            learn in 1u32..98,
            seed in proptest::option::of(any::<u64>()),
        ) {
            let valid = (100 - learn) / 2;
            let test = 100 - learn - valid;
            let split = [learn as f64 / 100.0, valid as f64 / 100.0, test as f64 / 100.0];
            let p = partition_by_fraction(rows, split, seed);

            prop_assert_eq!(p.len(), rows);
            let unique: HashSet<usize> =
                p.learn.iter().chain(&p.valid).chain(&p.test).copied().collect();
            prop_assert_eq!(unique.len(), rows);

            let expected_learn = (rows as f64 * split[0]).round() as usize;
            prop_assert!((p.learn.len() as i64 - expected_learn as i64).abs() <= 1);
        }
    }
}
