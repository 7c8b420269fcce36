//! Feature-matrix assembly from two group tables

use crate::structs::{ConcordError, FeatureMatrix, Result};
use ndarray::{concatenate, Array1, ArrayBase, Axis, Data, Ix2};

impl FeatureMatrix {
    /// Stack group `a` above group `b` and encode group identity
    ///
    /// Class codes follow the sorted group names, so the same pair of names
    /// always yields the same codes regardless of argument order.
    ///
    /// # Errors
    /// `Precondition` when the groups disagree on feature count, share a
    /// name, are empty, or contain non-finite values
    pub fn from_groups<S1, S2>(
        name_a: &str,
        a: &ArrayBase<S1, Ix2>,
        name_b: &str,
        b: &ArrayBase<S2, Ix2>,
    ) -> Result<Self>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        if name_a == name_b {
            return Err(ConcordError::Precondition(format!(
                "both groups are named '{name_a}'"
            )));
        }
        if a.ncols() != b.ncols() {
            return Err(ConcordError::Precondition(format!(
                "group '{name_a}' has {} features, group '{name_b}' has {}",
                a.ncols(),
                b.ncols()
            )));
        }
        for (name, group) in [(name_a, a.view()), (name_b, b.view())] {
            if group.is_empty() {
                return Err(ConcordError::Precondition(format!(
                    "group '{name}' has no samples or features"
                )));
            }
            if let Some(((row, col), _)) = group.indexed_iter().find(|(_, v)| !v.is_finite()) {
                return Err(ConcordError::Precondition(format!(
                    "group '{name}' has a non-finite value at row {row}, column {col}"
                )));
            }
        }

        let mut classes = vec![name_a.to_string(), name_b.to_string()];
        classes.sort();
        let code_a = usize::from(classes[0] != name_a);
        let code_b = 1 - code_a;

        let data = concatenate(Axis(0), &[a.view(), b.view()])
            .map_err(|e| ConcordError::Precondition(format!("cannot stack groups: {e}")))?;
        let labels: Array1<usize> = std::iter::repeat(code_a)
            .take(a.nrows())
            .chain(std::iter::repeat(code_b).take(b.nrows()))
            .collect();

        Ok(Self {
            data,
            labels,
            classes,
        })
    }

    /// Number of samples carrying each class code
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_ones_vs_zeros() {
        let a = Array2::<f64>::ones((5, 3));
        let b = Array2::<f64>::zeros((5, 3));
        let fm = FeatureMatrix::from_groups("groupA", &a, "groupB", &b).expect("features");

        assert_eq!(fm.data.dim(), (10, 3));
        assert_eq!(fm.class_counts(), vec![5, 5]);
        assert!(fm.labels.iter().take(5).all(|&l| l == fm.labels[0]));
        assert!(fm.labels.iter().skip(5).all(|&l| l == fm.labels[5]));
        assert_ne!(fm.labels[0], fm.labels[5]);
        assert!(fm.data.row(0).iter().all(|v| (*v - 1.0).abs() < 1e-12));
        assert!(fm.data.row(9).iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_encoding_is_stable() {
        let a = array![[1.0], [2.0]];
        let b = array![[3.0]];
        let forward = FeatureMatrix::from_groups("patients", &a, "controls", &b).expect("fm");
        let reverse = FeatureMatrix::from_groups("controls", &b, "patients", &a).expect("fm");

        assert_eq!(forward.classes, vec!["controls", "patients"]);
        assert_eq!(forward.labels, array![1, 1, 0]);
        assert_eq!(reverse.labels, array![0, 1, 1]);
    }

    #[test]
    fn test_rejects_bad_groups() {
        let a = Array2::<f64>::ones((2, 3));
        let b = Array2::<f64>::ones((2, 4));
        assert!(matches!(
            FeatureMatrix::from_groups("a", &a, "b", &b),
            Err(ConcordError::Precondition(_))
        ));
        assert!(matches!(
            FeatureMatrix::from_groups("a", &a, "a", &a),
            Err(ConcordError::Precondition(_))
        ));

        let mut nan = Array2::<f64>::ones((2, 3));
        nan[[1, 2]] = f64::NAN;
        let err = FeatureMatrix::from_groups("a", &a, "b", &nan).expect_err("nan");
        assert!(err.to_string().contains("row 1, column 2"));
    }
}
