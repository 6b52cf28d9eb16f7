use serde::{Serialize, Deserialize};

/// Row-major dense matrix as stored in model JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f64>>
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    /// Builds a matrix from rows. An empty input yields a 0×0 matrix.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map_or(0, |row| row.len()),
            data
        }
    }

    /// True when `rows`/`cols` agree with the stored data.
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.rows && self.data.iter().all(|row| row.len() == self.cols)
    }

    /// Computes the row-vector product `input · self`.
    ///
    /// `input.len()` must equal `rows`; the result has `cols` entries.
    /// Walks the matrix row by row so each weight row is read contiguously.
    pub fn left_mul(&self, input: &[f64]) -> Vec<f64> {
        assert_eq!(input.len(), self.rows, "input length must match matrix rows");
        let mut out = vec![0.0; self.cols];
        for (x, row) in input.iter().zip(&self.data) {
            if *x == 0.0 {
                continue;
            }
            for (acc, w) in out.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
        out
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_mul_matches_hand_computation() {
        let m = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(m.left_mul(&[1.0, 0.0, 2.0]), vec![11.0, 14.0]);
    }

    #[test]
    fn consistency_detects_ragged_rows() {
        let mut m = Matrix::zeros(2, 2);
        assert!(m.is_consistent());
        m.data[1].push(1.0);
        assert!(!m.is_consistent());
    }
}
