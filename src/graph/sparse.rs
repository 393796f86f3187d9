//! Compressed sparse row matrices for the incidence and co-occurrence graphs.
//!
//! Only the operations the retrieval pipeline needs are implemented: building
//! from coordinate triplets, transposition, `AᵗA` products, element-wise sums,
//! row normalization, and matrix–vector products.

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// An owned CSR matrix with `f64` values and an explicit shape.
///
/// Row `i` stores its column indices in `indices[indptr[i]..indptr[i + 1]]`,
/// sorted ascending and unique, with values parallel in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
}

impl CsrMatrix {
    /// An all-zero matrix of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            indptr: vec![0; rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Build from unsorted `(row, col, value)` triplets. O(nnz log nnz).
    ///
    /// Duplicate coordinates are summed; entries that sum to zero are dropped.
    /// Coordinates outside the shape are ignored.
    pub fn from_triplets(rows: usize, cols: usize, mut triplets: Vec<(usize, usize, f64)>) -> Self {
        triplets.retain(|&(r, c, _)| r < rows && c < cols);
        triplets.sort_by_key(|&(r, c, _)| (r, c));

        let mut indptr = vec![0usize; rows + 1];
        let mut indices = Vec::with_capacity(triplets.len());
        let mut data: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in triplets {
            if last == Some((r, c)) {
                if let Some(slot) = data.last_mut() {
                    *slot += v;
                }
                continue;
            }
            indices.push(c);
            data.push(v);
            indptr[r + 1] += 1;
            last = Some((r, c));
        }
        for i in 0..rows {
            indptr[i + 1] += indptr[i];
        }

        let mut m = Self {
            rows,
            cols,
            indptr,
            indices,
            data,
        };
        m.eliminate_zeros();
        m
    }

    /// Build a binary incidence matrix from `(row, col)` pairs. Repeated
    /// pairs still yield a single `1.0`.
    pub fn from_pairs(rows: usize, cols: usize, pairs: &[(usize, usize)]) -> Self {
        let mut pairs = pairs.to_vec();
        pairs.sort_unstable();
        pairs.dedup();
        let triplets = pairs.into_iter().map(|(r, c)| (r, c, 1.0)).collect();
        Self::from_triplets(rows, cols, triplets)
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Column indices and values of row `i`. Empty for out-of-range rows.
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        if i >= self.rows {
            return (&[], &[]);
        }
        let span = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[span.clone()], &self.data[span])
    }

    /// Value at `(i, j)`, zero if not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (cols, vals) = self.row(i);
        match cols.binary_search(&j) {
            Ok(pos) => vals[pos],
            Err(_) => 0.0,
        }
    }

    /// Iterate all stored entries as `(row, col, value)` in row-major order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.rows).flat_map(move |r| {
            let (cols, vals) = self.row(r);
            cols.iter().zip(vals).map(move |(&c, &v)| (r, c, v))
        })
    }

    /// The transposed matrix.
    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.cols + 1];
        for &c in &self.indices {
            counts[c + 1] += 1;
        }
        for j in 0..self.cols {
            counts[j + 1] += counts[j];
        }
        let indptr = counts.clone();
        let mut next = counts;
        let mut indices = vec![0usize; self.nnz()];
        let mut data = vec![0.0f64; self.nnz()];

        // Walking rows in order keeps each output row's columns sorted.
        for (r, c, v) in self.triplets() {
            let slot = next[c];
            indices[slot] = r;
            data[slot] = v;
            next[c] += 1;
        }

        Self {
            rows: self.cols,
            cols: self.rows,
            indptr,
            indices,
            data,
        }
    }

    /// The Gram matrix `AᵗA` (cols × cols), via a dense sparse accumulator
    /// per output row.
    pub fn gram(&self) -> Self {
        let at = self.transpose();
        let n = self.cols;
        let mut acc = vec![0.0f64; n];
        let mut marker = vec![usize::MAX; n];
        let mut touched: Vec<usize> = Vec::new();

        let mut indptr = Vec::with_capacity(n + 1);
        indptr.push(0);
        let mut indices = Vec::new();
        let mut data = Vec::new();

        for i in 0..n {
            touched.clear();
            let (rows_of_i, vals_of_i) = at.row(i);
            for (&s, &a_si) in rows_of_i.iter().zip(vals_of_i) {
                let (cols_of_s, vals_of_s) = self.row(s);
                for (&j, &a_sj) in cols_of_s.iter().zip(vals_of_s) {
                    if marker[j] != i {
                        marker[j] = i;
                        acc[j] = 0.0;
                        touched.push(j);
                    }
                    acc[j] += a_si * a_sj;
                }
            }
            touched.sort_unstable();
            for &j in &touched {
                if acc[j] != 0.0 {
                    indices.push(j);
                    data.push(acc[j]);
                }
            }
            indptr.push(indices.len());
        }

        Self {
            rows: n,
            cols: n,
            indptr,
            indices,
            data,
        }
    }

    /// Element-wise sum of two matrices of the same shape.
    pub fn add(&self, other: &Self) -> Result<Self, GraphError> {
        if self.shape() != other.shape() {
            return Err(GraphError::ShapeMismatch {
                matrix: "sum operand",
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        let triplets = self.triplets().chain(other.triplets()).collect();
        Ok(Self::from_triplets(self.rows, self.cols, triplets))
    }

    /// Copy with the main diagonal removed.
    pub fn without_diagonal(&self) -> Self {
        let triplets = self.triplets().filter(|&(r, c, _)| r != c).collect();
        Self::from_triplets(self.rows, self.cols, triplets)
    }

    /// Drop explicitly stored zeros.
    pub fn eliminate_zeros(&mut self) {
        let mut indptr = Vec::with_capacity(self.rows + 1);
        indptr.push(0);
        let mut w = 0usize;
        for r in 0..self.rows {
            for k in self.indptr[r]..self.indptr[r + 1] {
                if self.data[k] != 0.0 {
                    self.indices[w] = self.indices[k];
                    self.data[w] = self.data[k];
                    w += 1;
                }
            }
            indptr.push(w);
        }
        self.indices.truncate(w);
        self.data.truncate(w);
        self.indptr = indptr;
    }

    /// Sum of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.rows).map(|r| self.row(r).1.iter().sum()).collect()
    }

    /// Scale each row to sum to one. Rows summing to zero stay zero.
    pub fn row_normalized(&self) -> Self {
        let sums = self.row_sums();
        let mut out = self.clone();
        for (r, &sum) in sums.iter().enumerate() {
            if sum == 0.0 {
                continue;
            }
            for v in &mut out.data[out.indptr[r]..out.indptr[r + 1]] {
                *v /= sum;
            }
        }
        out
    }

    /// `y = A·x`. Panics if `x.len() != cols`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.cols, "mul_vec: vector length != cols");
        (0..self.rows)
            .map(|r| {
                let (cols, vals) = self.row(r);
                cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum()
            })
            .collect()
    }

    /// Check structural consistency (used after deserialization).
    pub fn validate(&self, name: &'static str) -> Result<(), GraphError> {
        let ok = self.indptr.len() == self.rows + 1
            && self.indptr.first() == Some(&0)
            && self.indptr.windows(2).all(|w| w[0] <= w[1])
            && self.indptr.last() == Some(&self.indices.len())
            && self.indices.len() == self.data.len()
            && self.indices.iter().all(|&c| c < self.cols);
        if ok {
            Ok(())
        } else {
            Err(GraphError::ShapeMismatch {
                matrix: name,
                expected: (self.rows, self.cols),
                actual: (self.indptr.len().saturating_sub(1), self.cols),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_is_binary_and_sorted() {
        let m = CsrMatrix::from_pairs(2, 3, &[(1, 2), (0, 1), (1, 0), (1, 2)]);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(1).0, &[0, 2]);
        assert_eq!(m.get(1, 2), 1.0);
        assert_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    fn from_triplets_sums_duplicates_and_drops_zeros() {
        let m = CsrMatrix::from_triplets(2, 2, vec![(0, 1, 1.5), (0, 1, 0.5), (1, 0, 1.0), (1, 0, -1.0), (5, 0, 1.0)]);
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.nnz(), 1);
    }

    #[test]
    fn transpose_swaps_coordinates() {
        let m = CsrMatrix::from_pairs(2, 3, &[(0, 2), (1, 0), (1, 2)]);
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.row(2).0, &[0, 1]);
        assert_eq!(t.get(0, 1), 1.0);
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn gram_counts_cooccurrence() {
        // Two sentences: {0, 1} and {0, 2}.
        let m = CsrMatrix::from_pairs(2, 3, &[(0, 0), (0, 1), (1, 0), (1, 2)]);
        let g = m.gram();
        assert_eq!(g.get(0, 0), 2.0);
        assert_eq!(g.get(0, 1), 1.0);
        assert_eq!(g.get(1, 0), 1.0);
        assert_eq!(g.get(1, 2), 0.0);
        let g = g.without_diagonal();
        assert_eq!(g.get(0, 0), 0.0);
        assert_eq!(g.nnz(), 4);
    }

    #[test]
    fn row_normalized_leaves_zero_rows() {
        let m = CsrMatrix::from_triplets(3, 3, vec![(0, 1, 1.0), (0, 2, 3.0), (1, 0, 2.0)]);
        let p = m.row_normalized();
        assert!((p.get(0, 1) - 0.25).abs() < 1e-12);
        assert!((p.get(0, 2) - 0.75).abs() < 1e-12);
        assert_eq!(p.get(1, 0), 1.0);
        assert_eq!(p.row(2).0.len(), 0);
    }

    #[test]
    fn mat_vec_product() {
        let m = CsrMatrix::from_triplets(2, 3, vec![(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)]);
        assert_eq!(m.mul_vec(&[1.0, 1.0, 1.0]), vec![3.0, 3.0]);
        assert_eq!(m.mul_vec(&[1.0, 2.0, 3.0]), vec![7.0, 6.0]);
    }

    #[test]
    fn add_requires_same_shape() {
        let a = CsrMatrix::zeros(2, 2);
        let b = CsrMatrix::zeros(3, 2);
        assert!(a.add(&b).is_err());
        let c = CsrMatrix::from_pairs(2, 2, &[(0, 1)]);
        let sum = c.add(&c).unwrap();
        assert_eq!(sum.get(0, 1), 2.0);
    }

    #[test]
    fn validate_rejects_corrupt_structure() {
        let mut m = CsrMatrix::from_pairs(2, 2, &[(0, 1)]);
        assert!(m.validate("M").is_ok());
        m.indices[0] = 7;
        assert!(m.validate("M").is_err());
    }
}
