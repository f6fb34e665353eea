#![allow(dead_code)]

pub use nalgebra::{DMatrix, DVector};

pub trait MatOps {
    type Mat;

    /// Rescale each row to sum to one; all-zero rows are left as they are
    fn sum_to_one_rows(&self) -> Self::Mat;
    fn sum_to_one_rows_inplace(&mut self);

    /// Column indices of each row sorted by decreasing value, keeping
    /// the top `k` of them
    fn top_columns_per_row(&self, k: usize) -> Vec<Vec<usize>>;
}

impl MatOps for DMatrix<f32> {
    type Mat = DMatrix<f32>;

    fn sum_to_one_rows(&self) -> Self::Mat {
        let mut ret = self.clone();
        ret.sum_to_one_rows_inplace();
        ret
    }

    fn sum_to_one_rows_inplace(&mut self) {
        for mut row in self.row_iter_mut() {
            let denom = row.sum();
            if denom > 0_f32 {
                row /= denom;
            }
        }
    }

    fn top_columns_per_row(&self, k: usize) -> Vec<Vec<usize>> {
        let k = k.min(self.ncols());
        self.row_iter()
            .map(|row| {
                let mut order: Vec<usize> = (0..row.len()).collect();
                order.sort_by(|&a, &b| {
                    row[b].partial_cmp(&row[a]).unwrap_or(std::cmp::Ordering::Equal)
                });
                order.truncate(k);
                order
            })
            .collect()
    }
}
