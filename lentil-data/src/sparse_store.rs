use hdf5::filters::blosc_set_nthreads;
use hdf5::types::VarLenUnicode;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use std::ops::Range;

use anyhow::anyhow;

const NUM_CHUNKS: usize = 1000;
const MIN_CHUNK_SIZE: usize = 8192;
const COMPRESSION_LEVEL: u8 = 5;

/// Feature x cell matrix stored inside an hdf5 group
///
/// ```text
/// (group)
///     ├── nrow, ncol, nnz (attributes)
///     ├── row_names
///     ├── column_names
///     └── by_column
///         ├── data
///         ├── indices (row indices)
///         └── indptr (column pointers)
/// ```
///
#[derive(Clone)]
pub struct SparseStore {
    group: hdf5::Group,
    by_column_indptr: Vec<u64>,
}

impl SparseStore {
    /// Record a CSC matrix with row and column names into `group`
    pub fn create(
        group: hdf5::Group,
        csc: &CscMatrix<f32>,
        row_names: &[Box<str>],
        column_names: &[Box<str>],
    ) -> anyhow::Result<Self> {
        if row_names.len() != csc.nrows() || column_names.len() != csc.ncols() {
            return Err(anyhow!(
                "names {} x {} don't match the matrix {} x {}",
                row_names.len(),
                column_names.len(),
                csc.nrows(),
                csc.ncols()
            ));
        }

        set_scalar_attr(&group, "nrow", csc.nrows())?;
        set_scalar_attr(&group, "ncol", csc.ncols())?;
        set_scalar_attr(&group, "nnz", csc.nnz())?;

        let csc_colptr: Vec<u64> = csc.col_offsets().iter().map(|&x| x as u64).collect();
        let csc_rows: Vec<u64> = csc.row_indices().iter().map(|&x| x as u64).collect();
        let csc_vals: Vec<f32> = csc.values().to_vec();

        let by_column = group.create_group("by_column")?;

        blosc_set_nthreads(num_cpus::get() as u8);

        record_chunked_dataset(&by_column, "data", &csc_vals)?;
        record_chunked_dataset(&by_column, "indptr", &csc_colptr)?;
        record_chunked_dataset(&by_column, "indices", &csc_rows)?;

        let ret = Self {
            group,
            by_column_indptr: csc_colptr,
        };

        ret.register_names("row_names", row_names)?;
        ret.register_names("column_names", column_names)?;

        Ok(ret)
    }

    /// Open an existing matrix group and load its column pointers
    pub fn open(group: hdf5::Group) -> anyhow::Result<Self> {
        let mut ret = Self {
            group,
            by_column_indptr: vec![],
        };

        if let (Some(_), Some(ncol), Some(_)) =
            (ret.num_rows(), ret.num_columns(), ret.num_non_zeros())
        {
            ret.by_column_indptr = ret
                .group
                .group("by_column")?
                .dataset("indptr")?
                .read_1d::<u64>()?
                .to_vec();

            if ret.by_column_indptr.len() != ncol + 1 {
                return Err(anyhow!("corrupted column pointers"));
            }
        } else {
            anyhow::bail!("couldn't figure out the size of this sparse matrix group");
        }

        Ok(ret)
    }

    pub fn num_rows(&self) -> Option<usize> {
        self.group.attr("nrow").ok()?.read_scalar().ok()
    }

    pub fn num_columns(&self) -> Option<usize> {
        self.group.attr("ncol").ok()?.read_scalar().ok()
    }

    pub fn num_non_zeros(&self) -> Option<usize> {
        self.group.attr("nnz").ok()?.read_scalar().ok()
    }

    pub fn row_names(&self) -> anyhow::Result<Vec<Box<str>>> {
        self.retrieve_names("row_names")
    }

    pub fn column_names(&self) -> anyhow::Result<Vec<Box<str>>> {
        self.retrieve_names("column_names")
    }

    /// Read columns within `[lb, ub)` and return them as a CSC matrix
    pub fn read_columns_csc(&self, columns: Range<usize>) -> anyhow::Result<CscMatrix<f32>> {
        let nrow = self
            .num_rows()
            .ok_or(anyhow!("can't figure out the number of rows"))?;
        let ncol = self
            .num_columns()
            .ok_or(anyhow!("can't figure out the number of columns"))?;

        if columns.end > ncol || columns.start > columns.end {
            return Err(anyhow!(
                "column range {:?} out of bounds for {} columns",
                columns,
                ncol
            ));
        }

        let by_column = self.group.group("by_column")?;
        let data = by_column.dataset("data")?;
        let indices = by_column.dataset("indices")?;
        let indptr = &self.by_column_indptr;

        let mut coo = CooMatrix::<f32>::new(nrow, columns.len());

        for (jj, j_data) in columns.clone().enumerate() {
            // [start, end)
            let start = indptr[j_data] as usize;
            let end = indptr[j_data + 1] as usize;

            if start < end {
                let data_slice = data.read_slice_1d::<f32, _>(start..end)?;
                let indices_slice = indices.read_slice_1d::<u64, _>(start..end)?;

                for k in 0..(end - start) {
                    coo.push(indices_slice[k] as usize, jj, data_slice[k]);
                }
            }
        }

        Ok(CscMatrix::from(&coo))
    }

    /// Read all the columns as a CSC matrix
    pub fn read_csc(&self) -> anyhow::Result<CscMatrix<f32>> {
        let ncol = self
            .num_columns()
            .ok_or(anyhow!("can't figure out the number of columns"))?;
        self.read_columns_csc(0..ncol)
    }

    /// Read columns within `[lb, ub)` and return a dense matrix
    pub fn read_columns_dmatrix(&self, columns: Range<usize>) -> anyhow::Result<DMatrix<f32>> {
        let csc = self.read_columns_csc(columns)?;
        let mut ret = DMatrix::<f32>::zeros(csc.nrows(), csc.ncols());
        for (ii, jj, &x_ij) in csc.triplet_iter() {
            ret[(ii, jj)] = x_ij;
        }
        Ok(ret)
    }

    fn register_names(&self, key: &str, names: &[Box<str>]) -> anyhow::Result<()> {
        let _names: Vec<VarLenUnicode> = names
            .iter()
            .map(|x| x.parse().map_err(|_| anyhow!("invalid name: {}", x)))
            .collect::<anyhow::Result<_>>()?;

        self.group
            .new_dataset::<VarLenUnicode>()
            .shape(_names.len())
            .chunk([_names.len().max(1)])
            .create(key)?
            .write(&_names)?;

        Ok(())
    }

    fn retrieve_names(&self, key: &str) -> anyhow::Result<Vec<Box<str>>> {
        let ret = self.group.dataset(key)?.read_1d::<VarLenUnicode>()?;
        Ok(ret.iter().map(|x| x.to_string().into_boxed_str()).collect())
    }
}

fn set_scalar_attr(group: &hdf5::Group, name: &str, value: usize) -> anyhow::Result<()> {
    group
        .new_attr::<usize>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn record_chunked_dataset<T: hdf5::H5Type>(
    group: &hdf5::Group,
    name: &str,
    values: &[T],
) -> anyhow::Result<()> {
    let nelem = values.len();
    let chunk_size = (nelem / NUM_CHUNKS).max(MIN_CHUNK_SIZE).min(nelem).max(1);

    group
        .new_dataset::<T>()
        .shape(nelem)
        .chunk([chunk_size])
        .blosc_blosclz(COMPRESSION_LEVEL, true)
        .create(name)?
        .write(values)?;

    Ok(())
}
