use crate::sparse_store::SparseStore;
use hdf5::types::VarLenUnicode;
use log::info;
use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

/// Multi-modal expression container with one group per modality
///
/// ```text
/// (root)
///     └── <modality>
///         ├── nrow, ncol, nnz (attributes)
///         ├── row_names (features)
///         ├── column_names (cells)
///         ├── by_column
///         │   ├── data
///         │   ├── indices (row indices)
///         │   └── indptr (column pointers)
///         ├── layers
///         │   └── <layer> (same layout as the modality itself)
///         ├── varm
///         │   └── <key> (dense feature x ? matrix)
///         └── uns
///             └── <key> (one string per line)
/// ```
///
#[derive(Clone)]
pub struct MultiModalData {
    backend: Arc<hdf5::File>,
    file_name: String,
}

impl MultiModalData {
    /// Create an empty container file, truncating any previous one
    pub fn create(backend_file: &str) -> anyhow::Result<Self> {
        let backend = hdf5::File::create(backend_file)?;
        Ok(Self {
            backend: backend.into(),
            file_name: backend_file.to_string(),
        })
    }

    /// Open an existing container file read-only
    pub fn open(backend_file: &str) -> anyhow::Result<Self> {
        let backend = hdf5::File::open(backend_file)?;
        Ok(Self {
            backend: backend.into(),
            file_name: backend_file.to_string(),
        })
    }

    /// Open an existing container file for augmentation
    pub fn open_rw(backend_file: &str) -> anyhow::Result<Self> {
        let backend = hdf5::File::open_rw(backend_file)?;
        Ok(Self {
            backend: backend.into(),
            file_name: backend_file.to_string(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Names of the modalities stored in this container
    pub fn modality_names(&self) -> anyhow::Result<Vec<Box<str>>> {
        Ok(self
            .backend
            .member_names()?
            .into_iter()
            .map(|x| x.into_boxed_str())
            .collect())
    }

    /// Open a modality by its key
    pub fn modality(&self, key: &str) -> anyhow::Result<Modality> {
        let group = self
            .backend
            .group(key)
            .map_err(|_| anyhow!("no modality '{}' in {}", key, self.file_name))?;
        let store = SparseStore::open(group.clone())?;
        Ok(Modality { group, store })
    }

    /// Record a new sparse modality (feature x cell)
    pub fn add_sparse_modality(
        &self,
        key: &str,
        csc: &CscMatrix<f32>,
        row_names: &[Box<str>],
        column_names: &[Box<str>],
    ) -> anyhow::Result<Modality> {
        if self.backend.group(key).is_ok() {
            return Err(anyhow!("modality '{}' already exists", key));
        }

        let group = self.backend.create_group(key)?;
        let store = SparseStore::create(group.clone(), csc, row_names, column_names)?;
        Ok(Modality { group, store })
    }

    /// Record a new dense modality (feature x cell)
    pub fn add_dense_modality(
        &self,
        key: &str,
        mat: &DMatrix<f32>,
        row_names: &[Box<str>],
        column_names: &[Box<str>],
    ) -> anyhow::Result<Modality> {
        let mut coo = CooMatrix::<f32>::new(mat.nrows(), mat.ncols());
        for jj in 0..mat.ncols() {
            for ii in 0..mat.nrows() {
                let x_ij = mat[(ii, jj)];
                if x_ij != 0_f32 {
                    coo.push(ii, jj, x_ij);
                }
            }
        }
        self.add_sparse_modality(key, &CscMatrix::from(&coo), row_names, column_names)
    }

    /// Copy one modality of `src` into this container under `key`
    pub fn copy_modality_from(
        &self,
        src: &Modality,
        key: &str,
    ) -> anyhow::Result<Modality> {
        let csc = src.store.read_csc()?;
        let rows = src.row_names()?;
        let columns = src.column_names()?;
        self.add_sparse_modality(key, &csc, &rows, &columns)
    }
}

/// One modality inside a `MultiModalData` container
#[derive(Clone)]
pub struct Modality {
    group: hdf5::Group,
    store: SparseStore,
}

impl Modality {
    pub fn num_rows(&self) -> Option<usize> {
        self.store.num_rows()
    }

    pub fn num_columns(&self) -> Option<usize> {
        self.store.num_columns()
    }

    pub fn row_names(&self) -> anyhow::Result<Vec<Box<str>>> {
        self.store.row_names()
    }

    pub fn column_names(&self) -> anyhow::Result<Vec<Box<str>>> {
        self.store.column_names()
    }

    pub fn read_csc(&self) -> anyhow::Result<CscMatrix<f32>> {
        self.store.read_csc()
    }

    pub fn read_columns_csc(
        &self,
        columns: std::ops::Range<usize>,
    ) -> anyhow::Result<CscMatrix<f32>> {
        self.store.read_columns_csc(columns)
    }

    pub fn read_columns_dmatrix(
        &self,
        columns: std::ops::Range<usize>,
    ) -> anyhow::Result<DMatrix<f32>> {
        self.store.read_columns_dmatrix(columns)
    }

    /// Record an alternative value layer sharing the modality's names
    pub fn add_layer(&self, name: &str, csc: &CscMatrix<f32>) -> anyhow::Result<()> {
        if Some(csc.nrows()) != self.num_rows() || Some(csc.ncols()) != self.num_columns() {
            return Err(anyhow!(
                "layer '{}' doesn't match the modality shape",
                name
            ));
        }

        let layers = match self.group.group("layers") {
            Ok(layers) => layers,
            Err(_) => self.group.create_group("layers")?,
        };

        if layers.group(name).is_ok() {
            return Err(anyhow!("layer '{}' already exists", name));
        }

        let rows = self.row_names()?;
        let columns = self.column_names()?;
        SparseStore::create(layers.create_group(name)?, csc, &rows, &columns)?;
        Ok(())
    }

    /// Open an alternative value layer
    pub fn layer(&self, name: &str) -> anyhow::Result<SparseStore> {
        let layers = self
            .group
            .group("layers")
            .map_err(|_| anyhow!("this modality has no layers"))?;
        let group = layers
            .group(name)
            .map_err(|_| anyhow!("no layer '{}'", name))?;
        SparseStore::open(group)
    }

    pub fn layer_names(&self) -> anyhow::Result<Vec<Box<str>>> {
        match self.group.group("layers") {
            Ok(layers) => Ok(layers
                .member_names()?
                .into_iter()
                .map(|x| x.into_boxed_str())
                .collect()),
            Err(_) => Ok(vec![]),
        }
    }

    /// Attach a dense feature-wise matrix under `varm/<key>`
    pub fn attach_varm(&self, key: &str, mat: &DMatrix<f32>) -> anyhow::Result<()> {
        if Some(mat.nrows()) != self.num_rows() {
            return Err(anyhow!(
                "varm '{}' has {} rows for {:?} features",
                key,
                mat.nrows(),
                self.num_rows()
            ));
        }

        let varm = match self.group.group("varm") {
            Ok(varm) => varm,
            Err(_) => self.group.create_group("varm")?,
        };

        let arr =
            ndarray::Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)]);

        varm.new_dataset::<f32>()
            .shape((mat.nrows(), mat.ncols()))
            .create(key)?
            .write(&arr)?;

        Ok(())
    }

    /// Read back a dense feature-wise matrix from `varm/<key>`
    pub fn read_varm(&self, key: &str) -> anyhow::Result<DMatrix<f32>> {
        let varm = self
            .group
            .group("varm")
            .map_err(|_| anyhow!("this modality has no varm"))?;
        let arr = varm.dataset(key)?.read_2d::<f32>()?;
        let (nrows, ncols) = arr.dim();
        Ok(DMatrix::from_row_iterator(
            nrows,
            ncols,
            arr.iter().copied(),
        ))
    }

    pub fn varm_keys(&self) -> anyhow::Result<Vec<Box<str>>> {
        match self.group.group("varm") {
            Ok(varm) => Ok(varm
                .member_names()?
                .into_iter()
                .map(|x| x.into_boxed_str())
                .collect()),
            Err(_) => Ok(vec![]),
        }
    }

    /// Attach an unstructured string table under `uns/<key>`
    pub fn attach_uns_lines(&self, key: &str, lines: &[Box<str>]) -> anyhow::Result<()> {
        let uns = match self.group.group("uns") {
            Ok(uns) => uns,
            Err(_) => self.group.create_group("uns")?,
        };

        let _lines: Vec<VarLenUnicode> = lines
            .iter()
            .map(|x| x.parse().map_err(|_| anyhow!("invalid line: {}", x)))
            .collect::<anyhow::Result<_>>()?;

        uns.new_dataset::<VarLenUnicode>()
            .shape(_lines.len())
            .chunk([_lines.len().max(1)])
            .create(key)?
            .write(&_lines)?;

        Ok(())
    }

    /// Read back an unstructured string table from `uns/<key>`
    pub fn read_uns_lines(&self, key: &str) -> anyhow::Result<Vec<Box<str>>> {
        let uns = self
            .group
            .group("uns")
            .map_err(|_| anyhow!("this modality has no uns"))?;
        let ret = uns.dataset(key)?.read_1d::<VarLenUnicode>()?;
        Ok(ret.iter().map(|x| x.to_string().into_boxed_str()).collect())
    }

    /// Export the primary matrix or one of the layers into a
    /// standalone single-matrix file with de-duplicated row names
    pub fn export_counts(&self, output_file: &str, layer: Option<&str>) -> anyhow::Result<()> {
        let csc = match layer {
            None => self.store.read_csc()?,
            Some(layer) => self.layer(layer)?.read_csc()?,
        };

        let rows = make_unique_names(&self.row_names()?);
        let columns = self.column_names()?;

        info!(
            "exporting {} x {} counts to {}",
            csc.nrows(),
            csc.ncols(),
            output_file
        );

        let counts = CountsFile::create(output_file, &csc, &rows, &columns)?;
        counts.flush()
    }
}

/// A standalone single-matrix file (the same layout as a modality
/// group, hoisted to the file root)
pub struct CountsFile {
    backend: Arc<hdf5::File>,
    pub store: SparseStore,
}

impl CountsFile {
    pub fn create(
        backend_file: &str,
        csc: &CscMatrix<f32>,
        row_names: &[Box<str>],
        column_names: &[Box<str>],
    ) -> anyhow::Result<Self> {
        let backend = hdf5::File::create(backend_file)?;
        let store = SparseStore::create(backend.group("/")?, csc, row_names, column_names)?;
        Ok(Self {
            backend: backend.into(),
            store,
        })
    }

    pub fn open(backend_file: &str) -> anyhow::Result<Self> {
        let backend = hdf5::File::open(backend_file)?;
        let store = SparseStore::open(backend.group("/")?)?;
        Ok(Self {
            backend: backend.into(),
            store,
        })
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.backend.flush()?;
        Ok(())
    }
}

/// De-duplicate names by appending `-1`, `-2`, ... to repeats; the
/// first occurrence keeps its name
pub fn make_unique_names(names: &[Box<str>]) -> Vec<Box<str>> {
    let mut seen = HashMap::<&str, usize>::new();
    names
        .iter()
        .map(|name| {
            let count = seen.entry(name.as_ref()).or_insert(0);
            let ret = if *count == 0 {
                name.clone()
            } else {
                format!("{}-{}", name, count).into_boxed_str()
            };
            *count += 1;
            ret
        })
        .collect()
}
