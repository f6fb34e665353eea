pub mod common_io; // gzip-aware line and path helpers
pub mod dense_io; // named dense matrix text files
pub mod dmatrix_util;
pub mod multi_modal; // multi-modal expression containers
pub mod simulate; // helper functions for simulation
pub mod sparse_store; // CSC matrix storage inside an hdf5 group
