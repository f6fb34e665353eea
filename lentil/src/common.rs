#![allow(dead_code)]

pub use log::info;

pub type Mat = nalgebra::DMatrix<f32>;
pub type CscMat = nalgebra_sparse::CscMatrix<f32>;

pub use lentil_data::multi_modal::*;

pub const DEFAULT_PROG_KEY: &str = "consensus_nmf";
pub const DEFAULT_DATA_KEY: &str = "rna";
pub const DEFAULT_RUN_NAME: &str = "cnmf";
pub const PRIMARY_LAYER: &str = "X";
