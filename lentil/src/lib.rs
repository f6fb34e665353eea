pub mod cnmf_engine; // the external engine's narrow call surface
pub mod common;
pub mod config;
pub mod external_cnmf; // command-line engine driver
pub mod input;
pub mod load_programs;
pub mod program_output;
pub mod run_consensus;
