use crate::cnmf_engine::*;
use crate::common::*;
use crate::external_cnmf::ExternalCnmf;
use crate::input::open_container;
use crate::program_output::*;

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct LoadProgramsArgs {
    #[arg(
        required = true,
        help = "Multi-modal container file",
        long_help = "Multi-modal expression container (`.h5`) the reloaded\n\
		     program modality is attached to."
    )]
    pub container_file: Box<str>,

    #[arg(long, short, required = true, help = "Rank of the consensus run")]
    pub k: usize,

    #[arg(
        long,
        short,
        required = true,
        help = "Density threshold of the consensus run"
    )]
    pub density_threshold: f64,

    #[arg(
        long,
        default_value = DEFAULT_PROG_KEY,
        help = "Prefix of the attached program modality key"
    )]
    pub prog_key: Box<str>,

    #[arg(
        long,
        default_value = "./",
        help = "Working directory holding the engine's output tree"
    )]
    pub work_dir: Box<str>,

    #[arg(
        long,
        default_value = DEFAULT_RUN_NAME,
        help = "Engine run name"
    )]
    pub run_name: Box<str>,

    #[arg(
        long,
        default_value_t = 100,
        help = "Genes listed per program in the unstructured table"
    )]
    pub n_top_genes: usize,

    #[arg(
        long,
        short,
        help = "Output container file",
        long_help = "Output container file holding a copy of the input\n\
		     modalities plus the reloaded programs.\n\
		     If omitted, the input container is augmented in place."
    )]
    pub out: Option<Box<str>>,

    #[arg(long, short, help = "Verbosity")]
    pub verbose: bool,
}

/// Reload consensus results for one (rank, threshold) pair from an
/// existing engine output directory and attach them as a program
/// modality, without re-running any factorization.
pub fn load_programs(args: &LoadProgramsArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // the executable is irrelevant here; only the output tree is read
    let engine = ExternalCnmf::new("cnmf", &args.work_dir, &args.run_name);

    let results = engine.load_results(args.k, args.density_threshold, args.n_top_genes)?;

    let key = format!(
        "{}_{}_{}",
        args.prog_key,
        args.k,
        threshold_label(args.density_threshold)
    );

    let out = match args.out.as_deref() {
        Some(out_file) => {
            let data = open_container(&args.container_file)?;
            let out = MultiModalData::create(out_file)?;
            for name in data.modality_names()? {
                out.copy_modality_from(&data.modality(&name)?, &name)?;
            }
            out
        }
        None => MultiModalData::open_rw(&args.container_file)?,
    };

    attach_program_modality(&out, &key, &results)?;

    info!("wrote {}", out.file_name());
    Ok(())
}
