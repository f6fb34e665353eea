use crate::cnmf_engine::*;
use crate::common::*;
use crate::config::CnmfConfig;
use crate::external_cnmf::ExternalCnmf;
use crate::input::*;
use crate::program_output::*;

use clap::Args;
use indicatif::{ProgressBar, ProgressDrawTarget};
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct ConsensusNmfArgs {
    #[arg(
        required = true,
        help = "Multi-modal container file",
        long_help = "Multi-modal expression container (`.h5`) holding the\n\
		     data modality to be factorized."
    )]
    pub container_file: Box<str>,

    #[arg(
        long,
        short,
        help = "Number of engine workers",
        long_help = "Number of engine worker processes for factorization.\n\
		     All parallelism happens inside the engine;\n\
		     defaults to the number of logical CPUs."
    )]
    pub n_jobs: Option<usize>,

    #[arg(
        long,
        default_value = DEFAULT_PROG_KEY,
        help = "Key of the program modality added to the output"
    )]
    pub prog_key: Box<str>,

    #[arg(
        long,
        default_value = DEFAULT_DATA_KEY,
        help = "Key of the data modality to factorize"
    )]
    pub data_key: Box<str>,

    #[arg(
        long,
        default_value = PRIMARY_LAYER,
        help = "Value layer handed to the engine",
        long_help = "Value layer handed to the engine.\n\
		     `X` takes the modality's primary matrix;\n\
		     any other name selects `layers/<name>`."
    )]
    pub layer: Box<str>,

    #[arg(
        long,
        default_value = "./",
        help = "Working directory for the engine's output tree"
    )]
    pub work_dir: Box<str>,

    #[arg(
        long,
        help = "Scratch directory for the temporary counts file",
        long_help = "Scratch directory for the temporary counts file.\n\
		     Defaults to the working directory."
    )]
    pub scratch_dir: Option<Box<str>>,

    #[arg(
        long,
        default_value = "./consensus_nmf.toml",
        help = "Configuration file with the factorization parameters"
    )]
    pub config: Box<str>,

    #[arg(
        long,
        short,
        help = "Output container file",
        long_help = "Output container file.\n\
		     Defaults to `<container stem>.cnmf.h5` next to the input."
    )]
    pub out: Option<Box<str>>,

    #[arg(
        long,
        default_value = "cnmf",
        help = "External engine executable"
    )]
    pub cnmf_exe: Box<str>,

    #[arg(
        long,
        default_value = DEFAULT_RUN_NAME,
        help = "Engine run name",
        long_help = "Engine run name; the engine keeps everything under\n\
		     `<work dir>/<run name>/`."
    )]
    pub run_name: Box<str>,

    #[arg(long, short, help = "Verbosity")]
    pub verbose: bool,
}

/// Orchestration knobs that survive once the command line has been
/// digested: where the counts went and how results are keyed
pub struct OrchestrationArgs<'a> {
    pub counts_file: &'a str,
    pub total_workers: usize,
    pub prog_key: &'a str,
    pub data_key: &'a str,
    pub verbose: bool,
}

pub fn run_consensus_nmf(args: &ConsensusNmfArgs) -> anyhow::Result<()> {
    if args.verbose {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    // 1. method-specific parameters
    let config = CnmfConfig::from_file(&args.config)?;

    // 2. directories for the engine results and the temporary counts
    std::fs::create_dir_all(args.work_dir.as_ref()).map_err(|_| {
        anyhow::anyhow!("work directory location is not usable: {}", args.work_dir)
    })?;

    let scratch_dir = args.scratch_dir.as_deref().unwrap_or(args.work_dir.as_ref());
    std::fs::create_dir_all(scratch_dir).map_err(|_| {
        anyhow::anyhow!("scratch directory location is not usable: {}", scratch_dir)
    })?;

    // 3. temporary counts file, before any engine call
    let data = open_container(&args.container_file)?;
    let counts_file = export_temp_counts(&data, &args.data_key, &args.layer, scratch_dir)?;

    let engine = ExternalCnmf::new(&args.cnmf_exe, &args.work_dir, &args.run_name);

    let out_file = match args.out.as_deref() {
        Some(out_file) => out_file.to_string(),
        None => default_output_file(&args.container_file),
    };

    let opts = OrchestrationArgs {
        counts_file: counts_file.as_ref(),
        total_workers: args.n_jobs.unwrap_or_else(num_cpus::get).max(1),
        prog_key: args.prog_key.as_ref(),
        data_key: args.data_key.as_ref(),
        verbose: args.verbose,
    };

    orchestrate_consensus_nmf(&engine, &data, &out_file, &config, &opts)?;

    info!("wrote {}", out_file);
    Ok(())
}

/// Run the engine phases and repackage the requested results into a
/// fresh output container. Generic over the engine so the call
/// surface can be exercised without the external toolchain.
pub fn orchestrate_consensus_nmf<E: CnmfEngine>(
    engine: &E,
    data: &MultiModalData,
    out_file: &str,
    config: &CnmfConfig,
    opts: &OrchestrationArgs,
) -> anyhow::Result<MultiModalData> {
    engine.prepare(&FactorizationPlan {
        counts_file: opts.counts_file.into(),
        components: config.components.clone(),
        n_iter: config.n_iter,
        seed: config.seed,
        num_highvar_genes: config.num_highvar_genes,
        beta_loss: config.beta_loss,
        total_workers: opts.total_workers,
    })?;

    engine.factorize(opts.total_workers)?;
    engine.combine()?;
    engine.k_selection_plot()?;

    // consensus for every requested (rank, threshold) pair
    let pairs = config.components.len() * config.density_thresholds.len();
    let pb = progress_bar(pairs, opts.verbose);

    for &k in config.components.iter() {
        for &density_threshold in config.density_thresholds.iter() {
            engine.consensus(k, density_threshold, config.show_clustering)?;
            pb.inc(1);
        }
    }
    pb.finish_and_clear();

    // repackage: source data modality plus the program modalities
    let out = MultiModalData::create(out_file)?;
    let source = data.modality(opts.data_key)?;
    out.copy_modality_from(&source, opts.data_key)?;

    let min_density_threshold = config.min_density_threshold();

    let primary = engine.load_results(
        config.selected_k,
        min_density_threshold,
        config.n_top_genes,
    )?;
    attach_program_modality(&out, opts.prog_key, &primary)?;

    if config.output_all_k || config.output_all_thresh {
        let components = match config.output_all_k {
            true => config.components.clone(),
            false => vec![config.selected_k],
        };
        let density_thresholds = match config.output_all_thresh {
            true => config.density_thresholds.clone(),
            false => vec![min_density_threshold],
        };

        let pb = progress_bar(components.len() * density_thresholds.len(), opts.verbose);

        for &k in components.iter() {
            for &density_threshold in density_thresholds.iter() {
                let results = engine.load_results(k, density_threshold, config.n_top_genes)?;
                let key = format!(
                    "{}_{}_{}",
                    opts.prog_key,
                    k,
                    threshold_label(density_threshold)
                );
                attach_program_modality(&out, &key, &results)?;
                pb.inc(1);
            }
        }
        pb.finish_and_clear();
    }

    Ok(out)
}

fn progress_bar(len: usize, verbose: bool) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb
}

fn default_output_file(container_file: &str) -> String {
    let path = Path::new(container_file);
    let stem = path
        .file_stem()
        .and_then(|x| x.to_str())
        .unwrap_or(container_file);

    match path.parent().and_then(|x| x.to_str()) {
        Some(dir) if !dir.is_empty() => format!("{}/{}.cnmf.h5", dir, stem),
        _ => format!("{}.cnmf.h5", stem),
    }
}
