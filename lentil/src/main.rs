use lentil::common::info;
use lentil::load_programs::*;
use lentil::run_consensus::*;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LENTIL",
    long_about = "Latent Expression programs by coNsensus non-negative matrix facTorIzation pLumbing\n\
		  Container files of `.h5` format; the factorization itself is\n\
		  delegated to the external `cnmf` toolchain."
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Discover gene programs by consensus NMF",
        long_about = "Discover gene programs by consensus NMF in three stages:\n\
		      (1) Export the selected modality/layer as a temporary counts file\n\
		      (2) Drive the external engine: prepare, factorize, combine,\n\
		          k-selection diagnostics, and consensus per (rank, threshold)\n\
		      (3) Repackage usage and loading matrices as program modalities.\n",
        visible_alias = "cnmf"
    )]
    ConsensusNmf(ConsensusNmfArgs),

    #[command(
        about = "Attach previously computed consensus results",
        long_about = "Reload usage and loading matrices for one (rank, threshold)\n\
		      pair from an existing engine output tree and attach them\n\
		      to a container, without re-running factorization.\n",
        visible_alias = "load"
    )]
    LoadPrograms(LoadProgramsArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.commands {
        Commands::ConsensusNmf(args) => {
            run_consensus_nmf(args)?;
        }
        Commands::LoadPrograms(args) => {
            load_programs(args)?;
        }
    }

    info!("Done");
    Ok(())
}
