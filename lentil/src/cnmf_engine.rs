use crate::common::Mat;
use crate::config::BetaLoss;

/// Everything the engine needs to set up a factorization run
#[derive(Debug, Clone)]
pub struct FactorizationPlan {
    pub counts_file: Box<str>,
    pub components: Vec<usize>,
    pub n_iter: usize,
    pub seed: u64,
    pub num_highvar_genes: usize,
    pub beta_loss: BetaLoss,
    pub total_workers: usize,
}

/// Consensus results for one (rank, density threshold) pair
///
/// `usage` is cells x programs with rows summing to one;
/// `spectra_scores` and `spectra_tpm` are programs x genes.
#[derive(Debug, Clone)]
pub struct ProgramResults {
    pub cell_names: Vec<Box<str>>,
    pub program_names: Vec<Box<str>>,
    pub gene_names: Vec<Box<str>>,
    pub usage: Mat,
    pub spectra_scores: Mat,
    pub spectra_tpm: Mat,
    pub top_genes: Vec<Vec<Box<str>>>,
}

/// The narrow call surface of the external consensus NMF library.
/// All factorization, clustering, and density-filtering math lives on
/// the other side of this trait; this repository only marshals
/// arguments and repackages results.
pub trait CnmfEngine {
    /// Stage the run: counts file, rank list, and parameters
    fn prepare(&self, plan: &FactorizationPlan) -> anyhow::Result<()>;

    /// Run the staged factorization replicates. Parallelism is wholly
    /// the engine's business; we only hand over a worker count.
    fn factorize(&self, total_workers: usize) -> anyhow::Result<()>;

    /// Merge the per-worker factorization outputs
    fn combine(&self) -> anyhow::Result<()>;

    /// Engine-side rank selection diagnostics
    fn k_selection_plot(&self) -> anyhow::Result<()>;

    /// Engine-side consensus clustering with density filtering
    fn consensus(
        &self,
        k: usize,
        density_threshold: f64,
        show_clustering: bool,
    ) -> anyhow::Result<()>;

    /// Reload consensus results for one (rank, threshold) pair
    fn load_results(
        &self,
        k: usize,
        density_threshold: f64,
        n_top_genes: usize,
    ) -> anyhow::Result<ProgramResults>;
}

/// Decimal label of a density threshold the way the engine spells it:
/// `0.01` stays `0.01` and integral values keep one decimal (`2.0`)
pub fn threshold_label(density_threshold: f64) -> String {
    if density_threshold.fract() == 0.0 {
        format!("{:.1}", density_threshold)
    } else {
        format!("{}", density_threshold)
    }
}

/// File-name tag of a density threshold in the engine's output
/// directory: the decimal label with `.` replaced by `_`
pub fn threshold_tag(density_threshold: f64) -> String {
    threshold_label(density_threshold).replace('.', "_")
}
