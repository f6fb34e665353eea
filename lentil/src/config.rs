use serde::Deserialize;

/// Declarative settings for one consensus NMF run, loaded from a TOML
/// file. Every key has a default, so an empty file is a valid
/// configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CnmfConfig {
    /// rank used for the primary program modality
    #[serde(default = "default_selected_k")]
    pub selected_k: usize,

    /// rank list handed to the factorization engine
    #[serde(default = "default_components")]
    pub components: Vec<usize>,

    /// NMF replicates per rank
    #[serde(default = "default_n_iter")]
    pub n_iter: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// highly-variable gene filter applied by the engine
    #[serde(default = "default_num_highvar_genes")]
    pub num_highvar_genes: usize,

    #[serde(default)]
    pub beta_loss: BetaLoss,

    /// consensus outlier-filter thresholds
    #[serde(default = "default_density_thresholds")]
    pub density_thresholds: Vec<f64>,

    /// keep one program modality per rank
    #[serde(default = "default_true")]
    pub output_all_k: bool,

    /// keep one program modality per density threshold
    #[serde(default = "default_true")]
    pub output_all_thresh: bool,

    /// genes listed per program in the unstructured table
    #[serde(default = "default_n_top_genes")]
    pub n_top_genes: usize,

    /// ask the engine for consensus clustering figures
    #[serde(default = "default_true")]
    pub show_clustering: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BetaLoss {
    #[default]
    Frobenius,
    KullbackLeibler,
}

impl BetaLoss {
    /// spelling understood by the engine's command line
    pub fn as_engine_arg(&self) -> &'static str {
        match self {
            BetaLoss::Frobenius => "frobenius",
            BetaLoss::KullbackLeibler => "kullback-leibler",
        }
    }
}

impl CnmfConfig {
    /// Read a configuration file; a missing or unparseable file is an
    /// error of this repository, not of the engine
    pub fn from_file(config_file: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(config_file).map_err(|_| {
            anyhow::anyhow!("cNMF configuration file could not be found: {}", config_file)
        })?;

        let config: CnmfConfig = toml::from_str(&text).map_err(|e| {
            anyhow::anyhow!("cNMF configuration file could not be parsed: {}\n{}", config_file, e)
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.components.is_empty() {
            anyhow::bail!("empty rank list in the configuration");
        }
        if self.density_thresholds.is_empty() {
            anyhow::bail!("empty density threshold list in the configuration");
        }
        if !self.components.contains(&self.selected_k) {
            anyhow::bail!(
                "selected_k = {} is not in the rank list {:?}",
                self.selected_k,
                self.components
            );
        }
        Ok(())
    }

    /// The most stringent (smallest) density threshold is the one the
    /// primary program modality is loaded at
    pub fn min_density_threshold(&self) -> f64 {
        self.density_thresholds
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}

fn default_selected_k() -> usize {
    10
}

fn default_components() -> Vec<usize> {
    vec![7, 8, 9, 10]
}

fn default_n_iter() -> usize {
    10
}

fn default_seed() -> u64 {
    14
}

fn default_num_highvar_genes() -> usize {
    2000
}

fn default_density_thresholds() -> Vec<f64> {
    vec![0.01, 2.0]
}

fn default_n_top_genes() -> usize {
    100
}

fn default_true() -> bool {
    true
}
