use lentil::cnmf_engine::*;
use lentil::config::*;
use lentil::input::*;
use lentil::run_consensus::*;

use lentil_data::common_io::create_temp_dir_file;
use lentil_data::dmatrix_util::MatOps;
use lentil_data::multi_modal::*;
use lentil_data::simulate::*;

use nalgebra::DMatrix;
use std::path::Path;
use std::sync::Mutex;

/// Engine stand-in that records the call order and serves
/// deterministic results, so the orchestration contract can be
/// checked without the external toolchain.
struct MockEngine {
    cell_names: Vec<Box<str>>,
    gene_names: Vec<Box<str>>,
    calls: Mutex<Vec<String>>,
    staged_counts: Mutex<Option<Box<str>>>,
    counts_present_at_factorize: Mutex<Option<bool>>,
}

impl MockEngine {
    fn new(cell_names: Vec<Box<str>>, gene_names: Vec<Box<str>>) -> Self {
        Self {
            cell_names,
            gene_names,
            calls: Mutex::new(vec![]),
            staged_counts: Mutex::new(None),
            counts_present_at_factorize: Mutex::new(None),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn results_for(&self, k: usize, density_threshold: f64, n_top_genes: usize) -> ProgramResults {
        let n = self.cell_names.len();
        let g = self.gene_names.len();

        let usage = DMatrix::<f32>::from_fn(n, k, |i, j| {
            (i + j + k) as f32 + density_threshold as f32 * 10.
        })
        .sum_to_one_rows();

        let spectra_scores = DMatrix::<f32>::from_fn(k, g, |i, j| {
            ((i * g + j * 7) % 11) as f32 + density_threshold as f32
        });
        let spectra_tpm = spectra_scores.scale(2.);

        let top_genes = spectra_scores
            .top_columns_per_row(n_top_genes)
            .into_iter()
            .map(|order| {
                order
                    .into_iter()
                    .map(|g| self.gene_names[g].clone())
                    .collect()
            })
            .collect();

        ProgramResults {
            cell_names: self.cell_names.clone(),
            program_names: (1..=k)
                .map(|i| format!("program_{}", i).into_boxed_str())
                .collect(),
            gene_names: self.gene_names.clone(),
            usage,
            spectra_scores,
            spectra_tpm,
            top_genes,
        }
    }
}

impl CnmfEngine for MockEngine {
    fn prepare(&self, plan: &FactorizationPlan) -> anyhow::Result<()> {
        self.record("prepare".to_string());
        *self.staged_counts.lock().unwrap() = Some(plan.counts_file.clone());
        Ok(())
    }

    fn factorize(&self, _total_workers: usize) -> anyhow::Result<()> {
        self.record("factorize".to_string());
        let staged = self.staged_counts.lock().unwrap();
        *self.counts_present_at_factorize.lock().unwrap() = staged
            .as_deref()
            .map(|counts_file| Path::new(counts_file).exists());
        Ok(())
    }

    fn combine(&self) -> anyhow::Result<()> {
        self.record("combine".to_string());
        Ok(())
    }

    fn k_selection_plot(&self) -> anyhow::Result<()> {
        self.record("k_selection_plot".to_string());
        Ok(())
    }

    fn consensus(
        &self,
        k: usize,
        density_threshold: f64,
        _show_clustering: bool,
    ) -> anyhow::Result<()> {
        self.record(format!("consensus {} {}", k, threshold_label(density_threshold)));
        Ok(())
    }

    fn load_results(
        &self,
        k: usize,
        density_threshold: f64,
        n_top_genes: usize,
    ) -> anyhow::Result<ProgramResults> {
        self.record(format!("load {} {}", k, threshold_label(density_threshold)));
        Ok(self.results_for(k, density_threshold, n_top_genes))
    }
}

fn test_config(output_all_k: bool, output_all_thresh: bool) -> CnmfConfig {
    CnmfConfig {
        selected_k: 3,
        components: vec![2, 3],
        n_iter: 5,
        seed: 14,
        num_highvar_genes: 10,
        beta_loss: BetaLoss::Frobenius,
        density_thresholds: vec![0.01, 2.0],
        output_all_k,
        output_all_thresh,
        n_top_genes: 4,
        show_clustering: true,
    }
}

struct Fixture {
    data: MultiModalData,
    engine: MockEngine,
    counts_file: Box<str>,
    gene_names: Vec<Box<str>>,
}

fn setup(scratch_dir: &str) -> anyhow::Result<Fixture> {
    let sim = generate_poisson_counts(&SimArgs {
        rows: 8,
        cols: 12,
        depth: 10.,
        rseed: 99,
    })?;

    let backend_file = create_temp_dir_file(".h5")?;
    let data = MultiModalData::create(backend_file.to_str().unwrap())?;
    data.add_sparse_modality("rna", &sim.counts, &sim.row_names, &sim.column_names)?;

    let counts_file = export_temp_counts(&data, "rna", "X", scratch_dir)?;
    let engine = MockEngine::new(sim.column_names.clone(), sim.row_names.clone());

    Ok(Fixture {
        data,
        engine,
        counts_file,
        gene_names: sim.row_names,
    })
}

fn run(
    fixture: &Fixture,
    config: &CnmfConfig,
) -> anyhow::Result<MultiModalData> {
    let out_file = create_temp_dir_file(".h5")?;

    orchestrate_consensus_nmf(
        &fixture.engine,
        &fixture.data,
        out_file.to_str().unwrap(),
        config,
        &OrchestrationArgs {
            counts_file: fixture.counts_file.as_ref(),
            total_workers: 2,
            prog_key: "consensus_nmf",
            data_key: "rna",
            verbose: false,
        },
    )
}

fn sorted_names(data: &MultiModalData) -> anyhow::Result<Vec<Box<str>>> {
    let mut names = data.modality_names()?;
    names.sort();
    Ok(names)
}

fn boxed(words: &[&str]) -> Vec<Box<str>> {
    let mut words: Vec<Box<str>> = words
        .iter()
        .map(|x| x.to_string().into_boxed_str())
        .collect();
    words.sort();
    words
}

#[test]
fn counts_exist_before_factorize_and_calls_stay_ordered() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let scratch_dir = scratch.path().to_str().unwrap();
    let fixture = setup(scratch_dir)?;

    // the primary layer lands at `<scratch>/<data_key>_temp.h5`
    assert_eq!(
        fixture.counts_file.as_ref(),
        format!("{}/rna_temp.h5", scratch_dir)
    );

    run(&fixture, &test_config(true, true))?;

    // the temporary counts file was on disk when factorization started
    assert_eq!(
        *fixture.engine.counts_present_at_factorize.lock().unwrap(),
        Some(true)
    );

    let calls = fixture.engine.calls.lock().unwrap().clone();
    let expected: Vec<String> = [
        "prepare",
        "factorize",
        "combine",
        "k_selection_plot",
        "consensus 2 0.01",
        "consensus 2 2.0",
        "consensus 3 0.01",
        "consensus 3 2.0",
        "load 3 0.01",
        "load 2 0.01",
        "load 2 2.0",
        "load 3 0.01",
        "load 3 2.0",
    ]
    .into_iter()
    .map(|x| x.to_string())
    .collect();

    assert_eq!(calls, expected);
    Ok(())
}

#[test]
fn named_layer_counts_get_their_own_path() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let scratch_dir = scratch.path().to_str().unwrap();

    let sim = generate_poisson_counts(&SimArgs {
        rows: 6,
        cols: 9,
        depth: 10.,
        rseed: 5,
    })?;
    let raw = generate_poisson_counts(&SimArgs {
        rows: 6,
        cols: 9,
        depth: 10.,
        rseed: 6,
    })?;

    let backend_file = create_temp_dir_file(".h5")?;
    let data = MultiModalData::create(backend_file.to_str().unwrap())?;
    let rna = data.add_sparse_modality("rna", &sim.counts, &sim.row_names, &sim.column_names)?;
    rna.add_layer("counts", &raw.counts)?;

    let counts_file = export_temp_counts(&data, "rna", "counts", scratch_dir)?;
    assert_eq!(
        counts_file.as_ref(),
        format!("{}/rna_counts_temp.h5", scratch_dir)
    );

    // the exported file carries the layer's values, not the primary matrix
    let counts = CountsFile::open(counts_file.as_ref())?;
    assert_eq!(
        counts.store.read_columns_dmatrix(0..9)?,
        DMatrix::<f32>::from(&raw.counts)
    );

    Ok(())
}

#[test]
fn one_modality_per_requested_pair() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let fixture = setup(scratch.path().to_str().unwrap())?;

    let out = run(&fixture, &test_config(true, true))?;
    assert_eq!(
        sorted_names(&out)?,
        boxed(&[
            "rna",
            "consensus_nmf",
            "consensus_nmf_2_0.01",
            "consensus_nmf_2_2.0",
            "consensus_nmf_3_0.01",
            "consensus_nmf_3_2.0",
        ])
    );

    let out = run(&fixture, &test_config(false, true))?;
    assert_eq!(
        sorted_names(&out)?,
        boxed(&[
            "rna",
            "consensus_nmf",
            "consensus_nmf_3_0.01",
            "consensus_nmf_3_2.0",
        ])
    );

    let out = run(&fixture, &test_config(true, false))?;
    assert_eq!(
        sorted_names(&out)?,
        boxed(&[
            "rna",
            "consensus_nmf",
            "consensus_nmf_2_0.01",
            "consensus_nmf_3_0.01",
        ])
    );

    // only the best selection
    let out = run(&fixture, &test_config(false, false))?;
    assert_eq!(sorted_names(&out)?, boxed(&["rna", "consensus_nmf"]));

    Ok(())
}

#[test]
fn attached_matrices_match_load_results() -> anyhow::Result<()> {
    let scratch = tempfile::tempdir()?;
    let fixture = setup(scratch.path().to_str().unwrap())?;
    let config = test_config(true, true);

    let out = run(&fixture, &config)?;

    // the source data modality is carried over
    let rna = out.modality("rna")?;
    assert_eq!(rna.row_names()?, fixture.gene_names);

    // the primary program modality reflects (selected_k, min threshold)
    let expected = fixture.engine.results_for(3, 0.01, config.n_top_genes);
    let programs = out.modality("consensus_nmf")?;

    assert_eq!(programs.row_names()?, expected.program_names);
    assert_eq!(programs.column_names()?, expected.cell_names);

    let x_kn = programs.read_columns_dmatrix(0..expected.cell_names.len())?;
    assert_eq!(x_kn, expected.usage.transpose());

    assert_eq!(programs.read_varm("loadings")?, expected.spectra_tpm);
    assert_eq!(
        programs.read_varm("loadings_zscore")?,
        expected.spectra_scores
    );
    assert_eq!(
        programs.read_uns_lines("loadings_gene_names")?,
        expected.gene_names
    );

    let top_lines: Vec<Box<str>> = expected
        .top_genes
        .iter()
        .map(|genes| {
            genes
                .iter()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join("\t")
                .into_boxed_str()
        })
        .collect();
    assert_eq!(programs.read_uns_lines("loadings_genes")?, top_lines);

    // a per-combination modality reflects its own (rank, threshold)
    let expected = fixture.engine.results_for(2, 2.0, config.n_top_genes);
    let programs = out.modality("consensus_nmf_2_2.0")?;
    let x_kn = programs.read_columns_dmatrix(0..expected.cell_names.len())?;
    assert_eq!(x_kn, expected.usage.transpose());

    Ok(())
}
