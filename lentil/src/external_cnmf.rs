use crate::cnmf_engine::*;
use crate::common::info;

use lentil_data::dense_io::read_named_matrix;
use lentil_data::dmatrix_util::MatOps;

use anyhow::anyhow;
use std::process::{Command, Stdio};

/// Driver for the external `cnmf` command-line engine. Each call
/// surface method becomes one engine subcommand run against the same
/// `--output-dir`/`--name` pair; results are read back from the
/// engine's own output directory.
pub struct ExternalCnmf {
    exe: Box<str>,
    output_dir: Box<str>,
    name: Box<str>,
}

impl ExternalCnmf {
    pub fn new(exe: &str, output_dir: &str, name: &str) -> Self {
        Self {
            exe: exe.into(),
            output_dir: output_dir.into(),
            name: name.into(),
        }
    }

    /// `<output_dir>/<name>` is where the engine keeps everything
    fn run_dir(&self) -> String {
        format!("{}/{}", self.output_dir, self.name)
    }

    fn result_file(&self, kind: &str, k: usize, density_threshold: f64) -> String {
        format!(
            "{}/{}.{}.k_{}.dt_{}.txt",
            self.run_dir(),
            self.name,
            kind,
            k,
            threshold_tag(density_threshold)
        )
    }

    fn engine_command(&self, subcommand: &str) -> Command {
        let mut command = Command::new(self.exe.as_ref());
        command.arg(subcommand).args([
            "--output-dir",
            self.output_dir.as_ref(),
            "--name",
            self.name.as_ref(),
        ]);
        command
    }

    fn run_engine(&self, subcommand: &str, extra_args: &[String]) -> anyhow::Result<()> {
        info!("engine: {} {}", subcommand, extra_args.join(" "));

        let output = self
            .engine_command(subcommand)
            .args(extra_args)
            .output()
            .map_err(|e| anyhow!("failed to launch engine '{}': {}", self.exe, e))?;

        if !output.status.success() {
            anyhow::bail!(
                "engine {} failed ({}):\n{}",
                subcommand,
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}

impl CnmfEngine for ExternalCnmf {
    fn prepare(&self, plan: &FactorizationPlan) -> anyhow::Result<()> {
        let mut args = vec!["-c".to_string(), plan.counts_file.to_string()];

        args.push("-k".to_string());
        args.extend(plan.components.iter().map(|k| k.to_string()));

        args.extend([
            "--n-iter".to_string(),
            plan.n_iter.to_string(),
            "--seed".to_string(),
            plan.seed.to_string(),
            "--numgenes".to_string(),
            plan.num_highvar_genes.to_string(),
            "--beta-loss".to_string(),
            plan.beta_loss.as_engine_arg().to_string(),
            "--total-workers".to_string(),
            plan.total_workers.to_string(),
        ]);

        self.run_engine("prepare", &args)
    }

    /// One engine worker process per worker index; all of the
    /// parallelism happens on the engine's side of the fence
    fn factorize(&self, total_workers: usize) -> anyhow::Result<()> {
        let total_workers = total_workers.max(1);
        info!("factorizing with {} engine workers", total_workers);

        let mut workers = Vec::with_capacity(total_workers);

        for worker_index in 0..total_workers {
            let child = self
                .engine_command("factorize")
                .args([
                    "--worker-index".to_string(),
                    worker_index.to_string(),
                    "--total-workers".to_string(),
                    total_workers.to_string(),
                ])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|e| anyhow!("failed to launch engine '{}': {}", self.exe, e))?;

            workers.push((worker_index, child));
        }

        let mut failures = vec![];
        for (worker_index, child) in workers {
            let output = child.wait_with_output()?;
            if !output.status.success() {
                failures.push(format!(
                    "worker {} failed ({}):\n{}",
                    worker_index,
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                ));
            }
        }

        if !failures.is_empty() {
            anyhow::bail!("engine factorize failed:\n{}", failures.join("\n"));
        }
        Ok(())
    }

    fn combine(&self) -> anyhow::Result<()> {
        self.run_engine("combine", &[])
    }

    fn k_selection_plot(&self) -> anyhow::Result<()> {
        self.run_engine("k_selection_plot", &[])
    }

    fn consensus(
        &self,
        k: usize,
        density_threshold: f64,
        show_clustering: bool,
    ) -> anyhow::Result<()> {
        let mut args = vec![
            "--components".to_string(),
            k.to_string(),
            "--local-density-threshold".to_string(),
            threshold_label(density_threshold),
        ];

        if show_clustering {
            args.push("--show-clustering".to_string());
        }

        self.run_engine("consensus", &args)
    }

    fn load_results(
        &self,
        k: usize,
        density_threshold: f64,
        n_top_genes: usize,
    ) -> anyhow::Result<ProgramResults> {
        let usage_file = format!(
            "{}/{}.usages.k_{}.dt_{}.consensus.txt",
            self.run_dir(),
            self.name,
            k,
            threshold_tag(density_threshold)
        );

        let usage = read_named_matrix(&usage_file, &['\t'])?;
        let scores = read_named_matrix(
            &self.result_file("gene_spectra_score", k, density_threshold),
            &['\t'],
        )?;
        let tpm = read_named_matrix(
            &self.result_file("gene_spectra_tpm", k, density_threshold),
            &['\t'],
        )?;

        if usage.mat.ncols() != k {
            anyhow::bail!(
                "usage matrix has {} programs for k = {}",
                usage.mat.ncols(),
                k
            );
        }
        if scores.mat.nrows() != k || tpm.mat.nrows() != k {
            anyhow::bail!(
                "spectra matrices have {} / {} programs for k = {}",
                scores.mat.nrows(),
                tpm.mat.nrows(),
                k
            );
        }
        if scores.cols != tpm.cols {
            anyhow::bail!("gene names disagree between the spectra files");
        }

        let program_names = (1..=k)
            .map(|i| format!("program_{}", i).into_boxed_str())
            .collect();

        let top_genes = scores
            .mat
            .top_columns_per_row(n_top_genes)
            .into_iter()
            .map(|order| order.into_iter().map(|g| scores.cols[g].clone()).collect())
            .collect();

        Ok(ProgramResults {
            cell_names: usage.rows,
            program_names,
            gene_names: scores.cols,
            usage: usage.mat.sum_to_one_rows(),
            spectra_scores: scores.mat,
            spectra_tpm: tpm.mat,
            top_genes,
        })
    }
}
