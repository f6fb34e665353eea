use crate::cnmf_engine::ProgramResults;
use crate::common::*;

/// Attach one set of consensus results to `out` as a program modality
/// named `key`: usage as the modality matrix (programs x cells, the
/// container convention), spectra as `varm` loadings, and the
/// top-gene table under `uns`.
pub fn attach_program_modality(
    out: &MultiModalData,
    key: &str,
    results: &ProgramResults,
) -> anyhow::Result<()> {
    let usage_kn = results.usage.transpose();

    let modality = out.add_dense_modality(
        key,
        &usage_kn,
        &results.program_names,
        &results.cell_names,
    )?;

    modality.attach_varm("loadings", &results.spectra_tpm)?;
    modality.attach_varm("loadings_zscore", &results.spectra_scores)?;

    // the loadings' column order
    modality.attach_uns_lines("loadings_gene_names", &results.gene_names)?;

    let top_genes: Vec<Box<str>> = results
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

    modality.attach_uns_lines("loadings_genes", &top_genes)?;

    info!(
        "attached program modality '{}': {} programs x {} cells",
        key,
        results.usage.ncols(),
        results.usage.nrows()
    );

    Ok(())
}
