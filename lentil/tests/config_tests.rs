use lentil::config::*;
use lentil_data::common_io::{create_temp_dir_file, write_lines};

fn write_config(lines: &[&str]) -> anyhow::Result<String> {
    let config_file = create_temp_dir_file(".toml")?;
    let config_file = config_file.to_str().unwrap().to_string();
    let lines: Vec<Box<str>> = lines
        .iter()
        .map(|x| x.to_string().into_boxed_str())
        .collect();
    write_lines(&lines, &config_file)?;
    Ok(config_file)
}

#[test]
fn empty_file_takes_all_defaults() -> anyhow::Result<()> {
    let config_file = write_config(&[])?;
    let config = CnmfConfig::from_file(&config_file)?;

    assert_eq!(config.selected_k, 10);
    assert_eq!(config.components, vec![7, 8, 9, 10]);
    assert_eq!(config.n_iter, 10);
    assert_eq!(config.seed, 14);
    assert_eq!(config.num_highvar_genes, 2000);
    assert_eq!(config.beta_loss, BetaLoss::Frobenius);
    assert_eq!(config.density_thresholds, vec![0.01, 2.0]);
    assert!(config.output_all_k);
    assert!(config.output_all_thresh);
    assert_eq!(config.n_top_genes, 100);
    assert!(config.show_clustering);

    assert_eq!(config.min_density_threshold(), 0.01);

    Ok(())
}

#[test]
fn explicit_settings_override_defaults() -> anyhow::Result<()> {
    let config_file = write_config(&[
        "selected_k = 5",
        "components = [4, 5, 6]",
        "n_iter = 50",
        "seed = 7",
        "num_highvar_genes = 1500",
        "beta_loss = \"kullback-leibler\"",
        "density_thresholds = [0.5, 0.1]",
        "output_all_k = false",
        "output_all_thresh = false",
        "n_top_genes = 25",
        "show_clustering = false",
    ])?;

    let config = CnmfConfig::from_file(&config_file)?;

    assert_eq!(config.selected_k, 5);
    assert_eq!(config.components, vec![4, 5, 6]);
    assert_eq!(config.n_iter, 50);
    assert_eq!(config.beta_loss, BetaLoss::KullbackLeibler);
    assert_eq!(config.beta_loss.as_engine_arg(), "kullback-leibler");
    assert!(!config.output_all_k);
    assert!(!config.output_all_thresh);
    assert_eq!(config.min_density_threshold(), 0.1);

    Ok(())
}

#[test]
fn missing_file_is_a_local_error() {
    let err = CnmfConfig::from_file("/no/such/consensus_nmf.toml");
    assert!(err.is_err());
    assert!(err
        .unwrap_err()
        .to_string()
        .contains("could not be found"));
}

#[test]
fn unparseable_file_is_a_local_error() -> anyhow::Result<()> {
    let config_file = write_config(&["components = \"not a list\""])?;
    let err = CnmfConfig::from_file(&config_file);
    assert!(err.is_err());
    assert!(err
        .unwrap_err()
        .to_string()
        .contains("could not be parsed"));
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> anyhow::Result<()> {
    let config_file = write_config(&["densty_thresholds = [0.01]"])?;
    assert!(CnmfConfig::from_file(&config_file).is_err());
    Ok(())
}

#[test]
fn selected_k_must_be_in_the_rank_list() -> anyhow::Result<()> {
    let config_file = write_config(&["selected_k = 3", "components = [7, 8]"])?;
    assert!(CnmfConfig::from_file(&config_file).is_err());
    Ok(())
}

#[test]
fn empty_lists_are_rejected() -> anyhow::Result<()> {
    let config_file = write_config(&["components = []"])?;
    assert!(CnmfConfig::from_file(&config_file).is_err());

    let config_file = write_config(&["density_thresholds = []"])?;
    assert!(CnmfConfig::from_file(&config_file).is_err());
    Ok(())
}
