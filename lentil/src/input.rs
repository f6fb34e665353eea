use crate::common::*;
use lentil_data::common_io::file_ext;

/// Open a multi-modal container file, checking the backend extension
pub fn open_container(container_file: &str) -> anyhow::Result<MultiModalData> {
    match file_ext(container_file)?.as_ref() {
        "h5" => MultiModalData::open(container_file),
        _ => Err(anyhow::anyhow!(
            "unknown backend file {}",
            container_file
        )),
    }
}

/// Write the temporary single-modality counts file the engine will
/// factorize: `<scratch>/<data_key>_temp.h5` for the primary matrix,
/// `<scratch>/<data_key>_<layer>_temp.h5` for a named layer
pub fn export_temp_counts(
    data: &MultiModalData,
    data_key: &str,
    layer: &str,
    scratch_dir: &str,
) -> anyhow::Result<Box<str>> {
    let modality = data.modality(data_key)?;

    let (counts_file, layer) = if layer == PRIMARY_LAYER {
        (format!("{}/{}_temp.h5", scratch_dir, data_key), None)
    } else {
        (
            format!("{}/{}_{}_temp.h5", scratch_dir, data_key, layer),
            Some(layer),
        )
    };

    modality.export_counts(&counts_file, layer)?;

    Ok(counts_file.into_boxed_str())
}
