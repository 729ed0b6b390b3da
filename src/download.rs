use std::{
    fs::{create_dir_all, File},
    io::{Error, ErrorKind, Write},
    path::PathBuf,
};

use burn::data::network::downloader;

/// Download the pre-trained weights to the local cache directory.
pub(crate) fn download(url: &str) -> Result<PathBuf, Error> {
    let model_dir = dirs::home_dir()
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "Could not determine the home directory."))?
        .join(".cache")
        .join("fcn-burn");

    if !model_dir.exists() {
        create_dir_all(&model_dir)?;
    }

    let file_base_name = url.rsplit_once('/').map(|(_, name)| name).ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("Weights URL has no file name: {url}"),
        )
    })?;
    let file_name = model_dir.join(file_base_name);
    if file_name.exists() {
        return Ok(file_name);
    }

    let bytes = downloader::download_file_as_bytes(url, file_base_name);

    let mut output_file = File::create(&file_name)?;
    let bytes_written = output_file.write(&bytes)?;
    if bytes_written != bytes.len() {
        return Err(Error::new(
            ErrorKind::InvalidData,
            "Failed to write the whole model weights file.",
        ));
    }

    Ok(file_name)
}
