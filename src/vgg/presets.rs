use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, Recorder, RecorderError},
    tensor::{backend::Backend, Device},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};

use super::{weights::*, Vgg16, Vgg16Record};

impl Vgg16Weights {
    /// Initialize a [Vgg16](Vgg16) with these weights, downloading the
    /// torchvision checkpoint into the local cache when required.
    pub fn load<B: Backend>(&self, device: &Device<B>) -> Result<Vgg16<B>, RecorderError> {
        let structure = self.weights();
        let model = structure.to_config().init(device);

        if let Some(url) = structure.url {
            let weight = crate::download(url).map_err(|err| {
                RecorderError::Unknown(format!("Could not download weights.\nError: {err}"))
            })?;
            let record = load_weights_record(weight, device)?;
            Ok(model.load_record(record))
        } else {
            Ok(model)
        }
    }
}

/// Load a torchvision VGG16 state dict as a record.
///
/// torchvision keeps the convolutions in a flat `features` sequence and the
/// linears in `classifier`; both are remapped onto the named module fields.
fn load_weights_record<B: Backend, P: AsRef<Path>>(
    torch_weights: P,
    device: &Device<B>,
) -> Result<Vgg16Record<B>, RecorderError> {
    let load_args = LoadArgs::new(torch_weights.as_ref().into())
        .with_key_remap("features\\.0\\.(.+)", "conv1_1.$1")
        .with_key_remap("features\\.2\\.(.+)", "conv1_2.$1")
        .with_key_remap("features\\.5\\.(.+)", "conv2_1.$1")
        .with_key_remap("features\\.7\\.(.+)", "conv2_2.$1")
        .with_key_remap("features\\.10\\.(.+)", "conv3_1.$1")
        .with_key_remap("features\\.12\\.(.+)", "conv3_2.$1")
        .with_key_remap("features\\.14\\.(.+)", "conv3_3.$1")
        .with_key_remap("features\\.17\\.(.+)", "conv4_1.$1")
        .with_key_remap("features\\.19\\.(.+)", "conv4_2.$1")
        .with_key_remap("features\\.21\\.(.+)", "conv4_3.$1")
        .with_key_remap("features\\.24\\.(.+)", "conv5_1.$1")
        .with_key_remap("features\\.26\\.(.+)", "conv5_2.$1")
        .with_key_remap("features\\.28\\.(.+)", "conv5_3.$1")
        .with_key_remap("classifier\\.0\\.(.+)", "fc6.$1")
        .with_key_remap("classifier\\.3\\.(.+)", "fc7.$1")
        .with_key_remap("classifier\\.6\\.(.+)", "fc8.$1");
    let record = PyTorchFileRecorder::<FullPrecisionSettings>::new().load(load_args, device)?;

    Ok(record)
}
