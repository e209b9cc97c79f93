use crate::checkpoint::{self, CheckpointError};
use crate::data::{self, DataError, LoaderConfig, Split};
use crate::error::Error;
use crate::model::LeNet5Config;
use burn::prelude::*;
use burn::tensor::ElementConversion;
use std::path::Path;

/// Predicted class next to the ground-truth label for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub predicted: i64,
    pub actual: i64,
}

/// Restores the model described by `model_config` from `checkpoint` and
/// classifies the first sample of the test split.
///
/// The record is shape-checked before it touches the model, so a
/// checkpoint from a differently sized network fails here instead of
/// deep inside a forward pass.
pub fn infer<B: Backend>(
    checkpoint: &Path,
    model_config: &LeNet5Config,
    data_dir: &Path,
    device: &B::Device,
) -> Result<Prediction, Error> {
    let record = checkpoint::load::<B>(checkpoint, device)?;
    model_config
        .validate_record(&record)
        .map_err(CheckpointError::from)?;
    let model = model_config.init::<B>(device).load_record(record);

    let loader = data::batches::<B>(
        data_dir,
        Split::Test,
        &LoaderConfig::new()
            .with_batch_size(1)
            .with_drop_remainder(false),
        None,
    )?;
    let batch = loader.iter().next().ok_or(DataError::NoBatches)?;

    let actual = batch.targets.into_scalar().elem::<i64>();
    let predicted = model
        .forward(batch.images)
        .argmax(1)
        .flatten::<1>(0, 1)
        .into_scalar()
        .elem::<i64>();

    Ok(Prediction { predicted, actual })
}
