use crate::checkpoint::{CheckpointConfig, Checkpointer};
use crate::data::{self, LoaderConfig, Split};
use crate::error::Error;
use crate::model::{LeNet5, LeNet5Config};
use burn::optim::momentum::MomentumConfig;
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::prelude::*;
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use std::path::{Path, PathBuf};

/// Everything one training run needs, bundled so it can be saved as
/// json next to the checkpoints it produced.
#[derive(Config)]
pub struct TrainingConfig {
    pub model: LeNet5Config,
    pub optimizer: SgdConfig,
    pub checkpoint: CheckpointConfig,
    pub loader: LoaderConfig,
    /// Full passes over the training split.
    #[config(default = 1)]
    pub num_epochs: usize,
    #[config(default = 1e-2)]
    pub learning_rate: f64,
    /// Steps between loss lines on stdout. Zero silences them.
    #[config(default = 125)]
    pub log_interval: usize,
    #[config(default = 42)]
    pub seed: u64,
}

/// SGD with classic, non-dampened momentum.
pub fn optimizer_config(momentum: f64) -> SgdConfig {
    SgdConfig::new().with_momentum(Some(
        MomentumConfig::new()
            .with_momentum(momentum)
            .with_dampening(0.0),
    ))
}

/// Outcome of [`train`].
#[derive(Debug)]
pub struct TrainingRun<B: AutodiffBackend> {
    /// Model after the final optimizer step.
    pub model: LeNet5<B>,
    /// Newest checkpoint on disk, `None` when checkpointing was off.
    pub last_checkpoint: Option<PathBuf>,
    /// Batch loss of every step, in step order across all epochs.
    pub losses: Vec<f32>,
}

/// Runs the training phase end to end: seeds the backend, walks the
/// epochs batch by batch, prints the periodic loss lines and writes
/// numbered checkpoints into `artifact_dir`.
///
/// Loss lines report the step within the running epoch; the checkpoint
/// cadence counts steps across the whole run.
pub fn train<B: AutodiffBackend>(
    artifact_dir: &Path,
    data_dir: &Path,
    config: TrainingConfig,
    device: B::Device,
) -> Result<TrainingRun<B>, Error> {
    std::fs::create_dir_all(artifact_dir).map_err(|err| {
        Error::Config(format!("cannot create `{}`: {err}", artifact_dir.display()))
    })?;
    config
        .save(artifact_dir.join("config.json"))
        .map_err(|err| Error::Config(format!("cannot save the run config: {err}")))?;

    B::seed(config.seed);
    let mut model = config.model.init::<B>(&device);
    let mut optimizer = config.optimizer.init::<B, LeNet5<B>>();
    let mut checkpointer = Checkpointer::new(artifact_dir, &config.checkpoint);
    let mut losses = Vec::new();
    let mut global_step = 0usize;

    for epoch in 1..=config.num_epochs {
        // Fresh shuffle order per epoch, derived from the run seed.
        let loader = data::batches::<B>(
            data_dir,
            Split::Train,
            &config.loader,
            Some(config.seed.wrapping_add(epoch as u64)),
        )?;

        for (iteration, batch) in loader.iter().enumerate() {
            let step = iteration + 1;
            global_step += 1;

            let output = model.forward_classification(batch.images, batch.targets);
            let gradients = GradientsParams::from_grads(output.loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, gradients);

            let loss = output.loss.into_scalar().elem::<f32>();
            losses.push(loss);
            if config.log_interval != 0 && step % config.log_interval == 0 {
                println!("epoch: {epoch} step: {step}, loss is {loss}");
            }
            if config.checkpoint.save_every != 0
                && global_step % config.checkpoint.save_every == 0
            {
                let path = checkpointer.save(epoch, step, &model)?;
                log::info!("saved checkpoint {}", path.display());
            }
        }
    }

    Ok(TrainingRun {
        model,
        last_checkpoint: checkpointer.latest().map(Path::to_path_buf),
        losses,
    })
}
