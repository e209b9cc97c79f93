pub mod batcher;
pub mod mnist;
pub mod shuffle;

pub use batcher::{MnistBatch, MnistBatcher, RESIZED};
pub use mnist::{MnistDataset, MnistItem, Split};
pub use shuffle::ShuffleBufferDataset;

use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::{Dataset, transform::PartialDataset};
use burn::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Missing or corrupt dataset input. Always fatal to the running phase.
#[derive(Error, Debug)]
pub enum DataError {
    /// A dataset file could not be read.
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The split directory does not exist.
    #[error("`{0}` is not a directory, expected an MNIST split directory")]
    MissingSplit(PathBuf),

    #[error("`{path}` starts with magic number {found}, expected {expected}")]
    BadMagic {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("`{path}` holds {found} data bytes, expected {expected}")]
    UnexpectedLength {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("`{path}` holds {rows}x{cols} images, expected {}x{}", mnist::HEIGHT, mnist::WIDTH)]
    BadDimensions {
        path: PathBuf,
        rows: usize,
        cols: usize,
    },

    #[error("image/label count mismatch under `{dir}`: {images} images, {labels} labels")]
    CountMismatch {
        dir: PathBuf,
        images: usize,
        labels: usize,
    },

    /// The split decoded fine but produced nothing to consume.
    #[error("the split yielded no batches")]
    NoBatches,
}

/// Knobs for turning a split into a batch stream.
#[derive(Config, Debug)]
pub struct LoaderConfig {
    /// Samples per batch.
    #[config(default = 32)]
    pub batch_size: usize,
    /// Capacity of the bounded shuffle buffer.
    #[config(default = 10_000)]
    pub shuffle_buffer: usize,
    /// Drop a trailing batch that would come up short.
    #[config(default = true)]
    pub drop_remainder: bool,
    /// Worker-count hint forwarded to the dataloader.
    #[config(default = 1)]
    pub num_workers: usize,
}

pub type Dataloader<B> = Arc<dyn DataLoader<B, MnistBatch<B>> + 'static>;

/// Builds the batch stream for one split.
///
/// `shuffle_seed` switches the bounded-buffer shuffle on; pass `None`
/// to keep the on-disk order (evaluation, inference). The stream is
/// lazy and restartable: every `iter()` walks the same order.
pub fn batches<B: Backend>(
    root: &Path,
    split: Split,
    config: &LoaderConfig,
    shuffle_seed: Option<u64>,
) -> Result<Dataloader<B>, DataError> {
    let dataset = MnistDataset::new(root, split)?;
    let loader = match shuffle_seed {
        Some(seed) => build::<B, _>(
            ShuffleBufferDataset::with_seed(dataset, config.shuffle_buffer, seed),
            config,
        ),
        None => build::<B, _>(dataset, config),
    };
    Ok(loader)
}

fn build<B: Backend, D>(dataset: D, config: &LoaderConfig) -> Dataloader<B>
where
    D: Dataset<MnistItem> + 'static,
{
    debug_assert!(config.batch_size > 0);
    let len = dataset.len();
    let limit = if config.drop_remainder {
        len - len % config.batch_size
    } else {
        len
    };
    let dataset = PartialDataset::new(dataset, 0, limit);

    DataLoaderBuilder::new(MnistBatcher::default())
        .batch_size(config.batch_size)
        .num_workers(config.num_workers)
        .build(dataset)
}
