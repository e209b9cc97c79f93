use crate::model::{LeNet5, LeNet5Record, ShapeMismatch};
use burn::prelude::*;
use burn::record::{
    FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder, Recorder, RecorderError,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Named-field MessagePack files, full f32 precision.
type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Filesystem trouble while pruning stale checkpoints.
    #[error("checkpoint io failed at `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The recorder could not encode or decode a checkpoint file.
    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Shape(#[from] ShapeMismatch),
}

/// Cadence and retention of checkpoint files.
#[derive(Config, Debug)]
pub struct CheckpointConfig {
    /// Leading component of every checkpoint file name.
    #[config(default = "String::from(\"checkpoint_lenet\")")]
    pub prefix: String,
    /// Global-step interval between saves. Zero disables checkpointing.
    #[config(default = 1875)]
    pub save_every: usize,
    /// Upper bound on checkpoint files kept on disk.
    #[config(default = 10)]
    pub keep_max: usize,
}

/// Writes `<prefix>-<epoch>_<step>` checkpoint files into one directory
/// and deletes the oldest once more than `keep_max` exist.
///
/// Only files written through this value are tracked; checkpoints left
/// over from an earlier run never count toward the retention bound.
pub struct Checkpointer {
    directory: PathBuf,
    prefix: String,
    keep_max: usize,
    saved: VecDeque<PathBuf>,
}

impl Checkpointer {
    pub fn new(directory: impl Into<PathBuf>, config: &CheckpointConfig) -> Self {
        Self {
            directory: directory.into(),
            prefix: config.prefix.clone(),
            // floor at one so the newest file always survives pruning
            keep_max: config.keep_max.max(1),
            saved: VecDeque::new(),
        }
    }

    /// Persists the model under the next numbered name and prunes.
    ///
    /// Returns the path of the file just written.
    pub fn save<B: Backend>(
        &mut self,
        epoch: usize,
        step: usize,
        model: &LeNet5<B>,
    ) -> Result<PathBuf, CheckpointError> {
        let stem = self.directory.join(format!("{}-{epoch}_{step}", self.prefix));
        let path =
            stem.with_added_extension(<CheckpointRecorder as FileRecorder<B>>::file_extension());

        model.clone().save_file(stem, &CheckpointRecorder::new())?; // ext added automatically
        self.saved.push_back(path.clone());

        while self.saved.len() > self.keep_max {
            if let Some(stale) = self.saved.pop_front() {
                std::fs::remove_file(&stale)
                    .map_err(|source| CheckpointError::Io { path: stale, source })?;
            }
        }
        Ok(path)
    }

    /// Path of the newest surviving checkpoint, if any save happened.
    pub fn latest(&self) -> Option<&Path> {
        self.saved.back().map(PathBuf::as_path)
    }
}

/// Reads a checkpoint record back. The caller picks the target device
/// and is expected to shape-check the record before loading it.
///
/// Accepts the path with or without the recorder extension.
pub fn load<B: Backend>(
    path: &Path,
    device: &B::Device,
) -> Result<LeNet5Record<B>, CheckpointError> {
    let extension = <CheckpointRecorder as FileRecorder<B>>::file_extension();
    // The recorder appends its own extension, so hand it the bare stem.
    let stem = match path.extension() {
        Some(found) if found == extension => path.with_extension(""),
        _ => path.to_path_buf(),
    };
    let record = CheckpointRecorder::new().load(stem, device)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RESIZED;
    use crate::model::LeNet5Config;
    use temp_dir::TempDir;

    type TestBackend = burn::backend::NdArray;

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn names_checkpoints_after_epoch_and_step() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let model = LeNet5Config::new().init::<TestBackend>(&device);
        let mut checkpointer = Checkpointer::new(dir.path(), &CheckpointConfig::new());

        let path = checkpointer.save(1, 1875, &model).unwrap();

        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("checkpoint_lenet-1_1875.mpk")
        );
        assert!(path.is_file());
        assert_eq!(checkpointer.latest(), Some(path.as_path()));
    }

    #[test]
    fn prunes_the_oldest_beyond_keep_max() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let model = LeNet5Config::new().init::<TestBackend>(&device);
        let config = CheckpointConfig::new().with_keep_max(3);
        let mut checkpointer = Checkpointer::new(dir.path(), &config);

        for step in 1..=5 {
            checkpointer.save(1, step, &model).unwrap();
        }

        assert_eq!(
            listing(dir.path()),
            vec![
                "checkpoint_lenet-1_3.mpk",
                "checkpoint_lenet-1_4.mpk",
                "checkpoint_lenet-1_5.mpk",
            ]
        );
        assert_eq!(
            checkpointer.latest().and_then(|path| path.file_name()),
            Some("checkpoint_lenet-1_5.mpk".as_ref())
        );
    }

    #[test]
    fn loads_what_it_saved() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();
        let model = LeNet5Config::new().init::<TestBackend>(&device);
        let mut checkpointer = Checkpointer::new(dir.path(), &CheckpointConfig::new());
        let path = checkpointer.save(1, 1, &model).unwrap();

        let images = Tensor::<TestBackend, 4>::ones([1, 1, RESIZED, RESIZED], &device);
        let expected = model
            .forward(images.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        let record = load::<TestBackend>(&path, &device).unwrap();
        let restored = LeNet5Config::new()
            .init::<TestBackend>(&device)
            .load_record(record);
        let found = restored.forward(images).into_data().to_vec::<f32>().unwrap();

        assert_eq!(expected, found);
    }

    #[test]
    fn load_reports_a_missing_file() {
        let dir = TempDir::new().unwrap();
        let device = Default::default();

        let err = load::<TestBackend>(&dir.path().join("nope.mpk"), &device).unwrap_err();
        assert!(matches!(err, CheckpointError::Recorder(_)));
    }
}
