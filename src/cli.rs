use crate::backend::DeviceTarget;
use crate::error::Error;
use std::ffi::OsStr;
use std::path::PathBuf;

const HELP: &str = "\
burn-lenet
Trains LeNet-5 on MNIST, reports test accuracy and reruns the newest
checkpoint on a single sample.

USAGE:
  burn-lenet [OPTIONS]

FLAGS:
  -h, --help                Prints help information

OPTIONS:
  --device-target TARGET    Backend to run on: cpu, wgpu or cuda [default: cpu]
  --data-path PATH          MNIST root holding the train/ and test/ splits
                            [default: ./datasets/MNIST_Data]
  --artifact-dir PATH       Where checkpoints and the run config land
                            [default: /tmp/burn-lenet]
  --batch-size N            Samples per training batch [default: 32]
  --num-epochs N            Passes over the training split [default: 1]
  --learning-rate LR        SGD learning rate [default: 0.01]
  --momentum M              SGD momentum [default: 0.9]
  --save-every N            Steps between checkpoints, 0 disables [default: 1875]
  --keep-max N              Checkpoint files kept on disk [default: 10]
  --shuffle-buffer N        Shuffle buffer capacity [default: 10000]
  --num-workers N           Dataloader workers [default: 1]
  --seed SEED               Run seed [default: 42]
";

#[derive(Debug)]
pub struct AppArgs {
    pub device_target: DeviceTarget,
    pub data_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub batch_size: usize,
    pub num_epochs: usize,
    pub learning_rate: f64,
    pub momentum: f64,
    pub save_every: usize,
    pub keep_max: usize,
    pub shuffle_buffer: usize,
    pub num_workers: usize,
    pub seed: u64,
}

/// Parses the process arguments. Prints help and exits when asked to.
pub fn parse() -> Result<AppArgs, Error> {
    let mut pargs = pico_args::Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }
    from_args(pargs)
}

fn from_args(mut pargs: pico_args::Arguments) -> Result<AppArgs, Error> {
    let args = AppArgs {
        device_target: pargs
            .opt_value_from_str("--device-target")?
            .unwrap_or_default(),
        data_path: pargs
            .opt_value_from_os_str("--data-path", parse_path)?
            .unwrap_or_else(|| PathBuf::from("./datasets/MNIST_Data")),
        artifact_dir: pargs
            .opt_value_from_os_str("--artifact-dir", parse_path)?
            .unwrap_or_else(|| PathBuf::from("/tmp/burn-lenet")),
        batch_size: pargs.opt_value_from_str("--batch-size")?.unwrap_or(32),
        num_epochs: pargs.opt_value_from_str("--num-epochs")?.unwrap_or(1),
        learning_rate: pargs.opt_value_from_str("--learning-rate")?.unwrap_or(1e-2),
        momentum: pargs.opt_value_from_str("--momentum")?.unwrap_or(0.9),
        save_every: pargs.opt_value_from_str("--save-every")?.unwrap_or(1875),
        keep_max: pargs.opt_value_from_str("--keep-max")?.unwrap_or(10),
        shuffle_buffer: pargs
            .opt_value_from_str("--shuffle-buffer")?
            .unwrap_or(10_000),
        num_workers: pargs.opt_value_from_str("--num-workers")?.unwrap_or(1),
        seed: pargs.opt_value_from_str("--seed")?.unwrap_or(42),
    };

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        return Err(Error::Config(format!(
            "unrecognized arguments: {remaining:?}"
        )));
    }
    args.validate()?;
    Ok(args)
}

impl AppArgs {
    fn validate(&self) -> Result<(), Error> {
        positive(self.batch_size, "--batch-size")?;
        positive(self.num_epochs, "--num-epochs")?;
        positive(self.keep_max, "--keep-max")?;
        positive(self.num_workers, "--num-workers")?;
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::Config(format!(
                "--learning-rate must be finite and positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.momentum.is_finite() && self.momentum >= 0.0) {
            return Err(Error::Config(format!(
                "--momentum must be finite and non-negative, got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

fn positive(value: usize, option: &str) -> Result<(), Error> {
    if value == 0 {
        return Err(Error::Config(format!("{option} must be at least 1")));
    }
    Ok(())
}

fn parse_path(s: &OsStr) -> Result<PathBuf, &'static str> {
    Ok(s.into())
}
