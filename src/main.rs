use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use burn_lenet::backend::DeviceTarget;
use burn_lenet::checkpoint::CheckpointConfig;
use burn_lenet::cli::{self, AppArgs};
use burn_lenet::data::{self, LoaderConfig, Split};
use burn_lenet::error::Error;
use burn_lenet::model::LeNet5Config;
use burn_lenet::training::{self, TrainingConfig, optimizer_config};
use burn_lenet::{evaluation, inference};

fn main() {
    env_logger::init();

    let args = match cli::parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("run with --help for usage");
            std::process::exit(2);
        }
    };
    if let Err(err) = run(&args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(args: &AppArgs) -> Result<(), Error> {
    log::info!("device target: {}", args.device_target.as_str());
    match args.device_target {
        DeviceTarget::Cpu => launch_cpu(args),
        DeviceTarget::Wgpu => launch_wgpu(args),
        DeviceTarget::Cuda => launch_cuda(args),
    }
}

#[cfg(feature = "ndarray")]
fn launch_cpu(args: &AppArgs) -> Result<(), Error> {
    launch::<burn::backend::Autodiff<burn::backend::NdArray>>(args)
}

#[cfg(not(feature = "ndarray"))]
fn launch_cpu(_args: &AppArgs) -> Result<(), Error> {
    Err(Error::Config(
        "device target `cpu` needs this binary built with the `ndarray` feature".into(),
    ))
}

#[cfg(feature = "wgpu")]
fn launch_wgpu(args: &AppArgs) -> Result<(), Error> {
    launch::<burn::backend::Autodiff<burn::backend::Wgpu>>(args)
}

#[cfg(not(feature = "wgpu"))]
fn launch_wgpu(_args: &AppArgs) -> Result<(), Error> {
    Err(Error::Config(
        "device target `wgpu` needs this binary built with the `wgpu` feature".into(),
    ))
}

#[cfg(feature = "cuda")]
fn launch_cuda(args: &AppArgs) -> Result<(), Error> {
    launch::<burn::backend::Autodiff<burn::backend::Cuda>>(args)
}

#[cfg(not(feature = "cuda"))]
fn launch_cuda(_args: &AppArgs) -> Result<(), Error> {
    Err(Error::Config(
        "device target `cuda` needs this binary built with the `cuda` feature".into(),
    ))
}

/// Trains, evaluates on the test split, then reloads the newest
/// checkpoint for a single-sample prediction.
fn launch<B>(args: &AppArgs) -> Result<(), Error>
where
    B: AutodiffBackend,
    B::Device: Default,
{
    let config = TrainingConfig::new(
        LeNet5Config::new(),
        optimizer_config(args.momentum),
        CheckpointConfig::new()
            .with_save_every(args.save_every)
            .with_keep_max(args.keep_max),
        LoaderConfig::new()
            .with_batch_size(args.batch_size)
            .with_shuffle_buffer(args.shuffle_buffer)
            .with_num_workers(args.num_workers),
    )
    .with_num_epochs(args.num_epochs)
    .with_learning_rate(args.learning_rate)
    .with_seed(args.seed);

    let device = B::Device::default();
    let run = training::train::<B>(&args.artifact_dir, &args.data_path, config, device.clone())?;

    let model = run.model.valid();
    let loader = data::batches::<B::InnerBackend>(
        &args.data_path,
        Split::Test,
        &LoaderConfig::new()
            .with_batch_size(args.batch_size)
            .with_num_workers(args.num_workers),
        None,
    )?;
    let accuracy = evaluation::evaluate(&model, &loader)?;
    println!("Accuracy: {accuracy}");

    match run.last_checkpoint {
        Some(checkpoint) => {
            let prediction = inference::infer::<B::InnerBackend>(
                &checkpoint,
                &LeNet5Config::new(),
                &args.data_path,
                &device,
            )?;
            println!(
                "Predicted: \"{}\", Actual: \"{}\"",
                prediction.predicted, prediction.actual
            );
        }
        None => log::warn!("no checkpoint was written, skipping the reload run"),
    }
    Ok(())
}
