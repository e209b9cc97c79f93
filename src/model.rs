use crate::data::RESIZED;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::loss::CrossEntropyLossConfig;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig, Relu};
use burn::prelude::*;
use burn::train::ClassificationOutput;
use thiserror::Error;

/// A loaded record carries a tensor whose shape the model cannot accept.
#[derive(Error, Debug)]
#[error("checkpoint field `{name}` has shape {found:?}, expected {expected:?}")]
pub struct ShapeMismatch {
    pub name: &'static str,
    pub expected: Vec<usize>,
    pub found: Vec<usize>,
}

/// [LeNet-5](https://en.wikipedia.org/wiki/LeNet) sized for MNIST.
#[derive(Config, Debug)]
pub struct LeNet5Config {
    /// Number of output classes.
    #[config(default = 10)]
    pub num_classes: usize,
    /// Channels in the input images.
    #[config(default = 1)]
    pub num_channels: usize,
    /// Std-dev of the normal init on the fully connected weights.
    #[config(default = 0.02)]
    pub fc_std: f64,
}

impl LeNet5Config {
    /// Initializes LeNet-5 with freshly sampled weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> LeNet5<B> {
        let initializer = Initializer::Normal {
            mean: 0.0,
            std: self.fc_std,
        };
        LeNet5 {
            conv1: Conv2dConfig::new([self.num_channels, 6], [5, 5]).init(device),
            conv2: Conv2dConfig::new([6, 16], [5, 5]).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(16 * 5 * 5, 120)
                .with_initializer(initializer.clone())
                .init(device),
            fc2: LinearConfig::new(120, 84)
                .with_initializer(initializer.clone())
                .init(device),
            fc3: LinearConfig::new(84, self.num_classes)
                .with_initializer(initializer)
                .init(device),
            activation: Relu::new(),
        }
    }

    /// Checks a loaded record against the shapes this config would build.
    ///
    /// The recorder restores whatever tensors the file holds, so a
    /// checkpoint from a differently sized model goes unnoticed until
    /// the first forward pass. Catch it here instead.
    pub fn validate_record<B: Backend>(
        &self,
        record: &LeNet5Record<B>,
    ) -> Result<(), ShapeMismatch> {
        check(
            "conv1.weight",
            &[6, self.num_channels, 5, 5],
            &record.conv1.weight.dims(),
        )?;
        check("conv2.weight", &[16, 6, 5, 5], &record.conv2.weight.dims())?;
        check("fc1.weight", &[400, 120], &record.fc1.weight.dims())?;
        check("fc2.weight", &[120, 84], &record.fc2.weight.dims())?;
        check(
            "fc3.weight",
            &[84, self.num_classes],
            &record.fc3.weight.dims(),
        )?;
        if let Some(bias) = &record.fc3.bias {
            check("fc3.bias", &[self.num_classes], &bias.dims())?;
        }
        Ok(())
    }
}

fn check(name: &'static str, expected: &[usize], found: &[usize]) -> Result<(), ShapeMismatch> {
    if expected != found {
        return Err(ShapeMismatch {
            name,
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Two valid-padded conv blocks followed by three fully connected layers.
#[derive(Module, Debug)]
pub struct LeNet5<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub pool: MaxPool2d,
    pub fc1: Linear<B>,
    pub fc2: Linear<B>,
    pub fc3: Linear<B>,
    pub activation: Relu,
}

impl<B: Backend> std::fmt::Debug for LeNet5Record<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeNet5Record").finish_non_exhaustive()
    }
}

impl<B: Backend> LeNet5<B> {
    /// # Shapes
    ///   - images [batch_size, num_channels, RESIZED, RESIZED]
    ///   - output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [_batch_size, _, height, width] = images.dims();
        debug_assert_eq!([height, width], [RESIZED, RESIZED]);

        let x = self
            .pool
            .forward(self.activation.forward(self.conv1.forward(images)));
        let x = self
            .pool
            .forward(self.activation.forward(self.conv2.forward(x)));
        // [batch_size, 16, 5, 5] -> [batch_size, 400]
        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.activation.forward(self.fc1.forward(x));
        let x = self.activation.forward(self.fc2.forward(x));
        self.fc3.forward(x)
    }

    /// Forward pass plus the cross-entropy loss against `targets`.
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}
