use crate::data::mnist::{HEIGHT, MnistItem, WIDTH};
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};

/// Side length the images are resized to before entering the network.
pub const RESIZED: usize = 32;

/// The input range is scaled down to [0, 1] first.
const SCALE: f32 = 1.0 / 255.0;
/// Dataset brightness statistics, from the PyTorch MNIST example
/// https://github.com/pytorch/examples/blob/54f4572509891883a947411fd7239237dd2a39c3/mnist/main.py#L122
const MEAN: f32 = 0.1307;
const STD: f32 = 0.3081;

#[derive(Clone, Default)]
pub struct MnistBatcher {}

#[derive(Clone, Debug)]
pub struct MnistBatch<B: Backend> {
    /// The input feature is the brightness, z-score normalized
    /// (mean=0.0, stddev=1.0) after the resize.
    ///
    /// The mappings are:
    ///
    /// * `z = (value / 255 - mean) / stddev`,
    /// * `value = (z * stddev + mean) * 255`.
    ///
    /// # Shape
    /// [batch_size, 1, RESIZED, RESIZED]
    pub images: Tensor<B, 4>,
    /// # Shape
    /// [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<B, MnistItem, MnistBatch<B>> for MnistBatcher {
    fn batch(&self, items: Vec<MnistItem>, device: &B::Device) -> MnistBatch<B> {
        let (items_image, items_label): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (item.image, item.label))
            .unzip();

        let images = items_image
            .into_iter()
            .map(|image: Vec<f32>| {
                TensorData::new(image, [HEIGHT, WIDTH, 1]).convert::<B::FloatElem>()
            })
            .map(|data| Tensor::<B, 3>::from_data(data, device))
            // [H, W, C] -> [C, H, W]
            .map(|tensor| tensor.swap_dims(2, 1).swap_dims(1, 0))
            .collect();
        let images = Tensor::stack(images, 0);

        let images = interpolate(
            images,
            [RESIZED, RESIZED],
            InterpolateOptions::new(InterpolateMode::Bilinear),
        );
        let images = images * SCALE;
        let images = (images - MEAN) / STD;

        let targets = items_label
            .into_iter()
            .map(|label: u8| {
                Tensor::<B, 1, Int>::from_data([(label as i64).elem::<B::IntElem>()], device)
            })
            .collect();
        let targets = Tensor::cat(targets, 0);

        MnistBatch { images, targets }
    }
}
