use crate::data::{DataError, Dataloader};
use crate::model::LeNet5;
use burn::prelude::*;
use burn::tensor::ElementConversion;

/// Fraction of samples whose top logit matches the label.
///
/// Walks the whole stream once. An empty stream is an error rather
/// than a quiet division by zero.
pub fn evaluate<B: Backend>(model: &LeNet5<B>, loader: &Dataloader<B>) -> Result<f64, DataError> {
    let mut correct = 0i64;
    let mut total = 0usize;

    for batch in loader.iter() {
        let [batch_size] = batch.targets.dims();
        let predictions = model.forward(batch.images).argmax(1).reshape([batch_size]);
        correct += predictions
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        total += batch_size;
    }

    if total == 0 {
        return Err(DataError::NoBatches);
    }
    Ok(correct as f64 / total as f64)
}
