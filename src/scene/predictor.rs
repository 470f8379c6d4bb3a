use crate::image::ImageTensor;
use crate::models::SceneModel;
use crate::scene::{ClassLabel, RankedPrediction};
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::ArrayD;
use std::cmp::Ordering;

/// Raw per-class model output, index-aligned with [`ClassLabel::ALL`].
///
/// Values are whatever the final layer produced. They are not guaranteed to
/// sum to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionVector([f32; ClassLabel::COUNT]);

impl PredictionVector {
    /// Accepts any shape that squeezes to `[6]`, typically `[1, 6]`. Any
    /// other width is a mismatch between the model and the label set.
    pub fn from_output(output: ArrayD<f32>) -> Result<Self> {
        let dims: Vec<usize> = output.shape().iter().copied().filter(|&d| d != 1).collect();
        let actual = match dims.as_slice() {
            [n] => *n,
            _ if output.len() != ClassLabel::COUNT => output.len(),
            _ => {
                return Err(ClassifyError::UnknownInference(format!(
                    "unexpected output shape {:?}",
                    output.shape()
                )))
            }
        };

        if actual != ClassLabel::COUNT {
            return Err(ClassifyError::LabelMismatch {
                expected: ClassLabel::COUNT,
                actual,
            });
        }

        let values: Vec<f32> = output.iter().copied().collect();
        Self::from_slice(&values)
    }

    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let values: [f32; ClassLabel::COUNT] =
            values.try_into().map_err(|_| ClassifyError::LabelMismatch {
                expected: ClassLabel::COUNT,
                actual: values.len(),
            })?;

        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ClassifyError::UnknownInference(format!(
                "model produced non-finite score {} for '{}'",
                values[i],
                ClassLabel::ALL[i]
            )));
        }

        Ok(Self(values))
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, label: ClassLabel) -> f32 {
        self.0[label.index()]
    }

    /// Highest scoring class and its raw score. The first maximum wins.
    ///
    /// Uses the same total order as [`PredictionVector::ranked`], so the
    /// result is always the first ranked entry (`0.0` outranks `-0.0`).
    pub fn best(&self) -> (ClassLabel, f32) {
        let mut best = 0;
        for (i, value) in self.0.iter().enumerate().skip(1) {
            if value.total_cmp(&self.0[best]) == Ordering::Greater {
                best = i;
            }
        }
        (ClassLabel::ALL[best], self.0[best])
    }

    /// Every class as a percentage, highest first. Equal scores keep class
    /// order.
    pub fn ranked(&self) -> Vec<RankedPrediction> {
        let mut ranked: Vec<RankedPrediction> = ClassLabel::ALL
            .iter()
            .zip(self.0.iter())
            .map(|(&label, &value)| RankedPrediction {
                label,
                confidence: value * 100.0,
            })
            .collect();

        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked
    }
}

pub struct Predictor;

impl Predictor {
    pub fn predict(model: &dyn SceneModel, tensor: &ImageTensor) -> Result<PredictionVector> {
        let output = model.run(tensor)?;
        tracing::debug!("Model output shape: {:?}", output.shape());
        PredictionVector::from_output(output)
    }
}
