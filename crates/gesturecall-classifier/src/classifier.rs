use std::sync::Arc;

use gesturecall_core::{ClassifierConfig, GestureLabel, LandmarkFrame, ModelError, Vocabulary};
use tracing::debug;

use crate::features::FeatureVector;
use crate::model::GestureModel;

// MARK: - GestureClassifier

/// Stateless per-frame classifier.
///
/// Holds only the loaded model and its configuration; every frame is
/// classified independently.
pub struct GestureClassifier {
    config: Arc<ClassifierConfig>,
    model: Option<Arc<dyn GestureModel>>,
}

/// Outcome of [`GestureClassifier::begin`].
pub enum Classification {
    /// Decided without inference (no hands in frame).
    Immediate(GestureLabel),
    /// Inference required; run the job to obtain the label.
    Pending(InferenceJob),
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config: Arc::new(config), model: None }
    }

    pub fn with_model(config: ClassifierConfig, model: Arc<dyn GestureModel>) -> Self {
        Self { config: Arc::new(config), model: Some(model) }
    }

    pub fn set_model(&mut self, model: Arc<dyn GestureModel>) {
        self.model = Some(model);
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Start classifying `frame`.
    ///
    /// Returns `None` while the model is still loading: the frame is
    /// dropped without error.
    pub fn begin(&self, frame: &LandmarkFrame) -> Option<Classification> {
        let model = self.model.as_ref()?;
        let features = FeatureVector::from_frame(frame);
        if features.is_all_zero() {
            return Some(Classification::Immediate(GestureLabel::NoGesture));
        }
        Some(Classification::Pending(InferenceJob {
            model: Arc::clone(model),
            features,
            config: Arc::clone(&self.config),
        }))
    }

    /// Classify `frame` to completion. `None` while the model is loading.
    pub async fn classify(&self, frame: &LandmarkFrame) -> Option<Result<GestureLabel, ModelError>> {
        match self.begin(frame)? {
            Classification::Immediate(label) => Some(Ok(label)),
            Classification::Pending(job) => Some(job.run().await),
        }
    }
}

// MARK: - InferenceJob

/// Owned inference request, safe to move into a spawned task.
pub struct InferenceJob {
    model: Arc<dyn GestureModel>,
    features: FeatureVector,
    config: Arc<ClassifierConfig>,
}

impl InferenceJob {
    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    pub async fn run(self) -> Result<GestureLabel, ModelError> {
        let probabilities = self.model.predict(&self.features).await?;
        select_label(&probabilities, &self.config.labels, self.config.confidence_threshold)
    }
}

// MARK: - Label selection

/// Pick the arg-max label if its probability reaches `threshold`.
///
/// The comparison is inclusive: a peak of exactly `threshold` is accepted.
/// Non-finite entries never win; a distribution without any finite value
/// yields [`GestureLabel::NoGesture`].
pub fn select_label(
    probabilities: &[f32],
    labels: &Vocabulary,
    threshold: f32,
) -> Result<GestureLabel, ModelError> {
    if probabilities.len() != labels.len() {
        return Err(ModelError::OutputShape {
            expected: labels.len(),
            actual: probabilities.len(),
        });
    }

    let peak = probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (i, p)| match best {
            Some((_, bp)) if bp >= p => best,
            _ => Some((i, p)),
        });

    let Some((index, confidence)) = peak else {
        debug!("No finite probability in model output");
        return Ok(GestureLabel::NoGesture);
    };

    if confidence >= threshold {
        // index < labels.len() by the length check above
        Ok(labels.label(index).unwrap_or_default())
    } else {
        debug!("Peak {:.3} at #{} below threshold {:.2}", confidence, index, threshold);
        Ok(GestureLabel::NoGesture)
    }
}
