//! Recorded detector sessions.
//!
//! One JSON object per line:
//!
//! ```json
//! {"tMs": 0, "multiHandLandmarks": [[{"x":0.1,"y":0.2,"z":0.0}, ...]], "probabilities": [...]}
//! ```
//!
//! `tMs` is the offset from the start of the recording. `probabilities` is
//! what the model produced for that frame; frames without them either carry
//! no hands or fail inference on replay.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use gesturecall_classifier::{FeatureVector, GestureModel, ModelLoader};
use gesturecall_core::{LandmarkFrame, ModelError};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRecord {
    #[serde(rename = "tMs", alias = "t_ms", default)]
    pub t_ms: u64,
    #[serde(flatten)]
    pub frame: LandmarkFrame,
    #[serde(default)]
    pub probabilities: Option<Vec<f32>>,
}

/// Parse a JSON-lines recording. Blank lines and `#` comments are skipped.
pub fn parse(text: &str) -> Result<Vec<ReplayRecord>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("replay line {}", i + 1))
        })
        .collect()
}

// MARK: - RecordedModel

/// Model that answers with the probabilities recorded for an identical
/// feature vector.
#[derive(Debug, Default)]
pub struct RecordedModel {
    outputs: HashMap<Vec<u32>, Vec<f32>>,
}

impl RecordedModel {
    pub fn from_records(records: &[ReplayRecord]) -> Self {
        let outputs = records
            .iter()
            .filter_map(|r| {
                let probs = r.probabilities.clone()?;
                Some((key(&FeatureVector::from_frame(&r.frame)), probs))
            })
            .collect();
        Self { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }
}

fn key(features: &FeatureVector) -> Vec<u32> {
    features.as_slice().iter().map(|v| v.to_bits()).collect()
}

#[async_trait]
impl GestureModel for RecordedModel {
    async fn predict(&self, features: &FeatureVector) -> Result<Vec<f32>, ModelError> {
        self.outputs
            .get(&key(features))
            .cloned()
            .ok_or_else(|| ModelError::InferenceFailed {
                reason: "no recorded output for this frame".into(),
            })
    }
}

pub struct RecordedModelLoader {
    model: Arc<RecordedModel>,
}

impl RecordedModelLoader {
    pub fn new(model: RecordedModel) -> Self {
        Self { model: Arc::new(model) }
    }
}

#[async_trait]
impl ModelLoader for RecordedModelLoader {
    async fn load(&self) -> Result<Arc<dyn GestureModel>, ModelError> {
        debug!("Recorded model ready ({} outputs)", self.model.len());
        Ok(self.model.clone())
    }
}
