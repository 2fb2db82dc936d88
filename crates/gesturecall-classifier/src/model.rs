use std::sync::Arc;

use async_trait::async_trait;
use gesturecall_core::ModelError;

use crate::features::FeatureVector;

// MARK: - GestureModel

/// A loaded sign classification model.
///
/// Implementations wrap whatever runtime hosts the network; the classifier
/// only needs a probability per vocabulary entry, in vocabulary order.
#[async_trait]
pub trait GestureModel: Send + Sync {
    async fn predict(&self, features: &FeatureVector) -> Result<Vec<f32>, ModelError>;
}

// MARK: - ModelLoader

/// Asynchronous model source. Called once per call session.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn GestureModel>, ModelError>;
}
