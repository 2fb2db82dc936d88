//! Gesture classifier: landmark frame → feature vector → model → label.
//!
//! Inference itself is delegated to a [`GestureModel`] implementation;
//! this crate owns the input layout the model was trained on and the
//! confidence thresholding applied to its output.

mod classifier;
mod features;
mod model;

pub use classifier::{select_label, Classification, GestureClassifier, InferenceJob};
pub use features::{FeatureVector, FEATURE_LEN, HAND_SLOT_LEN, PADDING_LEN};
pub use model::{GestureModel, ModelLoader};
