//! Feature vector layout expected by the sign model.
//!
//! ```text
//! [ hand 0: 21 × (x, y, z) | hand 1: 21 × (x, y, z) | 62 × 0.0 ]
//!   0..63                    63..126                  126..188
//! ```
//!
//! A missing hand leaves its slot zeroed. The zero tail matches the
//! model's trained input width and is never written.

use gesturecall_core::{LandmarkFrame, LANDMARKS_PER_HAND, MAX_HANDS};

/// Values contributed by one hand slot.
pub const HAND_SLOT_LEN: usize = LANDMARKS_PER_HAND * 3;

/// Always-zero tail after the hand slots.
pub const PADDING_LEN: usize = 62;

/// Total model input width.
pub const FEATURE_LEN: usize = MAX_HANDS * HAND_SLOT_LEN + PADDING_LEN;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    pub fn from_frame(frame: &LandmarkFrame) -> Self {
        let mut values = [0.0f32; FEATURE_LEN];
        for (slot, hand) in frame.hands().iter().enumerate() {
            let base = slot * HAND_SLOT_LEN;
            for (i, lm) in hand.landmarks().iter().enumerate() {
                let at = base + i * 3;
                values[at] = lm.x;
                values[at + 1] = lm.y;
                values[at + 2] = lm.z;
            }
        }
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Values of hand slot `slot` (0 or 1).
    pub fn hand_slot(&self, slot: usize) -> &[f32] {
        let base = slot * HAND_SLOT_LEN;
        &self.0[base..base + HAND_SLOT_LEN]
    }

    pub fn padding(&self) -> &[f32] {
        &self.0[MAX_HANDS * HAND_SLOT_LEN..]
    }

    /// True when no hand contributed a non-zero coordinate.
    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gesturecall_core::{Hand, Landmark};

    fn hand(seed: f32) -> Hand {
        let mut points = [Landmark::default(); LANDMARKS_PER_HAND];
        for (i, p) in points.iter_mut().enumerate() {
            let v = seed + i as f32 * 0.01;
            *p = Landmark::new(v, v + 0.001, -v);
        }
        Hand::new(points)
    }

    #[test]
    fn layout_constants() {
        assert_eq!(HAND_SLOT_LEN, 63);
        assert_eq!(FEATURE_LEN, 188);
    }

    #[test]
    fn zero_hands_is_all_zero() {
        let v = FeatureVector::from_frame(&LandmarkFrame::empty());
        assert_eq!(v.as_slice().len(), FEATURE_LEN);
        assert!(v.is_all_zero());
    }

    #[test]
    fn one_hand_leaves_second_slot_zero() {
        let v = FeatureVector::from_frame(&LandmarkFrame::new(vec![hand(0.2)]));
        assert_eq!(v.as_slice().len(), FEATURE_LEN);
        assert!(v.hand_slot(0).iter().any(|x| *x != 0.0));
        assert!(v.hand_slot(1).iter().all(|x| *x == 0.0));
        assert!(v.padding().iter().all(|x| *x == 0.0));
    }

    #[test]
    fn two_hands_keep_detector_order() {
        let v = FeatureVector::from_frame(&LandmarkFrame::new(vec![hand(0.1), hand(0.5)]));
        assert_eq!(v.as_slice().len(), FEATURE_LEN);
        assert_eq!(&v.as_slice()[0..3], &[0.1, 0.1 + 0.001, -0.1]);
        assert_eq!(v.hand_slot(1)[0], 0.5);
        // last landmark of hand 1: z coordinate
        assert_eq!(v.as_slice()[125], -(0.5 + 20.0 * 0.01));
        assert_eq!(v.padding().len(), PADDING_LEN);
        assert!(v.padding().iter().all(|x| *x == 0.0));
    }
}
