//! Viewer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::platform::{SessionInit, XrFeature};
use crate::scene::{Camera, HemisphereLight, IndicatorStyle};

/// One display refresh at 60 Hz, in microseconds.
pub const DEFAULT_FRAME_BUDGET_US: u64 = 16_666;

/// Select events buffered between two ticks.
pub const DEFAULT_SELECT_QUEUE: usize = 16;

/// Tunables of one AR view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Per-tick budget; ticks over it are logged, never aborted.
    pub frame_budget_us: u64,
    /// Extra features the session must grant. Hit testing and the overlay
    /// are required regardless.
    pub required_features: Vec<XrFeature>,
    /// Features requested opportunistically.
    pub optional_features: Vec<XrFeature>,
    /// Capacity of the select queue.
    pub select_queue: usize,
    /// Placement indicator look.
    pub indicator: IndicatorStyle,
    /// Ambient light.
    pub light: HemisphereLight,
    /// Pre-session camera.
    pub camera: Camera,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            frame_budget_us: DEFAULT_FRAME_BUDGET_US,
            required_features: vec![XrFeature::HitTest, XrFeature::DomOverlay],
            optional_features: Vec::new(),
            select_queue: DEFAULT_SELECT_QUEUE,
            indicator: IndicatorStyle::default(),
            light: HemisphereLight::default(),
            camera: Camera::default(),
        }
    }
}

impl ViewerConfig {
    /// Session negotiation parameters.
    #[must_use]
    pub fn session_init(&self) -> SessionInit {
        SessionInit {
            required_features: self.required_features.clone(),
            optional_features: self.optional_features.clone(),
        }
        .with_viewer_features()
    }

    /// Per-tick budget as a duration.
    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        Duration::from_micros(self.frame_budget_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_require_hit_test_and_overlay() {
        let init = ViewerConfig::default().session_init();
        assert_eq!(init.required_features, vec![XrFeature::HitTest, XrFeature::DomOverlay]);
        assert!(init.optional_features.is_empty());
    }

    #[test]
    fn test_viewer_features_cannot_be_configured_away() {
        let config = ViewerConfig {
            required_features: Vec::new(),
            optional_features: vec![XrFeature::DomOverlay, XrFeature::LightEstimation],
            ..ViewerConfig::default()
        };
        let init = config.session_init();
        assert_eq!(init.required_features, vec![XrFeature::HitTest, XrFeature::DomOverlay]);
        assert_eq!(init.optional_features, vec![XrFeature::LightEstimation]);
    }

    #[test]
    fn test_extra_required_features_are_kept() {
        let config = ViewerConfig {
            required_features: vec![XrFeature::Anchors],
            ..ViewerConfig::default()
        };
        assert_eq!(
            config.session_init().required_features,
            vec![XrFeature::Anchors, XrFeature::HitTest, XrFeature::DomOverlay]
        );
    }

    #[test]
    fn test_budget_is_one_refresh() {
        assert_eq!(ViewerConfig::default().frame_budget(), Duration::from_micros(16_666));
    }
}
