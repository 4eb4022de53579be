//! # Scene Graph
//!
//! The minimal graph handed to the external renderer each tick: a camera, a
//! hemisphere light, the placement indicator and, once resolved, the model.
//!
//! The graph is owned by the frame-loop task. Placement decisions are made
//! under the view-state lock and copied in as [`PlacementVisuals`] before the
//! render call, so the renderer never runs while the lock is held.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use arview_shared::{Quaternion, RigidTransform, Vec3};

use crate::placement::PlacementVisuals;

/// A resolved renderable object.
///
/// The payload belongs to the resolver/renderer pair; the core only moves it
/// around and toggles its visibility.
#[derive(Clone)]
pub struct Model {
    source: String,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Model {
    /// Wraps a resolver payload.
    #[must_use]
    pub fn new(source: impl Into<String>, payload: impl Any + Send + Sync) -> Self {
        Self {
            source: source.into(),
            payload: Arc::new(payload),
        }
    }

    /// Location the model was resolved from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Typed access to the resolver payload.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("source", &self.source).finish_non_exhaustive()
    }
}

/// Perspective camera. In a session the platform supplies the pose and
/// projection; these values cover the pre-session frames.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near clip distance (metres).
    pub near: f32,
    /// Far clip distance (metres).
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y_degrees: 70.0,
            aspect: 1.0,
            near: 0.01,
            far: 20.0,
        }
    }
}

/// Sky/ground ambient light.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HemisphereLight {
    /// Sky colour (0xRRGGBB).
    pub sky_color: u32,
    /// Ground colour (0xRRGGBB).
    pub ground_color: u32,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Light position.
    pub position: Vec3,
}

impl Default for HemisphereLight {
    fn default() -> Self {
        Self {
            sky_color: 0x00ff_ffff,
            ground_color: 0x00bb_bbff,
            intensity: 1.0,
            position: Vec3::new(0.5, 1.0, 0.25),
        }
    }
}

/// Look of the placement indicator ring.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorStyle {
    /// Inner ring radius (metres).
    pub inner_radius: f32,
    /// Outer ring radius (metres).
    pub outer_radius: f32,
    /// Ring tessellation.
    pub segments: u32,
    /// Colour (0xRRGGBB).
    pub color: u32,
    /// Opacity in `0.0..=1.0`.
    pub opacity: f32,
}

impl Default for IndicatorStyle {
    fn default() -> Self {
        Self {
            inner_radius: 0.15,
            outer_radius: 0.2,
            segments: 32,
            color: 0x0000_ff00,
            opacity: 0.5,
        }
    }
}

impl IndicatorStyle {
    /// Geometry orientation: the ring is authored in XY and laid flat.
    #[must_use]
    pub fn geometry_rotation() -> Quaternion {
        Quaternion::from_rotation_x(-std::f32::consts::FRAC_PI_2)
    }
}

/// What a node draws.
#[derive(Clone, Debug)]
pub enum NodeKind {
    /// The camera node.
    Camera(Camera),
    /// Ambient light.
    Light(HemisphereLight),
    /// The "place here" ring.
    Indicator(IndicatorStyle),
    /// The product model.
    Model(Model),
}

/// Index of a node in its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// One node of the scene graph.
#[derive(Clone, Debug)]
pub struct SceneNode {
    /// What the node draws.
    pub kind: NodeKind,
    /// Node pose in the world-local frame.
    pub transform: RigidTransform,
    /// Whether the renderer should draw it.
    pub visible: bool,
}

/// Flat scene graph.
#[derive(Clone, Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    indicator: Option<NodeId>,
    model: Option<NodeId>,
}

impl SceneGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Camera, light and a hidden indicator.
    #[must_use]
    pub fn with_defaults(camera: Camera, light: HemisphereLight, indicator: IndicatorStyle) -> Self {
        let mut graph = Self::new();
        graph.add(SceneNode {
            kind: NodeKind::Camera(camera),
            transform: RigidTransform::IDENTITY,
            visible: true,
        });
        graph.add(SceneNode {
            kind: NodeKind::Light(light),
            transform: RigidTransform::from_translation(light.position),
            visible: true,
        });
        let id = graph.add(SceneNode {
            kind: NodeKind::Indicator(indicator),
            transform: RigidTransform::IDENTITY,
            visible: false,
        });
        graph.indicator = Some(id);
        graph
    }

    /// Appends a node.
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(node);
        id
    }

    /// Adds the resolved model, hidden until placement.
    ///
    /// A second call replaces the model in place.
    pub fn attach_model(&mut self, model: Model) -> NodeId {
        let node = SceneNode {
            kind: NodeKind::Model(model),
            transform: RigidTransform::IDENTITY,
            visible: false,
        };
        if let Some(id) = self.model {
            if let Some(slot) = self.nodes.get_mut(id.0 as usize) {
                *slot = node;
                return id;
            }
        }
        let id = self.add(node);
        self.model = Some(id);
        id
    }

    /// Node lookup.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0 as usize)
    }

    /// All nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    /// The indicator node, if the graph has one.
    #[must_use]
    pub fn indicator(&self) -> Option<&SceneNode> {
        self.indicator.and_then(|id| self.get(id))
    }

    /// The model node, once attached.
    #[must_use]
    pub fn model(&self) -> Option<&SceneNode> {
        self.model.and_then(|id| self.get(id))
    }

    /// Copies placement decisions onto the indicator and model nodes.
    pub fn apply(&mut self, visuals: &PlacementVisuals) {
        if let Some(node) = self.indicator.and_then(|id| self.nodes.get_mut(id.0 as usize)) {
            node.visible = visuals.indicator.visible;
            node.transform = visuals.indicator.transform;
        }
        if let Some(node) = self.model.and_then(|id| self.nodes.get_mut(id.0 as usize)) {
            node.visible = visuals.model.visible;
            node.transform = visuals.model.transform;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::Visual;

    #[test]
    fn test_default_scene_hides_indicator() {
        let graph = SceneGraph::with_defaults(Camera::default(), HemisphereLight::default(), IndicatorStyle::default());
        assert_eq!(graph.nodes().len(), 3);
        assert!(!graph.indicator().map_or(true, |n| n.visible));
        assert!(graph.model().is_none());
    }

    #[test]
    fn test_model_attached_hidden_and_replaced_in_place() {
        let mut graph = SceneGraph::with_defaults(Camera::default(), HemisphereLight::default(), IndicatorStyle::default());
        let first = graph.attach_model(Model::new("chair.glb", 1u8));
        let second = graph.attach_model(Model::new("table.glb", 2u8));

        assert_eq!(first, second);
        assert_eq!(graph.nodes().len(), 4);
        let node = graph.model().map(|n| (n.visible, n.kind.clone()));
        match node {
            Some((false, NodeKind::Model(m))) => {
                assert_eq!(m.source(), "table.glb");
                assert_eq!(m.payload::<u8>(), Some(&2));
            }
            other => panic!("unexpected model node: {other:?}"),
        }
    }

    #[test]
    fn test_apply_moves_indicator_and_model() {
        let mut graph = SceneGraph::with_defaults(Camera::default(), HemisphereLight::default(), IndicatorStyle::default());
        graph.attach_model(Model::new("chair.glb", ()));

        let at = RigidTransform::from_translation(Vec3::new(0.0, -1.0, -2.0));
        graph.apply(&PlacementVisuals {
            indicator: Visual { visible: false, transform: at },
            model: Visual { visible: true, transform: at },
        });

        let model = graph.model().map(|n| (n.visible, n.transform));
        assert_eq!(model, Some((true, at)));
        assert_eq!(graph.indicator().map(|n| n.visible), Some(false));
    }

    #[test]
    fn test_default_indicator_matches_ring_spec() {
        let style = IndicatorStyle::default();
        assert_eq!(style.segments, 32);
        assert_eq!(style.color, 0x00ff00);
        assert!(style.inner_radius < style.outer_radius);
    }
}
