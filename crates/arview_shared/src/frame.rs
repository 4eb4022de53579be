//! Frame identifiers.

use serde::{Deserialize, Serialize};

/// Identifies one display refresh of an AR session.
///
/// Tokens increase monotonically for the life of a session. Two values
/// computed against the same token describe the same device pose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct FrameToken(pub u64);

impl std::fmt::Display for FrameToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}
