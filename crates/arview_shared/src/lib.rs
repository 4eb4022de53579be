//! # ARVIEW Shared
//!
//! Math and identifier types used by every ARVIEW crate.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - an async runtime
//! - a platform XR binding
//! - a renderer
//!
//! Poses reported by the platform arrive as column-major 4×4 matrices and are
//! converted into [`RigidTransform`] at the boundary.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod frame;
pub mod math;

pub use frame::FrameToken;
pub use math::{Quaternion, RigidTransform, Vec3};
