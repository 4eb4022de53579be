//! Capability probe: the gate in front of every expensive setup step.

use crate::error::CapabilityError;
use crate::platform::{SessionMode, XrSystem};

/// Verdict of a capability probe. Immutable once computed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    reason: Option<CapabilityError>,
}

impl Capability {
    /// Immersive AR is available.
    #[must_use]
    pub const fn supported() -> Self {
        Self { reason: None }
    }

    /// Immersive AR is not available, for `reason`.
    #[must_use]
    pub const fn unsupported(reason: CapabilityError) -> Self {
        Self { reason: Some(reason) }
    }

    /// Whether the pipeline may continue.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        self.reason.is_none()
    }

    /// Why not, if not.
    #[must_use]
    pub const fn reason(&self) -> Option<&CapabilityError> {
        self.reason.as_ref()
    }

    /// Converts the verdict into a gate.
    ///
    /// # Errors
    ///
    /// The recorded [`CapabilityError`] when unsupported.
    pub fn into_result(self) -> Result<(), CapabilityError> {
        match self.reason {
            None => Ok(()),
            Some(reason) => Err(reason),
        }
    }
}

/// Asks the platform once whether immersive AR can be entered.
pub struct CapabilityProbe<'a, P: XrSystem> {
    platform: &'a P,
}

impl<'a, P: XrSystem> CapabilityProbe<'a, P> {
    /// Creates a probe against `platform`.
    #[must_use]
    pub const fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    /// Runs the probe. Allocates nothing and never retries.
    pub async fn probe(&self) -> Capability {
        let capability = if !self.platform.is_available() {
            Capability::unsupported(CapabilityError::Unsupported)
        } else {
            match self.platform.is_session_supported(SessionMode::ImmersiveAr).await {
                Ok(true) => Capability::supported(),
                Ok(false) => Capability::unsupported(CapabilityError::Denied),
                Err(e) => Capability::unsupported(CapabilityError::ProbeFailed(e)),
            }
        };

        match capability.reason() {
            None => tracing::info!("Immersive AR supported"),
            Some(reason) => tracing::info!("Immersive AR unavailable: {}", reason),
        }
        capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlatformError;
    use crate::sim::SimPlatform;

    #[tokio::test]
    async fn test_probe_without_entry_point_is_unsupported() {
        let platform = SimPlatform::builder().without_xr().build();
        let capability = CapabilityProbe::new(&platform).probe().await;
        assert_eq!(capability.reason(), Some(&CapabilityError::Unsupported));
        assert_eq!(platform.hub().support_queries(), 0);
    }

    #[tokio::test]
    async fn test_probe_mode_denied() {
        let platform = SimPlatform::builder().ar_unsupported().build();
        let capability = CapabilityProbe::new(&platform).probe().await;
        assert_eq!(capability.into_result(), Err(CapabilityError::Denied));
    }

    #[tokio::test]
    async fn test_probe_query_failure() {
        let platform = SimPlatform::builder().probe_error("permissions policy").build();
        let capability = CapabilityProbe::new(&platform).probe().await;
        assert_eq!(
            capability.reason(),
            Some(&CapabilityError::ProbeFailed(PlatformError::new("permissions policy")))
        );
    }

    #[tokio::test]
    async fn test_probe_supported() {
        let platform = SimPlatform::builder().build();
        let capability = CapabilityProbe::new(&platform).probe().await;
        assert!(capability.is_supported());
        assert_eq!(platform.hub().support_queries(), 1);
    }
}
