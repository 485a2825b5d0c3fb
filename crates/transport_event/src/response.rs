//! Response functions weighting estimator contributions.

use transport_core::ParticleState;

/// A response function evaluated at each scoring point.
///
/// Estimators multiply every raw score by the response evaluated on the
/// contributing particle, producing one tallied quantity per response.
pub trait ParticleResponse: Send + Sync {
    /// Evaluates the response at the particle's current phase-space point.
    fn evaluate(&self, particle: &ParticleState) -> f64;

    /// Human-readable name used in summaries.
    fn name(&self) -> &str;
}

/// The identity response: every score passes through unweighted.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnitResponse;

impl ParticleResponse for UnitResponse {
    #[inline]
    fn evaluate(&self, _particle: &ParticleState) -> f64 {
        1.0
    }

    fn name(&self) -> &str {
        "unit"
    }
}

/// A constant multiplicative response.
#[derive(Clone, Debug)]
pub struct ConstantResponse {
    value: f64,
    name: String,
}

impl ConstantResponse {
    pub fn new(value: f64, name: impl Into<String>) -> Self {
        Self {
            value,
            name: name.into(),
        }
    }
}

impl ParticleResponse for ConstantResponse {
    #[inline]
    fn evaluate(&self, _particle: &ParticleState) -> f64 {
        self.value
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport_core::ParticleType;

    #[test]
    fn test_unit_response_is_identity() {
        let p = ParticleState::new(ParticleType::Neutron, 0);
        assert_eq!(UnitResponse.evaluate(&p), 1.0);
    }

    #[test]
    fn test_constant_response() {
        let p = ParticleState::new(ParticleType::Photon, 0);
        let r = ConstantResponse::new(2.5, "dose");

        assert_eq!(r.evaluate(&p), 2.5);
        assert_eq!(r.name(), "dose");
    }
}
