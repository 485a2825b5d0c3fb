//! Geometry navigation interface.

use transport_core::{CellId, LostParticleError, ParticleState, SurfaceId};

/// Result of firing a ray from a particle's position along its direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Distance to the nearest surface along the flight path (cm).
    pub distance: f64,
    /// The surface that would be hit.
    pub surface: SurfaceId,
}

/// Result of advancing a particle onto and through a cell boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundaryCrossing {
    /// The surface that was crossed.
    pub surface: SurfaceId,
    /// Cosine of the angle between the flight direction and the surface
    /// normal at the crossing point.
    pub angle_cosine: f64,
    /// True when the particle was reflected instead of transmitted.
    pub reflected: bool,
}

/// Ray tracing over the problem geometry.
///
/// The navigator is shared read-only across worker threads; all particle
/// state (position, direction, cell) lives on the [`ParticleState`] itself.
pub trait GeometryNavigator: Send + Sync {
    /// Distance from the particle to the nearest surface along its
    /// direction of travel.
    ///
    /// Fails with a lost-particle condition when the particle cannot be
    /// located in the geometry; the manager absorbs the failure and
    /// terminates the track.
    fn fire_ray(&self, particle: &ParticleState) -> Result<RayHit, LostParticleError>;

    /// Moves the particle onto the nearest boundary and across it,
    /// updating its position and cell.
    fn advance_to_boundary(
        &self,
        particle: &mut ParticleState,
    ) -> Result<BoundaryCrossing, LostParticleError>;

    /// Moves the particle a distance strictly inside its current cell.
    fn advance_by_substep(&self, particle: &mut ParticleState, distance: f64) {
        particle.advance(distance);
    }

    /// Returns true when `cell` terminates tracking (vacuum / region of
    /// no interest).
    fn is_termination_cell(&self, cell: CellId) -> bool;
}
