//! Collision physics interface.

use transport_core::{CellId, HistoryRng, ParticleBank, ParticleState, ParticleType};

/// Opaque tag identifying a reaction channel within a material model.
pub type ReactionTag = u32;

/// Material data and collision kernels for the problem's cells.
///
/// Shared read-only across worker threads.
pub trait CollisionHandler: Send + Sync {
    /// Returns true when `cell` holds no material for this particle type.
    ///
    /// Void cells have zero total cross section; particles stream through
    /// them without interacting.
    fn is_cell_void(&self, cell: CellId, particle_type: ParticleType) -> bool;

    /// Macroscopic total cross section (1/cm) at the particle's current
    /// phase-space point.
    fn macroscopic_total_cross_section(&self, particle: &ParticleState) -> f64;

    /// Macroscopic cross section (1/cm) of one reaction channel.
    fn macroscopic_reaction_cross_section(
        &self,
        particle: &ParticleState,
        reaction: ReactionTag,
    ) -> f64;

    /// Samples an interaction, updating the particle and banking any
    /// secondaries.
    fn collide_with_cell_material(
        &self,
        particle: &mut ParticleState,
        bank: &mut ParticleBank,
        rng: &mut HistoryRng,
    );

    /// Variance-reduction hook invoked when a subtrack leaves a cell it
    /// entered from a source point or a boundary. Default: no forcing.
    fn force_collision(
        &self,
        particle: &mut ParticleState,
        distance_to_boundary: f64,
        bank: &mut ParticleBank,
        rng: &mut HistoryRng,
    ) {
        let _ = (particle, distance_to_boundary, bank, rng);
    }
}
