// --- File: lib.rs ---
// Soft-bodied microbes as XPBD particle clusters, with spatial-hash collisions and a
// metaball hand-off for rendering.

pub mod behavior;
pub mod clock;
pub mod config;
pub mod constants;
pub mod constraints;
pub mod error;
pub mod grid;
pub mod handoff;
pub mod organism;
pub mod particles;
pub mod pipeline;
pub mod profiling;
pub mod renderer;
pub mod simulation;
pub mod topology;
pub mod utils;
pub mod xpbd;

pub use clock::{FixedTimestep, SpawnPacer};
pub use config::{Settings, SolverConfig};
pub use constraints::{Constraint, ConstraintKind};
pub use error::{RendererError, SolverError};
pub use grid::{GridLayout, SpatialGrid};
pub use handoff::{RenderView, SplatInstance};
pub use organism::{OrganismAggregate, OrganismKind};
pub use particles::Particle;
pub use profiling::PipelineProfile;
pub use renderer::{Camera2D, Renderer};
pub use simulation::{MicrobeSolver, TickInput};
