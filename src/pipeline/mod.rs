// Pipeline — composes the subgroup passes into one run.

pub mod analysis;
pub mod exemplars;

pub use analysis::{run, PipelineParams};
