mod engine;
mod types;

pub use engine::{MAX_AGE, MAX_PROJECTION_YEARS, project, round_to_thousand};
pub use types::{
    ContributionMode, FireStatus, Inputs, ProjectionResult, ProjectionYear, Windfall,
};
