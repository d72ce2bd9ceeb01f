mod areas;
mod milestones;
mod projects;

pub use areas::AreaStorage;
pub use milestones::MilestoneStorage;
pub use projects::ProjectStorage;
