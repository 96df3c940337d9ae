pub mod builder;
pub mod ranking;

pub use builder::SnapshotBuilder;
pub use ranking::compute_standings;
