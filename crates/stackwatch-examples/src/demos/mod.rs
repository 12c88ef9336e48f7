pub mod replay_deploy;

pub use replay_deploy::{ReplayDeployOptions, run_replay_deploy};
