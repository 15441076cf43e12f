//! 领域模型模块
//!
//! 纯数据结构，不依赖 tokio/russh

pub mod deploy;
pub mod plan;
pub mod ssh;

// Re-exports for convenience
pub use deploy::{BackupId, DeployStage, Stage, StageStatus};
pub use plan::DeployPlan;
pub use ssh::{ConnectParams, RemoteAuth, SessionState};
