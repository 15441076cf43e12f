//! 服务层模块
//!
//! 远程会话抽象与部署编排

pub mod deploy;
pub mod session;

pub use deploy::{run, DeployOutcome, DeployReport, ProgressWriter, RunOptions};
pub use session::{Connector, RemoteSession};
