//! 配置模块
//!
//! 配置文件加载、校验与环境变量

pub mod deployment;
pub mod env;
pub mod file;

pub use deployment::{validate, DeploymentConfig};
pub use env::SessionTimeouts;
pub use file::{DeployFile, DestinationFile};
