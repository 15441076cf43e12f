//! dist-deploy - 前端构建产物一键发布
//!
//! 压缩本地构建目录，通过 SSH 上传到服务器，旧版本按时间戳备份后原地解压。

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

pub use config::{DeployFile, DeploymentConfig, SessionTimeouts};
pub use error::{ConfigError, DeployError, DeployFailure};
pub use infra::SshConnector;
pub use services::{run, DeployOutcome, DeployReport, ProgressWriter, RunOptions};
