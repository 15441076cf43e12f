//! 基础设施模块
//!
//! 封装外部依赖（SSH 传输、zip 压缩）

pub mod archive;
pub mod ssh;

pub use archive::ArchivePackage;
pub use ssh::{SshConnector, SshSession};
