//! 远程会话
//!
//! 流水线只依赖这里的两个 trait：`Connector` 负责建立一次连接，
//! `RemoteSession` 提供命令执行与文件传输。生产实现见 `infra::ssh`。
//!
//! 所有方法都需要 `&mut self`，同一时刻只会有一个远程操作在进行。

use std::path::Path;

use async_trait::async_trait;

use crate::domain::ssh::{ConnectParams, SessionState};
use crate::error::DeployResult;

#[cfg(test)]
pub mod mock;

/// 一次已认证的远程连接
#[async_trait]
pub trait RemoteSession: Send {
    /// 当前会话状态
    fn state(&self) -> SessionState;

    /// 执行远程命令，返回完整 stdout
    ///
    /// 命令无法执行或退出码非零时返回 `DeployError::RemoteCommand`
    async fn run_command(&mut self, command: &str) -> DeployResult<String>;

    /// 整文件上传，不支持断点续传
    async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> DeployResult<()>;

    /// 远程路径是否为已存在的目录
    async fn directory_exists(&mut self, remote_path: &str) -> DeployResult<bool>;

    /// 远程路径是否存在（文件或目录）
    async fn path_exists(&mut self, remote_path: &str) -> DeployResult<bool>;

    /// 创建目录（单层）
    async fn make_directory(&mut self, remote_path: &str) -> DeployResult<()>;

    /// 释放连接，可重复调用
    async fn close(&mut self) -> DeployResult<()>;
}

/// 连接工厂：每次调用只尝试一次，不重试
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> DeployResult<Box<dyn RemoteSession>>;
}

/// 确保目录存在，不存在时创建
///
/// 返回是否新建了目录
pub async fn ensure_directory(session: &mut dyn RemoteSession, remote_path: &str) -> DeployResult<bool> {
    if session.directory_exists(remote_path).await? {
        return Ok(false);
    }
    session.make_directory(remote_path).await?;
    Ok(true)
}
