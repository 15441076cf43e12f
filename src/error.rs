//! 统一错误处理
//!
//! `ConfigError` 覆盖配置加载与校验，`DeployError` 覆盖流水线各阶段，
//! `DeployFailure` 是最终上报给进程入口的唯一失败形态（阶段 + 原因）。

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::deploy::Stage;

/// 配置错误（任何远程操作之前即失败）
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 本地构建产物不存在
    #[error("local artifact `{}` not found; configure the correct outputDir or check that the build succeeded", .0.display())]
    MissingArtifact(PathBuf),
    /// 未配置服务器信息
    #[error("remote destination `dest` is not configured")]
    MissingDestination,
    #[error("remote `host` is not configured")]
    MissingHost,
    #[error("remote `username` is not configured")]
    MissingUsername,
    /// password 与 privateKey 必须且只能配置一个
    #[error("configure exactly one of remote `password` or `privateKey`")]
    MissingCredential,
    #[error("remote `path` is not configured")]
    MissingRemotePath,
    #[error("invalid remote port `{0}`")]
    InvalidPort(String),
    /// 压缩包路径落在待压缩目录内
    #[error("archive `{}` would be written inside the artifact `{}` it packs", archive.display(), artifact.display())]
    ArchiveInsideArtifact { archive: PathBuf, artifact: PathBuf },
    /// 读取配置文件失败
    #[error("failed to read config file `{}`: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 解析配置文件失败
    #[error("failed to parse config file `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// 部署流水线错误
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 本地压缩失败，未发生任何远程操作
    #[error("failed to compress `{}`: {source}", path.display())]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 连接或认证失败，远程未被修改
    #[error("failed to connect to {target}: {reason}")]
    Connection { target: String, reason: String },

    /// 远程命令失败，远程状态可能已部分变更
    #[error("remote command `{command}` failed: {reason}")]
    RemoteCommand {
        command: String,
        reason: String,
        exit_status: Option<u32>,
        stderr: String,
    },

    /// 上传失败
    #[error("failed to upload `{}` to `{remote}`: {reason}", local.display())]
    Transfer {
        local: PathBuf,
        remote: String,
        reason: String,
    },
}

impl DeployError {
    /// 创建连接错误
    pub fn connection(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建远程命令错误（命令未能执行或执行中断）
    pub fn remote_command(command: impl Into<String>, reason: impl ToString) -> Self {
        Self::RemoteCommand {
            command: command.into(),
            reason: reason.to_string(),
            exit_status: None,
            stderr: String::new(),
        }
    }

    /// 创建远程命令错误（命令执行完成但退出码非零）
    pub fn exit_status(command: impl Into<String>, exit_status: u32, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        let reason = match stderr.trim() {
            "" => format!("exited with status {}", exit_status),
            msg => format!("exited with status {}: {}", exit_status, msg),
        };
        Self::RemoteCommand {
            command: command.into(),
            reason,
            exit_status: Some(exit_status),
            stderr,
        }
    }

    /// 创建上传错误
    pub fn transfer(local: impl Into<PathBuf>, remote: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transfer {
            local: local.into(),
            remote: remote.into(),
            reason: reason.to_string(),
        }
    }

    /// 进程退出码
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::Config(_) => 2,
            DeployError::Compression { .. } => 3,
            DeployError::Connection { .. } => 4,
            DeployError::RemoteCommand { .. } => 5,
            DeployError::Transfer { .. } => 6,
        }
    }
}

/// 便捷类型别名
pub type DeployResult<T> = Result<T, DeployError>;

/// 顶层失败报告：失败的阶段及其原因
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {error}")]
pub struct DeployFailure {
    pub stage: Stage,
    #[source]
    pub error: DeployError,
}

impl DeployFailure {
    pub fn new(stage: Stage, error: impl Into<DeployError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}
