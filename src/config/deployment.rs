//! 部署配置校验
//!
//! 在任何不可逆操作之前按固定顺序检查配置，遇到第一个错误即返回。
//! 校验通过后得到不可变的 `DeploymentConfig`。

use std::path::{Path, PathBuf};

use crate::config::file::{DeployFile, DestinationFile};
use crate::domain::ssh::{ConnectParams, RemoteAuth};
use crate::error::ConfigError;

/// 校验后的部署配置，整个运行期间不可变
#[derive(Clone, Debug)]
pub struct DeploymentConfig {
    /// 本地构建产物（已按工作目录解析）
    pub local_artifact_path: PathBuf,
    /// 产物名称，即路径最后一段，用于压缩包名和远程目录名
    pub artifact_name: String,
    /// 远程连接参数
    pub remote: ConnectParams,
    /// 远程部署根目录
    pub remote_path: String,
}

impl DeploymentConfig {
    /// 本地压缩包路径：与产物同级的 `<artifactName>.zip`
    pub fn local_archive_path(&self) -> PathBuf {
        let parent = self
            .local_artifact_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        parent.join(format!("{}.zip", self.artifact_name))
    }
}

/// 校验配置
///
/// 顺序：本地产物存在 → dest 存在 → host → username → 凭据（二选一）→ path
pub fn validate(file: &DeployFile, work_dir: &Path) -> Result<DeploymentConfig, ConfigError> {
    let output_dir = file.output_dir();
    let configured = work_dir.join(output_dir);
    if std::fs::metadata(&configured).is_err() {
        return Err(ConfigError::MissingArtifact(configured));
    }
    let local_artifact_path = resolve_artifact(configured)?;

    let dest = file.dest.as_ref().ok_or(ConfigError::MissingDestination)?;
    if is_blank(&dest.host) {
        return Err(ConfigError::MissingHost);
    }
    if is_blank(&dest.username) {
        return Err(ConfigError::MissingUsername);
    }
    let auth = credential(dest)?;
    if is_blank(&dest.path) {
        return Err(ConfigError::MissingRemotePath);
    }
    let port = dest.port()?;

    let artifact_name = local_artifact_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::MissingArtifact(local_artifact_path.clone()))?;

    let config = DeploymentConfig {
        local_artifact_path,
        artifact_name,
        remote: ConnectParams {
            host: dest.host.trim().to_string(),
            port,
            username: dest.username.trim().to_string(),
            auth,
            strict_host_key_checking: dest.strict_host_key_checking,
        },
        remote_path: dest.path.trim().to_string(),
    };
    ensure_archive_outside(&config)?;
    Ok(config)
}

/// 产物名取配置路径的最后一段，符号链接不解析；
/// 只有以 `..` 结尾等没有文件名的路径才规范化
fn resolve_artifact(configured: PathBuf) -> Result<PathBuf, ConfigError> {
    if configured.file_name().is_some() {
        return Ok(configured);
    }
    std::fs::canonicalize(&configured).map_err(|_| ConfigError::MissingArtifact(configured))
}

/// 压缩包不能写进正在压缩的目录（例如产物是指向上级目录的符号链接）
fn ensure_archive_outside(config: &DeploymentConfig) -> Result<(), ConfigError> {
    let archive = config.local_archive_path();
    let (Ok(artifact), Some(parent)) = (
        std::fs::canonicalize(&config.local_artifact_path),
        archive.parent(),
    ) else {
        return Ok(());
    };
    if !artifact.is_dir() {
        return Ok(());
    }
    let parent = std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
    if parent.starts_with(&artifact) {
        return Err(ConfigError::ArchiveInsideArtifact {
            archive,
            artifact: config.local_artifact_path.clone(),
        });
    }
    Ok(())
}

fn credential(dest: &DestinationFile) -> Result<RemoteAuth, ConfigError> {
    let password = dest.password.as_deref().filter(|p| !p.is_empty());
    let private_key = dest.private_key.as_deref().filter(|k| !is_blank(k));

    match (password, private_key) {
        (Some(password), None) => Ok(RemoteAuth::Password(password.to_string())),
        (None, Some(key)) => Ok(RemoteAuth::PrivateKey {
            path: PathBuf::from(key.trim()),
            passphrase: dest.passphrase.clone().filter(|p| !p.is_empty()),
        }),
        _ => Err(ConfigError::MissingCredential),
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
