//! JSON 配置文件
//!
//! 与前端项目中的 `deploy.json` 保持同样的字段：
//!
//! ```json
//! {
//!   "outputDir": "dist",
//!   "dest": { "host": "1.2.3.4", "port": 22, "username": "root",
//!             "password": "***", "path": "/srv/app" }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::config::env::constants::{DEFAULT_OUTPUT_DIR, DEFAULT_SSH_PORT};
use crate::error::ConfigError;

/// 配置文件原始内容（未校验）
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployFile {
    /// 本地打包文件路径
    pub output_dir: Option<String>,
    /// 服务器信息
    pub dest: Option<DestinationFile>,
}

/// 服务器信息
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationFile {
    /// 服务器 ip
    #[serde(default)]
    pub host: String,
    /// 端口，一般默认 22，可写成数字或字符串
    pub port: Option<PortValue>,
    /// 服务器用户名
    #[serde(default)]
    pub username: String,
    /// 服务器连接密码
    pub password: Option<String>,
    /// 服务器连接密钥文件路径
    pub private_key: Option<String>,
    /// 密钥口令
    pub passphrase: Option<String>,
    /// 上传到服务器的位置
    #[serde(default)]
    pub path: String,
    /// 是否校验 known_hosts
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Text(String),
}

impl DeployFile {
    /// 读取并解析配置文件
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// outputDir，未配置或为空时取 `dist`
    pub fn output_dir(&self) -> &str {
        match self.output_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => dir,
            _ => DEFAULT_OUTPUT_DIR,
        }
    }
}

impl DestinationFile {
    /// 解析端口，未配置时为 22
    pub fn port(&self) -> Result<u16, ConfigError> {
        match &self.port {
            None => Ok(DEFAULT_SSH_PORT),
            Some(PortValue::Number(port)) => Ok(*port),
            Some(PortValue::Text(text)) if text.trim().is_empty() => Ok(DEFAULT_SSH_PORT),
            Some(PortValue::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(text.clone())),
        }
    }
}
