//! 环境变量配置加载

use std::env;
use std::time::Duration;

use tracing::warn;

use self::constants::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TRANSFER_TIMEOUT_SECS,
};

/// 远程操作超时
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// 建立连接 + 认证
    pub connect: Duration,
    /// 单条远程命令
    pub command: Duration,
    /// 单个文件上传
    pub transfer: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            command: Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS),
            transfer: Duration::from_secs(DEFAULT_TRANSFER_TIMEOUT_SECS),
        }
    }
}

impl SessionTimeouts {
    /// 从环境变量加载超时配置
    pub fn from_env() -> Self {
        Self {
            connect: secs_from_env("DEPLOY_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            command: secs_from_env("DEPLOY_COMMAND_TIMEOUT_SECS", DEFAULT_COMMAND_TIMEOUT_SECS),
            transfer: secs_from_env("DEPLOY_TRANSFER_TIMEOUT_SECS", DEFAULT_TRANSFER_TIMEOUT_SECS),
        }
    }
}

/// 读取秒数，缺失或非法时使用默认值
fn secs_from_env(name: &str, default: u64) -> Duration {
    let secs = match env::var(name) {
        Ok(v) => match v.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            _ => {
                warn!(name = %name, value = %v, default, "Ignoring invalid timeout");
                default
            }
        },
        Err(_) => default,
    };
    Duration::from_secs(secs)
}

/// 常量
pub mod constants {
    /// 默认 SSH 端口
    pub const DEFAULT_SSH_PORT: u16 = 22;

    /// 未配置 outputDir 时的默认构建目录
    pub const DEFAULT_OUTPUT_DIR: &str = "dist";

    /// 连接超时（秒）
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

    /// 单条命令超时（秒）
    pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600; // 10 分钟

    /// 上传超时（秒）
    pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 1800; // 30 分钟

    /// 命令行参数错误的退出码，不与部署错误的 2-6 重叠
    pub const EXIT_USAGE: u8 = 64;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
