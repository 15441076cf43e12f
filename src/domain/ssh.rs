//! SSH 连接相关领域模型

use std::fmt;
use std::path::PathBuf;

/// 远程认证方式，二者只能取其一
#[derive(Clone, PartialEq, Eq)]
pub enum RemoteAuth {
    /// 密码登录
    Password(String),
    /// 私钥登录（私钥文件路径，可选口令）
    PrivateKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl RemoteAuth {
    pub fn method(&self) -> &'static str {
        match self {
            RemoteAuth::Password(_) => "password",
            RemoteAuth::PrivateKey { .. } => "publickey",
        }
    }
}

// 不输出密码与口令
impl fmt::Debug for RemoteAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteAuth::Password(_) => f.write_str("Password(***)"),
            RemoteAuth::PrivateKey { path, .. } => f
                .debug_struct("PrivateKey")
                .field("path", path)
                .finish_non_exhaustive(),
        }
    }
}

/// 建立连接所需参数
#[derive(Clone, Debug)]
pub struct ConnectParams {
    pub host: String,
    /// 端口，默认 22
    pub port: u16,
    pub username: String,
    pub auth: RemoteAuth,
    /// 是否校验 known_hosts
    pub strict_host_key_checking: bool,
}

impl ConnectParams {
    /// `host:port`，用于日志和错误信息
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 远程会话状态
///
/// `Disconnected → Connecting → Ready → Closed`，认证或网络错误时 `Connecting → Failed`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Closed,
    Failed,
}

impl SessionState {
    /// 是否允许迁移到 `next`
    pub fn can_transition(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Ready)
                | (Connecting, Failed)
                | (Ready, Closed)
        )
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}
