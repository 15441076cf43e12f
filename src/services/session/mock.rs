//! 测试用会话：按顺序记录每一次远程调用

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Connector, RemoteSession};
use crate::domain::ssh::{ConnectParams, SessionState};
use crate::error::{DeployError, DeployResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCall {
    Connect(String),
    Command(String),
    Upload { local: PathBuf, remote: String },
    DirectoryExists(String),
    PathExists(String),
    MakeDirectory(String),
    Close,
}

/// 多个会话共享的调用记录
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RemoteCall>>>);

impl CallLog {
    fn push(&self, call: RemoteCall) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.0.lock().unwrap().clone()
    }

    /// 仅 shell 命令
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Command(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RemoteCall::Close))
            .count()
    }

    /// 第一次满足条件的调用位置
    pub fn position(&self, pred: impl Fn(&RemoteCall) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }
}

/// 远程主机的模拟行为
#[derive(Clone, Default)]
pub struct MockBehavior {
    /// 已存在的目录
    pub directories: HashSet<String>,
    /// 以此前缀开头的命令返回非零退出码
    pub fail_commands: Vec<String>,
    pub fail_upload: bool,
    pub fail_mkdir: bool,
}

pub struct RecordingSession {
    behavior: MockBehavior,
    state: SessionState,
    log: CallLog,
}

impl RecordingSession {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        (Self::with_behavior(MockBehavior::default(), log.clone()), log)
    }

    pub fn with_behavior(behavior: MockBehavior, log: CallLog) -> Self {
        Self {
            behavior,
            state: SessionState::Ready,
            log,
        }
    }

    pub fn add_directory(&mut self, path: &str) {
        self.behavior.directories.insert(path.to_string());
    }

    fn ensure_ready(&self, what: &str) -> DeployResult<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(DeployError::remote_command(what, "session is not ready"))
        }
    }
}

#[async_trait]
impl RemoteSession for RecordingSession {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn run_command(&mut self, command: &str) -> DeployResult<String> {
        self.ensure_ready(command)?;
        self.log.push(RemoteCall::Command(command.to_string()));
        if self
            .behavior
            .fail_commands
            .iter()
            .any(|prefix| command.starts_with(prefix.as_str()))
        {
            return Err(DeployError::exit_status(command, 1, "mock failure"));
        }
        Ok(String::new())
    }

    async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> DeployResult<()> {
        self.ensure_ready("upload")?;
        self.log.push(RemoteCall::Upload {
            local: local_path.to_path_buf(),
            remote: remote_path.to_string(),
        });
        if self.behavior.fail_upload {
            return Err(DeployError::transfer(local_path, remote_path, "mock failure"));
        }
        Ok(())
    }

    async fn directory_exists(&mut self, remote_path: &str) -> DeployResult<bool> {
        self.ensure_ready("stat")?;
        self.log.push(RemoteCall::DirectoryExists(remote_path.to_string()));
        Ok(self.behavior.directories.contains(remote_path))
    }

    async fn path_exists(&mut self, remote_path: &str) -> DeployResult<bool> {
        self.ensure_ready("stat")?;
        self.log.push(RemoteCall::PathExists(remote_path.to_string()));
        Ok(self.behavior.directories.contains(remote_path))
    }

    async fn make_directory(&mut self, remote_path: &str) -> DeployResult<()> {
        self.ensure_ready("mkdir")?;
        self.log.push(RemoteCall::MakeDirectory(remote_path.to_string()));
        if self.behavior.fail_mkdir {
            return Err(DeployError::remote_command(
                format!("mkdir {}", remote_path),
                "mock failure",
            ));
        }
        self.behavior.directories.insert(remote_path.to_string());
        Ok(())
    }

    async fn close(&mut self) -> DeployResult<()> {
        self.log.push(RemoteCall::Close);
        self.state = SessionState::Closed;
        Ok(())
    }
}

/// 测试用连接工厂
#[derive(Clone, Default)]
pub struct RecordingConnector {
    pub behavior: MockBehavior,
    /// 模拟认证失败
    pub reject: bool,
    pub log: CallLog,
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn connect(&self, params: &ConnectParams) -> DeployResult<Box<dyn RemoteSession>> {
        self.log.push(RemoteCall::Connect(params.target()));
        if self.reject {
            return Err(DeployError::connection(params.target(), "authentication rejected"));
        }
        Ok(Box::new(RecordingSession::with_behavior(
            self.behavior.clone(),
            self.log.clone(),
        )))
    }
}
