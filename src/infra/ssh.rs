//! SSH 客户端实现（russh + russh-sftp）
//!
//! 命令通过独立的 exec 通道执行；SFTP 子系统在第一次需要时打开，之后复用。

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::env::SessionTimeouts;
use crate::domain::ssh::{ConnectParams, RemoteAuth, SessionState};
use crate::error::{DeployError, DeployResult};
use crate::services::session::{Connector, RemoteSession};

/// 基于 russh 的连接工厂
#[derive(Clone, Debug, Default)]
pub struct SshConnector {
    timeouts: SessionTimeouts,
}

impl SshConnector {
    pub fn new(timeouts: SessionTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, params: &ConnectParams) -> DeployResult<Box<dyn RemoteSession>> {
        let session = SshSession::connect(params, self.timeouts.clone()).await?;
        Ok(Box::new(session))
    }
}

/// 客户端回调，只负责校验服务器主机密钥
struct ClientHandler {
    host: String,
    port: u16,
    strict: bool,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint();
        if !self.strict {
            debug!(host = %self.host, fingerprint = %fingerprint, "Accepting server host key");
            return Ok(true);
        }

        match russh_keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(host = %self.host, fingerprint = %fingerprint, "Server host key not found in known_hosts");
                Ok(false)
            }
            Err(e) => {
                warn!(host = %self.host, fingerprint = %fingerprint, error = %e, "Server host key rejected");
                Ok(false)
            }
        }
    }
}

/// 一次远程命令的原始输出
#[derive(Debug, Default)]
struct CommandOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    exit_status: Option<u32>,
}

impl CommandOutput {
    /// 退出码非零即失败
    fn into_result(self, command: &str) -> DeployResult<String> {
        match self.exit_status {
            Some(0) => Ok(String::from_utf8_lossy(&self.stdout).into_owned()),
            Some(code) => Err(DeployError::exit_status(
                command,
                code,
                String::from_utf8_lossy(&self.stderr),
            )),
            None => Err(DeployError::remote_command(
                command,
                "command terminated without an exit status",
            )),
        }
    }
}

/// russh 远程会话
pub struct SshSession {
    handle: Option<Handle<ClientHandler>>,
    sftp: Option<SftpSession>,
    state: SessionState,
    target: String,
    timeouts: SessionTimeouts,
}

impl SshSession {
    /// 建立连接并认证，只尝试一次
    pub async fn connect(params: &ConnectParams, timeouts: SessionTimeouts) -> DeployResult<Self> {
        let target = params.target();
        let mut session = Self {
            handle: None,
            sftp: None,
            state: SessionState::Disconnected,
            target: target.clone(),
            timeouts,
        };

        session.transition(SessionState::Connecting);
        info!(
            target = %target,
            user = %params.username,
            method = params.auth.method(),
            "Connecting to server"
        );

        let limit = session.timeouts.connect;
        match tokio::time::timeout(limit, open_handle(params)).await {
            Ok(Ok(handle)) => {
                session.handle = Some(handle);
                session.transition(SessionState::Ready);
                Ok(session)
            }
            Ok(Err(e)) => {
                session.transition(SessionState::Failed);
                Err(DeployError::connection(target, format!("{:#}", e)))
            }
            Err(_) => {
                session.transition(SessionState::Failed);
                Err(DeployError::connection(target, timed_out(limit)))
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition(next) {
            warn!(target = %self.target, from = ?self.state, to = ?next, "Unexpected session state transition");
        }
        debug!(target = %self.target, from = ?self.state, to = ?next, "Session state");
        self.state = next;
    }

    fn handle(&self, what: &str) -> DeployResult<&Handle<ClientHandler>> {
        match (&self.handle, self.state) {
            (Some(handle), SessionState::Ready) => Ok(handle),
            _ => Err(DeployError::remote_command(
                what,
                format!("session is {:?}", self.state),
            )),
        }
    }

    async fn sftp(&mut self) -> anyhow::Result<&SftpSession> {
        if self.sftp.is_none() {
            let handle = self
                .handle
                .as_ref()
                .filter(|_| self.state == SessionState::Ready)
                .ok_or_else(|| anyhow!("session is {:?}", self.state))?;
            let channel = handle.channel_open_session().await?;
            channel.request_subsystem(true, "sftp").await?;
            let sftp = SftpSession::new(channel.into_stream()).await?;
            debug!(target = %self.target, "SFTP subsystem opened");
            self.sftp = Some(sftp);
        }
        self.sftp
            .as_ref()
            .ok_or_else(|| anyhow!("sftp subsystem unavailable"))
    }

    async fn stat(&mut self, remote_path: &str, want_dir: bool) -> DeployResult<bool> {
        let what = format!("sftp stat {}", remote_path);
        let limit = self.timeouts.command;
        let fut = async {
            let sftp = self.sftp().await?;
            if !sftp.try_exists(remote_path).await? {
                return Ok(false);
            }
            if !want_dir {
                return Ok(true);
            }
            Ok::<_, anyhow::Error>(sftp.metadata(remote_path).await?.is_dir())
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(exists)) => Ok(exists),
            Ok(Err(e)) => Err(DeployError::remote_command(what, format!("{:#}", e))),
            Err(_) => Err(DeployError::remote_command(what, timed_out(limit))),
        }
    }
}

async fn open_handle(params: &ConnectParams) -> anyhow::Result<Handle<ClientHandler>> {
    let config = Arc::new(client::Config::default());
    let handler = ClientHandler {
        host: params.host.clone(),
        port: params.port,
        strict: params.strict_host_key_checking,
    };

    let mut handle = client::connect(config, (params.host.as_str(), params.port), handler).await?;

    let authenticated = match &params.auth {
        RemoteAuth::Password(password) => {
            handle
                .authenticate_password(params.username.as_str(), password.as_str())
                .await?
        }
        RemoteAuth::PrivateKey { path, passphrase } => {
            let key_pair = russh_keys::load_secret_key(path, passphrase.as_deref())
                .with_context(|| format!("failed to load private key `{}`", path.display()))?;
            handle
                .authenticate_publickey(params.username.as_str(), Arc::new(key_pair))
                .await?
        }
    };

    if !authenticated {
        bail!(
            "{} authentication rejected for user `{}`",
            params.auth.method(),
            params.username
        );
    }
    Ok(handle)
}

async fn exec(handle: &Handle<ClientHandler>, command: &str) -> Result<CommandOutput, russh::Error> {
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut output = CommandOutput::default();
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => output.stdout.extend_from_slice(data),
            // ext == 1 为 stderr
            ChannelMsg::ExtendedData { ref data, ext: 1 } => output.stderr.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => output.exit_status = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                output
                    .stderr
                    .extend_from_slice(format!("killed by signal {:?}", signal_name).as_bytes());
            }
            _ => {}
        }
    }
    Ok(output)
}

fn timed_out(limit: Duration) -> String {
    format!("timed out after {}s", limit.as_secs())
}

#[async_trait]
impl RemoteSession for SshSession {
    fn state(&self) -> SessionState {
        self.state
    }

    async fn run_command(&mut self, command: &str) -> DeployResult<String> {
        let limit = self.timeouts.command;
        let handle = self.handle(command)?;
        debug!(target = %self.target, command = %command, "Executing remote command");

        let output = match tokio::time::timeout(limit, exec(handle, command)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(DeployError::remote_command(command, e)),
            Err(_) => return Err(DeployError::remote_command(command, timed_out(limit))),
        };

        let stdout = output.into_result(command)?;
        if !stdout.trim().is_empty() {
            debug!(command = %command, stdout = %stdout.trim_end(), "Remote command output");
        }
        Ok(stdout)
    }

    async fn upload_file(&mut self, local_path: &Path, remote_path: &str) -> DeployResult<()> {
        let limit = self.timeouts.transfer;
        let fut = async {
            let sftp = self.sftp().await?;
            let mut local = tokio::fs::File::open(local_path)
                .await
                .with_context(|| format!("failed to open `{}`", local_path.display()))?;
            let mut remote = sftp.create(remote_path).await?;
            let bytes = tokio::io::copy(&mut local, &mut remote).await?;
            remote.shutdown().await?;
            Ok::<_, anyhow::Error>(bytes)
        };

        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(bytes)) => {
                debug!(remote = %remote_path, bytes, "Upload complete");
                Ok(())
            }
            Ok(Err(e)) => Err(DeployError::transfer(local_path, remote_path, format!("{:#}", e))),
            Err(_) => Err(DeployError::transfer(local_path, remote_path, timed_out(limit))),
        }
    }

    async fn directory_exists(&mut self, remote_path: &str) -> DeployResult<bool> {
        self.stat(remote_path, true).await
    }

    async fn path_exists(&mut self, remote_path: &str) -> DeployResult<bool> {
        self.stat(remote_path, false).await
    }

    async fn make_directory(&mut self, remote_path: &str) -> DeployResult<()> {
        let what = format!("sftp mkdir {}", remote_path);
        let limit = self.timeouts.command;
        let fut = async {
            self.sftp().await?.create_dir(remote_path).await?;
            Ok::<_, anyhow::Error>(())
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DeployError::remote_command(what, format!("{:#}", e))),
            Err(_) => Err(DeployError::remote_command(what, timed_out(limit))),
        }
    }

    async fn close(&mut self) -> DeployResult<()> {
        if self.state.is_terminal() || self.state == SessionState::Disconnected {
            return Ok(());
        }
        self.transition(SessionState::Closed);

        if let Some(sftp) = self.sftp.take() {
            if let Err(e) = sftp.close().await {
                debug!(target = %self.target, error = %e, "Failed to close SFTP subsystem");
            }
        }
        if let Some(handle) = self.handle.take() {
            handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| DeployError::connection(self.target.clone(), e))?;
        }
        info!(target = %self.target, "Session closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_status: Option<u32>, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_status,
        }
    }

    #[test]
    fn test_zero_exit_returns_stdout() {
        let result = output(Some(0), "hello\n", "").into_result("echo hello");
        assert_eq!(result.unwrap(), "hello\n");
    }

    #[test]
    fn test_non_zero_exit_is_an_error() {
        let err = output(Some(2), "", "unzip: cannot find dist.zip")
            .into_result("unzip -o -q dist.zip")
            .unwrap_err();
        match err {
            DeployError::RemoteCommand {
                command,
                exit_status,
                stderr,
                ..
            } => {
                assert_eq!(command, "unzip -o -q dist.zip");
                assert_eq!(exit_status, Some(2));
                assert!(stderr.contains("cannot find"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_exit_status_is_an_error() {
        assert!(output(None, "partial", "").into_result("sleep 10").is_err());
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // 绑定后立即释放，得到一个没有监听的端口
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let params = ConnectParams {
            host: "127.0.0.1".to_string(),
            port,
            username: "u".to_string(),
            auth: RemoteAuth::Password("p".to_string()),
            strict_host_key_checking: false,
        };
        let timeouts = SessionTimeouts {
            connect: Duration::from_secs(5),
            ..SessionTimeouts::default()
        };

        let err = SshConnector::new(timeouts)
            .connect(&params)
            .await
            .err()
            .expect("connection should fail");
        assert!(matches!(err, DeployError::Connection { ref target, .. } if target == &params.target()));
    }

    fn params(port: u16) -> ConnectParams {
        ConnectParams {
            host: "127.0.0.1".to_string(),
            port,
            username: "u".to_string(),
            auth: RemoteAuth::Password("p".to_string()),
            strict_host_key_checking: false,
        }
    }

    #[tokio::test]
    async fn test_silent_server_times_out_as_connection_error() {
        // 只接受连接、不发送 SSH banner
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let timeouts = SessionTimeouts {
            connect: Duration::from_secs(1),
            ..SessionTimeouts::default()
        };
        let started = std::time::Instant::now();
        let err = SshConnector::new(timeouts)
            .connect(&params(port))
            .await
            .err()
            .expect("silent server should time out");

        match err {
            DeployError::Connection { target, reason } => {
                assert_eq!(target, format!("127.0.0.1:{}", port));
                assert_eq!(reason, "timed out after 1s");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }

    // ed25519 公钥，不会出现在任何 known_hosts 中
    const UNKNOWN_KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIJdD7y3aLq454yWBdwLWbieU1ebz9/cu7/QEXn9OIeZJ";

    #[tokio::test]
    async fn test_unknown_host_key_rejected_when_strict() {
        use russh::client::Handler;

        let key = russh_keys::parse_public_key_base64(UNKNOWN_KEY).unwrap();
        let mut handler = ClientHandler {
            host: "deploy-target.invalid".to_string(),
            port: 2222,
            strict: true,
        };
        assert!(!handler.check_server_key(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_host_key_accepted_when_not_strict() {
        use russh::client::Handler;

        let key = russh_keys::parse_public_key_base64(UNKNOWN_KEY).unwrap();
        let mut handler = ClientHandler {
            host: "deploy-target.invalid".to_string(),
            port: 2222,
            strict: false,
        };
        assert!(handler.check_server_key(&key).await.unwrap());
    }
}
