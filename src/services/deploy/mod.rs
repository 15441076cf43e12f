//! 部署编排
//!
//! 校验 → 压缩 → 连接 → 备份轮换 → 上传解压，严格串行，不重试。
//! 任一阶段失败立即停止，已打开的会话保证关闭一次，返回 `DeployFailure`。

pub mod backup;
pub mod context;
pub mod progress;
pub mod upload;

use std::path::{Path, PathBuf};

use indicatif::MultiProgress;
use tracing::{info, warn, Instrument};

use crate::config::{validate, DeployFile};
use crate::domain::deploy::Stage;
use crate::domain::plan::DeployPlan;
use crate::error::DeployFailure;
use crate::infra::archive::{self, ArchivePackage};
use crate::services::session::{Connector, RemoteSession};

pub use context::DeployContext;
pub use progress::{ProgressWriter, StageProgress};

/// 运行参数
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// JSON 配置文件
    pub config_path: PathBuf,
    /// 解析相对 outputDir 的目录
    pub work_dir: PathBuf,
    pub dry_run: bool,
    /// spinner 绘制目标，与日志写入器共用
    pub progress: MultiProgress,
}

/// 成功部署的结果
#[derive(Clone, Debug)]
pub struct DeployReport {
    pub target: String,
    pub live_dir: String,
    /// 首次部署时为 None
    pub backup_dir: Option<String>,
    pub archive: ArchivePackage,
}

#[derive(Clone, Debug)]
pub enum DeployOutcome {
    Deployed(DeployReport),
    /// `--dry-run`：只校验，返回计划
    Planned(DeployPlan),
}

/// 读取配置文件并执行一次部署
pub async fn run(options: &RunOptions, connector: &dyn Connector) -> Result<DeployOutcome, DeployFailure> {
    let progress = StageProgress::new(options.progress.clone());
    let mut ctx = DeployContext::new(options.work_dir.clone(), options.dry_run, progress);
    run_with_context(&mut ctx, &options.config_path, connector).await
}

/// 同 `run`，使用外部提供的上下文
pub async fn run_with_context(
    ctx: &mut DeployContext,
    config_path: &Path,
    connector: &dyn Connector,
) -> Result<DeployOutcome, DeployFailure> {
    let span = tracing::info_span!("deploy", run_id = %ctx.run_id);
    async {
        ctx.start(Stage::Validate);
        let file = DeployFile::load(config_path).map_err(|e| ctx.fail(Stage::Validate, e))?;
        let result = execute(ctx, &file, connector).await;
        ctx.log_summary();
        result
    }
    .instrument(span)
    .await
}

/// 按顺序执行各阶段，`Validate` 阶段须已由调用方开始
pub async fn execute(
    ctx: &mut DeployContext,
    file: &DeployFile,
    connector: &dyn Connector,
) -> Result<DeployOutcome, DeployFailure> {
    // 1. 校验
    let config = validate(file, &ctx.work_dir).map_err(|e| ctx.fail(Stage::Validate, e))?;
    let plan = DeployPlan::new(&config.remote_path, &config.artifact_name, ctx.backup_id.clone());
    ctx.succeed(
        Stage::Validate,
        format!(
            "Deploying {} to {}:{}",
            config.local_artifact_path.display(),
            config.remote.target(),
            plan.remote_path()
        ),
    );

    if ctx.dry_run {
        ctx.skip_pending("dry run");
        return Ok(DeployOutcome::Planned(plan));
    }

    // 2. 压缩
    ctx.start(Stage::Compress);
    let archive = archive::compress(
        &config.local_artifact_path,
        &config.local_archive_path(),
        &config.artifact_name,
    )
    .await
    .map_err(|e| ctx.fail(Stage::Compress, e))?;
    ctx.succeed(
        Stage::Compress,
        format!(
            "Compressed {} files into {} ({} bytes, sha256 {})",
            archive.files,
            archive.path.display(),
            archive.size,
            archive.sha256
        ),
    );

    // 3. 连接
    ctx.start(Stage::Connect);
    let mut session = connector
        .connect(&config.remote)
        .await
        .map_err(|e| ctx.fail(Stage::Connect, e))?;
    ctx.succeed(Stage::Connect, format!("Connected to {}", config.remote.target()));

    // 4. 备份轮换；失败时会话尚未交给部署阶段，在这里关闭
    ctx.start(Stage::Rotate);
    ctx.step("Removing stale backups...");
    let rotation = match backup::rotate(session.as_mut(), &plan).await {
        Ok(rotation) => rotation,
        Err(e) => {
            close_quietly(session.as_mut()).await;
            return Err(ctx.fail(Stage::Rotate, e));
        }
    };
    let message = match &rotation.backup_dir {
        Some(dir) => format!("Backed up to {}", dir),
        None => format!("Nothing to back up at {}", plan.live_dir()),
    };
    ctx.succeed(Stage::Rotate, message);

    // 5. 上传、解压、清理、关闭会话
    ctx.start(Stage::Deploy);
    ctx.step("Uploading archive...");
    upload::deploy(session, &plan, &archive.path)
        .await
        .map_err(|e| ctx.fail(Stage::Deploy, e))?;
    ctx.succeed(Stage::Deploy, format!("Deployed {}", plan.live_dir()));

    info!(target = %config.remote.target(), live_dir = %plan.live_dir(), "Deployment finished");
    Ok(DeployOutcome::Deployed(DeployReport {
        target: config.remote.target(),
        live_dir: plan.live_dir(),
        backup_dir: rotation.backup_dir,
        archive,
    }))
}

async fn close_quietly(session: &mut dyn RemoteSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close remote session");
    }
}
