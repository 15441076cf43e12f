//! 部署上下文
//!
//! 一次运行的全部状态：运行 ID、工作目录、备份标识、阶段记录和进度显示

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::domain::deploy::{BackupId, DeployStage, Stage, StageStatus};
use crate::error::{DeployError, DeployFailure};

use super::progress::StageProgress;

/// 部署执行上下文
pub struct DeployContext {
    /// 运行 ID
    pub run_id: String,
    /// 解析相对 outputDir 的目录
    pub work_dir: PathBuf,
    /// 本次运行的备份标识，只生成一次
    pub backup_id: BackupId,
    /// 只校验并输出计划
    pub dry_run: bool,
    stages: Vec<DeployStage>,
    progress: StageProgress,
}

impl DeployContext {
    pub fn new(work_dir: PathBuf, dry_run: bool, progress: StageProgress) -> Self {
        Self::with_parts(work_dir, BackupId::now(), dry_run, progress)
    }

    /// 指定备份标识
    pub fn with_parts(work_dir: PathBuf, backup_id: BackupId, dry_run: bool, progress: StageProgress) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            work_dir,
            backup_id,
            dry_run,
            stages: Stage::ALL.iter().copied().map(DeployStage::new).collect(),
            progress,
        }
    }

    fn stage_mut(&mut self, stage: Stage) -> &mut DeployStage {
        let idx = Stage::ALL
            .iter()
            .position(|s| *s == stage)
            .unwrap_or_default();
        &mut self.stages[idx]
    }

    /// 阶段开始
    pub fn start(&mut self, stage: Stage) {
        self.stage_mut(stage).start();
        self.progress.start(format!("{}...", stage.display_name()));
        info!(stage = %stage, "{}", stage.display_name());
    }

    /// 更新当前阶段的进度文字
    pub fn step(&self, message: &str) {
        self.progress.update(message.to_string());
    }

    /// 阶段成功
    pub fn succeed(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        self.progress.clear();
        self.stage_mut(stage).finish(true, Some(message.clone()));
        info!(stage = %stage, "{}", message);
    }

    /// 阶段失败，其后的阶段标记为跳过，返回顶层失败报告
    pub fn fail(&mut self, stage: Stage, error: impl Into<DeployError>) -> DeployFailure {
        let error = error.into();
        self.progress.abandon(format!("{} failed", stage.display_name()));
        self.stage_mut(stage).finish(false, Some(error.to_string()));
        self.skip_pending(&format!("{} failed", stage));
        error!(stage = %stage, error = %error, "Stage failed");
        DeployFailure::new(stage, error)
    }

    /// 所有未开始的阶段标记为跳过
    pub fn skip_pending(&mut self, reason: &str) {
        for stage in self.stages.iter_mut() {
            if stage.status == StageStatus::Pending {
                stage.skip(Some(reason.to_string()));
            }
        }
    }

    pub fn stages(&self) -> &[DeployStage] {
        &self.stages
    }

    /// 输出各阶段汇总
    pub fn log_summary(&self) {
        for stage in &self.stages {
            let duration_ms = stage.duration_ms.unwrap_or_default();
            match stage.status {
                StageStatus::Failed => {
                    warn!(stage = %stage.stage, status = ?stage.status, duration_ms, "Stage summary")
                }
                _ => info!(stage = %stage.stage, status = ?stage.status, duration_ms, "Stage summary"),
            }
        }
        if let Ok(json) = serde_json::to_string(&self.stages) {
            tracing::debug!(run_id = %self.run_id, stages = %json, "Run summary");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DeployContext {
        DeployContext::with_parts(
            PathBuf::from("."),
            BackupId::parse("20240115103000").unwrap(),
            false,
            StageProgress::hidden(),
        )
    }

    #[test]
    fn test_success_then_failure_skips_rest() {
        let mut ctx = context();
        ctx.start(Stage::Validate);
        ctx.succeed(Stage::Validate, "ok");
        ctx.start(Stage::Compress);
        let failure = ctx.fail(
            Stage::Compress,
            DeployError::Compression {
                path: PathBuf::from("dist"),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            },
        );

        assert_eq!(failure.stage, Stage::Compress);
        let statuses: Vec<_> = ctx.stages().iter().map(|s| s.status.clone()).collect();
        assert_eq!(
            statuses,
            vec![
                StageStatus::Success,
                StageStatus::Failed,
                StageStatus::Skipped,
                StageStatus::Skipped,
                StageStatus::Skipped,
            ]
        );
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(context().run_id, context().run_id);
    }
}
