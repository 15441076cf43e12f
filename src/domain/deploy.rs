//! 部署相关领域模型

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;

/// 流水线阶段（按执行顺序）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Compress,
    Connect,
    Rotate,
    Deploy,
}

impl Stage {
    /// 全部阶段，按执行顺序
    pub const ALL: [Stage; 5] = [
        Stage::Validate,
        Stage::Compress,
        Stage::Connect,
        Stage::Rotate,
        Stage::Deploy,
    ];

    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Compress => "compress",
            Stage::Connect => "connect",
            Stage::Rotate => "rotate",
            Stage::Deploy => "deploy",
        }
    }

    /// 显示名称
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Validate => "Validate configuration",
            Stage::Compress => "Compress artifact",
            Stage::Connect => "Connect to server",
            Stage::Rotate => "Rotate backup",
            Stage::Deploy => "Upload and expand",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阶段状态
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 部署阶段信息
#[derive(Clone, Debug, Serialize)]
pub struct DeployStage {
    pub stage: Stage,
    /// 开始时间
    pub started_at: Option<DateTime<Utc>>,
    /// 结束时间
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    /// 阶段状态
    pub status: StageStatus,
    /// 附加信息
    pub message: Option<String>,
}

impl DeployStage {
    /// 创建新的待执行阶段
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过阶段
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StageStatus::Skipped;
        self.message = reason;
    }
}

/// 备份标识：本地时间 `YYYYMMDDHHMMSS`，每次运行生成一次
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupId(String);

impl BackupId {
    const FORMAT: &'static str = "%Y%m%d%H%M%S";

    /// 以当前本地时间生成
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at.format(Self::FORMAT).to_string())
    }

    /// 解析已有的标识，仅接受 14 位数字且为合法时间
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != 14 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDateTime::parse_from_str(s, Self::FORMAT)
            .ok()
            .map(|_| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_stage_as_str() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, ["validate", "compress", "connect", "rotate", "deploy"]);
    }

    #[test]
    fn test_deploy_stage_lifecycle() {
        let mut stage = DeployStage::new(Stage::Compress);
        assert_eq!(stage.status, StageStatus::Pending);

        stage.start();
        assert_eq!(stage.status, StageStatus::Running);
        assert!(stage.started_at.is_some());

        stage.finish(true, Some("Done".to_string()));
        assert_eq!(stage.status, StageStatus::Success);
        assert!(stage.finished_at.is_some());
        assert!(stage.duration_ms.is_some());
    }

    #[test]
    fn test_deploy_stage_skip() {
        let mut stage = DeployStage::new(Stage::Deploy);
        stage.skip(Some("rotate failed".to_string()));
        assert_eq!(stage.status, StageStatus::Skipped);
        assert!(stage.started_at.is_none());
    }

    #[test]
    fn test_backup_id_format() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(BackupId::from_datetime(at).as_str(), "20240115103000");
    }

    #[test]
    fn test_backup_id_now_is_digits_only() {
        let id = BackupId::now();
        assert_eq!(id.as_str().len(), 14);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(BackupId::parse(id.as_str()), Some(id));
    }

    #[test]
    fn test_backup_id_parse_rejects_garbage() {
        assert!(BackupId::parse("2024/01/15").is_none());
        assert!(BackupId::parse("20241315103000").is_none());
        assert!(BackupId::parse("2024011510300").is_none());
    }
}
