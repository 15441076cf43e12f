//! 远程部署计划
//!
//! 由校验后的配置和备份标识推导出所有远程路径和 shell 命令，
//! 备份轮换、上传解压以及 `--dry-run` 都从这里取命令。

use std::fmt;

use super::deploy::BackupId;

/// 远程部署计划
#[derive(Clone, Debug)]
pub struct DeployPlan {
    remote_path: String,
    artifact_name: String,
    backup_id: BackupId,
}

impl DeployPlan {
    pub fn new(remote_path: &str, artifact_name: &str, backup_id: BackupId) -> Self {
        Self {
            remote_path: normalize_remote(remote_path),
            artifact_name: artifact_name.to_string(),
            backup_id,
        }
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    pub fn backup_id(&self) -> &BackupId {
        &self.backup_id
    }

    /// 线上部署目录 `<remotePath>/<artifactName>`
    pub fn live_dir(&self) -> String {
        join_remote(&self.remote_path, &self.artifact_name)
    }

    /// 备份目录 `<remotePath>/<artifactName>_<backupId>`
    pub fn backup_dir(&self) -> String {
        format!("{}_{}", self.live_dir(), self.backup_id)
    }

    /// 远程压缩包 `<remotePath>/<artifactName>.zip`
    pub fn remote_archive(&self) -> String {
        join_remote(&self.remote_path, &self.archive_file_name())
    }

    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.artifact_name)
    }

    /// 删除旧备份，无匹配时 `rm -rf` 仍返回 0
    pub fn remove_backups_command(&self) -> String {
        format!("rm -rf {}_*", shell_quote(&self.live_dir()))
    }

    /// 线上目录改名为备份目录
    pub fn rotate_command(&self) -> String {
        format!(
            "mv {} {}",
            shell_quote(&self.live_dir()),
            shell_quote(&self.backup_dir())
        )
    }

    /// 在 `remotePath` 下静默覆盖解压
    pub fn expand_command(&self) -> String {
        format!(
            "cd {} && unzip -o -q {}",
            shell_quote(&self.remote_path),
            shell_quote(&self.archive_file_name())
        )
    }

    /// 解压成功后删除远程压缩包
    pub fn remove_archive_command(&self) -> String {
        format!("rm -f {}", shell_quote(&self.remote_archive()))
    }
}

impl fmt::Display for DeployPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "1. {}", self.remove_backups_command())?;
        writeln!(f, "2. {} (skipped when {} is absent)", self.rotate_command(), self.live_dir())?;
        writeln!(f, "3. ensure directory {}", self.remote_path)?;
        writeln!(f, "4. upload {} -> {}", self.archive_file_name(), self.remote_archive())?;
        writeln!(f, "5. {}", self.expand_command())?;
        write!(f, "6. {}", self.remove_archive_command())
    }
}

/// 拼接远程 POSIX 路径
pub fn join_remote(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

fn normalize_remote(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 对 shell 参数加引号，只含安全字符时原样返回
pub fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(remote: &str, name: &str) -> DeployPlan {
        DeployPlan::new(remote, name, BackupId::parse("20240115103000").unwrap())
    }

    #[test]
    fn test_backup_naming() {
        let plan = plan("/srv/app", "app");
        assert_eq!(plan.live_dir(), "/srv/app/app");
        assert_eq!(plan.backup_dir(), "/srv/app/app_20240115103000");
        assert_eq!(plan.remove_backups_command(), "rm -rf /srv/app/app_*");
        assert_eq!(
            plan.rotate_command(),
            "mv /srv/app/app /srv/app/app_20240115103000"
        );
    }

    #[test]
    fn test_expand_and_cleanup_commands() {
        let plan = plan("/srv/app/", "dist");
        assert_eq!(plan.remote_path(), "/srv/app");
        assert_eq!(plan.remote_archive(), "/srv/app/dist.zip");
        assert_eq!(plan.expand_command(), "cd /srv/app && unzip -o -q dist.zip");
        assert_eq!(plan.remove_archive_command(), "rm -f /srv/app/dist.zip");
    }

    #[test]
    fn test_root_remote_path() {
        let plan = plan("/", "dist");
        assert_eq!(plan.remote_path(), "/");
        assert_eq!(plan.live_dir(), "/dist");
    }

    #[test]
    fn test_glob_stays_outside_quotes() {
        let plan = plan("/srv/my app", "dist");
        assert_eq!(plan.remove_backups_command(), "rm -rf '/srv/my app/dist'_*");
        assert_eq!(plan.expand_command(), "cd '/srv/my app' && unzip -o -q dist.zip");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("simple"), "simple");
        assert_eq!(shell_quote("/srv/app-1.0"), "/srv/app-1.0");
        assert_eq!(shell_quote("with space"), "'with space'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("a;rm -rf /"), "'a;rm -rf /'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_display_lists_every_step() {
        let rendered = plan("/srv/app", "dist").to_string();
        assert_eq!(rendered.lines().count(), 6);
        assert!(rendered.contains("upload dist.zip -> /srv/app/dist.zip"));
    }
}
