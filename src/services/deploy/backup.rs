//! 备份轮换
//!
//! 上传之前执行：先删除所有旧备份，再把线上目录改名为带时间戳的备份，
//! 让线上目录名空出来给新包解压。两步之间到上传完成前远程没有线上目录。

use tracing::info;

use crate::domain::plan::DeployPlan;
use crate::error::DeployResult;
use crate::services::session::RemoteSession;

/// 轮换结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rotation {
    /// 新备份路径；首次部署没有线上目录时为 None
    pub backup_dir: Option<String>,
}

/// 删除 `<remotePath>/<artifactName>_*`，再把 `<remotePath>/<artifactName>` 改名为备份
pub async fn rotate(session: &mut dyn RemoteSession, plan: &DeployPlan) -> DeployResult<Rotation> {
    session.run_command(&plan.remove_backups_command()).await?;
    info!(pattern = %format!("{}_*", plan.live_dir()), "Removed stale backups");

    let live_dir = plan.live_dir();
    if !session.path_exists(&live_dir).await? {
        info!(live_dir = %live_dir, "No live deployment to back up");
        return Ok(Rotation { backup_dir: None });
    }

    let backup_dir = plan.backup_dir();
    session.run_command(&plan.rotate_command()).await?;
    info!(backup_dir = %backup_dir, "Backed up live deployment");

    Ok(Rotation {
        backup_dir: Some(backup_dir),
    })
}
