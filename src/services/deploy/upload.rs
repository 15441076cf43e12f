//! 上传并解压
//!
//! 确保远程目录存在 → 上传 zip → 覆盖解压 → 删除远程 zip → 关闭会话。
//! 任何一步失败都不再执行后续步骤，但会话总会关闭。

use std::path::Path;

use tracing::{info, warn};

use crate::domain::plan::DeployPlan;
use crate::error::DeployResult;
use crate::services::session::{ensure_directory, RemoteSession};

/// 部署新包，接管会话并在返回前关闭它（恰好一次）
pub async fn deploy(
    mut session: Box<dyn RemoteSession>,
    plan: &DeployPlan,
    local_archive: &Path,
) -> DeployResult<()> {
    let result = upload_and_expand(session.as_mut(), plan, local_archive).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close remote session");
    }
    result
}

async fn upload_and_expand(
    session: &mut dyn RemoteSession,
    plan: &DeployPlan,
    local_archive: &Path,
) -> DeployResult<()> {
    if ensure_directory(session, plan.remote_path()).await? {
        info!(remote_path = %plan.remote_path(), "Created remote directory");
    }

    let remote_archive = plan.remote_archive();
    session.upload_file(local_archive, &remote_archive).await?;
    info!(local = %local_archive.display(), remote = %remote_archive, "Uploaded archive");

    session.run_command(&plan.expand_command()).await?;
    session.run_command(&plan.remove_archive_command()).await?;
    info!(remote_path = %plan.remote_path(), "Expanded archive and removed it");

    Ok(())
}
