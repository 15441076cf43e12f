//! 阶段进度显示
//!
//! 同一时刻只有一个 spinner；stderr 不是终端时不绘制。
//! 日志通过 `ProgressWriter` 输出，写入前先暂停 spinner，两者不会交错。

use std::io::{self, Write};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::fmt::MakeWriter;

/// 当前阶段的 spinner
pub struct StageProgress {
    multi: MultiProgress,
    bar: Option<ProgressBar>,
}

impl StageProgress {
    /// 绘制到 `multi`，日志写入器须共用同一个 `MultiProgress`
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi, bar: None }
    }

    /// 不绘制
    pub fn hidden() -> Self {
        Self::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    /// 替换正在运行的 spinner
    pub fn start(&mut self, message: impl Into<String>) {
        self.clear();

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    /// 更新提示文字
    pub fn update(&self, message: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(message.into());
        }
    }

    /// 停止并擦除
    pub fn clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    /// 停止并保留 `message`
    pub fn abandon(&mut self, message: impl Into<String>) {
        if let Some(bar) = self.bar.take() {
            bar.abandon_with_message(message.into());
        }
    }

    pub fn is_running(&self) -> bool {
        self.bar.is_some()
    }
}

impl Drop for StageProgress {
    fn drop(&mut self) {
        self.clear();
    }
}

/// 日志写入器：写 stderr 前暂停 spinner
#[derive(Clone)]
pub struct ProgressWriter {
    multi: MultiProgress,
}

impl ProgressWriter {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl<'a> MakeWriter<'a> for ProgressWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().lock().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}
