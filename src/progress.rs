use crate::Progress;
use log::debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// 请求计数器（仅供参考）
///
/// worker使用relaxed原子操作递增，没有任何逻辑依赖它们，只用于显示进度
#[derive(Debug, Default)]
pub struct ProgressCounters {
    done: AtomicUsize,
    approx: AtomicUsize,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    /// 安排了一次重试，预计请求总数加一
    pub fn retry_scheduled(&self) {
        self.approx.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_estimate(&self, requests: usize) {
        self.approx.fetch_add(requests, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            num_done_requests: self.done.load(Ordering::Relaxed),
            num_approx_requests: self.approx.load(Ordering::Relaxed),
        }
    }
}

/// 字典计数完成后，每隔 `interval` 发送一次快照
///
/// 进度接收端关闭或字典计数失败时退出
pub async fn emit_progress(
    counters: Arc<ProgressCounters>,
    wordlist_read: oneshot::Receiver<()>,
    interval: Duration,
    progress: mpsc::Sender<Progress>,
) {
    // 字典计数完成前估算值没有意义
    if wordlist_read.await.is_err() {
        debug!("字典计数未完成，不输出进度");
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if progress.send(counters.snapshot()).await.is_err() {
            return;
        }
    }
}
