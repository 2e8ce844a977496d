//! worker池与运行调度
//!
//! 一个生产者从字典填充有界队列，`concurrency` 个worker从中取请求。
//! 生产者结束后发送端被释放，队列关闭；队列关闭且为空时worker退出循环。
//! 所有worker退出后才发送结束信号并关闭结果通道
use crate::config::FuzzConfig;
use crate::http::{HttpClient, Invoker};
use crate::progress::{emit_progress, ProgressCounters};
use crate::template::RequestTemplate;
use crate::utils::count_wordlist_lines;
use crate::wordlist::{produce_requests, RequestDescriptor};
use crate::{FuzzResult, Progress, Result};
use futures::future;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::fs::File;
use tokio::sync::{mpsc, oneshot, Mutex};

/// 交给输出端的通道
pub struct FuzzChannels {
    /// 每个通过隐藏过滤的响应一条
    pub results: mpsc::Receiver<FuzzResult>,
    /// 定期的进度快照，仅在启用进度输出时发送
    pub progress: mpsc::Receiver<Progress>,
    /// 所有worker退出后触发一次，随后结果发送端被释放。
    /// `results` 有容量上限，必须在等待该信号的同时读取，先等待会让worker阻塞在已满的通道上
    pub finished: oneshot::Receiver<()>,
}

type SharedQueue = Arc<Mutex<mpsc::Receiver<RequestDescriptor>>>;

/// 模糊测试引擎
pub struct Fuzzer {
    config: Arc<FuzzConfig>,
    invoker: Arc<dyn Invoker>,
    counters: Arc<ProgressCounters>,
}

impl Fuzzer {
    /// 创建发送真实HTTP请求的引擎
    pub fn new(config: FuzzConfig) -> Result<Self> {
        let client = HttpClient::new(&config)?;
        Ok(Self::with_invoker(config, Arc::new(client)))
    }

    pub fn with_invoker(config: FuzzConfig, invoker: Arc<dyn Invoker>) -> Self {
        Self {
            config: Arc::new(config),
            invoker,
            counters: Arc::new(ProgressCounters::new()),
        }
    }

    pub fn counters(&self) -> Arc<ProgressCounters> {
        self.counters.clone()
    }

    /// 在后台开始运行并返回输出通道
    ///
    /// 先打开字典再启动任务，打开失败则整个运行失败
    pub async fn start(self) -> Result<FuzzChannels> {
        let file = File::open(&self.config.wordlist).await?;

        let (result_tx, result_rx) = mpsc::channel(self.config.concurrency);
        let (progress_tx, progress_rx) = mpsc::channel(self.config.concurrency);
        let (finished_tx, finished_rx) = oneshot::channel();
        let (wordlist_read_tx, wordlist_read_rx) = oneshot::channel();

        info!(
            "开始测试 {}，worker数: {}，包含关键字: {}",
            self.config.url, self.config.concurrency, self.config.keyword_present
        );

        tokio::spawn(estimate_requests(
            self.config.clone(),
            self.counters.clone(),
            wordlist_read_tx,
        ));

        if self.config.progress {
            tokio::spawn(emit_progress(
                self.counters.clone(),
                wordlist_read_rx,
                self.config.progress_interval,
                progress_tx,
            ));
        }

        tokio::spawn(self.run(file, result_tx, finished_tx));

        Ok(FuzzChannels {
            results: result_rx,
            progress: progress_rx,
            finished: finished_rx,
        })
    }

    async fn run(
        self,
        file: File,
        results: mpsc::Sender<FuzzResult>,
        finished: oneshot::Sender<()>,
    ) {
        let template = Arc::new(RequestTemplate::from_config(&self.config));
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity());
        let queue: SharedQueue = Arc::new(Mutex::new(queue_rx));

        let producer = {
            let config = self.config.clone();
            tokio::spawn(async move {
                produce_requests(file, template, &config.extensions, queue_tx).await
            })
        };

        let workers: Vec<_> = (0..self.config.concurrency)
            .map(|id| {
                tokio::spawn(work(
                    id,
                    queue.clone(),
                    self.invoker.clone(),
                    self.config.clone(),
                    self.counters.clone(),
                    results.clone(),
                ))
            })
            .collect();

        // 生产者持有唯一的发送端，结束后队列即关闭
        match producer.await {
            Ok(Ok(produced)) => debug!("生产者结束，共 {} 个请求入队", produced),
            Ok(Err(e)) => warn!("读取字典失败: {}", e),
            Err(e) => warn!("生产者任务失败: {}", e),
        }

        for outcome in future::join_all(workers).await {
            if let Err(e) = outcome {
                warn!("worker任务失败: {}", e);
            }
        }

        info!("所有worker已结束: {:?}", self.counters.snapshot());
        let _ = finished.send(());
        drop(results);
    }
}

/// 统计字典行数作为预计总数，然后通知进度发送任务
async fn estimate_requests(
    config: Arc<FuzzConfig>,
    counters: Arc<ProgressCounters>,
    wordlist_read: oneshot::Sender<()>,
) {
    match count_wordlist_lines(&config.wordlist).await {
        Ok(lines) => {
            counters.add_estimate(lines * config.extensions.len());
            let _ = wordlist_read.send(());
        }
        Err(e) => warn!("统计字典行数失败: {}", e),
    }
}

/// 从队列取请求，直到队列关闭且为空
async fn work(
    id: usize,
    queue: SharedQueue,
    invoker: Arc<dyn Invoker>,
    config: Arc<FuzzConfig>,
    counters: Arc<ProgressCounters>,
    results: mpsc::Sender<FuzzResult>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        match next {
            Some(descriptor) => {
                consume_request(descriptor, invoker.as_ref(), &config, &counters, &results).await
            }
            None => break,
        }
    }
    debug!("worker {} 结束", id);
}

/// 执行一个请求，出错时原地重试，最多 `config.max_retries` 次
///
/// 每次尝试都计为一个已完成请求，之后等待配置的时间。多次失败的请求记录警告后丢弃
pub async fn consume_request(
    mut descriptor: RequestDescriptor,
    invoker: &dyn Invoker,
    config: &FuzzConfig,
    counters: &ProgressCounters,
    results: &mpsc::Sender<FuzzResult>,
) {
    loop {
        let outcome = invoker.invoke(&descriptor).await;
        counters.request_done();

        if !config.sleep.is_zero() {
            tokio::time::sleep(config.sleep).await;
        }

        match outcome {
            Ok(result) => {
                if config.hide.is_visible(&result) && results.send(result).await.is_err() {
                    debug!("结果接收端已关闭");
                }
                return;
            }
            Err(e) if descriptor.retries < config.max_retries => {
                descriptor.retries += 1;
                counters.retry_scheduled();
                debug!(
                    "重试 {}/{} '{}': {}",
                    descriptor.retries, config.max_retries, descriptor.payload, e
                );
            }
            Err(e) => {
                warn!(
                    "放弃请求 '{}{}'，错误次数过多: {}",
                    descriptor.payload, descriptor.ext, e
                );
                return;
            }
        }
    }
}
