pub mod config;
pub mod engine;
pub mod filter;
pub mod http;
pub mod output;
pub mod progress;
pub mod template;
pub mod utils;
pub mod wordlist;

pub use config::{FuzzConfig, FuzzOptions, OutputFormat};
pub use engine::{FuzzChannels, Fuzzer};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FuzzError {
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL解析错误: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("模板错误: {0}")]
    Template(String),

    #[error("扫描错误: {0}")]
    Scan(String),
}

pub type Result<T> = std::result::Result<T, FuzzError>;

/// 单个响应的度量结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FuzzResult {
    /// 响应体字节数，服务器未给出时按实际读取的字节计算
    pub content_length: u64,
    /// 响应体中连续字母序列的个数
    pub num_words: usize,
    /// 响应体中 `\n` 的个数
    pub num_lines: usize,
    /// 所有响应头名称与值的长度之和
    pub header_size: usize,
    pub status_code: u16,
    /// 产生该响应的字典条目
    pub payload: String,
}

/// 请求计数器快照（仅供参考）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub num_done_requests: usize,
    pub num_approx_requests: usize,
}

impl Progress {
    /// 完成百分比，最大为100
    pub fn percent(&self) -> usize {
        if self.num_approx_requests == 0 {
            return 0;
        }
        (self.num_done_requests * 100 / self.num_approx_requests).min(100)
    }
}
