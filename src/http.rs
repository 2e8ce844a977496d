use crate::config::FuzzConfig;
use crate::utils::{count_lines, count_words, header_size};
use crate::wordlist::RequestDescriptor;
use crate::{FuzzResult, Result};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{redirect, Client};
use std::time::Duration;

/// 执行一个请求描述
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, descriptor: &RequestDescriptor) -> Result<FuzzResult>;
}

/// worker使用的HTTP客户端封装
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &FuzzConfig) -> Result<Self> {
        Self::with_options(config.timeout, config.follow_redirects)
    }

    pub fn with_options(timeout: Duration, follow_redirects: bool) -> Result<Self> {
        let redirect_policy = if follow_redirects {
            redirect::Policy::default()
        } else {
            redirect::Policy::none()
        };

        // 不校验证书
        let client = Client::builder()
            .timeout(timeout)
            .use_rustls_tls()
            .danger_accept_invalid_certs(true)
            .redirect(redirect_policy)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Invoker for HttpClient {
    async fn invoke(&self, descriptor: &RequestDescriptor) -> Result<FuzzResult> {
        let (request, payload) = descriptor
            .template
            .request_for(&descriptor.payload, &descriptor.ext)?;

        debug!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;

        let status_code = response.status().as_u16();
        let header_size = header_size(response.headers());
        let announced_length = response.content_length();
        let body: Bytes = response.bytes().await?;

        Ok(measure(status_code, header_size, announced_length, &body, payload))
    }
}

/// 根据完整读取的响应体计算度量
///
/// 没有Content-Length时（30x/40x响应常见）按读取的字节数计算
pub fn measure(
    status_code: u16,
    header_size: usize,
    announced_length: Option<u64>,
    body: &[u8],
    payload: String,
) -> FuzzResult {
    FuzzResult {
        content_length: announced_length.unwrap_or(body.len() as u64),
        num_words: count_words(body),
        num_lines: count_lines(body),
        header_size,
        status_code,
        payload,
    }
}
