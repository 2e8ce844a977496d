use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use fuzzy::output::Output;
use fuzzy::{FuzzConfig, FuzzOptions, Fuzzer};
use log::debug;
use std::path::PathBuf;

/// 请求中任意位置（URL、方法、请求头、请求体或扩展名）出现关键字FUZZ时，
/// 用字典中的每一项替换它；否则将字典项追加到URL路径后
#[derive(Parser, Debug)]
#[clap(
    name = "fuzzy",
    about = "一个高性能、多线程的HTTP内容发现与关键字模糊测试工具",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
)]
struct Cli {
    /// 目标URL或主机名
    #[clap(short, long)]
    url: String,

    /// 字典文件路径（每行一个payload）
    #[clap(short, long, value_name = "FILE")]
    wordlist: PathBuf,

    /// HTTP方法: GET, POST, <自定义>, ...
    #[clap(short, long, default_value = "GET")]
    method: String,

    /// 追加到路径后的扩展名，逗号分隔。例如: -x .php,.html
    #[clap(short = 'x', long, default_value = "")]
    extensions: String,

    /// 自定义请求头，逗号分隔。例如: -H 'User-Agent:Chrome,Cookie:a=b'
    #[clap(short = 'H', long, default_value = "")]
    headers: String,

    /// 请求体
    #[clap(short, long, default_value = "")]
    data: String,

    /// 自定义User-Agent
    #[clap(short = 'a', long, default_value = "")]
    user_agent: String,

    /// 自定义Cookie
    #[clap(short, long, default_value = "")]
    cookie: String,

    /// 并发数量（1-100）
    #[clap(short, long, default_value = "8")]
    threads: usize,

    /// 请求超时时间（毫秒）
    #[clap(long, default_value = "10000")]
    timeout: u64,

    /// 每个worker每次请求后的等待时间（毫秒）
    #[clap(short, long, default_value = "0")]
    sleep: u64,

    /// 跟随30x重定向
    #[clap(short, long)]
    follow_redirects: bool,

    /// 禁用进度输出
    #[clap(long)]
    no_progress: bool,

    /// 显示404响应
    #[clap(long = "show-404")]
    show_404: bool,

    /// 隐藏的状态码，逗号分隔。例如: --hc 404,500
    #[clap(long = "hc", default_value = "")]
    hide_codes: String,

    /// 隐藏的响应长度
    #[clap(long = "hh", default_value = "")]
    hide_lengths: String,

    /// 隐藏的单词数
    #[clap(long = "hw", default_value = "")]
    hide_words: String,

    /// 隐藏的行数
    #[clap(long = "hl", default_value = "")]
    hide_lines: String,

    /// 隐藏的响应头大小
    #[clap(long = "hr", default_value = "")]
    hide_header_sizes: String,

    /// 结果输出文件路径
    #[clap(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// 输出文件格式: csv, json, txt
    #[clap(long)]
    output_format: Option<String>,

    /// 启用调试日志
    #[clap(long)]
    debug: bool,
}

impl From<Cli> for FuzzOptions {
    fn from(cli: Cli) -> Self {
        FuzzOptions {
            url: cli.url,
            wordlist: cli.wordlist,
            method: cli.method,
            extensions: cli.extensions,
            headers: cli.headers,
            user_agent: cli.user_agent,
            cookie: cli.cookie,
            body: cli.data,
            concurrency: cli.threads,
            timeout_ms: cli.timeout,
            sleep_ms: cli.sleep,
            follow_redirects: cli.follow_redirects,
            progress: !cli.no_progress,
            show_404: cli.show_404,
            hide_codes: cli.hide_codes,
            hide_lengths: cli.hide_lengths,
            hide_words: cli.hide_words,
            hide_lines: cli.hide_lines,
            hide_header_sizes: cli.hide_header_sizes,
            output_file: cli.output,
            output_format: cli.output_format,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let cli = Cli::parse();

    let log_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let config = FuzzConfig::from_options(cli.into()).context("参数无效")?;
    let mut output = Output::new(&config).context("初始化输出失败")?;

    let fuzzer = Fuzzer::new(config)?;
    let mut channels = fuzzer.start().await.context("启动失败")?;

    let mut progress_open = true;
    loop {
        tokio::select! {
            Some(result) = channels.results.recv() => output.write(&result)?,
            progress = channels.progress.recv(), if progress_open => match progress {
                Some(progress) => output.write_progress(&progress)?,
                None => progress_open = false,
            },
            _ = &mut channels.finished => break,
        }
    }

    // 结束信号之前发送的结果可能仍在缓冲中
    while let Some(result) = channels.results.recv().await {
        output.write(&result)?;
    }
    output.close()?;
    debug!("运行结束");

    Ok(())
}
