use crate::filter::HideFilters;
use crate::utils::{is_ext_format_valid, normalize_url, parse_int_set, split_header_fields};
use crate::{FuzzError, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const FUZZ_KEYWORD: &str = "FUZZ";
pub const MAX_REQUEST_RETRIES: u8 = 3;
pub const PROGRESS_SEND_INTERVAL: Duration = Duration::from_millis(75);
pub const MAX_CONCURRENCY: usize = 100;

const CMD_LINE_VALUE_SEP: &str = ",";
const HEADER_FIELD_SEP: &str = ",";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Txt,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "txt" => Ok(OutputFormat::Txt),
            other => Err(FuzzError::Config(format!(
                "不支持的输出格式 '{}'，可选: csv, json, txt",
                other
            ))),
        }
    }
}

/// 命令行传入的原始参数
#[derive(Debug, Clone)]
pub struct FuzzOptions {
    /// 目标URL或主机名
    pub url: String,
    /// 字典文件
    pub wordlist: PathBuf,
    pub method: String,
    /// 追加到每个payload后的扩展名，逗号分隔（`.php,.html`）
    pub extensions: String,
    /// 自定义请求头，逗号分隔（`Name:Value,Name:Value`）
    pub headers: String,
    pub user_agent: String,
    pub cookie: String,
    /// 请求体
    pub body: String,
    /// 并发worker数量
    pub concurrency: usize,
    /// 请求超时时间（毫秒）
    pub timeout_ms: u64,
    /// 每个worker每次请求后的等待时间（毫秒）
    pub sleep_ms: u64,
    pub follow_redirects: bool,
    pub progress: bool,
    pub show_404: bool,
    pub hide_codes: String,
    pub hide_lengths: String,
    pub hide_words: String,
    pub hide_lines: String,
    pub hide_header_sizes: String,
    pub output_file: Option<PathBuf>,
    pub output_format: Option<String>,
}

impl Default for FuzzOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            wordlist: PathBuf::new(),
            method: "GET".to_string(),
            extensions: String::new(),
            headers: String::new(),
            user_agent: String::new(),
            cookie: String::new(),
            body: String::new(),
            concurrency: 8,
            timeout_ms: 10_000,
            sleep_ms: 0,
            follow_redirects: false,
            progress: true,
            show_404: false,
            hide_codes: String::new(),
            hide_lengths: String::new(),
            hide_words: String::new(),
            hide_lines: String::new(),
            hide_header_sizes: String::new(),
            output_file: None,
            output_format: None,
        }
    }
}

/// 校验后的运行配置，所有派生值在此一次性计算
#[derive(Debug, Clone)]
pub struct FuzzConfig {
    /// 规范化后的目标，带协议，无结尾斜杠
    pub url: String,
    pub wordlist: PathBuf,
    /// 大写的HTTP方法
    pub method: String,
    /// 不会为空，未指定扩展名时为单个 `""`
    pub extensions: Vec<String>,
    pub headers: Vec<(String, String)>,
    pub user_agent: String,
    pub cookie: String,
    pub body: String,
    pub concurrency: usize,
    pub timeout: Duration,
    pub sleep: Duration,
    pub follow_redirects: bool,
    pub progress: bool,
    pub hide: HideFilters,
    pub keyword: String,
    pub keyword_present: bool,
    pub max_retries: u8,
    pub progress_interval: Duration,
    pub output_file: Option<PathBuf>,
    pub output_format: Option<OutputFormat>,
}

impl FuzzConfig {
    pub fn from_options(opts: FuzzOptions) -> Result<Self> {
        let url = normalize_url(&opts.url)?;

        if opts.wordlist.as_os_str().is_empty() {
            return Err(FuzzError::Config("未指定字典文件".to_string()));
        }
        if !opts.wordlist.exists() {
            return Err(FuzzError::Config(format!(
                "字典文件不存在: '{}'",
                opts.wordlist.display()
            )));
        }

        let extensions = parse_extensions(&opts.extensions)?;

        if opts.concurrency < 1 || opts.concurrency > MAX_CONCURRENCY {
            return Err(FuzzError::Config(format!(
                "并发数必须 >=1 且 <={}",
                MAX_CONCURRENCY
            )));
        }

        let output_format = match (&opts.output_file, &opts.output_format) {
            (Some(_), Some(format)) => Some(OutputFormat::parse(format)?),
            (None, None) => None,
            (Some(_), None) => {
                return Err(FuzzError::Config(
                    "指定输出文件时必须指定输出格式 (csv, json, txt)".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(FuzzError::Config(
                    "指定输出格式时必须指定输出文件".to_string(),
                ))
            }
        };

        let headers = split_header_fields(&opts.headers, HEADER_FIELD_SEP)?;
        let method = opts.method.to_uppercase();

        let mut hide = HideFilters {
            status_codes: parse_int_set(&opts.hide_codes, CMD_LINE_VALUE_SEP),
            content_lengths: parse_int_set(&opts.hide_lengths, CMD_LINE_VALUE_SEP),
            num_words: parse_int_set(&opts.hide_words, CMD_LINE_VALUE_SEP),
            num_lines: parse_int_set(&opts.hide_lines, CMD_LINE_VALUE_SEP),
            header_sizes: parse_int_set(&opts.hide_header_sizes, CMD_LINE_VALUE_SEP),
        };
        if !opts.show_404 {
            hide.status_codes.insert(404);
        }

        let parsed = Url::parse(&url)?;
        let keyword = FUZZ_KEYWORD.to_string();
        let keyword_present = [
            parsed.path(),
            parsed.query().unwrap_or_default(),
            opts.headers.as_str(),
            opts.body.as_str(),
            method.as_str(),
            opts.extensions.as_str(),
            opts.user_agent.as_str(),
            opts.cookie.as_str(),
        ]
        .iter()
        .any(|field| field.contains(&keyword));

        Ok(Self {
            url,
            wordlist: opts.wordlist,
            method,
            extensions,
            headers,
            user_agent: opts.user_agent,
            cookie: opts.cookie,
            body: opts.body,
            concurrency: opts.concurrency,
            timeout: Duration::from_millis(opts.timeout_ms),
            sleep: Duration::from_millis(opts.sleep_ms),
            follow_redirects: opts.follow_redirects,
            progress: opts.progress,
            hide,
            keyword,
            keyword_present,
            max_retries: MAX_REQUEST_RETRIES,
            progress_interval: PROGRESS_SEND_INTERVAL,
            output_file: opts.output_file,
            output_format,
        })
    }

    /// 生产者与worker之间请求队列的容量
    pub fn queue_capacity(&self) -> usize {
        self.concurrency * self.concurrency
    }
}

fn parse_extensions(raw: &str) -> Result<Vec<String>> {
    // 只有一个空扩展名时，每行字典仍会被请求一次
    if raw.is_empty() {
        return Ok(vec![String::new()]);
    }

    raw.split(CMD_LINE_VALUE_SEP)
        .map(|ext| {
            if is_ext_format_valid(ext) {
                Ok(ext.to_string())
            } else {
                Err(FuzzError::Config(format!(
                    "无效的扩展名 '{}'，应为点号加字母或数字，例如 .php",
                    ext
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn wordlist() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "admin").unwrap();
        file
    }

    fn options(wordlist: &NamedTempFile) -> FuzzOptions {
        FuzzOptions {
            url: "example.com/".to_string(),
            wordlist: wordlist.path().to_path_buf(),
            ..FuzzOptions::default()
        }
    }

    #[test]
    fn derives_defaults() {
        let wl = wordlist();
        let config = FuzzConfig::from_options(options(&wl)).unwrap();

        assert_eq!(config.url, "http://example.com");
        assert_eq!(config.extensions, vec![String::new()]);
        assert_eq!(config.method, "GET");
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.keyword, "FUZZ");
        assert!(!config.keyword_present);
        assert!(config.hide.status_codes.contains(&404));
        assert_eq!(config.queue_capacity(), 64);
    }

    #[test]
    fn show_404_keeps_status_hide_set_empty() {
        let wl = wordlist();
        let config = FuzzConfig::from_options(FuzzOptions {
            show_404: true,
            ..options(&wl)
        })
        .unwrap();
        assert!(config.hide.status_codes.is_empty());
    }

    #[test]
    fn detects_keyword_in_each_field() {
        let wl = wordlist();
        let cases = [
            FuzzOptions { url: "http://x/FUZZ".into(), ..options(&wl) },
            FuzzOptions { url: "http://x/?q=FUZZ".into(), ..options(&wl) },
            FuzzOptions { headers: "X-FUZZ:1".into(), ..options(&wl) },
            FuzzOptions { body: "a=FUZZ".into(), ..options(&wl) },
            FuzzOptions { method: "fuzz".into(), ..options(&wl) },
            FuzzOptions { extensions: ".FUZZ".into(), ..options(&wl) },
            FuzzOptions { user_agent: "FUZZ".into(), ..options(&wl) },
            FuzzOptions { cookie: "s=FUZZ".into(), ..options(&wl) },
        ];

        for opts in cases {
            let config = FuzzConfig::from_options(opts.clone()).unwrap();
            assert!(config.keyword_present, "{:?}", opts);
        }
    }

    #[test]
    fn rejects_invalid_input() {
        let wl = wordlist();
        assert!(FuzzConfig::from_options(FuzzOptions { url: String::new(), ..options(&wl) }).is_err());
        assert!(FuzzConfig::from_options(FuzzOptions { concurrency: 0, ..options(&wl) }).is_err());
        assert!(FuzzConfig::from_options(FuzzOptions { concurrency: 101, ..options(&wl) }).is_err());
        assert!(FuzzConfig::from_options(FuzzOptions { extensions: ".php,html".into(), ..options(&wl) }).is_err());
        assert!(FuzzConfig::from_options(FuzzOptions { headers: "broken".into(), ..options(&wl) }).is_err());
        assert!(FuzzConfig::from_options(FuzzOptions {
            wordlist: PathBuf::from("/nonexistent/wordlist.txt"),
            ..options(&wl)
        })
        .is_err());
        assert!(FuzzConfig::from_options(FuzzOptions {
            output_format: Some("json".into()),
            ..options(&wl)
        })
        .is_err());
        assert!(FuzzConfig::from_options(FuzzOptions {
            output_file: Some(PathBuf::from("out.xml")),
            output_format: Some("xml".into()),
            ..options(&wl)
        })
        .is_err());
    }

    #[test]
    fn parses_hide_sets_and_extensions() {
        let wl = wordlist();
        let config = FuzzConfig::from_options(FuzzOptions {
            extensions: ".php,.html".into(),
            hide_codes: "500,302".into(),
            hide_lengths: "0".into(),
            hide_words: "12".into(),
            hide_lines: "3".into(),
            hide_header_sizes: "120".into(),
            output_file: Some(PathBuf::from("out.csv")),
            output_format: Some("CSV".into()),
            ..options(&wl)
        })
        .unwrap();

        assert_eq!(config.extensions, vec![".php", ".html"]);
        assert!(config.hide.status_codes.contains(&500));
        assert!(config.hide.status_codes.contains(&302));
        assert!(config.hide.status_codes.contains(&404));
        assert!(config.hide.content_lengths.contains(&0));
        assert!(config.hide.num_words.contains(&12));
        assert!(config.hide.num_lines.contains(&3));
        assert!(config.hide.header_sizes.contains(&120));
        assert_eq!(config.output_format, Some(OutputFormat::Csv));
    }
}
