use crate::{FuzzError, Result};
use regex::Regex;
use reqwest::header::HeaderMap;
use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use url::Url;

/// 规范化URL格式，`example.com:8080/` -> `http://example.com:8080`
///
/// 返回的字符串用于构建请求URL。解析只用于校验，不返回解析结果，
/// 因为解析会把主机名转为小写，主机名中的关键字会丢失
pub fn normalize_url(url: &str) -> Result<String> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FuzzError::Config("未指定URL或主机名".to_string()));
    }

    let with_scheme = if has_http_scheme(url) {
        url.to_string()
    } else {
        format!("http://{}", url)
    };

    // 去掉结尾的斜杠，拼接路径时统一加一个
    let normalized = with_scheme
        .strip_suffix('/')
        .map(str::to_string)
        .unwrap_or(with_scheme);

    Url::parse(&normalized)?;
    Ok(normalized)
}

fn has_http_scheme(url: &str) -> bool {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME
        .get_or_init(|| Regex::new(r"^https?://").expect("static regex"))
        .is_match(url)
}

/// 检查扩展名格式是否形如 `.php`：点号加字母或数字
pub fn is_ext_format_valid(ext: &str) -> bool {
    static EXT: OnceLock<Regex> = OnceLock::new();
    EXT.get_or_init(|| Regex::new(r"^\.[[:alnum:]]+$").expect("static regex"))
        .is_match(ext)
}

/// 将 `Name:Value,Name:Value` 拆分为去除空白的键值对
///
/// 重复的名称保留原位置，取最后一个值
pub fn split_header_fields(raw: &str, sep: &str) -> Result<Vec<(String, String)>> {
    let mut header: Vec<(String, String)> = Vec::new();
    if raw.is_empty() {
        return Ok(header);
    }

    for field in raw.split(sep) {
        let (name, value) = field.split_once(':').ok_or_else(|| {
            FuzzError::Config(format!(
                "请求头格式错误 '{}'，应为 name:value",
                field
            ))
        })?;
        let name = name.trim().to_string();
        let value = value.trim().to_string();

        match header.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => header.push((name, value)),
        }
    }

    Ok(header)
}

/// 将 `404,500` 解析为集合，跳过非整数项
pub fn parse_int_set<T>(raw: &str, sep: &str) -> HashSet<T>
where
    T: FromStr + Hash + Eq,
{
    raw.split(sep)
        .filter_map(|token| token.trim().parse::<T>().ok())
        .collect()
}

/// 读取字典的下一行，去掉结尾的 `\n` 或 `\r\n`
///
/// 按原始字节读取，无效的UTF-8序列会被替换而不会中断读取。文件结束时返回 `None`
pub async fn read_payload<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

pub async fn count_wordlist_lines<P: AsRef<Path>>(path: P) -> Result<usize> {
    let mut reader = BufReader::new(File::open(path).await?);
    let mut buf = Vec::new();

    let mut count = 0;
    while read_payload(&mut reader, &mut buf).await?.is_some() {
        count += 1;
    }

    Ok(count)
}

/// 统计连续Unicode字母序列的个数，数字、标点和空白都会结束一个单词
pub fn count_words(body: &[u8]) -> usize {
    let text = String::from_utf8_lossy(body);

    let mut num_words = 0;
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if !in_word {
                num_words += 1;
                in_word = true;
            }
        } else {
            in_word = false;
        }
    }

    num_words
}

pub fn count_lines(body: &[u8]) -> usize {
    body.iter().filter(|&&b| b == b'\n').count()
}

/// 所有响应头名称及其全部值的字节数之和
pub fn header_size(headers: &HeaderMap) -> usize {
    headers
        .keys()
        .map(|name| {
            let values: usize = headers
                .get_all(name)
                .iter()
                .map(|value| value.as_bytes().len())
                .sum();
            name.as_str().len() + values
        })
        .sum()
}
