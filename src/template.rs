//! 关键字替换
//!
//! [`RequestTemplate`] 以文本形式保存请求的每个字段。使用关键字时逐个字段替换，
//! 然后再转换为HTTP类型，payload不会从一个字段溢出到另一个字段。
//! 使字段无效的payload（例如请求头值中的换行）会导致构建失败。
use crate::config::FuzzConfig;
use crate::{FuzzError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

/// 可直接交给HTTP客户端的请求
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub method: String,
    /// 规范化后的基础URL，无结尾斜杠
    pub url: String,
    /// 按应用顺序排列的请求头
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub keyword: String,
    /// 请求中是否出现关键字
    pub keyword_present: bool,
}

impl RequestTemplate {
    /// 根据运行配置创建模板
    ///
    /// 先设置User-Agent和Cookie，同名的自定义请求头会覆盖它们
    pub fn from_config(config: &FuzzConfig) -> Self {
        let mut template = Self {
            method: config.method.clone(),
            url: config.url.clone(),
            headers: Vec::new(),
            body: config.body.clone(),
            keyword: config.keyword.clone(),
            keyword_present: config.keyword_present,
        };

        if !config.user_agent.is_empty() {
            template.set_header("User-Agent", &config.user_agent);
        }
        if !config.cookie.is_empty() {
            template.set_header("Cookie", &config.cookie);
        }
        for (name, value) in &config.headers {
            template.set_header(name, value);
        }

        template
    }

    /// 设置请求头，替换名称相同（不区分大小写）的字段
    pub fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some(field) => *field = (name.to_string(), value.to_string()),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }

    /// 为一个payload和扩展名生成请求
    ///
    /// 没有关键字时payload追加到URL路径后，并去掉一个开头的斜杠。
    /// 返回请求以及实际使用的payload
    pub fn request_for(&self, payload: &str, ext: &str) -> Result<(PreparedRequest, String)> {
        if self.keyword_present {
            let ext = ext.replace(&self.keyword, payload);
            let mut template = self.clone();
            template.url.push_str(&ext);
            let request = template.replace_keyword(payload).into_request()?;
            Ok((request, payload.to_string()))
        } else {
            let payload = payload.strip_prefix('/').unwrap_or(payload);
            let mut template = self.clone();
            template.url = format!("{}/{}{}", self.url, payload, ext);
            Ok((template.into_request()?, payload.to_string()))
        }
    }

    /// 替换所有字段中出现的关键字
    ///
    /// 请求头名称不区分大小写，通常写成规范形式，所以名称中的 `Fuzz` 也会被替换
    pub fn replace_keyword(&self, payload: &str) -> RequestTemplate {
        let canonical = canonical_header_case(&self.keyword);

        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                let name = name
                    .replace(&self.keyword, payload)
                    .replace(&canonical, payload);
                (name, value.replace(&self.keyword, payload))
            })
            .collect();

        RequestTemplate {
            method: self.method.replace(&self.keyword, payload),
            url: self.url.replace(&self.keyword, payload),
            headers,
            body: self.body.replace(&self.keyword, payload),
            keyword: self.keyword.clone(),
            keyword_present: self.keyword_present,
        }
    }

    /// 将文本字段转换为HTTP类型并逐个校验
    pub fn into_request(self) -> Result<PreparedRequest> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| FuzzError::Template(format!("无效的请求方法 '{}'", self.method)))?;

        let url = Url::parse(&self.url)?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FuzzError::Template(format!("无效的请求头名称 '{}'", name)))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                FuzzError::Template(format!("请求头 '{}' 的值无效", name))
            })?;
            headers.insert(name, value);
        }

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body: self.body,
        })
    }
}

/// `FUZZ` -> `Fuzz`：首字母大写，其余小写
fn canonical_header_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
