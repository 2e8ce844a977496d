use crate::template::RequestTemplate;
use crate::utils::read_payload;
use crate::Result;
use log::debug;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::BufReader;
use tokio::sync::mpsc;

/// 一个工作单元：请求模板加一个payload和一个扩展名
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub template: Arc<RequestTemplate>,
    pub ext: String,
    pub payload: String,
    /// 已重试次数，只由持有该描述的worker修改
    pub retries: u8,
}

impl RequestDescriptor {
    pub fn new(template: Arc<RequestTemplate>, payload: String, ext: String) -> Self {
        Self {
            template,
            ext,
            payload,
            retries: 0,
        }
    }
}

/// 逐行读取字典，为每行和每个扩展名生成一个请求描述放入队列
///
/// 按原始字节读取，包含无效UTF-8的行以替换字符保留，不会中断读取。
/// 队列满时等待。返回入队的数量，返回时文件关闭。所有接收端关闭时提前结束
pub async fn produce_requests(
    file: File,
    template: Arc<RequestTemplate>,
    extensions: &[String],
    queue: mpsc::Sender<RequestDescriptor>,
) -> Result<usize> {
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut produced = 0;

    while let Some(line) = read_payload(&mut reader, &mut buf).await? {
        for ext in extensions {
            let descriptor = RequestDescriptor::new(template.clone(), line.clone(), ext.clone());
            if queue.send(descriptor).await.is_err() {
                debug!("请求队列已关闭，停止读取字典");
                return Ok(produced);
            }
            produced += 1;
        }
    }

    debug!("字典读取完成，共 {} 个请求入队", produced);
    Ok(produced)
}
