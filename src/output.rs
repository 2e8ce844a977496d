//! 结果输出：控制台表格始终显示，另可输出csv、json或txt文件
use crate::config::{FuzzConfig, OutputFormat};
use crate::{FuzzError, FuzzResult, Progress, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const FILE_HEADER: [&str; 6] = [
    "Content-Length",
    "Words",
    "Lines",
    "Header",
    "Status-Code",
    "Payload",
];

/// 所有输出格式都实现该trait
pub trait Writer: Send {
    fn init(&mut self) -> Result<()>;
    fn write(&mut self, result: &FuzzResult) -> Result<()>;
    fn write_progress(&mut self, _progress: &Progress) -> Result<()> {
        Ok(())
    }
    fn close(&mut self) -> Result<()>;
}

/// 按 `format` 打开输出，创建或截断 `path`
pub fn file_writer<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Box<dyn Writer>> {
    let file = File::create(path)?;
    let writer: Box<dyn Writer> = match format {
        OutputFormat::Csv => Box::new(CsvWriter::new(file)),
        OutputFormat::Json => Box::new(JsonWriter::new(file)),
        OutputFormat::Txt => Box::new(TxtWriter::new(file)),
    };
    Ok(writer)
}

/// 控制台加可选的文件输出
pub struct Output {
    console: Console,
    file: Option<Box<dyn Writer>>,
}

impl Output {
    pub fn new(config: &FuzzConfig) -> Result<Self> {
        let file = match (&config.output_file, config.output_format) {
            (Some(path), Some(format)) => Some(file_writer(path, format)?),
            _ => None,
        };

        let mut output = Self {
            console: Console::new(config.progress)?,
            file,
        };
        output.console.init()?;
        if let Some(file) = output.file.as_mut() {
            file.init()?;
        }
        Ok(output)
    }

    pub fn write(&mut self, result: &FuzzResult) -> Result<()> {
        self.console.write(result)?;
        if let Some(file) = self.file.as_mut() {
            file.write(result)?;
        }
        Ok(())
    }

    pub fn write_progress(&mut self, progress: &Progress) -> Result<()> {
        self.console.write_progress(progress)?;
        if let Some(file) = self.file.as_mut() {
            file.write_progress(progress)?;
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.console.close()?;
        if let Some(file) = self.file.as_mut() {
            file.close()?;
        }
        Ok(())
    }
}

/// 标准输出上的对齐表格，下方显示进度条
pub struct Console {
    bar: ProgressBar,
}

impl Console {
    pub fn new(show_progress: bool) -> Result<Self> {
        let bar = if show_progress {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40}] {msg}")
                    .map_err(|e| FuzzError::Config(e.to_string()))?
                    .progress_chars("=>"),
            );
            bar
        } else {
            ProgressBar::hidden()
        };
        Ok(Self { bar })
    }
}

impl Writer for Console {
    fn init(&mut self) -> Result<()> {
        let rule = "-".repeat(81);
        self.bar.suspend(|| {
            println!("{}", rule);
            println!(
                "{:<13}{:<13}{:<13}{:<13}{:<13}{}",
                "Chars(-hh)", "Words(-hw)", "Lines(-hl)", "Header(-hr)", "Code(-hc)", "Payload"
            );
            println!("{}", rule);
        });
        Ok(())
    }

    fn write(&mut self, result: &FuzzResult) -> Result<()> {
        let row = table_row(result);
        self.bar.suspend(|| println!("{}", row));
        Ok(())
    }

    fn write_progress(&mut self, progress: &Progress) -> Result<()> {
        self.bar.set_length(progress.num_approx_requests as u64);
        self.bar.set_position(progress.num_done_requests as u64);
        self.bar.set_message(progress_line(progress));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

pub fn table_row(result: &FuzzResult) -> String {
    format!(
        "{:<13}{:<13}{:<13}{:<13}{:<13}{}",
        result.content_length,
        result.num_words,
        result.num_lines,
        result.header_size,
        result.status_code,
        result.payload
    )
}

/// `~123/9000 (1%)`
pub fn progress_line(progress: &Progress) -> String {
    format!(
        "~{}/{} ({}%)",
        progress.num_done_requests,
        progress.num_approx_requests,
        progress.percent()
    )
}

/// 以 `;` 分隔，带表头
pub struct CsvWriter {
    writer: csv::Writer<File>,
}

impl CsvWriter {
    pub fn new(file: File) -> Self {
        let writer = csv::WriterBuilder::new().delimiter(b';').from_writer(file);
        Self { writer }
    }
}

impl Writer for CsvWriter {
    fn init(&mut self) -> Result<()> {
        self.writer.write_record(FILE_HEADER)?;
        Ok(())
    }

    fn write(&mut self, result: &FuzzResult) -> Result<()> {
        self.writer.write_record(&[
            result.content_length.to_string(),
            result.num_words.to_string(),
            result.num_lines.to_string(),
            result.header_size.to_string(),
            result.status_code.to_string(),
            result.payload.clone(),
        ])?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// 收集所有结果，关闭时写出一个JSON数组
pub struct JsonWriter {
    file: BufWriter<File>,
    results: Vec<FuzzResult>,
}

impl JsonWriter {
    pub fn new(file: File) -> Self {
        Self {
            file: BufWriter::new(file),
            results: Vec::new(),
        }
    }
}

impl Writer for JsonWriter {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, result: &FuzzResult) -> Result<()> {
        self.results.push(result.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        serde_json::to_writer(&mut self.file, &self.results)?;
        writeln!(self.file)?;
        self.file.flush()?;
        Ok(())
    }
}

/// 以制表符分隔的纯文本
pub struct TxtWriter {
    file: BufWriter<File>,
}

impl TxtWriter {
    pub fn new(file: File) -> Self {
        Self {
            file: BufWriter::new(file),
        }
    }
}

impl Writer for TxtWriter {
    fn init(&mut self) -> Result<()> {
        writeln!(self.file, "{}", FILE_HEADER.join("\t"))?;
        Ok(())
    }

    fn write(&mut self, result: &FuzzResult) -> Result<()> {
        writeln!(
            self.file,
            "{}\t{}\t{}\t{}\t{}\t{}",
            result.content_length,
            result.num_words,
            result.num_lines,
            result.header_size,
            result.status_code,
            result.payload
        )?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}
