//! 命令行入口
//!
//! 对保存下来的页面执行一次过滤：整个 `<body>` 作为一次变更通知送入管道，随后执行
//! 关闭刷新，把处理后的 HTML 写到输出文件或标准输出。

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use comment_filter::env::core::{LogLevel, NoColor};
use comment_filter::env::{generate_env_docs, EnvVar};
use comment_filter::filter::{
    ConfigManager, FilterConfig, FilterError, FilterResult, FilterService, FlushOutcome,
    MutationRecord,
};
use comment_filter::parsers::html::dom::get_child_node_by_name;
use comment_filter::parsers::{html_to_dom, serialize_document};

const ANSI_COLOR_RED: &str = "\x1b[31m";
const ANSI_COLOR_RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(name = "comment-filter")]
#[command(about = "Hide toxic comments in a saved HTML page")]
#[command(version)]
struct Cli {
    /// HTML file to filter, or "-" to read from stdin
    #[arg(required_unless_present_any = ["env_docs", "init_config"])]
    input: Option<String>,

    /// Write the filtered page to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Load configuration from this TOML or JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Classification endpoint
    #[arg(short = 'a', long)]
    api_url: Option<String>,

    /// Toxicity threshold in [0, 1]
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Number of comments per classification request
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Leave the page untouched and send nothing
    #[arg(long)]
    disabled: bool,

    /// Charset of the input document
    #[arg(short = 'E', long, default_value = "utf-8")]
    encoding: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print supported environment variables and exit
    #[arg(long)]
    env_docs: bool,

    /// Write an example configuration file and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        print_error_message(&e.to_string());
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LogLevel::get_set()
            .and_then(Result::ok)
            .unwrap_or_else(|| "warn".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let ansi = !NoColor::get_or_default(false) && atty::is(atty::Stream::Stderr);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("comment_filter={}", level)))
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .init();
}

fn run(cli: &Cli) -> FilterResult<()> {
    if cli.env_docs {
        print!("{}", generate_env_docs());
        return Ok(());
    }
    if let Some(path) = &cli.init_config {
        ConfigManager::generate_example_config(path)?;
        eprintln!("已生成示例配置: {}", path.display());
        return Ok(());
    }

    let config = build_config(cli)?;
    let input = match cli.input.as_deref() {
        Some(input) => read_input(input)?,
        None => return Err(FilterError::InvalidInput("缺少输入文件".to_string())),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(filter_document(&config, &input, &cli.encoding))?;

    match &cli.output {
        Some(path) => fs::write(path, output)?,
        None => io::stdout().write_all(&output)?,
    }

    Ok(())
}

fn build_config(cli: &Cli) -> FilterResult<FilterConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigManager::from_file(path)?.into_config(),
        None => ConfigManager::new()?.into_config(),
    };

    if let Some(api_url) = &cli.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(threshold) = cli.threshold {
        config.default_threshold = threshold;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if cli.disabled {
        config.default_enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn read_input(input: &str) -> FilterResult<Vec<u8>> {
    if input == "-" {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        Ok(data)
    } else {
        fs::read(input).map_err(|e| FilterError::InvalidInput(format!("无法读取 {}: {}", input, e)))
    }
}

async fn filter_document(config: &FilterConfig, input: &[u8], encoding: &str) -> FilterResult<Vec<u8>> {
    let dom = html_to_dom(input, encoding)?;
    let service = FilterService::from_config(config)?;

    let root = get_child_node_by_name(&dom.document, "html")
        .and_then(|html| get_child_node_by_name(&html, "body"))
        .unwrap_or_else(|| dom.document.clone());

    let added = service.ingest(&MutationRecord::new(vec![root]));
    tracing::info!("发现 {} 条评论", added);

    let report = service.flush_now().await;
    match &report.outcome {
        FlushOutcome::Aborted(e) => tracing::warn!("过滤未完成: {} ({})", report.summary(), e),
        _ => tracing::info!("{}", report.summary()),
    }

    Ok(serialize_document(&dom.document, encoding)?)
}

fn print_error_message(text: &str) {
    let stderr = io::stderr();
    let mut handle = stderr.lock();

    if atty::is(atty::Stream::Stderr) && !NoColor::get_or_default(false) {
        let _ = writeln!(handle, "{}{}{}", ANSI_COLOR_RED, text, ANSI_COLOR_RESET);
    } else {
        let _ = writeln!(handle, "{}", text);
    }
}
