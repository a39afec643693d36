//! # 图片格式转换 — 命令行入口
//!
//! 本文件仅负责日志初始化、参数解析与结果输出，转换逻辑见 `lib.rs`。
//!
//! ```text
//! image-converter <input> [output] [--config <path>]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tokio::task::JoinHandle;

use image_converter::{ChannelProgressSink, ConverterConfig, ImageConverterManager, RawImageBlob};

struct CliArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs, String> {
    let mut input = None;
    let mut output = None;
    let mut config = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config 需要路径参数")?;
                config = Some(PathBuf::from(path));
            }
            _ if input.is_none() => input = Some(PathBuf::from(arg)),
            _ if output.is_none() => output = Some(PathBuf::from(arg)),
            other => return Err(format!("多余的参数：{}", other)),
        }
    }

    let input = input.ok_or("用法：image-converter <input> [output] [--config <path>]")?;
    Ok(CliArgs {
        input,
        output,
        config,
    })
}

fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension)
}

/// 等待进度输出任务结束；任务异常时记录警告，返回是否正常结束。
async fn finish_reporter(reporter: JoinHandle<()>) -> bool {
    match reporter.await {
        Ok(()) => true,
        Err(err) => {
            log::warn!("进度输出任务异常结束：{}", err);
            false
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = match args.config.as_deref().map(ConverterConfig::load_from_path) {
        Some(Ok(config)) => config,
        Some(Err(err)) => {
            log::error!("配置加载失败：{}", err);
            return ExitCode::from(2);
        }
        None => ConverterConfig::default(),
    };

    let blob = match RawImageBlob::from_path(&args.input, config.max_file_size) {
        Ok(blob) => blob,
        Err(err) => {
            log::error!("读取输入失败：{}", err);
            return ExitCode::FAILURE;
        }
    };

    let manager = ImageConverterManager::with_config(&config);
    let (progress, mut events) = ChannelProgressSink::new();
    let reporter = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event.progress_percent {
                Some(percent) => log::info!("⏳ {} ({}%)", event.message, percent),
                None => log::info!("⏳ {}", event.message),
            }
        }
    });

    let locator = args.input.display().to_string();
    let outcome = manager.convert_image(&blob, &locator, &progress).await;
    drop(progress);
    finish_reporter(reporter).await;

    match outcome {
        Ok(Some(result)) => {
            let output = args.output.unwrap_or_else(|| {
                default_output_path(&args.input, &result.output_format.file_extension_hint)
            });
            if let Err(err) = result.output.write_to_path(&output) {
                log::error!("写入输出失败：{}", err);
                return ExitCode::FAILURE;
            }
            log::info!(
                "✅ 已转换 {} -> {}（{} bytes -> {} bytes）",
                args.input.display(),
                output.display(),
                result.original_size_bytes,
                result.converted_size_bytes
            );
            ExitCode::SUCCESS
        }
        Ok(None) => {
            log::info!("无需转换：{}", args.input.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("转换失败 [{}/{}]：{}", err.stage(), err.code(), err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reporter_failure_is_not_swallowed() {
        assert!(finish_reporter(tokio::spawn(async {})).await);

        let panicking: JoinHandle<()> = tokio::spawn(async { panic!("reporter crashed") });
        assert!(!finish_reporter(panicking).await);
    }

    #[test]
    fn output_path_takes_converted_extension() {
        assert_eq!(
            default_output_path(Path::new("/tmp/scan.tif"), "jpg"),
            PathBuf::from("/tmp/scan.jpg")
        );
    }
}
