//! # InvisiGuard 客户端 — 命令行入口
//!
//! 本文件只负责参数解析、配置装配与结果输出，
//! 业务逻辑全部经由 `WorkflowController`，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use invisiguard_client::asset::ImageAsset;
use invisiguard_client::config::ClientConfig;
use invisiguard_client::error::AppError;
use invisiguard_client::gateway::health::spawn_startup_probe;
use invisiguard_client::gateway::{HealthStatus, HttpGateway};
use invisiguard_client::validation::{
    ExtractRole, FileConstraintValidator, RequestValidator, StrengthInput,
};
use invisiguard_client::workflow::{
    Mode, SubmitError, SubmitOutcome, WorkflowController, WorkflowResult, DEFAULT_ALPHA,
};

#[derive(Parser)]
#[command(name = "invisiguard", version, about = "Embed, extract and verify invisible image watermarks")]
struct Cli {
    /// JSON 配置文件（不存在时使用默认配置）
    #[arg(long, global = true, default_value = "invisiguard.json")]
    config: PathBuf,

    /// 覆盖后端根地址，如 http://127.0.0.1:8000
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 探测后端是否在线
    Health,

    /// 向图片嵌入不可见水印
    Embed {
        /// PNG 或 JPG 图片
        image: PathBuf,

        /// 水印文本（最多 240 字符）
        #[arg(long)]
        text: String,

        /// 嵌入强度，0.1 ~ 5.0
        #[arg(long)]
        alpha: Option<String>,

        /// 保存带水印图片的目录
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// 对比原图与可疑图提取水印
    Extract {
        original: PathBuf,
        suspect: PathBuf,
    },

    /// 不依赖原图的盲检
    Verify { image: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            log::error!("❌ [{}] {}", err.code(), err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let mut config = ClientConfig::load_from_path(&cli.config)?;
    config.apply_env_overrides()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    let validator = RequestValidator::new(
        FileConstraintValidator::new().with_content_sniffing(config.sniff_content),
    );
    let gateway = HttpGateway::new(config)?;
    log::info!("⚙️ 后端地址 - {}", gateway.config().base_url);

    let (health, _probe) = spawn_startup_probe(Arc::new(gateway.clone()));
    let controller = WorkflowController::new(gateway, validator);

    let status = health.settled().await;
    if let Command::Health = cli.command {
        print_json(&status);
        return Ok(if health.is_online() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }
    if let HealthStatus::Offline { reason, .. } = &status {
        log::warn!("⚠️ 后端离线，仍将尝试提交 - {}", reason);
    }

    let (mode, submitted) = match cli.command {
        Command::Health => return Ok(ExitCode::SUCCESS),
        Command::Embed {
            image,
            text,
            alpha,
            out_dir,
        } => {
            controller.select_embed_image(ImageAsset::from_path(&image)?)?;
            controller.set_embed_text(text)?;
            controller.set_embed_strength(
                alpha.map_or(StrengthInput::Number(DEFAULT_ALPHA), StrengthInput::Text),
            )?;

            let submitted = controller.submit_embed().await;
            if let (Ok(SubmitOutcome::Completed(WorkflowResult::Embedded(embedded))), Some(dir)) =
                (&submitted, out_dir)
            {
                let path = controller
                    .gateway()
                    .download_artifact(&embedded.image_url, &dir)
                    .await?;
                println!("saved: {}", path.display());
            }
            (Mode::Embed, submitted)
        }
        Command::Extract { original, suspect } => {
            controller.select_extract_image(ExtractRole::Original, ImageAsset::from_path(&original)?)?;
            controller.select_extract_image(ExtractRole::Suspect, ImageAsset::from_path(&suspect)?)?;
            (Mode::Extract, controller.submit_extract().await)
        }
        Command::Verify { image } => {
            controller.select_verify_image(ImageAsset::from_path(&image)?)?;
            (Mode::Verify, controller.submit_verify().await)
        }
    };

    let outcome = match submitted {
        Ok(outcome) => outcome,
        Err(SubmitError::Rejected(report)) => {
            print_json(&report);
            return Ok(ExitCode::FAILURE);
        }
        Err(err) => return Err(err.into()),
    };

    print_json(&controller.snapshot(mode)?);

    match outcome {
        SubmitOutcome::Completed(WorkflowResult::Failure(failure)) => {
            eprintln!("{}\nhint: {}", failure.message(), failure.hint());
            Ok(ExitCode::FAILURE)
        }
        SubmitOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
        SubmitOutcome::Discarded => {
            log::warn!("⚠️ 结果已被丢弃 - mode: {}", mode);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(err) => log::error!("❌ 结果序列化失败: {}", err),
    }
}
