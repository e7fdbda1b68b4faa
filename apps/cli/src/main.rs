//! # MeasureMates CLI
//!
//! Command-line interface for MeasureMates pressure mats.
//!
//! ```bash
//! # 监听 UDP 数据（默认 0.0.0.0:4210，被动模式）
//! measuremate-cli listen --matrix
//!
//! # 解析单个帧
//! measuremate-cli decode 57333351426666944200
//!
//! # 离线回放录制的帧
//! measuremate-cli replay session.hex --mode acknowledged --format binary
//!
//! # 查看生效的配置
//! measuremate-cli config show
//! ```
//!
//! 日志级别通过 `RUST_LOG` 控制（默认 `measuremate=info`）。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod render;

use commands::{ConfigCommand, DecodeCommand, ListenCommand, ReplayCommand};
use config::CliConfig;

/// 默认日志过滤指令
const DEFAULT_LOG_DIRECTIVE: &str = "measuremate=info";

/// MeasureMates CLI - 压力垫命令行工具
#[derive(Parser, Debug)]
#[command(name = "measuremate-cli")]
#[command(about = "Command-line interface for MeasureMates pressure mats", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认：系统配置目录下的 measuremate/config.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 监听 UDP 数据并显示测量状态
    Listen {
        #[command(flatten)]
        args: ListenCommand,
    },

    /// 解析一个十六进制帧
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },

    /// 离线回放录制的帧
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { args } => args.execute(),

        Commands::Listen { args } => {
            let (config, _) = CliConfig::load(cli.config.as_deref())?;
            args.execute(config)
        },

        Commands::Replay { args } => {
            let (config, _) = CliConfig::load(cli.config.as_deref())?;
            args.execute(&config)
        },

        Commands::Config(cmd) => {
            let (config, source) = CliConfig::load(cli.config.as_deref())?;
            cmd.execute(&config, source.as_deref())
        },
    }
}
