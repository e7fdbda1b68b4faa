//! 配置管理命令

use crate::config::{CliConfig, default_config_path};
use anyhow::Result;
use clap::Subcommand;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（TOML）
    Show,

    /// 显示默认配置文件路径
    Path,
}

impl ConfigCommand {
    pub fn execute(self, config: &CliConfig, source: Option<&std::path::Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                match source {
                    Some(path) => println!("# 配置文件: {}", path.display()),
                    None => println!("# 未找到配置文件，使用默认值"),
                }
                print!("{}", config.to_toml()?);
            },
            ConfigCommand::Path => match default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("无法确定配置目录"),
            },
        }
        Ok(())
    }
}
