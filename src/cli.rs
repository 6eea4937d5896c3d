//! 命令行定义
//!
//! 子命令：slurp / create / passes / grade

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// 被遗忘的 ILIAS 测验 API
#[derive(Debug, Parser)]
#[command(name = "ilias-exam-robot", version, about = "批量创建、抓取和批改 ILIAS 测验")]
pub struct Cli {
    /// 登录用户名
    #[arg(long)]
    pub user: String,

    /// 登录密码（不给则交互式输入）
    #[arg(long)]
    pub password: Option<String>,

    /// Cookie 文件位置
    #[arg(long, default_value = ".cookies")]
    pub cookies: PathBuf,

    /// 显示更详细的调试日志
    #[arg(long)]
    pub explain: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 把远端测验/文件夹抓成 YAML 规格
    Slurp {
        /// 要抓取的文件夹 URL
        url: String,
        /// 输出目录（会自动创建）
        data_dir: PathBuf,
    },
    /// 按 YAML 规格批量创建测验
    Create {
        /// 规格文件
        spec: PathBuf,
        /// 放置测验的文件夹 URL；配合 --replicate 时作为根
        ilias_folder: String,
        /// 目标文件夹的逐层 glob 模式
        #[arg(long, default_value = "*")]
        replicate: String,
        /// 按标题筛选规格里的测验
        #[arg(long, default_value = "*")]
        tests: String,
    },
    /// 轮次管理（结束轮次 / 发布状态 / 手动计分开关）
    Passes {
        /// 测验 URL；配合 --replicate 时作为根文件夹
        #[arg(long)]
        test_url: String,
        /// 展开多个测验的逐层 glob 模式
        #[arg(long)]
        replicate: Option<String>,
        /// 结束所有用户的轮次
        #[arg(long)]
        end_passes: bool,
        /// 设置发布状态（true=在线 false=离线）
        #[arg(long, action = clap::ArgAction::Set)]
        publish: Option<bool>,
        /// 设置手动计分可见性
        #[arg(long, action = clap::ArgAction::Set)]
        manual_scoring: Option<bool>,
    },
    /// 人工批改的导出与回传
    Grade {
        #[command(subcommand)]
        command: GradeCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum GradeCommand {
    /// 把未批改的提交导出为 Markdown 文件
    Export {
        /// 测验 URL
        #[arg(long)]
        test_url: String,
        /// 导出目录
        out_dir: PathBuf,
    },
    /// 把批改好的 Markdown 文件回传
    Upload {
        /// 测验 URL
        #[arg(long)]
        test_url: String,
        /// 批改文件所在目录
        in_dir: PathBuf,
    },
}

impl Command {
    /// 本次命令操作的主 URL，会话的登录地址从它推导
    pub fn primary_url(&self) -> &str {
        match self {
            Command::Slurp { url, .. } => url,
            Command::Create { ilias_folder, .. } => ilias_folder,
            Command::Passes { test_url, .. } => test_url,
            Command::Grade { command } => match command {
                GradeCommand::Export { test_url, .. } => test_url,
                GradeCommand::Upload { test_url, .. } => test_url,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_replicate_to_star() {
        let cli = Cli::parse_from([
            "ilias-exam-robot",
            "--user",
            "uabcd",
            "create",
            "spec.yml",
            "https://ilias.example.org/goto.php?target=fold_1",
        ]);
        match cli.command {
            Command::Create { replicate, tests, .. } => {
                assert_eq!(replicate, "*");
                assert_eq!(tests, "*");
            }
            other => panic!("falsches Kommando: {:?}", other),
        }
    }

    #[test]
    fn publish_takes_an_explicit_bool() {
        let cli = Cli::parse_from([
            "ilias-exam-robot",
            "--user",
            "uabcd",
            "passes",
            "--test-url",
            "https://ilias.example.org/goto.php?target=tst_2",
            "--publish",
            "false",
        ]);
        match cli.command {
            Command::Passes { publish, end_passes, .. } => {
                assert_eq!(publish, Some(false));
                assert!(!end_passes);
            }
            other => panic!("falsches Kommando: {:?}", other),
        }
    }
}
