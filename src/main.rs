use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use url::Url;

use ilias_exam_robot::cli::{Cli, Command, GradeCommand};
use ilias_exam_robot::config::Config;
use ilias_exam_robot::infrastructure::SimpleAuthenticator;
use ilias_exam_robot::orchestrator::App;
use ilias_exam_robot::utils::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let config = Config::from_env();
    logging::init(cli.explain || config.verbose_logging);

    // 会话的登录地址从命令的主 URL 推导（去掉最后一个路径段）
    let base_url = base_of(cli.command.primary_url())?;
    let authenticator = Box::new(SimpleAuthenticator::new(
        cli.user.clone(),
        cli.password.clone(),
    ));
    let app = App::initialize(&config, &base_url, authenticator, &cli.cookies)?;

    // 中断时安静退出，不打印堆栈
    let outcome = tokio::select! {
        result = run(&app, &cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("收到中断，立即退出");
            Ok(())
        }
    };

    app.shutdown();
    outcome
}

async fn run(app: &App, command: &Command) -> Result<()> {
    match command {
        Command::Slurp { url, data_dir } => app.run_slurp(url, data_dir).await,
        Command::Create {
            spec,
            ilias_folder,
            replicate,
            tests,
        } => app.run_create(spec, ilias_folder, replicate, tests).await,
        Command::Passes {
            test_url,
            replicate,
            end_passes,
            publish,
            manual_scoring,
        } => {
            app.run_passes(
                test_url,
                replicate.as_deref(),
                *end_passes,
                *publish,
                *manual_scoring,
            )
            .await
        }
        Command::Grade { command } => match command {
            GradeCommand::Export { test_url, out_dir } => {
                app.run_grade_export(test_url, out_dir).await
            }
            GradeCommand::Upload { test_url, in_dir } => {
                app.run_grade_upload(test_url, in_dir).await
            }
        },
    }
}

/// 从任意 ILIAS 页面 URL 推导站点根（登录地址的拼接基准）
fn base_of(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("无效的 URL: {}", url))?;
    let base = parsed
        .join("./")
        .with_context(|| format!("无法从 {} 推导站点根", url))?;
    Ok(base.to_string())
}
