//! 批量执行器 - 编排层

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::{Authenticator, HttpSession};
use crate::models::loaders;
use crate::services::{resolve_targets, TestService};
use crate::utils::logging;
use crate::utils::text::matches_segment;
use crate::workflow::{self, TestCtx};

/// 应用主结构
///
/// 唯一持有 HttpSession 的地方
pub struct App {
    session: HttpSession,
}

/// 批量创建的统计
#[derive(Debug, Default)]
struct CreateStats {
    success: usize,
    failed: usize,
    total: usize,
}

impl App {
    /// 初始化应用：建立会话（不主动登录）
    pub fn initialize(
        config: &Config,
        base_url: &str,
        authenticator: Box<dyn Authenticator>,
        cookie_path: &Path,
    ) -> Result<Self> {
        let session = HttpSession::new(config, base_url, authenticator, cookie_path)
            .context("无法建立 HTTP 会话")?;
        Ok(Self { session })
    }

    /// 正常退出前的清理：Cookie 落盘
    pub fn shutdown(&self) {
        if let Err(e) = self.session.save_cookies() {
            warn!("⚠️ 保存 Cookie 失败: {}", e);
        }
    }

    // ========== slurp ==========

    /// 把远端文件夹抓成规格文件
    pub async fn run_slurp(&self, url: &str, data_dir: &Path) -> Result<()> {
        logging::log_startup("slurp 模式");
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("无法创建输出目录 {}", data_dir.display()))?;

        let tests = workflow::slurp_tests_from_folder(&self.session, url, data_dir).await?;
        info!("✓ 共抓取 {} 个测验", tests.len());

        let spec_path = data_dir.join("spec.yml");
        loaders::save_spec_to_file(&tests, &spec_path).await?;
        info!("✅ 规格已写入 {}", spec_path.display());
        Ok(())
    }

    // ========== create ==========

    /// 按规格文件批量创建测验
    ///
    /// # 参数
    /// - `replicate`: 目标文件夹的逐层模式
    /// - `test_filter`: 按标题筛选规格里的测验
    pub async fn run_create(
        &self,
        spec_path: &Path,
        folder_url: &str,
        replicate: &str,
        test_filter: &str,
    ) -> Result<()> {
        logging::log_startup("create 模式");

        let spec = loaders::load_spec_from_file(spec_path).await?;
        let mut tests = Vec::new();
        for test in spec.tests {
            if matches_segment(&test.title, test_filter)? {
                tests.push(test);
            }
        }
        info!("✓ 筛选后剩余 {} 个测验", tests.len());

        let targets = resolve_targets(&self.session, folder_url, replicate).await?;
        logging::log_targets_resolved(replicate, targets.len());

        let mut stats = CreateStats {
            total: targets.len() * tests.len(),
            ..Default::default()
        };

        for (target_index, target) in targets.iter().enumerate() {
            info!("📁 目标文件夹 {}", target.path.display());
            let folder = self.session.get_page(&target.url).await?;

            for (test_index, test) in tests.iter().enumerate() {
                let ctx = TestCtx {
                    target_path: target.path.clone(),
                    target_index: target_index + 1,
                    test_index: test_index + 1,
                };
                match workflow::add_test(&self.session, &folder, test, &ctx).await {
                    Ok(()) => stats.success += 1,
                    Err(e) => {
                        // 已建成的部分不回滚，继续下一个
                        error!("{} ❌ 创建失败: {:#}", ctx, e);
                        stats.failed += 1;
                    }
                }
            }
        }

        logging::print_final_stats(stats.success, stats.failed, stats.total);
        Ok(())
    }

    // ========== passes ==========

    /// 轮次管理：结束轮次 / 发布状态 / 手动计分开关
    pub async fn run_passes(
        &self,
        test_url: &str,
        replicate: Option<&str>,
        end_passes: bool,
        publish: Option<bool>,
        manual_scoring: Option<bool>,
    ) -> Result<()> {
        logging::log_startup("passes 模式");
        if !end_passes && publish.is_none() && manual_scoring.is_none() {
            warn!("⚠️ 没有指定任何动作，直接退出");
            return Ok(());
        }

        let tests_service = TestService::new(&self.session);

        let targets = match replicate {
            Some(pattern) => {
                let targets = resolve_targets(&self.session, test_url, pattern).await?;
                logging::log_targets_resolved(pattern, targets.len());
                targets
            }
            None => vec![crate::services::MatchedTarget {
                path: std::path::PathBuf::from("."),
                url: test_url.to_string(),
            }],
        };

        for target in targets {
            info!("🎯 处理 {}", target.path.display());
            let test_page = self.session.get_page(&target.url).await?;

            if end_passes {
                info!("⏹️ 结束所有用户的轮次");
                tests_service.end_all_user_passes(&test_page).await?;
            }
            if let Some(online) = publish {
                info!(
                    "🚦 把测验置为{}",
                    if online { "在线" } else { "离线" }
                );
                let settings_tab = tests_service
                    .select_tab(&test_page, crate::page::TestTab::Settings)
                    .await?;
                let current = settings_tab.reconstruct_test(vec![])?;
                tests_service
                    .configure_test(&settings_tab, &current, online)
                    .await?;
            }
            if let Some(enabled) = manual_scoring {
                info!("📝 手动计分可见性 -> {}", enabled);
                tests_service
                    .configure_scoring(&test_page, "Manuelle", enabled)
                    .await?;
            }
        }

        info!("✅ passes 处理完成");
        Ok(())
    }

    // ========== grade ==========

    /// 导出批改数据
    pub async fn run_grade_export(&self, test_url: &str, out_dir: &Path) -> Result<()> {
        logging::log_startup("grade export 模式");
        workflow::export_grading(&self.session, test_url, out_dir).await
    }

    /// 回传批改数据
    pub async fn run_grade_upload(&self, test_url: &str, in_dir: &Path) -> Result<()> {
        logging::log_startup("grade upload 模式");
        workflow::upload_grading(&self.session, test_url, in_dir).await
    }
}
