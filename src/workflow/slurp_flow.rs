//! 测验抓取（slurp）流程 - 流程层
//!
//! 把远端文件夹里的每个测验抓成规格数据：
//! 设置页 → 测验参数，题目列表 → 逐题进编辑页重建，
//! 正文设计块里的图片顺手下载到辅助目录。

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::infrastructure::HttpSession;
use crate::models::spec::{IliasTest, TestQuestion};
use crate::page::{ChildKind, IliasPage, TestTab};
use crate::services::TestService;

/// 抓取一个文件夹里的所有测验
pub async fn slurp_tests_from_folder(
    session: &HttpSession,
    folder_url: &str,
    aux_path: &Path,
) -> Result<Vec<IliasTest>> {
    let tests = TestService::new(session);
    info!("🔍 抓取文件夹 {}", folder_url);
    let folder = tests.select_page(folder_url).await?;

    let mut result = Vec::new();
    for child in folder.child_elements()? {
        if child.kind != ChildKind::Test {
            tracing::debug!("跳过非测验子元素 {:?}", child.name);
            continue;
        }
        info!("📖 抓取测验 {:?}", child.name);
        let test_page = tests.select_page(&child.url).await?;
        let questions = slurp_questions_from_test(session, &test_page, aux_path).await?;

        let settings_tab = tests.select_tab(&test_page, TestTab::Settings).await?;
        result.push(settings_tab.reconstruct_test(questions)?);
    }
    Ok(result)
}

/// 抓取一个测验里的所有题目
pub async fn slurp_questions_from_test(
    session: &HttpSession,
    test_page: &IliasPage,
    data_path: &Path,
) -> Result<Vec<TestQuestion>> {
    let tests = TestService::new(session);
    let questions_tab = tests.select_tab(test_page, TestTab::Questions).await?;

    let mut questions = Vec::new();
    for (title, url) in questions_tab.question_listing()? {
        info!("  📄 题目 {:?}", title);
        let question_page = tests.select_page(&url).await?;

        // 图片下载回调：题目标题 + 计数器拼出稳定的文件名前缀
        let mut counter = 0usize;
        let page_design = question_page
            .design_blocks(|image_url| {
                let prefix = format!("{}-", slug::slugify(format!("{}-{}", title, counter)));
                counter += 1;
                let data_path = data_path.to_path_buf();
                async move {
                    session
                        .download_file(&image_url, &data_path, &prefix)
                        .await
                }
            })
            .await?;

        let edit_page = tests
            .select_page(&question_page.question_edit_url()?)
            .await?;
        questions.push(edit_page.reconstruct_question(page_design)?);
    }
    Ok(questions)
}
