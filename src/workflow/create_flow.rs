//! 测验创建流程 - 流程层
//!
//! 一个测验的完整创建顺序：
//! 1. 在目标文件夹创建测验对象
//! 2. 进设置页，提交两次设置
//! 3. 进题目页，逐个添加题目（含正文设计块）
//! 4. 重新打开题目页，按规格顺序重排

use std::fmt::Display;
use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::infrastructure::HttpSession;
use crate::models::spec::IliasTest;
use crate::page::{IliasPage, TestTab};
use crate::services::{QuestionService, TestService};

/// 创建流程上下文
///
/// 封装"我正在哪个目标文件夹里建哪个测验"，只用于日志
#[derive(Debug, Clone)]
pub struct TestCtx {
    /// 目标文件夹的相对路径
    pub target_path: PathBuf,
    /// 目标文件夹序号（从 1 开始）
    pub target_index: usize,
    /// 测验在批次里的序号（从 1 开始）
    pub test_index: usize,
}

impl Display for TestCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[目标 {} ({}) 测验 {}]",
            self.target_index,
            self.target_path.display(),
            self.test_index
        )
    }
}

/// 在指定文件夹里建好一个完整的测验
pub async fn add_test(
    session: &HttpSession,
    folder: &IliasPage,
    test: &IliasTest,
    ctx: &TestCtx,
) -> Result<()> {
    let tests = TestService::new(session);
    let questions = QuestionService::new(session);

    info!("{} 🏗️ 创建测验对象 {:?}", ctx, test.title);
    let test_page = tests
        .create_test(folder, &test.title, &test.description)
        .await?;

    info!("{} ⚙️ 写入设置", ctx);
    let settings_tab = tests.select_tab(&test_page, TestTab::Settings).await?;
    // ILIAS 第一次保存会丢掉简介文本，提交两遍才能全部落库。
    // 去掉第二次提交前请先在目标服务器上验证这个毛病已经修好
    let settings_tab = tests.configure_test(&settings_tab, test, false).await?;
    tests.configure_test(&settings_tab, test, false).await?;

    info!("{} 📚 添加 {} 道题目", ctx, test.questions.len());
    let questions_tab = tests.select_tab(&settings_tab, TestTab::Questions).await?;
    for (index, question) in test.questions.iter().enumerate() {
        info!(
            "{} ✏️ 题目 {}/{} ({:?})",
            ctx,
            index + 1,
            test.questions.len(),
            question.title()
        );
        questions.add_question(&questions_tab, question).await?;
    }

    // 列表页已经过期，重排前要拿最新的题目 id
    info!("{} 🔀 重排题目顺序", ctx);
    let fresh_tab = tests.select_tab(&questions_tab, TestTab::Questions).await?;
    let title_order: Vec<String> = test
        .questions
        .iter()
        .map(|q| q.title().to_string())
        .collect();
    tests.reorder_questions(&fresh_tab, &title_order).await?;

    info!("{} ✅ 测验 {:?} 创建完成", ctx, test.title);
    Ok(())
}
