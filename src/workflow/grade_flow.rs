//! 人工批改流程 - 流程层
//!
//! 导出：抓取批改界面 → 每道题一个 Markdown 文件。
//! 回传：读回文件 → 校验 → 和线上参与者对齐 → 逐人提交。
//! 任何校验失败都发生在第一个上传请求之前。

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::error::{AppError, ValidationError};
use crate::infrastructure::HttpSession;
use crate::services::grading_io;
use crate::services::GradingService;
use crate::services::TestService;

/// 把一个测验的批改数据导出到目录
pub async fn export_grading(
    session: &HttpSession,
    test_url: &str,
    out_dir: &Path,
) -> Result<()> {
    let tests = TestService::new(session);
    let grading = GradingService::new(session);

    let test_page = tests.select_page(test_url).await?;
    if !test_page.is_test_page() {
        tracing::warn!("⚠️ {} 看起来不是测验页面，继续尝试", test_url);
    }

    let results = grading.collect_results(&test_page).await?;
    if results.is_empty() {
        tracing::warn!("⚠️ 没有任何参与者提交，无可导出");
        return Ok(());
    }

    let written = grading_io::export_results_to_dir(&results, out_dir).await?;
    info!("✅ 已导出 {} 个批改文件到 {}", written.len(), out_dir.display());
    Ok(())
}

/// 读回批改文件并逐人上传
pub async fn upload_grading(
    session: &HttpSession,
    test_url: &str,
    in_dir: &Path,
) -> Result<()> {
    // 先把文件全部读完并通过校验，再碰网络
    let parsed = grading_io::import_results_from_dir(in_dir).await?;
    if parsed.is_empty() {
        tracing::warn!("⚠️ {} 里没有批改文件", in_dir.display());
        return Ok(());
    }
    info!("✓ 读入 {} 道题目的批改结果，校验通过", parsed.len());

    let tests = TestService::new(session);
    let grading = GradingService::new(session);
    let test_page = tests.select_page(test_url).await?;

    let participants = grading.list_participants(&test_page).await?;
    let by_email: HashMap<&str, _> = participants
        .iter()
        .map(|p| (p.email.as_str(), p))
        .collect();

    // 按参与者聚合：一人一次保存请求
    let mut per_participant: HashMap<String, Vec<(String, f64, Option<String>)>> = HashMap::new();
    for question in &parsed {
        for entry in &question.entries {
            if !by_email.contains_key(entry.email.as_str()) {
                return Err(AppError::Validation(ValidationError::UnknownParticipant {
                    email: entry.email.clone(),
                })
                .into());
            }
            per_participant
                .entry(entry.email.clone())
                .or_default()
                .push((
                    question.question_id.clone(),
                    entry.points,
                    entry.feedback.clone(),
                ));
        }
    }

    let mut uploaded = 0usize;
    for (email, scores) in per_participant {
        let Some(participant) = by_email.get(email.as_str()) else {
            continue;
        };
        grading.save_participant_scores(participant, &scores).await?;
        uploaded += 1;
    }

    info!("✅ 已回传 {} 名参与者的批改结果", uploaded);
    Ok(())
}
