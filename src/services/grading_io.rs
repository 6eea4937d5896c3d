//! 批改数据与 Markdown 文件的互转 - 业务能力层
//!
//! 导出：按题目分组，每道题一个 `<题目id>.md`，每名参与者一个小节，
//! 答案放在代码围栏里（HTML 答案先清理再转 Markdown）。
//! 导入：宽容的逐行解析器，读回 (参与者, 分数, 反馈)。
//! 三条硬校验在任何上传发生之前执行：
//! 同一文件里一人一份答案、所有文件的参与者数量一致、分数不超满分。

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::grading::{
    GradedQuestion, GradingAnswer, GradingQuestion, ParticipantResults,
};
use crate::utils::text::{cleanup_answer_html, norm};

/// 从一个导出文件解析出的批改记录
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestionGrading {
    pub question_id: String,
    pub title: String,
    pub max_points: f64,
    pub entries: Vec<ParsedEntry>,
}

/// 单个参与者在单道题上的批改记录
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub email: String,
    pub display_name: String,
    pub points: f64,
    pub answer: String,
    pub feedback: Option<String>,
}

/// 批改文件格式错误
#[derive(Debug, thiserror::Error)]
pub enum GradingFileError {
    #[error("文件 {file} 第 {line} 行无法解析: {detail}")]
    MalformedLine {
        file: String,
        line: usize,
        detail: String,
    },
    #[error("文件 {file} 缺少 Max points 行")]
    MissingMaxPoints { file: String },
}

// ========== 导出 ==========

/// 把抓取到的批改数据导出到目录，按题目各写一个 Markdown 文件
pub async fn export_results_to_dir(
    results: &[ParticipantResults],
    dir: &Path,
) -> AppResult<Vec<std::path::PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::file_write_failed(dir.display().to_string(), e))?;

    let mut written = Vec::new();
    for (question, entries) in group_by_question(results) {
        let content = render_question_markdown(&question, &entries);
        let path = dir.join(format!("{}.md", question.id));
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
        tracing::info!("✓ 已写出 {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// 按题目分组，参与者顺序保持抓取顺序
fn group_by_question(
    results: &[ParticipantResults],
) -> Vec<(GradingQuestion, Vec<(String, GradedQuestion)>)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: BTreeMap<String, (GradingQuestion, Vec<(String, GradedQuestion)>)> =
        BTreeMap::new();

    for result in results {
        for graded in &result.answers {
            let entry = grouped
                .entry(graded.question.id.clone())
                .or_insert_with(|| {
                    order.push(graded.question.id.clone());
                    (graded.question.clone(), Vec::new())
                });
            entry.1.push((
                format!(
                    "{} ({})",
                    result.participant.email,
                    result.participant.display_name()
                ),
                graded.clone(),
            ));
        }
    }

    order
        .into_iter()
        .filter_map(|id| grouped.remove(&id))
        .collect()
}

/// 渲染一道题的导出文件
fn render_question_markdown(
    question: &GradingQuestion,
    entries: &[(String, GradedQuestion)],
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", question.title));
    out.push_str(&format!("Max points: {}\n\n", question.max_points));

    for (heading, graded) in entries {
        out.push_str(&format!("## {}\n\n", heading));
        out.push_str(&format!(
            "Points: {} / {}\n\n",
            graded.points, question.max_points
        ));
        out.push_str("```text\n");
        out.push_str(&answer_as_markdown(graded.answer.as_ref()));
        out.push_str("\n```\n\n");
        out.push_str("Feedback:\n");
        if let Some(feedback) = &graded.feedback {
            out.push_str(feedback);
        }
        out.push_str("\n\n");
    }
    out
}

/// 把答案渲染成可读文本
fn answer_as_markdown(answer: Option<&GradingAnswer>) -> String {
    match answer {
        None => String::from("(keine Abgabe)"),
        Some(GradingAnswer::Text(html)) => {
            norm(html2md::parse_html(&cleanup_answer_html(html)).trim())
        }
        Some(GradingAnswer::Files(files)) => files
            .iter()
            .map(|f| format!("- {} ({})", f.name, f.url))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ========== 导入 ==========

/// 读回整个导出目录并执行全部校验
pub async fn import_results_from_dir(dir: &Path) -> AppResult<Vec<ParsedQuestionGrading>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(dir.display().to_string(), e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("md") {
            files.push(path);
        }
    }
    files.sort();

    let mut parsed = Vec::new();
    for path in files {
        let question_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        parsed.push(parse_question_markdown(
            &content,
            &question_id,
            &path.display().to_string(),
        )?);
    }

    validate_parsed(&parsed)?;
    Ok(parsed)
}

/// 解析单个导出文件
pub fn parse_question_markdown(
    content: &str,
    question_id: &str,
    file_name: &str,
) -> AppResult<ParsedQuestionGrading> {
    let heading_pattern =
        Regex::new(r"^## (\S+@\S+) \((.+)\)\s*$").expect("静态正则必定合法");

    let mut title = String::new();
    let mut max_points: Option<f64> = None;
    let mut entries: Vec<ParsedEntry> = Vec::new();

    let mut current: Option<ParsedEntry> = None;
    let mut in_fence = false;
    let mut in_feedback = false;
    let mut answer_lines: Vec<String> = Vec::new();
    let mut feedback_lines: Vec<String> = Vec::new();

    let mut finish_entry = |current: &mut Option<ParsedEntry>,
                            answer_lines: &mut Vec<String>,
                            feedback_lines: &mut Vec<String>| {
        if let Some(mut entry) = current.take() {
            entry.answer = answer_lines.join("\n").trim().to_string();
            let feedback = feedback_lines.join("\n").trim().to_string();
            entry.feedback = if feedback.is_empty() {
                None
            } else {
                Some(feedback)
            };
            answer_lines.clear();
            feedback_lines.clear();
            entries.push(entry);
        }
    };

    for (index, line) in content.lines().enumerate() {
        if in_fence {
            if line.trim_start().starts_with("```") {
                in_fence = false;
            } else if current.is_some() {
                answer_lines.push(line.to_string());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("# ") {
            title = rest.trim().to_string();
            continue;
        }
        if let Some(rest) = line.strip_prefix("Max points:") {
            let value = rest.trim();
            max_points = Some(value.parse::<f64>().map_err(|_| {
                AppError::Other(
                    GradingFileError::MalformedLine {
                        file: file_name.to_string(),
                        line: index + 1,
                        detail: format!("满分 {:?} 不是数字", value),
                    }
                    .to_string(),
                )
            })?);
            continue;
        }
        if line.starts_with("## ") {
            finish_entry(&mut current, &mut answer_lines, &mut feedback_lines);
            in_feedback = false;
            let captures = heading_pattern.captures(line).ok_or_else(|| {
                AppError::Other(
                    GradingFileError::MalformedLine {
                        file: file_name.to_string(),
                        line: index + 1,
                        detail: "参与者标题必须形如 `## email (Nachname, Vorname)`".to_string(),
                    }
                    .to_string(),
                )
            })?;
            current = Some(ParsedEntry {
                email: captures[1].to_string(),
                display_name: captures[2].to_string(),
                points: 0.0,
                answer: String::new(),
                feedback: None,
            });
            continue;
        }
        if let Some(rest) = line.strip_prefix("Points:") {
            if let Some(entry) = current.as_mut() {
                let value = rest.split('/').next().unwrap_or("").trim();
                entry.points = value.parse::<f64>().map_err(|_| {
                    AppError::Other(
                        GradingFileError::MalformedLine {
                            file: file_name.to_string(),
                            line: index + 1,
                            detail: format!("分数 {:?} 不是数字", value),
                        }
                        .to_string(),
                    )
                })?;
            }
            continue;
        }
        if line.trim_start().starts_with("```") {
            in_fence = true;
            in_feedback = false;
            continue;
        }
        if line.trim() == "Feedback:" {
            in_feedback = true;
            continue;
        }
        if in_feedback && current.is_some() {
            feedback_lines.push(line.to_string());
        }
        // 其余行一律忽略，人改文件时的自由度就在这里
    }
    finish_entry(&mut current, &mut answer_lines, &mut feedback_lines);

    let max_points = max_points.ok_or_else(|| {
        AppError::Other(
            GradingFileError::MissingMaxPoints {
                file: file_name.to_string(),
            }
            .to_string(),
        )
    })?;

    Ok(ParsedQuestionGrading {
        question_id: question_id.to_string(),
        title,
        max_points,
        entries,
    })
}

/// 导入后的三条硬校验
pub fn validate_parsed(parsed: &[ParsedQuestionGrading]) -> AppResult<()> {
    // 1. 同一题目下一人一份答案
    for question in parsed {
        let mut seen = std::collections::HashSet::new();
        for entry in &question.entries {
            if !seen.insert(entry.email.clone()) {
                return Err(AppError::Validation(ValidationError::DuplicateParticipant {
                    question: question.title.clone(),
                    email: entry.email.clone(),
                }));
            }
        }
    }

    // 2. 所有题目的参与者数量一致（不一致说明导出不完整或被改坏）
    if let Some(first) = parsed.first() {
        let expected = first.entries.len();
        for question in parsed {
            if question.entries.len() != expected {
                return Err(AppError::Validation(
                    ValidationError::ParticipantCountMismatch {
                        question: question.title.clone(),
                        expected,
                        actual: question.entries.len(),
                    },
                ));
            }
        }
    }

    // 3. 分数不超满分——宁可拒收也不悄悄截断
    for question in parsed {
        for entry in &question.entries {
            if entry.points > question.max_points {
                return Err(AppError::Validation(ValidationError::PointsExceedMax {
                    question: question.title.clone(),
                    participant: entry.email.clone(),
                    points: entry.points,
                    max_points: question.max_points,
                }));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::grading::{FileAnswer, ParticipantInfo};

    fn participant(email: &str, last: &str, first: &str) -> ParticipantInfo {
        ParticipantInfo {
            last_name: last.to_string(),
            first_name: first.to_string(),
            email: email.to_string(),
            username: email.split('@').next().unwrap_or("").to_string(),
            detail_url: format!("https://ilias.example.org/detail/{}", email),
        }
    }

    fn graded(id: &str, title: &str, max: f64, points: f64, answer_html: &str) -> GradedQuestion {
        GradedQuestion {
            question: GradingQuestion {
                id: id.to_string(),
                title: title.to_string(),
                max_points: max,
            },
            answer: Some(GradingAnswer::Text(answer_html.to_string())),
            points,
            feedback: Some("weiter so".to_string()),
            finalized: false,
        }
    }

    #[test]
    fn export_import_roundtrip() {
        let results = vec![
            ParticipantResults {
                participant: participant("alice@example.org", "Doe", "Alice"),
                answers: vec![graded("101", "Frage: Essay [ID: 101]", 10.0, 7.5, "<p>Antwort A</p>")],
            },
            ParticipantResults {
                participant: participant("bob@example.org", "Roe", "Bob"),
                answers: vec![graded("101", "Frage: Essay [ID: 101]", 10.0, 3.0, "<p>Antwort B</p>")],
            },
        ];

        let grouped = group_by_question(&results);
        assert_eq!(grouped.len(), 1);
        let markdown = render_question_markdown(&grouped[0].0, &grouped[0].1);
        let parsed = parse_question_markdown(&markdown, "101", "101.md").unwrap();

        assert_eq!(parsed.title, "Frage: Essay [ID: 101]");
        assert_eq!(parsed.max_points, 10.0);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[0].email, "alice@example.org");
        assert_eq!(parsed.entries[0].display_name, "Doe, Alice");
        assert_eq!(parsed.entries[0].points, 7.5);
        assert_eq!(parsed.entries[0].answer, "Antwort A");
        assert_eq!(parsed.entries[0].feedback.as_deref(), Some("weiter so"));
        assert_eq!(parsed.entries[1].points, 3.0);
    }

    #[test]
    fn file_answers_are_listed() {
        let answer = GradingAnswer::Files(vec![FileAnswer {
            name: "loesung.pdf".into(),
            url: "https://ilias.example.org/file/9".into(),
        }]);
        let rendered = answer_as_markdown(Some(&answer));
        assert!(rendered.contains("loesung.pdf"));
    }

    #[test]
    fn duplicate_participant_in_one_file_is_rejected() {
        let parsed = vec![ParsedQuestionGrading {
            question_id: "101".into(),
            title: "Essay".into(),
            max_points: 10.0,
            entries: vec![
                ParsedEntry {
                    email: "alice@example.org".into(),
                    display_name: "Doe, Alice".into(),
                    points: 1.0,
                    answer: String::new(),
                    feedback: None,
                },
                ParsedEntry {
                    email: "alice@example.org".into(),
                    display_name: "Doe, Alice".into(),
                    points: 2.0,
                    answer: String::new(),
                    feedback: None,
                },
            ],
        }];
        let err = validate_parsed(&parsed).unwrap_err();
        assert!(err.to_string().contains("alice@example.org"));
    }

    #[test]
    fn asymmetric_participant_counts_are_rejected() {
        let entry = |email: &str| ParsedEntry {
            email: email.to_string(),
            display_name: "X, Y".into(),
            points: 1.0,
            answer: String::new(),
            feedback: None,
        };
        let parsed = vec![
            ParsedQuestionGrading {
                question_id: "101".into(),
                title: "Essay".into(),
                max_points: 10.0,
                entries: vec![entry("a@x"), entry("b@x"), entry("c@x")],
            },
            ParsedQuestionGrading {
                question_id: "102".into(),
                title: "Upload".into(),
                max_points: 5.0,
                entries: vec![entry("a@x"), entry("b@x")],
            },
        ];
        let err = validate_parsed(&parsed).unwrap_err();
        assert!(err.to_string().contains("Upload"));
        assert!(err.to_string().contains("2"));
    }

    #[test]
    fn points_above_max_are_rejected() {
        let parsed = vec![ParsedQuestionGrading {
            question_id: "101".into(),
            title: "Essay".into(),
            max_points: 10.0,
            entries: vec![ParsedEntry {
                email: "alice@example.org".into(),
                display_name: "Doe, Alice".into(),
                points: 15.0,
                answer: String::new(),
                feedback: None,
            }],
        }];
        let err = validate_parsed(&parsed).unwrap_err();
        assert!(err.to_string().contains("15"));
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn parser_ignores_unknown_lines() {
        let content = "# Titel\n\nirgendein Kommentar\nMax points: 5\n\n## a@x (L, F)\n\nPoints: 2 / 5\n\n```text\nAntwort\n```\n\nFeedback:\n\n";
        let parsed = parse_question_markdown(content, "7", "7.md").unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].points, 2.0);
        assert!(parsed.entries[0].feedback.is_none());
    }

    #[test]
    fn malformed_heading_is_an_error() {
        let content = "# T\nMax points: 5\n## kaputte zeile\n";
        assert!(parse_question_markdown(content, "7", "7.md").is_err());
    }
}
