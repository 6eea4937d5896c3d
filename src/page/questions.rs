//! 题目列表页与题目编辑页的解析

use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::spec::{
    ChoiceAnswer, MultiChoiceAnswer, PageDesignBlock, TestQuestion,
};
use crate::page::{element_text, sel, IliasPage};
use crate::utils::text::norm;

/// 文件上传题未显式配置时的最大文件大小（2 MiB，ILIAS 的默认值）
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2_097_152;

/// 设置页上没有读到尝试次数时的回退值
pub const DEFAULT_NUMBER_OF_TRIES: u32 = 100;

impl IliasPage {
    /// 是否处于题目列表页
    pub fn is_question_listing(&self) -> bool {
        self.normalized_url().contains("cmd=questions")
            && self.normalized_url().contains("ilobjtestgui")
    }

    /// 是否处于题目编辑页
    pub fn is_question_edit_page(&self) -> bool {
        self.normalized_url().contains("cmd=editquestion")
    }

    /// 题目列表页上"添加题目"按钮背后的 URL
    ///
    /// 按钮用 onclick 跳转，目标地址藏在两个单引号之间
    pub fn add_question_url(&self) -> AppResult<String> {
        let button = self
            .html()
            .select(&sel(r#"[onclick*="cmd=addQuestion"]"#))
            .next()
            .ok_or_else(|| {
                AppError::element_missing("添加题目按钮", self.alert_summary())
            })?;
        let on_click = button.value().attr("onclick").unwrap_or("");
        let start = on_click.find('\'');
        let end = on_click.rfind('\'');
        match (start, end) {
            (Some(start), Some(end)) if end > start => {
                self.abs_url(&on_click[start + 1..end])
            }
            _ => Err(AppError::element_missing(
                "添加题目按钮的跳转地址",
                self.alert_summary(),
            )),
        }
    }

    /// 读取题目列表表格
    ///
    /// # 返回
    /// 返回有序的 (题目id, 标题, 绝对URL) 列表。
    /// 整张表格缺失是硬错误（附带页面提示文本），
    /// 缺少 order 列的行是"暂无数据"占位行，直接跳过
    pub fn question_rows(&self) -> AppResult<Vec<(String, String, String)>> {
        if !self.is_question_listing() {
            return Err(AppError::page_mismatch(self.url_str(), "题目列表页"));
        }
        let table = self
            .html()
            .select(&sel(r#"table[id^="tst_qst_lst"]"#))
            .next()
            .ok_or_else(|| {
                AppError::element_missing("题目列表表格", self.alert_summary())
            })?;

        let mut rows = Vec::new();
        for row in table.select(&sel("tbody tr")) {
            let cells: Vec<_> = row.select(&sel("td")).collect();
            if cells.len() == 1 {
                tracing::debug!("跳过只有一个单元格的行（空表占位）");
                continue;
            }
            // 列名是服务器分配的 order[<id>]，据此拿到题目 id
            let Some(order_cell) = cells.iter().find(|td| {
                td.value()
                    .attr("name")
                    .map(|n| n.starts_with("order["))
                    .unwrap_or(false)
            }) else {
                tracing::debug!("跳过没有 order 列的行");
                continue;
            };
            let name = order_cell.value().attr("name").unwrap_or("");
            let id = name
                .trim_start_matches("order[")
                .trim_end_matches(']')
                .trim()
                .to_string();

            let Some(link) = row.select(&sel("a[href]")).next() else {
                continue;
            };
            let title = norm(&element_text(link));
            let href = link.value().attr("href").unwrap_or("");
            rows.push((id, title, self.abs_url(href)?));
        }
        Ok(rows)
    }

    /// 题目列表：(标题, URL)
    pub fn question_listing(&self) -> AppResult<Vec<(String, String)>> {
        Ok(self
            .question_rows()?
            .into_iter()
            .map(|(_, title, url)| (title, url))
            .collect())
    }

    /// 题目列表：标题 → 服务器分配的题目 id
    pub fn question_ids(&self) -> AppResult<HashMap<String, String>> {
        Ok(self
            .question_rows()?
            .into_iter()
            .map(|(id, title, _)| (title, id))
            .collect())
    }

    /// 题目预览页上"编辑题目"的链接
    pub fn question_edit_url(&self) -> AppResult<String> {
        let link = self
            .html()
            .select(&sel(r#"a[href*="cmd=editQuestion"]"#))
            .next()
            .ok_or_else(|| {
                AppError::element_missing("编辑题目链接", self.alert_summary())
            })?;
        self.abs_url(link.value().attr("href").unwrap_or(""))
    }

    /// 从题目编辑页重建题目
    ///
    /// 根据 URL 里的 cmdClass 标记分发到具体题型，
    /// 设计块由调用方先行抓好传入
    pub fn reconstruct_question(
        &self,
        page_design: Vec<PageDesignBlock>,
    ) -> AppResult<TestQuestion> {
        if !self.is_question_edit_page() {
            return Err(AppError::page_mismatch(self.url_str(), "题目编辑页"));
        }

        let title = norm(&self.id_value("title")?);
        let author = norm(&self.id_value("author")?);
        let summary = norm(
            &self
                .find_by_id("comment")
                .and_then(|el| el.value().attr("value").map(str::to_string))
                .unwrap_or_default(),
        );
        let question_html = norm(
            &self
                .find_by_id("question")
                .map(element_text)
                .unwrap_or_default(),
        );

        let url = self.normalized_url();
        if url.contains("asstextquestiongui") {
            let points = self.parse_f64_field("non_keyword_points")?;
            Ok(TestQuestion::FreeformText {
                title,
                author,
                summary,
                question_html,
                page_design,
                points,
            })
        } else if url.contains("assfileuploadgui") {
            let max_bytes = match self.find_by_id("maxsize").and_then(|el| el.value().attr("value"))
            {
                Some(value) if !value.trim().is_empty() => value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| AppError::number_parse("maxsize", value))?,
                _ => DEFAULT_MAX_UPLOAD_BYTES,
            };
            let allowed_filetypes = self
                .find_by_id("allowedextensions")
                .and_then(|el| el.value().attr("value"))
                .unwrap_or("")
                .trim()
                .split(',')
                .map(str::to_string)
                .collect();
            let points = self.parse_f64_field("points")?;
            Ok(TestQuestion::FileUpload {
                title,
                author,
                summary,
                question_html,
                page_design,
                points,
                allowed_filetypes,
                max_bytes,
            })
        } else if url.contains("asssinglechoicegui") {
            let shuffle = self.checkbox_checked("shuffle");
            let answers = self
                .choice_answers("singlechoicewizard")?
                .into_iter()
                .map(|(answer, points, _)| ChoiceAnswer { answer, points })
                .collect();
            Ok(TestQuestion::SingleChoice {
                title,
                author,
                summary,
                question_html,
                page_design,
                shuffle,
                answers,
            })
        } else if url.contains("assmultiplechoicegui") {
            let shuffle = self.checkbox_checked("shuffle");
            let selection_limit = match self
                .find_by_id("selection_limit")
                .and_then(|el| el.value().attr("value"))
            {
                Some(value) if !value.trim().is_empty() => Some(
                    value
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| AppError::number_parse("selection_limit", value))?,
                ),
                _ => None,
            };
            let answers = self
                .choice_answers("multiplechoicewizard")?
                .into_iter()
                .map(|(answer, points, points_unchecked)| MultiChoiceAnswer {
                    answer,
                    points,
                    points_unchecked,
                })
                .collect();
            Ok(TestQuestion::MultipleChoice {
                title,
                author,
                summary,
                question_html,
                page_design,
                shuffle,
                selection_limit,
                answers,
            })
        } else {
            Err(AppError::page_mismatch(self.url_str(), "已知题型的编辑页"))
        }
    }

    /// 读取 id 对应元素的 value 属性
    fn id_value(&self, id: &str) -> AppResult<String> {
        let element = self.find_by_id(id).ok_or_else(|| {
            AppError::element_missing(format!("输入元素 #{}", id), self.alert_summary())
        })?;
        Ok(element.value().attr("value").unwrap_or("").to_string())
    }

    fn parse_f64_field(&self, id: &str) -> AppResult<f64> {
        let raw = self.id_value(id)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0.0);
        }
        trimmed
            .parse::<f64>()
            .map_err(|_| AppError::number_parse(id, trimmed))
    }

    fn checkbox_checked(&self, id: &str) -> bool {
        self.find_by_id(id)
            .map(|el| el.value().attr("checked").is_some())
            .unwrap_or(false)
    }

    /// 读取选择题向导表格里的选项
    ///
    /// # 返回
    /// 返回 (选项文本, 选中得分, 未选中得分)；单选题没有未选中得分，按 0 处理
    fn choice_answers(&self, wizard_class: &str) -> AppResult<Vec<(String, f64, f64)>> {
        let table = self
            .html()
            .select(&sel(&format!(r#"table[class*="{}"]"#, wizard_class)))
            .next()
            .ok_or_else(|| {
                AppError::element_missing(
                    format!("选项表格 ({})", wizard_class),
                    self.alert_summary(),
                )
            })?;

        let mut answers = Vec::new();
        let inputs: Vec<_> = table
            .select(&sel("input[id]"))
            .filter(|el| {
                el.value()
                    .attr("id")
                    .map(|id| id.starts_with("choice[answer]"))
                    .unwrap_or(false)
            })
            .collect();

        for input in inputs {
            let id = input.value().attr("id").unwrap_or("");
            let answer = norm(input.value().attr("value").unwrap_or(""));
            let points = self.table_points(table, &id.replace("answer", "points"))?;
            let points_unchecked =
                self.table_points(table, &id.replace("answer", "points_unchecked"))?;
            answers.push((answer, points, points_unchecked));
        }
        Ok(answers)
    }

    /// 在选项表格里按 id 找配对的分数输入框
    fn table_points(
        &self,
        table: scraper::ElementRef<'_>,
        id: &str,
    ) -> AppResult<f64> {
        let Some(input) = table
            .select(&sel("input[id]"))
            .find(|el| el.value().attr("id") == Some(id))
        else {
            return Ok(0.0);
        };
        let raw = input.value().attr("value").unwrap_or("0");
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0.0);
        }
        trimmed
            .parse::<f64>()
            .map_err(|_| AppError::number_parse(id, trimmed))
    }
}
