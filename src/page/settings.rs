//! 测验设置页的解析
//!
//! 设置页上的字段没有稳定的 id，只能从 label 文本出发，
//! 顺着 `for` 属性找到关联的输入元素。label 的措辞随语言包和
//! 版本漂移，所以用前缀匹配；匹配到零个或多个候选都直接报错，
//! 绝不悄悄选一个。

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::ElementRef;

use crate::error::{AppError, AppResult, ScrapeError};
use crate::models::spec::{IliasTest, TestQuestion};
use crate::page::questions::DEFAULT_NUMBER_OF_TRIES;
use crate::page::{element_text, sel, FormTarget, IliasPage};
use crate::utils::text::norm;

/// 设置页时间输入框的格式
const SETTINGS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

impl IliasPage {
    /// 测验设置表单（含提交地址和需要回传的额外字段）
    pub fn settings_form(&self) -> AppResult<FormTarget> {
        self.editable_form(
            "form.il-standard-form",
            "测验设置表单（当前页面是设置页吗？）",
        )
    }

    /// 计分设置表单
    pub fn scoring_settings_form(&self) -> AppResult<FormTarget> {
        self.editable_form(
            "form.il-standard-form",
            "计分设置表单（当前页面是计分设置页吗？）",
        )
    }

    /// 测验页上计分设置子页的链接
    pub fn scoring_settings_url(&self) -> AppResult<String> {
        let link = self
            .html()
            .select(&sel("a[href]"))
            .find(|a| {
                a.value()
                    .attr("href")
                    .map(|h| h.to_lowercase().contains("ilobjtestsettingsscoringresultsgui"))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                AppError::element_missing("计分设置链接", self.alert_summary())
            })?;
        self.abs_url(link.value().attr("href").unwrap_or(""))
    }

    /// 按 label 的正则匹配收集输入框的 name（大小写不敏感）
    ///
    /// 计分设置页的复选框没有可预测的 name，只能从 label 反查
    pub fn input_names_for_label(&self, label_pattern: &str) -> AppResult<Vec<String>> {
        let regex = Regex::new(&format!("(?i)^(?:{})", label_pattern))
            .map_err(|e| AppError::Other(format!("无效的标签正则 {:?}: {}", label_pattern, e)))?;
        let mut names = Vec::new();
        for input in self.html().select(&sel("input[id]")) {
            let Some(input_id) = input.value().attr("id") else {
                continue;
            };
            let Some(label) = self.html().select(&sel("label[for]")).find(|l| {
                l.value().attr("for") == Some(input_id)
            }) else {
                continue;
            };
            if regex.is_match(norm(&element_text(label)).as_str()) {
                if let Some(name) = input.value().attr("name") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// 计分设置页上所有日期时间输入框的 name
    pub fn scoring_date_input_names(&self) -> Vec<String> {
        self.html()
            .select(&sel(".date.il-input-datetime input"))
            .filter_map(|input| input.value().attr("name").map(str::to_string))
            .collect()
    }

    /// 从设置页重建测验对象
    ///
    /// # 参数
    /// - `questions`: 已经抓好的题目列表（可为空，发布流程只关心设置）
    pub fn reconstruct_test(&self, questions: Vec<TestQuestion>) -> AppResult<IliasTest> {
        let title_input = self.input_by_label_prefix(&["Titel", "Title"], "label")?;
        let description_input =
            self.input_by_label_prefix(&["Zusammenfassung", "Description"], "label")?;
        let starting_input = self.input_by_label_prefix(
            &["Start"],
            ".il-section-input .form-group label",
        )?;
        let ending_input = self.input_by_label_prefix(
            &["Ende", "End"],
            ".il-section-input .form-group label",
        )?;
        let tries_input = self.input_by_label_prefix(
            &["Maximale Anzahl von Testdurchläufen", "Maximum Number of Passes"],
            "label",
        )?;

        let title = norm(title_input.value().attr("value").unwrap_or(""));
        // 简介在单独的编辑页上，设置页只有摘要，两边先共用同一段文本
        let description = match description_input.value().attr("value") {
            Some(value) => norm(value),
            None => norm(&element_text(description_input)),
        };
        let intro_text = description.clone();

        let number_of_tries = match tries_input.value().attr("value") {
            Some(value) if !value.trim().is_empty() => value
                .trim()
                .parse::<u32>()
                .map_err(|_| AppError::number_parse("number_of_tries", value))?,
            _ => DEFAULT_NUMBER_OF_TRIES,
        };

        Ok(IliasTest {
            title,
            description,
            intro_text,
            starting_time: parse_time_input(starting_input)?,
            ending_time: parse_time_input(ending_input)?,
            number_of_tries,
            questions,
        })
    }

    /// 按 label 前缀找到唯一关联的输入元素
    ///
    /// 没有 `for` 属性的 label 跳过；候选数不为 1 时报错
    fn input_by_label_prefix(
        &self,
        prefixes: &[&str],
        selector: &str,
    ) -> AppResult<ElementRef<'_>> {
        let mut candidates = Vec::new();
        for label in self.html().select(&sel(selector)) {
            let text = norm(&element_text(label));
            if !prefixes.iter().any(|p| text.starts_with(p)) {
                continue;
            }
            let Some(target_id) = label.value().attr("for") else {
                tracing::debug!("标签 {:?} 没有 for 属性，跳过", text);
                continue;
            };
            let Some(input) = self.find_by_id(target_id) else {
                tracing::debug!("标签 {:?} 指向的元素 #{} 不存在，跳过", text, target_id);
                continue;
            };
            candidates.push(input);
        }

        match candidates.len() {
            1 => Ok(candidates[0]),
            0 => Err(AppError::element_missing(
                format!("label 前缀 {:?} 对应的输入元素", prefixes),
                self.alert_summary(),
            )),
            count => Err(AppError::Scrape(ScrapeError::AmbiguousLabel {
                label: prefixes.join("/"),
                count,
            })),
        }
    }
}

/// 解析时间输入框的值，空值表示未设置
fn parse_time_input(input: ElementRef<'_>) -> AppResult<Option<NaiveDateTime>> {
    let Some(raw) = input.value().attr("value") else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(trimmed, SETTINGS_TIME_FORMAT)
        .map(Some)
        .map_err(|_| AppError::number_parse("时间输入框", trimmed))
}
