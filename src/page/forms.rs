//! 表单抓取
//!
//! ILIAS 的服务端校验要求表单里的 required / disabled 字段原样回传，
//! 而这些字段会随着之前的配置状态变化，硬编码字段列表会悄悄丢状态。
//! 这里把提交地址和这些"额外字段"一起抓出来，交给上层合并。

use scraper::ElementRef;

use crate::error::{AppError, AppResult};
use crate::page::{element_text, sel, IliasPage};

/// 需要原样回传的表单字段
///
/// 按名字去重，先抓到的优先；调用方显式给出的值永远覆盖抓取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFormValue {
    pub name: String,
    pub value: String,
    pub disabled: bool,
}

/// 一个可提交的表单目标
#[derive(Debug, Clone)]
pub struct FormTarget {
    /// 提交的绝对 URL
    pub url: String,
    /// 触发按钮自身的 value（有些表单要求把按钮也作为字段提交）
    pub button_value: String,
    /// 抓取到的额外字段
    pub extras: Vec<ExtraFormValue>,
}

impl IliasPage {
    /// 通过提交按钮的 name 定位其所在表单
    ///
    /// # 参数
    /// - `button_name`: 按钮的 name 属性，例如 `cmd[saveReturn]`
    ///
    /// # 返回
    /// 返回表单的提交地址、按钮 value 和全部额外字段
    pub fn form_target_from_button(&self, button_name: &str) -> AppResult<FormTarget> {
        let button = self
            .html()
            .select(&sel("[name]"))
            .find(|el| el.value().attr("name") == Some(button_name))
            .ok_or_else(|| {
                AppError::element_missing(
                    format!("按钮 {:?}", button_name),
                    self.alert_summary(),
                )
            })?;

        let form = enclosing_form(button).ok_or_else(|| {
            AppError::element_missing(
                format!("按钮 {:?} 所在的表单", button_name),
                self.alert_summary(),
            )
        })?;

        let action = form.value().attr("action").ok_or_else(|| {
            AppError::element_missing("表单的 action 属性", self.alert_summary())
        })?;

        Ok(FormTarget {
            url: self.abs_url(action)?,
            button_value: button.value().attr("value").unwrap_or("").to_string(),
            extras: extract_extra_form_values(form),
        })
    }

    /// 按 CSS 选择器抓取一个可编辑表单
    ///
    /// # 参数
    /// - `selector`: 表单选择器，例如 `form.il-standard-form`
    /// - `what`: 出错时的描述（"测验设置表单"等）
    pub fn editable_form(&self, selector: &str, what: &str) -> AppResult<FormTarget> {
        let form = self
            .html()
            .select(&sel(selector))
            .next()
            .ok_or_else(|| AppError::element_missing(what, self.alert_summary()))?;
        let action = form.value().attr("action").ok_or_else(|| {
            AppError::element_missing(format!("{} 的 action 属性", what), self.alert_summary())
        })?;
        Ok(FormTarget {
            url: self.abs_url(action)?,
            button_value: String::new(),
            extras: extract_extra_form_values(form),
        })
    }

    /// 测验创建页上 `cmd[save]` 表单的提交目标
    pub fn test_create_submit_target(&self) -> AppResult<FormTarget> {
        if !self.is_test_create_page() {
            return Err(AppError::page_mismatch(self.url_str(), "测验创建页"));
        }
        self.form_target_from_button("cmd[save]")
    }

    /// 题目定稿表单（`cmd[saveReturn]`）的提交目标
    ///
    /// 页面上的 ilfilehash 也要一并回传
    pub fn question_finalize_target(&self) -> AppResult<FormTarget> {
        let mut target = self.form_target_from_button("cmd[saveReturn]")?;
        if let Some(hash_input) = self.find_by_id("ilfilehash") {
            let value = hash_input.value().attr("value").unwrap_or("").to_string();
            push_unique(
                &mut target.extras,
                ExtraFormValue {
                    name: "ilfilehash".to_string(),
                    value,
                    disabled: false,
                },
            );
        }
        Ok(target)
    }
}

/// 沿祖先链向上找包含元素的 form
fn enclosing_form(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    for ancestor in el.ancestors() {
        if let Some(parent) = ElementRef::wrap(ancestor) {
            if parent.value().name() == "form" {
                return Some(parent);
            }
        }
    }
    None
}

/// 抓取表单里所有需要回传的字段
///
/// - 带 `required` 的 input / textarea：名字和当前值
/// - 所有 `select`：当前选中项（没有选中项就取第一项）
/// - 带 `disabled` 的 input / select / textarea：以空值回传，避免服务端误重置
pub fn extract_extra_form_values(form: ElementRef<'_>) -> Vec<ExtraFormValue> {
    let mut extras: Vec<ExtraFormValue> = Vec::new();

    for input in form.select(&sel("input[required], textarea[required]")) {
        let Some(name) = input.value().attr("name") else {
            continue;
        };
        push_unique(
            &mut extras,
            ExtraFormValue {
                name: name.to_string(),
                value: input.value().attr("value").unwrap_or("").to_string(),
                disabled: input.value().attr("disabled").is_some(),
            },
        );
    }

    for select in form.select(&sel("select")) {
        let Some(name) = select.value().attr("name") else {
            continue;
        };
        let selected = select
            .select(&sel("option[selected]"))
            .next()
            .or_else(|| select.select(&sel("option")).next());
        let value = selected
            .map(|option| {
                option
                    .value()
                    .attr("value")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(option).trim().to_string())
            })
            .unwrap_or_default();
        push_unique(
            &mut extras,
            ExtraFormValue {
                name: name.to_string(),
                value,
                disabled: select.value().attr("disabled").is_some(),
            },
        );
    }

    for disabled in form.select(&sel("input[disabled], select[disabled], textarea[disabled]")) {
        let Some(name) = disabled.value().attr("name") else {
            continue;
        };
        push_unique(
            &mut extras,
            ExtraFormValue {
                name: name.to_string(),
                value: String::new(),
                disabled: true,
            },
        );
    }

    extras
}

/// 按名字去重追加，先到先得
fn push_unique(extras: &mut Vec<ExtraFormValue>, value: ExtraFormValue) {
    if extras.iter().any(|e| e.name == value.name) {
        return;
    }
    extras.push(value);
}
