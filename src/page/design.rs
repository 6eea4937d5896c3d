//! 题目正文（富文本设计块）的解析
//!
//! 题目预览表单的直接子元素是一条扁平的兄弟序列：
//! 标题标记之后依次是文本 / 代码 / 图片块，直到嵌入的题目预览为止。
//! 按 CSS class 逐个归类。图片块需要下载，下载动作通过调用方传入的
//! 异步回调完成，页面模型自身保持无 I/O。

use std::future::Future;
use std::path::PathBuf;

use regex::Regex;
use scraper::ElementRef;

use crate::error::{AppError, AppResult};
use crate::models::spec::PageDesignBlock;
use crate::page::{sel, IliasPage};
use crate::utils::text::norm;

impl IliasPage {
    /// 题目预览页上"编辑页面"按钮指向的设计页
    pub fn design_page_url(&self) -> AppResult<String> {
        let button = self
            .html()
            .select(&sel("[data-action]"))
            .find(|el| {
                el.value()
                    .attr("data-action")
                    .map(|a| a.to_lowercase().contains("cmdclass=ilassquestionpagegui"))
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                AppError::element_missing("编辑页面按钮", self.alert_summary())
            })?;
        self.abs_url(button.value().attr("data-action").unwrap_or(""))
    }

    /// 设计页的两个提交端点
    ///
    /// # 返回
    /// 返回 (JSON 端点, 传统表单端点)。文本/图片块走前者，代码块走后者
    pub fn design_post_urls(&self) -> AppResult<(String, String)> {
        let init = self.find_by_id("il-copg-init").ok_or_else(|| {
            AppError::element_missing("设计页初始化元素 (il-copg-init)", self.alert_summary())
        })?;
        let endpoint = init.value().attr("data-endpoint").ok_or_else(|| {
            AppError::element_missing("设计页的 data-endpoint", self.alert_summary())
        })?;
        let form_action = init.value().attr("data-formaction").ok_or_else(|| {
            AppError::element_missing("设计页的 data-formaction", self.alert_summary())
        })?;
        Ok((self.abs_url(endpoint)?, self.abs_url(form_action)?))
    }

    /// 代码块第二阶段的提交表单
    pub fn design_code_submit_url(&self) -> AppResult<String> {
        Ok(self.form_target_from_button("cmd[create_src]")?.url)
    }

    /// 设计页上最后一个内容块的 id
    ///
    /// 题目预览永远排在最后，所以取倒数第二个 pc 块
    pub fn last_design_component_id(&self) -> AppResult<String> {
        let editor = self.find_by_id("ilEditorTD").ok_or_else(|| {
            AppError::element_missing("设计页编辑器 (ilEditorTD)", self.alert_summary())
        })?;
        let candidates: Vec<_> = editor
            .select(&sel("div[id]"))
            .filter(|div| {
                div.value()
                    .attr("id")
                    .map(|id| id.starts_with("pc"))
                    .unwrap_or(false)
            })
            .collect();
        if candidates.len() >= 2 {
            let id = candidates[candidates.len() - 2]
                .value()
                .attr("id")
                .unwrap_or("");
            return Ok(id.trim_start_matches("pc").to_string());
        }
        Ok(String::new())
    }

    /// 遍历题目预览，抓取全部设计块
    ///
    /// # 参数
    /// - `download`: 图片下载回调，输入图片的绝对 URL，返回本地路径
    pub async fn design_blocks<F, Fut>(&self, mut download: F) -> AppResult<Vec<PageDesignBlock>>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = AppResult<PathBuf>>,
    {
        let form = self
            .html()
            .select(&sel(r#"form[name="ilAssQuestionPreview"]"#))
            .next()
            .ok_or_else(|| {
                AppError::element_missing("题目预览表单", self.alert_summary())
            })?;

        let mut after_start = false;
        let mut blocks = Vec::new();

        for child in form.children() {
            let Some(element) = ElementRef::wrap(child) else {
                continue;
            };
            let classes: Vec<&str> = element.value().classes().collect();

            if classes.contains(&"ilc_page_title_PageTitle") {
                after_start = true;
                continue;
            }
            if !after_start {
                continue;
            }
            if classes.iter().any(|c| c.starts_with("ilc_question_")) {
                break;
            }

            if classes.contains(&"ilc_Paragraph") {
                tracing::debug!("发现文本块");
                blocks.push(PageDesignBlock::Text {
                    text: normalize_design_html(&element.inner_html()),
                });
                continue;
            }
            if classes.contains(&"ilc_Code") {
                tracing::debug!("发现代码块");
                blocks.push(self.code_block(element)?);
                continue;
            }
            if let Some(media) = element
                .select(&sel(".ilc_media_cont_MediaContainer"))
                .next()
            {
                tracing::debug!("发现图片块");
                let source = media
                    .select(&sel("img"))
                    .next()
                    .or_else(|| media.select(&sel("embed")).next())
                    .and_then(|el| el.value().attr("src"))
                    .ok_or_else(|| {
                        AppError::element_missing("图片块的 src", self.alert_summary())
                    })?;
                let path = download(self.abs_url(source)?).await?;
                blocks.push(PageDesignBlock::Image { path });
                continue;
            }

            tracing::warn!("无法识别的设计块: {:?}", classes);
        }

        Ok(blocks)
    }

    /// 解析一个代码块
    fn code_block(&self, element: ElementRef<'_>) -> AppResult<PageDesignBlock> {
        let code_el = element
            .select(&sel(".ilc_Sourcecode .ilc_code_block_Code"))
            .next()
            .ok_or_else(|| {
                AppError::element_missing("代码块内容", self.alert_summary())
            })?;
        let code = norm(&text_with_line_breaks(code_el));

        let mut name = String::from("unknown.c");
        if let Some(link) = element
            .select(&sel(r#"a[href*="cmd=download_paragraph"]"#))
            .next()
        {
            let href = link.value().attr("href").unwrap_or("");
            let pattern = Regex::new(r"downloadtitle=([^&]+)").expect("静态正则必定合法");
            if let Some(captures) = pattern.captures(href) {
                name = norm(&captures[1]);
            }
        }

        Ok(PageDesignBlock::Code {
            code,
            // 预览页不暴露语言，统一按 c 处理
            language: "c".to_string(),
            name,
        })
    }
}

/// 把 `<br>` 展开成换行的文本提取
fn text_with_line_breaks(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            out.push_str(&text.text);
        } else if let Some(child) = node.value().as_element() {
            if child.name() == "br" {
                out.push('\n');
            }
        }
    }
    out
}

/// 归一化文本块的 HTML，使其可以原样回传给 ILIAS
///
/// - 去掉注释
/// - `<code>` 的 class 去掉（带 class 回传会让 ILIAS 崩溃）
/// - `<em>` / `<strong>` 改写成 ILIAS 自己的行内样式 span
fn normalize_design_html(html: &str) -> String {
    let comment = Regex::new(r"(?s)<!--.*?-->").expect("静态正则必定合法");
    let code_open = Regex::new(r"<code[^>]*>").expect("静态正则必定合法");
    let em_open = Regex::new(r"<em[^>]*>").expect("静态正则必定合法");
    let strong_open = Regex::new(r"<strong[^>]*>").expect("静态正则必定合法");

    let html = comment.replace_all(html, "");
    let html = code_open.replace_all(&html, "<code>");
    let html = em_open.replace_all(&html, r#"<span class="ilc_text_inline_Emph">"#);
    let html = html.replace("</em>", "</span>");
    let html = strong_open.replace_all(&html, r#"<span class="ilc_text_inline_Strong">"#);
    let html = html.replace("</strong>", "</span>");
    norm(&html)
}
