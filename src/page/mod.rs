//! 页面模型 - 解析层
//!
//! ILIAS 没有 API，所有信息都要从服务端渲染的 HTML 里抠出来。
//! 本层把抓到的 HTML 包装成 [`IliasPage`]，对上层暴露结构化查询：
//! 标签页、表单、题目列表、批改表格等。
//!
//! ## 设计原则
//!
//! - **纯函数**：输入 HTML 文本 + URL，输出类型化结果，不做任何 I/O
//! - **脆弱点隔离**：每个查询一个具名函数，ILIAS 改版时只需要改对应函数
//! - **快速失败**：在类型不符的页面上发起查询会得到明确的 PageMismatch 错误

pub mod dashboard;
pub mod design;
pub mod forms;
pub mod grading;
pub mod questions;
pub mod settings;

pub use forms::{ExtraFormValue, FormTarget};

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, AppResult};
use crate::utils::text::norm;

/// 测验的标签页
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestTab {
    Settings,
    Questions,
    Participants,
    Dashboard,
    ManualGrading,
}

impl TestTab {
    /// 页面上可能出现的标签文本（德语在前，英语在后）
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            TestTab::Settings => &["Einstellungen", "Settings"],
            TestTab::Questions => &["Fragen", "Questions"],
            TestTab::Participants => &["Teilnehmer", "Participants"],
            TestTab::Dashboard => &["Dashboard"],
            TestTab::ManualGrading => &["Manuelle Bewertung", "Manual Grading"],
        }
    }
}

/// 容器页面里的子元素类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Test,
    Other,
}

/// 容器页面里的一个子元素
#[derive(Debug, Clone)]
pub struct ChildElement {
    pub name: String,
    pub url: String,
    pub kind: ChildKind,
}

/// 一个已抓取的 ILIAS 页面
///
/// (HTML 树, 规范化 URL) 的不可变快照，构造后不再修改
pub struct IliasPage {
    html: Html,
    url: Url,
    url_lower: String,
}

impl IliasPage {
    /// 从 HTML 文本和页面 URL 构造页面模型
    pub fn new(html_text: &str, url: &str) -> AppResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| AppError::Other(format!("无法解析页面URL {:?}: {}", url, e)))?;
        let url_lower = url.as_str().to_lowercase();
        Ok(Self {
            html: Html::parse_document(html_text),
            url,
            url_lower,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_str(&self) -> &str {
        self.url.as_str()
    }

    /// 小写化的页面 URL，用于 cmdClass 之类的标记匹配
    pub fn normalized_url(&self) -> &str {
        &self.url_lower
    }

    pub(crate) fn html(&self) -> &Html {
        &self.html
    }

    /// 把页面上的相对链接转成绝对 URL
    pub fn abs_url(&self, relative: &str) -> AppResult<String> {
        self.url
            .join(relative)
            .map(|u| u.to_string())
            .map_err(|e| AppError::Other(format!("无法拼接URL {:?}: {}", relative, e)))
    }

    /// 按 id 精确查找元素
    ///
    /// ILIAS 的 id 里经常带方括号（choice[answer][0]），
    /// 直接写 CSS 选择器需要转义，统一走属性遍历更稳妥
    pub(crate) fn find_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html
            .select(&sel("[id]"))
            .find(|el| el.value().attr("id") == Some(id))
    }

    // ========== 标签页 ==========

    /// 列出导航栏里的所有标签页
    ///
    /// # 返回
    /// 返回 (标签文本, 绝对URL) 列表；没有标签栏时为空
    pub fn tabs(&self) -> AppResult<Vec<(String, String)>> {
        let mut result = Vec::new();
        let Some(bar) = self.find_by_id("ilTab") else {
            return Ok(result);
        };
        for item in bar.select(&sel("li")) {
            let Some(item_id) = item.value().attr("id") else {
                continue;
            };
            if !item_id.starts_with("tab_") {
                continue;
            }
            let Some(link) = item.select(&sel("a")).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            // 链接文本里混着无障碍提示（"(Selected)"），按 class 剔除
            let label = norm(&text_excluding_class(link, "ilAccHidden"));
            result.push((label, self.abs_url(href)?));
        }
        Ok(result)
    }

    /// 查找指定标签页的 URL
    pub fn tab_url(&self, tab: TestTab) -> AppResult<String> {
        let tabs = self.tabs()?;
        for (label, url) in &tabs {
            if tab.labels().iter().any(|candidate| label == candidate) {
                return Ok(url.clone());
            }
        }
        Err(AppError::element_missing(
            format!("标签页 {:?}", tab.labels()),
            self.alert_summary(),
        ))
    }

    // ========== 提示框 ==========

    /// 收集页面上所有提示框的文本
    pub fn alert_texts(&self) -> Vec<String> {
        let mut texts = Vec::new();
        for el in self.html.select(&sel(r#"[role="alert"], [role="status"]"#)) {
            texts.push(norm(&element_text(el)));
        }
        texts
    }

    /// 把提示框文本拼成一段，用于错误信息
    pub fn alert_summary(&self) -> String {
        self.alert_texts().join(" | ")
    }

    /// 页面上是否有失败提示
    pub fn has_danger_alert(&self) -> bool {
        for el in self.html.select(&sel(r#"[role="alert"], [role="status"]"#)) {
            if el.value().classes().any(|c| c == "alert-danger") {
                tracing::warn!("页面出现失败提示: {}", norm(&element_text(el)));
                return true;
            }
        }
        false
    }

    /// 页面上是否有成功提示
    ///
    /// 只要同时存在失败提示就按失败处理
    pub fn has_success_alert(&self) -> bool {
        if self.has_danger_alert() {
            return false;
        }
        self.html
            .select(&sel(r#"[role="alert"], [role="status"]"#))
            .any(|el| el.value().classes().any(|c| c == "alert-success"))
    }

    // ========== 登录状态 ==========

    /// 判断页面是否处于已登录状态
    pub fn is_authenticated(&self) -> bool {
        if self.find_by_id("userlog").is_some() {
            return true;
        }
        self.html
            .select(&sel("a[href]"))
            .any(|a| {
                a.value()
                    .attr("href")
                    .map(|h| h.to_lowercase().contains("logout"))
                    .unwrap_or(false)
            })
    }

    // ========== 容器子元素 ==========

    /// 列出容器页面（文件夹、课程）里的子元素
    pub fn child_elements(&self) -> AppResult<Vec<ChildElement>> {
        let mut result: Vec<ChildElement> = Vec::new();
        // 经典容器布局和新版 il-item 布局都要兼容
        for selector in ["a.il_ContainerItemTitle", ".il-item-title a"] {
            for link in self.html.select(&sel(selector)) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                let url = self.abs_url(href)?;
                if result.iter().any(|c| c.url == url) {
                    continue;
                }
                let name = norm(&element_text(link));
                let kind = detect_child_kind(&url);
                result.push(ChildElement { name, url, kind });
            }
        }
        Ok(result)
    }

    /// 文件夹页面上"新建测验"的入口链接
    pub fn test_create_url(&self) -> AppResult<String> {
        let element = self.find_by_id("tst").ok_or_else(|| {
            AppError::element_missing("新建测验入口 (id=tst)", self.alert_summary())
        })?;
        let href = element
            .value()
            .attr("href")
            .or_else(|| {
                element
                    .select(&sel("a[href]"))
                    .next()
                    .and_then(|a| a.value().attr("href"))
            })
            .ok_or_else(|| {
                AppError::element_missing("新建测验入口的链接", self.alert_summary())
            })?;
        self.abs_url(href)
    }

    /// 是否处于测验创建页
    pub fn is_test_create_page(&self) -> bool {
        self.url_lower.contains("cmd=create") && self.url_lower.contains("new_type=tst")
    }

    /// 是否是测验页面（粘贴的链接可能指向各种子视图）
    pub fn is_test_page(&self) -> bool {
        const MARKERS: [&str; 4] = [
            "cmdclass=iltestscreengui",
            "cmdclass=ilobjtestgui",
            "cmdclass=ilparticipantstestresultsgui",
            "cmdclass=iltestscoringbyquestionsgui",
        ];
        if MARKERS.iter().any(|m| self.url_lower.contains(m)) {
            return true;
        }
        if let Some(header) = self.find_by_id("headerimage") {
            if let Some(alt) = header.value().attr("alt") {
                return alt.to_lowercase() == "symbol test";
            }
        }
        false
    }
}

/// 根据链接特征判断子元素类型
fn detect_child_kind(url: &str) -> ChildKind {
    let lower = url.to_lowercase();
    if lower.contains("target=tst_")
        || lower.contains("ilobjtestgui")
        || lower.contains("baseclass=iltestscreengui")
    {
        ChildKind::Test
    } else {
        ChildKind::Other
    }
}

/// 解析静态 CSS 选择器
///
/// 选择器全部是编译期字符串，解析失败属于编码错误
pub(crate) fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("静态选择器必定合法")
}

/// 收集元素的全部文本
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// 收集元素文本，但跳过带指定 class 的子树
pub(crate) fn text_excluding_class(el: ElementRef<'_>, excluded: &str) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let mut skip = false;
        for ancestor in node.ancestors() {
            if ancestor.id() == el.id() {
                break;
            }
            if let Some(element) = ancestor.value().as_element() {
                if element.classes().any(|c| c == excluded) {
                    skip = true;
                    break;
                }
            }
        }
        if !skip {
            out.push_str(&text.text);
        }
    }
    out
}
