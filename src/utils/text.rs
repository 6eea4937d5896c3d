//! 文本处理辅助函数
//!
//! 集中存放路径、模式和 HTML 文本的小工具，避免散落在各个业务模块里

use rand::Rng;
use regex::Regex;

use crate::error::{AppError, AppResult};

/// 规范化从页面上抓取的文本
///
/// 去掉首尾空白，替换不间断空格，统一换行符
pub fn norm(input: &str) -> String {
    input.trim().replace('\u{a0}', " ").replace("\r\n", "\n")
}

/// 清洗远端元素名称，使其可以安全地用作相对路径的一段
pub fn sanitize_path_segment(name: &str) -> String {
    name.replace('/', "-").replace('\\', "-").trim().to_string()
}

/// 生成 ILIAS 上传表单需要的随机文件哈希（32 位小写字母数字）
pub fn random_ilfilehash() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char)
        .collect()
}

/// 生成富文本段落插入时使用的随机 20 位数字 id
pub fn random_paragraph_id() -> String {
    let mut rng = rand::thread_rng();
    (0..20)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// 把单段 glob 模式翻译为全串匹配的正则
///
/// `*` 匹配任意串，`?` 匹配单个字符，其余字符按字面处理。
/// 全串匹配（而不是子串匹配）保证 `foo` 不会误匹配 `foobar`。
pub fn glob_to_regex(segment: &str) -> AppResult<Regex> {
    let mut body = String::with_capacity(segment.len() * 2);
    for c in segment.chars() {
        match c {
            '*' => body.push_str(".*"),
            '?' => body.push('.'),
            c => body.push_str(&regex::escape(&c.to_string())),
        }
    }
    Regex::new(&format!("^(?s:{})$", body))
        .map_err(|e| AppError::Other(format!("无效的匹配模式 {:?}: {}", segment, e)))
}

/// 判断名称是否匹配单段 glob 模式
pub fn matches_segment(name: &str, segment: &str) -> AppResult<bool> {
    let result = glob_to_regex(segment)?.is_match(name);
    tracing::debug!("模式 {:?} 匹配 {:?} ? {}", segment, name, result);
    Ok(result)
}

/// 切出斜杠分隔模式的第一段
///
/// # 返回
/// 返回 (第一段, 剩余模式)；没有剩余时为 None
pub fn split_first_segment(pattern: &str) -> (&str, Option<&str>) {
    match pattern.find('/') {
        Some(idx) => (&pattern[..idx], Some(&pattern[idx + 1..])),
        None => (pattern, None),
    }
}

/// 转换 HTML 答案前的清理
///
/// ILIAS 的富文本答案里充满空段落和多余的 `<br>`，
/// 直接转 Markdown 会产生大量空行，这里先行剔除。
pub fn cleanup_answer_html(html: &str) -> String {
    let empty_paragraph = Regex::new(r"(?i)<p[^>]*>(\s|&nbsp;|<br\s*/?>)*</p>")
        .expect("静态正则必定合法");
    let cleaned = empty_paragraph.replace_all(html, "");
    let squeezed = Regex::new(r"\n{3,}")
        .expect("静态正则必定合法")
        .replace_all(cleaned.trim(), "\n\n")
        .into_owned();
    squeezed
}

/// 根据扩展名猜测上传文件的 MIME 类型
///
/// 只覆盖题目设计块里会出现的图片类型，其余一律按二进制流处理
pub fn guess_mime(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    match lower.rsplit('.').next() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_strips_and_unifies() {
        assert_eq!(norm("  a\u{a0}b\r\nc  "), "a b\nc");
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_path_segment("a/b\\c "), "a-b-c");
    }

    #[test]
    fn glob_matches_full_string_only() {
        assert!(matches_segment("foo", "foo").unwrap());
        assert!(!matches_segment("foobar", "foo").unwrap());
        assert!(matches_segment("anything", "*").unwrap());
        assert!(matches_segment("a.b", "a.b").unwrap());
        assert!(!matches_segment("axb", "a.b").unwrap());
        assert!(matches_segment("axb", "a?b").unwrap());
        assert!(matches_segment("Übungsblatt 3", "Übungs*").unwrap());
    }

    #[test]
    fn split_segments() {
        assert_eq!(split_first_segment("foo/bar/baz"), ("foo", Some("bar/baz")));
        assert_eq!(split_first_segment("foo"), ("foo", None));
    }

    #[test]
    fn ilfilehash_shape() {
        let hash = random_ilfilehash();
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn cleanup_removes_empty_paragraphs() {
        let html = "<p>text</p><p> </p><p><br></p><p>&nbsp;</p><p>more</p>";
        assert_eq!(cleanup_answer_html(html), "<p>text</p><p>more</p>");
    }
}
