//! 表单载荷合并
//!
//! 服务器渲染的表单里藏着 required / disabled 字段，漏掉任何一个都会
//! 被服务端校验打回（或者更糟：悄悄重置已有配置）。这里保证两条规则：
//!
//! 1. 抓到的 required / disabled 字段只要没被显式覆盖，一律原样回传
//! 2. 调用方显式给出的值永远优先于抓取值

use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::infrastructure::{FieldValue, FormBody};
use crate::page::ExtraFormValue;
use crate::utils::text::guess_mime;

/// 待提交表单的构建器
#[derive(Debug, Clone)]
pub struct FormPayload {
    body: FormBody,
}

impl FormPayload {
    /// urlencoded 表单
    pub fn urlencoded() -> Self {
        Self {
            body: FormBody {
                fields: Vec::new(),
                multipart: false,
            },
        }
    }

    /// multipart 表单（含文件字段时必须用这个）
    pub fn multipart() -> Self {
        Self {
            body: FormBody {
                fields: Vec::new(),
                multipart: true,
            },
        }
    }

    /// 是否已经有同名字段
    pub fn contains(&self, name: &str) -> bool {
        self.body.fields.iter().any(|(n, _)| n == name)
    }

    /// 显式写入文本字段
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.body.fields.push((name.into(), FieldValue::Text(value.into())));
        self
    }

    /// 写入空文件占位字段
    pub fn empty_file(mut self, name: impl Into<String>) -> Self {
        self.body.fields.push((name.into(), FieldValue::EmptyFile));
        self
    }

    /// 批量写入字段
    pub fn fields(mut self, fields: Vec<(String, FieldValue)>) -> Self {
        self.body.fields.extend(fields);
        self
    }

    /// 从磁盘读文件写入真实上传字段
    pub async fn file_from_path(
        mut self,
        name: impl Into<String>,
        path: &Path,
    ) -> AppResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime = guess_mime(&file_name).to_string();
        self.body.fields.push((
            name.into(),
            FieldValue::File {
                bytes,
                file_name,
                mime,
            },
        ));
        Ok(self)
    }

    /// 合并抓取到的额外字段
    ///
    /// 已显式写入的名字跳过；disabled 字段以空值回传
    pub fn merge_extras(mut self, extras: &[ExtraFormValue]) -> Self {
        for extra in extras {
            if self.contains(&extra.name) {
                continue;
            }
            let value = if extra.disabled {
                String::new()
            } else {
                extra.value.clone()
            };
            self.body.fields.push((extra.name.clone(), FieldValue::Text(value)));
        }
        self
    }

    pub fn into_body(self) -> FormBody {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extras() -> Vec<ExtraFormValue> {
        vec![
            ExtraFormValue {
                name: "csrf_token".into(),
                value: "abc".into(),
                disabled: false,
            },
            ExtraFormValue {
                name: "title".into(),
                value: "old title".into(),
                disabled: false,
            },
            ExtraFormValue {
                name: "fixed_participants".into(),
                value: "1".into(),
                disabled: true,
            },
        ]
    }

    #[test]
    fn explicit_values_win_over_scraped_extras() {
        let body = FormPayload::urlencoded()
            .text("title", "new title")
            .merge_extras(&extras())
            .into_body();

        let pairs = body.urlencoded_pairs();
        let title: Vec<_> = pairs.iter().filter(|(n, _)| n == "title").collect();
        assert_eq!(title.len(), 1);
        assert_eq!(title[0].1, "new title");
    }

    #[test]
    fn required_and_disabled_extras_are_never_dropped() {
        let body = FormPayload::urlencoded()
            .text("title", "new title")
            .merge_extras(&extras())
            .into_body();

        let pairs = body.urlencoded_pairs();
        assert!(pairs.iter().any(|(n, v)| n == "csrf_token" && v == "abc"));
        // disabled 字段以空值出现，但绝不缺席
        assert!(pairs.iter().any(|(n, v)| n == "fixed_participants" && v.is_empty()));
    }

    #[test]
    fn merge_is_idempotent_per_name() {
        let duplicated = vec![
            ExtraFormValue {
                name: "x".into(),
                value: "first".into(),
                disabled: false,
            },
            ExtraFormValue {
                name: "x".into(),
                value: "second".into(),
                disabled: false,
            },
        ];
        let body = FormPayload::urlencoded()
            .merge_extras(&duplicated)
            .into_body();
        let pairs = body.urlencoded_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "first");
    }
}
