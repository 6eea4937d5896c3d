//! 题目级操作 - 业务能力层
//!
//! 一道题的创建分两步：先选题型进入编辑器，再提交定稿表单。
//! 正文的设计块随后逐个插入，每个块都要接在上一个块的
//! 服务器分配 id 之后，顺序因此得到保证。

use std::path::Path;

use serde_json::json;

use crate::error::{AppError, AppResult, HttpError};
use crate::infrastructure::{FieldValue, HttpSession, PageCheck, ResponseCheck};
use crate::models::spec::{PageDesignBlock, TestQuestion};
use crate::page::IliasPage;
use crate::services::payload::FormPayload;
use crate::utils::text::{random_ilfilehash, random_paragraph_id};

/// 题目操作能力
pub struct QuestionService<'a> {
    session: &'a HttpSession,
}

impl<'a> QuestionService<'a> {
    pub fn new(session: &'a HttpSession) -> Self {
        Self { session }
    }

    /// 向测验添加一道题目（含正文设计块）
    ///
    /// # 参数
    /// - `questions_tab`: 题目列表页
    /// - `question`: 待创建的题目
    pub async fn add_question(
        &self,
        questions_tab: &IliasPage,
        question: &TestQuestion,
    ) -> AppResult<IliasPage> {
        tracing::debug!("添加题目 {:?}", question.title());
        let add_url = questions_tab.add_question_url()?;
        let type_select_page = self.session.get_page(&add_url).await?;

        // 第一步：选题型，进入编辑器
        let create_target =
            type_select_page.form_target_from_button("cmd[executeCreateQuestion]")?;
        let create_payload = FormPayload::urlencoded()
            .text("cmd[executeCreateQuestion]", "Erstellen")
            .text("qtype", question.question_type().code().to_string())
            // TinyMCE 编辑模式
            .text("add_quest_cont_edit_mode", "default")
            // 不进题库
            .text("usage", "1")
            .text("position", "0")
            .merge_extras(&create_target.extras);
        let edit_page = self
            .session
            .post_form(
                &create_target.url,
                &create_payload.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::QuestionEditPage,
            )
            .await?;

        // 第二步：填内容，定稿
        let finalize_target = edit_page.question_finalize_target()?;
        let finalize_payload = FormPayload::multipart()
            .fields(question_form_options(question))
            .text("cmd[saveReturn]", "Speichern und zurückkehren")
            .merge_extras(&finalize_target.extras);
        let question_page = self
            .session
            .post_form(
                &finalize_target.url,
                &finalize_payload.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::SuccessAlert,
            )
            .await?;

        // 第三步：正文设计块
        if !question.page_design().is_empty() {
            let design_page = self
                .session
                .get_page(&question_page.design_page_url()?)
                .await?;
            self.add_design_blocks(&design_page, question.page_design())
                .await?;
        }

        Ok(question_page)
    }

    /// 按顺序插入全部设计块
    pub async fn add_design_blocks(
        &self,
        design_page: &IliasPage,
        blocks: &[PageDesignBlock],
    ) -> AppResult<()> {
        let mut current_id = String::new();
        for block in blocks {
            tracing::debug!("插入设计块 {:?}", block);
            current_id = match block {
                PageDesignBlock::Text { text } => {
                    self.add_text_block(design_page, text, &current_id).await?
                }
                PageDesignBlock::Image { path } => {
                    self.add_image_block(design_page, path, &current_id).await?
                }
                PageDesignBlock::Code {
                    code,
                    language,
                    name,
                } => {
                    self.add_code_block(design_page, code, language, name, &current_id)
                        .await?
                }
            };
        }
        Ok(())
    }

    /// 插入文本块（JSON 端点）
    ///
    /// # 返回
    /// 返回新块的 id，下一个块接在它后面
    async fn add_text_block(
        &self,
        design_page: &IliasPage,
        text_html: &str,
        after_id: &str,
    ) -> AppResult<String> {
        let (json_url, _) = design_page.design_post_urls()?;
        let new_id = random_paragraph_id();
        let response = self
            .session
            .post_json(
                &json_url,
                &json!({
                    "component": "Paragraph",
                    "action": "insert",
                    "data": {
                        "after_pcid": after_id,
                        "pcid": new_id,
                        "content": text_html,
                        "characteristic": "Standard",
                        "fromPlaceholder": false,
                    }
                }),
            )
            .await?;

        // HTTP 2xx 不代表成功，信封里的 error 字段才算数
        if let Some(error) = response.get("error") {
            let failed = match error {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::String(s) => !s.is_empty(),
                _ => true,
            };
            if failed {
                return Err(AppError::Http(HttpError::FailedValidation {
                    url: json_url,
                    detail: format!("插入文本块失败: {}", error),
                }));
            }
        }
        tracing::debug!("新文本块 id = {}", new_id);
        Ok(new_id)
    }

    /// 插入图片块（multipart 上传）
    async fn add_image_block(
        &self,
        design_page: &IliasPage,
        path: &Path,
        after_id: &str,
    ) -> AppResult<String> {
        let (json_url, _) = design_page.design_post_urls()?;

        let payload = FormPayload::multipart()
            .file_from_path("standard_file", path)
            .await?
            .text("standard_type", "File")
            .text("standard_size", "original")
            .text("full_type", "None")
            .text("component", "MediaObject")
            .text("action", "insert")
            .text("after_pcid", after_id)
            .text("pcid", "")
            .text("ilfilehash", random_ilfilehash());

        self.session
            .post_form(
                &json_url,
                &payload.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::Any,
            )
            .await?;

        // 图片块的 id 服务器不直接返回，重新拉设计页数出来
        let refreshed = self.session.get_page(design_page.url_str()).await?;
        let new_id = refreshed.last_design_component_id()?;
        tracing::debug!("新图片块 id = {}", new_id);
        Ok(new_id)
    }

    /// 插入代码块（两段式传统表单）
    async fn add_code_block(
        &self,
        design_page: &IliasPage,
        code: &str,
        language: &str,
        file_name: &str,
        after_id: &str,
    ) -> AppResult<String> {
        let (_, form_url) = design_page.design_post_urls()?;

        // 第一阶段：声明要插入一个源码组件
        let stage_one = FormPayload::urlencoded()
            .text("cmd", "insert")
            .text("ctype", "src")
            .text("pcid", after_id)
            .text("hier_id", "pg")
            .text("pluginname", "")
            .text("cmd[insert]", "-");
        let editor_page = self
            .session
            .post_form(
                &form_url,
                &stage_one.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::UrlContains("cmdclass=ilpageeditorgui"),
            )
            .await?;

        // 第二阶段：提交代码内容
        let submit_url = editor_page.design_code_submit_url()?;
        let stage_two = FormPayload::multipart()
            .text("par_language", "de")
            .text("par_subcharacteristic", language)
            .text("par_showlinenumbers", "1")
            .text("par_content", code)
            .text("par_downloadtitle", file_name)
            .text("ilfilehash", random_ilfilehash())
            .text("cmd[create_src]", "Speichern")
            .empty_file("userfile");
        let result_page = self
            .session
            .post_form(
                &submit_url,
                &stage_two.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::UrlContains("cmdclass=ilassquestionpagegui"),
            )
            .await?;

        let new_id = result_page.last_design_component_id()?;
        tracing::debug!("新代码块 id = {}", new_id);
        Ok(new_id)
    }
}

/// 题目定稿表单的语义字段
///
/// 公共字段 + 各题型的专有字段；选择题的选项按
/// `choice[...][index]` 的约定展开，图片列必须以空文件占位
pub fn question_form_options(question: &TestQuestion) -> Vec<(String, FieldValue)> {
    let mut options: Vec<(String, FieldValue)> = vec![
        ("title".into(), FieldValue::Text(question.title().into())),
        ("author".into(), FieldValue::Text(question.author().into())),
        ("comment".into(), FieldValue::Text(question.summary().into())),
        ("lifecycle".into(), FieldValue::Text("draft".into())),
        (
            "question".into(),
            FieldValue::Text(question.question_html().into()),
        ),
    ];

    match question {
        TestQuestion::FreeformText { points, .. } => {
            // 人工批改
            options.push(("scoring_mode".into(), FieldValue::Text("non".into())));
            for field in ["non_keyword_points", "all_keyword_points", "one_keyword_points"] {
                options.push((field.into(), FieldValue::Text(points.to_string())));
            }
        }
        TestQuestion::FileUpload {
            points,
            allowed_filetypes,
            max_bytes,
            ..
        } => {
            options.push((
                "allowedextensions".into(),
                FieldValue::Text(allowed_filetypes.join(",")),
            ));
            options.push(("maxsize".into(), FieldValue::Text(max_bytes.to_string())));
            options.push(("points".into(), FieldValue::Text(points.to_string())));
        }
        TestQuestion::SingleChoice {
            shuffle, answers, ..
        } => {
            for (index, answer) in answers.iter().enumerate() {
                options.push((
                    format!("choice[answer][{}]", index),
                    FieldValue::Text(answer.answer.clone()),
                ));
                options.push((
                    format!("choice[answer_id][{}]", index),
                    FieldValue::Text("-1".into()),
                ));
                options.push((format!("choice[image][{}]", index), FieldValue::EmptyFile));
                options.push((
                    format!("choice[points][{}]", index),
                    FieldValue::Text(answer.points.to_string()),
                ));
            }
            options.push((
                "shuffle".into(),
                FieldValue::Text(if *shuffle { "1" } else { "0" }.into()),
            ));
            // 单行答案，图片预览尺寸暂不支持调整
            options.push(("types".into(), FieldValue::Text("0".into())));
            options.push(("thumb_size".into(), FieldValue::Text("150".into())));
        }
        TestQuestion::MultipleChoice {
            shuffle,
            selection_limit,
            answers,
            ..
        } => {
            for (index, answer) in answers.iter().enumerate() {
                options.push((
                    format!("choice[answer][{}]", index),
                    FieldValue::Text(answer.answer.clone()),
                ));
                options.push((
                    format!("choice[answer_id][{}]", index),
                    FieldValue::Text("-1".into()),
                ));
                options.push((format!("choice[image][{}]", index), FieldValue::EmptyFile));
                options.push((
                    format!("choice[points][{}]", index),
                    FieldValue::Text(answer.points.to_string()),
                ));
                options.push((
                    format!("choice[points_unchecked][{}]", index),
                    FieldValue::Text(answer.points_unchecked.to_string()),
                ));
            }
            options.push((
                "shuffle".into(),
                FieldValue::Text(if *shuffle { "1" } else { "0" }.into()),
            ));
            if let Some(limit) = selection_limit {
                options.push(("selection_limit".into(), FieldValue::Text(limit.to_string())));
            }
            options.push(("types".into(), FieldValue::Text("0".into())));
            options.push(("thumb_size".into(), FieldValue::Text("150".into())));
        }
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spec::ChoiceAnswer;

    #[test]
    fn single_choice_options_expand_per_answer() {
        let question = TestQuestion::SingleChoice {
            title: "Q".into(),
            author: "a".into(),
            summary: String::new(),
            question_html: "<p>q</p>".into(),
            page_design: vec![],
            shuffle: true,
            answers: vec![
                ChoiceAnswer {
                    answer: "erste".into(),
                    points: 2.0,
                },
                ChoiceAnswer {
                    answer: "zweite".into(),
                    points: 0.0,
                },
            ],
        };
        let options = question_form_options(&question);

        let text_of = |name: &str| {
            options.iter().find_map(|(n, v)| {
                if n == name {
                    match v {
                        FieldValue::Text(t) => Some(t.clone()),
                        _ => None,
                    }
                } else {
                    None
                }
            })
        };
        assert_eq!(text_of("choice[answer][0]").unwrap(), "erste");
        assert_eq!(text_of("choice[points][1]").unwrap(), "0");
        assert_eq!(text_of("shuffle").unwrap(), "1");
        // 图片列以空文件占位
        assert!(options
            .iter()
            .any(|(n, v)| n == "choice[image][0]" && matches!(v, FieldValue::EmptyFile)));
    }

    #[test]
    fn freeform_points_cover_all_scoring_fields() {
        let question = TestQuestion::FreeformText {
            title: "Q".into(),
            author: "a".into(),
            summary: String::new(),
            question_html: String::new(),
            page_design: vec![],
            points: 4.5,
        };
        let options = question_form_options(&question);
        for field in ["non_keyword_points", "all_keyword_points", "one_keyword_points"] {
            assert!(options
                .iter()
                .any(|(n, v)| n == field && matches!(v, FieldValue::Text(t) if t == "4.5")));
        }
    }
}
