//! 测验与题目的数据模型
//!
//! 所有类型都是封闭的 enum / struct，序列化通过 `type` 判别字段完成。
//! 新增题型时只需要扩展 enum，编译器会把所有遗漏的 match 找出来。

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 富文本设计块
///
/// 题目正文由有序的设计块组成，创建时按"插入到上一个块之后"的协议逐个提交
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageDesignBlock {
    /// 普通文本段落（HTML 片段）
    Text { text: String },
    /// 图片，路径指向本地文件
    Image { path: PathBuf },
    /// 代码块
    Code {
        code: String,
        language: String,
        name: String,
    },
}

/// ILIAS 的题型编号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    FreeFormText,
    FileUpload,
}

impl QuestionType {
    /// 题目创建表单中的 qtype 数值
    pub fn code(self) -> u32 {
        match self {
            QuestionType::SingleChoice => 1,
            QuestionType::MultipleChoice => 2,
            QuestionType::FreeFormText => 8,
            QuestionType::FileUpload => 14,
        }
    }
}

/// 单选题的一个选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceAnswer {
    pub answer: String,
    pub points: f64,
}

/// 多选题的一个选项
///
/// 未勾选时也可以计分（points_unchecked）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiChoiceAnswer {
    pub answer: String,
    pub points: f64,
    pub points_unchecked: f64,
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestQuestion {
    FreeformText {
        title: String,
        author: String,
        summary: String,
        question_html: String,
        page_design: Vec<PageDesignBlock>,
        points: f64,
    },
    FileUpload {
        title: String,
        author: String,
        summary: String,
        question_html: String,
        page_design: Vec<PageDesignBlock>,
        points: f64,
        allowed_filetypes: Vec<String>,
        max_bytes: u64,
    },
    SingleChoice {
        title: String,
        author: String,
        summary: String,
        question_html: String,
        page_design: Vec<PageDesignBlock>,
        shuffle: bool,
        answers: Vec<ChoiceAnswer>,
    },
    MultipleChoice {
        title: String,
        author: String,
        summary: String,
        question_html: String,
        page_design: Vec<PageDesignBlock>,
        shuffle: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selection_limit: Option<u32>,
        answers: Vec<MultiChoiceAnswer>,
    },
}

impl TestQuestion {
    pub fn title(&self) -> &str {
        match self {
            TestQuestion::FreeformText { title, .. }
            | TestQuestion::FileUpload { title, .. }
            | TestQuestion::SingleChoice { title, .. }
            | TestQuestion::MultipleChoice { title, .. } => title,
        }
    }

    pub fn author(&self) -> &str {
        match self {
            TestQuestion::FreeformText { author, .. }
            | TestQuestion::FileUpload { author, .. }
            | TestQuestion::SingleChoice { author, .. }
            | TestQuestion::MultipleChoice { author, .. } => author,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            TestQuestion::FreeformText { summary, .. }
            | TestQuestion::FileUpload { summary, .. }
            | TestQuestion::SingleChoice { summary, .. }
            | TestQuestion::MultipleChoice { summary, .. } => summary,
        }
    }

    pub fn question_html(&self) -> &str {
        match self {
            TestQuestion::FreeformText { question_html, .. }
            | TestQuestion::FileUpload { question_html, .. }
            | TestQuestion::SingleChoice { question_html, .. }
            | TestQuestion::MultipleChoice { question_html, .. } => question_html,
        }
    }

    pub fn page_design(&self) -> &[PageDesignBlock] {
        match self {
            TestQuestion::FreeformText { page_design, .. }
            | TestQuestion::FileUpload { page_design, .. }
            | TestQuestion::SingleChoice { page_design, .. }
            | TestQuestion::MultipleChoice { page_design, .. } => page_design,
        }
    }

    pub fn question_type(&self) -> QuestionType {
        match self {
            TestQuestion::FreeformText { .. } => QuestionType::FreeFormText,
            TestQuestion::FileUpload { .. } => QuestionType::FileUpload,
            TestQuestion::SingleChoice { .. } => QuestionType::SingleChoice,
            TestQuestion::MultipleChoice { .. } => QuestionType::MultipleChoice,
        }
    }
}

/// 一个测验（ILIAS Test 对象）
///
/// 由 slurp（抓取设置页）或规格文件反序列化构造，创建流程整体消费，
/// 不做原地修改
#[derive(Debug, Clone, PartialEq)]
pub struct IliasTest {
    pub title: String,
    pub description: String,
    pub intro_text: String,
    pub starting_time: Option<NaiveDateTime>,
    pub ending_time: Option<NaiveDateTime>,
    pub number_of_tries: u32,
    pub questions: Vec<TestQuestion>,
}

/// 整个规格文件的内容
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub tests: Vec<IliasTest>,
}

/// 规格文件里时间戳的存储格式
pub const SPEC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[cfg(test)]
mod tests {
    use super::*;

    fn design_blocks() -> Vec<PageDesignBlock> {
        vec![
            PageDesignBlock::Text {
                text: "<p>hello</p>".to_string(),
            },
            PageDesignBlock::Image {
                path: PathBuf::from("aux/pic-0.png"),
            },
            PageDesignBlock::Code {
                code: "int main() { return 0; }".to_string(),
                language: "c".to_string(),
                name: "main.c".to_string(),
            },
        ]
    }

    #[test]
    fn question_yaml_roundtrip_all_variants() {
        let questions = vec![
            TestQuestion::FreeformText {
                title: "Q1".into(),
                author: "author".into(),
                summary: "s".into(),
                question_html: "<p>q</p>".into(),
                page_design: design_blocks(),
                points: 4.5,
            },
            TestQuestion::FileUpload {
                title: "Q2".into(),
                author: "author".into(),
                summary: String::new(),
                question_html: String::new(),
                page_design: vec![],
                points: 10.0,
                allowed_filetypes: vec!["pdf".into(), "zip".into()],
                max_bytes: 2_097_152,
            },
            TestQuestion::SingleChoice {
                title: "Q3".into(),
                author: "author".into(),
                summary: "s".into(),
                question_html: "<p>pick one</p>".into(),
                page_design: vec![],
                shuffle: true,
                answers: vec![
                    ChoiceAnswer {
                        answer: "a".into(),
                        points: 1.0,
                    },
                    ChoiceAnswer {
                        answer: "b".into(),
                        points: 0.0,
                    },
                ],
            },
            TestQuestion::MultipleChoice {
                title: "Q4".into(),
                author: "author".into(),
                summary: "s".into(),
                question_html: "<p>pick some</p>".into(),
                page_design: vec![],
                shuffle: false,
                selection_limit: Some(2),
                answers: vec![MultiChoiceAnswer {
                    answer: "a".into(),
                    points: 2.0,
                    points_unchecked: 0.5,
                }],
            },
        ];

        for question in questions {
            let yaml = serde_yaml::to_string(&question).unwrap();
            let back: TestQuestion = serde_yaml::from_str(&yaml).unwrap();
            assert_eq!(back, question);
        }
    }

    #[test]
    fn type_discriminators_match_the_spec_file_format() {
        let q = TestQuestion::FreeformText {
            title: "t".into(),
            author: "a".into(),
            summary: String::new(),
            question_html: String::new(),
            page_design: vec![],
            points: 1.0,
        };
        let yaml = serde_yaml::to_string(&q).unwrap();
        assert!(yaml.contains("type: freeform_text"));

        let block = PageDesignBlock::Code {
            code: "x".into(),
            language: "c".into(),
            name: "x.c".into(),
        };
        let yaml = serde_yaml::to_string(&block).unwrap();
        assert!(yaml.contains("type: code"));
    }

    #[test]
    fn question_type_codes() {
        assert_eq!(QuestionType::SingleChoice.code(), 1);
        assert_eq!(QuestionType::MultipleChoice.code(), 2);
        assert_eq!(QuestionType::FreeFormText.code(), 8);
        assert_eq!(QuestionType::FileUpload.code(), 14);
    }
}
