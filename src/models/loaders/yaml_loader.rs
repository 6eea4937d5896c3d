//! 规格文件（YAML）的加载与写出
//!
//! 文件顶层是 `tests` 和 `questions` 两个映射，键都是 slug。
//! 测验通过 slug 引用题目，这样同一道题可以被多个测验复用。

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::error::{AppError, ValidationError};
use crate::models::spec::{IliasTest, Spec, TestQuestion, SPEC_TIME_FORMAT};

/// 规格文件的顶层结构
#[derive(Debug, Serialize, Deserialize)]
struct SpecFileRecord {
    tests: BTreeMap<String, TestRecord>,
    questions: BTreeMap<String, TestQuestion>,
}

/// 单个测验在文件中的形态，题目以 slug 引用
#[derive(Debug, Serialize, Deserialize)]
struct TestRecord {
    title: String,
    description: String,
    intro_text: String,
    #[serde(default, with = "spec_time")]
    starting_time: Option<NaiveDateTime>,
    #[serde(default, with = "spec_time")]
    ending_time: Option<NaiveDateTime>,
    number_of_tries: u32,
    questions: Vec<String>,
}

/// 时间戳按 `YYYY-MM-DD HH:MM` 字符串存储
mod spec_time {
    use super::{NaiveDateTime, SPEC_TIME_FORMAT};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => serializer.serialize_str(&time.format(SPEC_TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(text) => NaiveDateTime::parse_from_str(&text, SPEC_TIME_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// 从 YAML 文件加载完整规格
///
/// # 返回
/// 返回解析后的 Spec；测验引用了不存在的题目 slug 时报校验错误
pub async fn load_spec_from_file(path: &Path) -> Result<Spec> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取规格文件: {}", path.display()))?;
    parse_spec(&content).with_context(|| format!("无法解析规格文件: {}", path.display()))
}

/// 解析规格文件内容
pub fn parse_spec(content: &str) -> Result<Spec> {
    let record: SpecFileRecord = serde_yaml::from_str(content)?;

    let mut tests = Vec::new();
    for (slug, test) in record.tests {
        let mut questions = Vec::new();
        for reference in &test.questions {
            let question = record.questions.get(reference).ok_or_else(|| {
                AppError::Validation(ValidationError::UnresolvedQuestionRef {
                    test: slug.clone(),
                    reference: reference.clone(),
                })
            })?;
            questions.push(question.clone());
        }
        tests.push(IliasTest {
            title: test.title,
            description: test.description,
            intro_text: test.intro_text,
            starting_time: test.starting_time,
            ending_time: test.ending_time,
            number_of_tries: test.number_of_tries,
            questions,
        });
    }

    Ok(Spec { tests })
}

/// 把测验列表序列化为规格文件内容
pub fn dump_tests_to_yaml(tests: &[IliasTest]) -> Result<String> {
    let mut questions = BTreeMap::new();
    let mut test_records = BTreeMap::new();

    for test in tests {
        let mut question_slugs = Vec::new();
        for question in &test.questions {
            let slug = slug::slugify(question.title());
            question_slugs.push(slug.clone());
            questions.insert(slug, question.clone());
        }
        test_records.insert(
            slug::slugify(&test.title),
            TestRecord {
                title: test.title.clone(),
                description: test.description.clone(),
                intro_text: test.intro_text.clone(),
                starting_time: test.starting_time,
                ending_time: test.ending_time,
                number_of_tries: test.number_of_tries,
                questions: question_slugs,
            },
        );
    }

    let record = SpecFileRecord {
        tests: test_records,
        questions,
    };
    Ok(serde_yaml::to_string(&record)?)
}

/// 把测验列表写入规格文件
pub async fn save_spec_to_file(tests: &[IliasTest], path: &Path) -> Result<()> {
    let yaml = dump_tests_to_yaml(tests)?;
    fs::write(path, yaml)
        .await
        .with_context(|| format!("无法写入规格文件: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::spec::{ChoiceAnswer, PageDesignBlock};
    use chrono::NaiveDate;

    fn sample_tests() -> Vec<IliasTest> {
        let shared_question = TestQuestion::SingleChoice {
            title: "Shared Question".into(),
            author: "robot".into(),
            summary: "s".into(),
            question_html: "<p>pick</p>".into(),
            page_design: vec![PageDesignBlock::Text {
                text: "<p>intro</p>".into(),
            }],
            shuffle: true,
            answers: vec![ChoiceAnswer {
                answer: "a".into(),
                points: 2.0,
            }],
        };
        let upload_question = TestQuestion::FileUpload {
            title: "Upload Homework".into(),
            author: "robot".into(),
            summary: String::new(),
            question_html: "<p>upload</p>".into(),
            page_design: vec![],
            points: 10.0,
            allowed_filetypes: vec!["pdf".into()],
            max_bytes: 2_097_152,
        };

        vec![
            IliasTest {
                title: "Test One".into(),
                description: "first".into(),
                intro_text: "<p>welcome</p>".into(),
                starting_time: NaiveDate::from_ymd_opt(2024, 4, 1)
                    .and_then(|d| d.and_hms_opt(8, 30, 0)),
                ending_time: None,
                number_of_tries: 3,
                questions: vec![shared_question.clone(), upload_question],
            },
            IliasTest {
                title: "Test Two".into(),
                description: "second".into(),
                intro_text: String::new(),
                starting_time: None,
                ending_time: None,
                number_of_tries: 100,
                questions: vec![shared_question],
            },
        ]
    }

    #[test]
    fn spec_roundtrip_preserves_everything() {
        let tests = sample_tests();
        let yaml = dump_tests_to_yaml(&tests).unwrap();
        let spec = parse_spec(&yaml).unwrap();

        assert_eq!(spec.tests.len(), 2);
        // BTreeMap 的键顺序就是 slug 顺序，两个测验的标题保证回读无误
        let one = spec.tests.iter().find(|t| t.title == "Test One").unwrap();
        let two = spec.tests.iter().find(|t| t.title == "Test Two").unwrap();
        assert_eq!(one, &tests[0]);
        assert_eq!(two, &tests[1]);
    }

    #[test]
    fn timestamps_are_plain_strings() {
        let yaml = dump_tests_to_yaml(&sample_tests()).unwrap();
        assert!(yaml.contains("2024-04-01 08:30"));
    }

    #[test]
    fn unresolved_question_reference_is_an_error() {
        let yaml = r#"
tests:
  broken-test:
    title: Broken
    description: ""
    intro_text: ""
    number_of_tries: 1
    questions: [does-not-exist]
questions: {}
"#;
        let err = parse_spec(yaml).unwrap_err();
        assert!(err.to_string().contains("does-not-exist"));
    }
}
