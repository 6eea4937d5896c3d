//! 人工批改界面的解析

use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::models::grading::{
    FileAnswer, GradedQuestion, GradingAnswer, GradingQuestion, ParticipantInfo,
    ParticipantResults,
};
use crate::page::{element_text, sel, FormTarget, IliasPage};
use crate::utils::text::norm;

impl IliasPage {
    /// "按参与者批改"子视图的链接
    pub fn manual_grading_per_participant_url(&self) -> AppResult<Option<String>> {
        let Some(link) = self
            .html()
            .select(&sel(r#"a[href*="cmd=showManScoringParticipantsTable"]"#))
            .next()
        else {
            return Ok(None);
        };
        Ok(Some(self.abs_url(link.value().attr("href").unwrap_or(""))?))
    }

    /// 批改列表页的参与者表格
    ///
    /// # 返回
    /// 返回参与者信息列表；表格只有一行单格时表示没有任何结果
    pub fn manual_grading_participants(&self) -> AppResult<Vec<ParticipantInfo>> {
        let table = self.find_by_id("manScorePartTable").ok_or_else(|| {
            AppError::element_missing("参与者表格 (manScorePartTable)", self.alert_summary())
        })?;

        let rows: Vec<_> = table.select(&sel("tbody tr")).collect();
        if rows.len() == 1 && rows[0].select(&sel("td")).count() == 1 {
            tracing::debug!("参与者表格没有结果");
            return Ok(Vec::new());
        }

        let mut participants = Vec::new();
        for row in rows {
            let cells: Vec<_> = row.select(&sel("td")).collect();
            if cells.len() < 4 {
                continue;
            }
            let last_name = norm(&element_text(cells[0]));
            let first_name = norm(&element_text(cells[1]));
            let email = norm(&element_text(cells[2]));
            let username = email.split('@').next().unwrap_or("").to_string();
            let Some(link) = cells[3].select(&sel("a[href]")).next() else {
                continue;
            };
            let detail_url = self.abs_url(link.value().attr("href").unwrap_or(""))?;
            participants.push(ParticipantInfo {
                last_name,
                first_name,
                email,
                username,
                detail_url,
            });
        }
        Ok(participants)
    }

    /// 解析单个参与者的批改详情页
    ///
    /// 每道题以一个 "Frage: ... [ID: n]" 标题开始，
    /// 答案在标题之后的属性容器里
    pub fn manual_grading_results(
        &self,
        participant: &ParticipantInfo,
    ) -> AppResult<ParticipantResults> {
        let id_pattern = Regex::new(r"\[ID: (\d+)\]").expect("静态正则必定合法");
        let mut questions = Vec::new();

        // 一次文档序遍历：记住最近的题目标题，把紧随其后的
        // 答案容器归到它名下
        let mut pending: Option<(String, String)> = None; // (id, 标题)
        for node in self.html().root_element().descendants() {
            let Some(element) = scraper::ElementRef::wrap(node) else {
                continue;
            };
            if element.value().name() == "h2" {
                let text = norm(&element_text(element));
                if !(text.contains("Frage:") || text.contains("Question:")) {
                    continue;
                }
                let question_id = match id_pattern.captures(&text) {
                    Some(captures) => captures[1].to_string(),
                    None => continue,
                };
                // 上一道题没有答案容器也要落盘
                if let Some((id, title)) = pending.take() {
                    questions.push(self.graded_question(&id, &title, None)?);
                }
                pending = Some((question_id, text));
                continue;
            }
            let is_answer_container = element
                .value()
                .attr("id")
                .map(|id| id.starts_with("il_prop_cont_") && !id.contains("question__"))
                .unwrap_or(false);
            if is_answer_container {
                if let Some((id, title)) = pending.take() {
                    let answer = extract_answer(element);
                    questions.push(self.graded_question(&id, &title, answer)?);
                }
            }
        }
        if let Some((id, title)) = pending.take() {
            questions.push(self.graded_question(&id, &title, None)?);
        }

        Ok(ParticipantResults {
            participant: participant.clone(),
            answers: questions,
        })
    }

    /// 组装一道题的批改记录（分数、满分、反馈）
    fn graded_question(
        &self,
        question_id: &str,
        title: &str,
        answer: Option<GradingAnswer>,
    ) -> AppResult<GradedQuestion> {
        let points_raw = self
            .html()
            .select(&sel(&format!(
                "#il_prop_cont_question__{}__points input",
                question_id
            )))
            .next()
            .and_then(|el| el.value().attr("value").map(str::to_string))
            .unwrap_or_else(|| "0".to_string());
        let points = points_raw
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::number_parse("points", &points_raw))?;

        let max_points_el = self
            .find_by_id(&format!("question__{}__maxpoints", question_id))
            .ok_or_else(|| {
                AppError::element_missing(
                    format!("题目 {} 的满分元素", question_id),
                    self.alert_summary(),
                )
            })?;
        let max_raw = norm(&element_text(max_points_el));
        let max_points = max_raw
            .trim()
            .parse::<f64>()
            .map_err(|_| AppError::number_parse("max_points", &max_raw))?;

        let feedback_name = format!("question__{}__feedback", question_id);
        let feedback_el = self
            .html()
            .select(&sel("[name]"))
            .find(|el| el.value().attr("name") == Some(feedback_name.as_str()))
            .ok_or_else(|| {
                AppError::element_missing(
                    format!("题目 {} 的反馈元素", question_id),
                    self.alert_summary(),
                )
            })?;

        // 定稿前反馈是 textarea，定稿后变成只读 input
        let (feedback, finalized) = match feedback_el.value().name() {
            "textarea" => (norm(&element_text(feedback_el)), false),
            "input" => (
                norm(feedback_el.value().attr("value").unwrap_or("")),
                true,
            ),
            other => {
                return Err(AppError::element_missing(
                    format!("已知类型的反馈元素（实际是 {}）", other),
                    self.alert_summary(),
                ))
            }
        };
        let feedback = if feedback.is_empty() {
            None
        } else {
            Some(feedback)
        };

        Ok(GradedQuestion {
            question: GradingQuestion {
                id: question_id.to_string(),
                title: title.to_string(),
                max_points,
            },
            answer,
            points,
            feedback,
            finalized,
        })
    }

    /// 批改保存表单
    pub fn manual_grading_save_target(&self) -> AppResult<FormTarget> {
        self.form_target_from_button("cmd[saveManScoringParticipantScreen]")
    }
}

/// 从答案容器里识别答案类型
fn extract_answer(container: scraper::ElementRef<'_>) -> Option<GradingAnswer> {
    if let Some(text_answer) = container
        .select(&sel(".ilc_question_TextQuestion .ilc_qanswer_Answer"))
        .next()
    {
        return Some(GradingAnswer::Text(text_answer.inner_html()));
    }
    if let Some(file_answer) = container.select(&sel(".ilc_question_FileUpload")).next() {
        let files = file_answer
            .select(&sel("[download]"))
            .filter_map(|link| {
                link.value().attr("href").map(|href| FileAnswer {
                    name: norm(&element_text(link)),
                    url: href.to_string(),
                })
            })
            .collect();
        return Some(GradingAnswer::Files(files));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::IliasPage;

    const LIST_PAGE: &str = r#"
        <html><body>
        <table id="manScorePartTable">
          <tbody>
            <tr>
              <td>Doe</td><td>Alice</td><td>alice@example.org</td>
              <td><a href="ilias.php?cmd=showManScoringParticipantScreen&active_id=5">bewerten</a></td>
            </tr>
            <tr>
              <td>Roe</td><td>Bob</td><td>bob@example.org</td>
              <td><a href="ilias.php?cmd=showManScoringParticipantScreen&active_id=6">bewerten</a></td>
            </tr>
          </tbody>
        </table>
        </body></html>"#;

    #[test]
    fn participants_are_read_from_the_table() {
        let page = IliasPage::new(LIST_PAGE, "https://ilias.example.org/grading").unwrap();
        let participants = page.manual_grading_participants().unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].last_name, "Doe");
        assert_eq!(participants[0].username, "alice");
        assert!(participants[1].detail_url.contains("active_id=6"));
    }

    #[test]
    fn empty_table_yields_no_participants() {
        let html = r#"<html><body>
            <table id="manScorePartTable"><tbody>
              <tr><td>Keine Ergebnisse</td></tr>
            </tbody></table>
            </body></html>"#;
        let page = IliasPage::new(html, "https://ilias.example.org/grading").unwrap();
        assert!(page.manual_grading_participants().unwrap().is_empty());
    }

    fn participant() -> ParticipantInfo {
        ParticipantInfo {
            last_name: "Doe".into(),
            first_name: "Alice".into(),
            email: "alice@example.org".into(),
            username: "alice".into(),
            detail_url: "https://ilias.example.org/detail".into(),
        }
    }

    const DETAIL_PAGE: &str = r#"
        <html><body>
        <h2>Frage: Essay [ID: 101]</h2>
        <div id="il_prop_cont_">
          <div class="ilc_question_TextQuestion">
            <div class="ilc_qanswer_Answer"><p>meine Antwort</p></div>
          </div>
        </div>
        <div id="il_prop_cont_question__101__points"><input value="3.5"></div>
        <span id="question__101__maxpoints">10</span>
        <textarea name="question__101__feedback">gut gemacht</textarea>

        <h2>Frage: Abgabe [ID: 102]</h2>
        <div id="il_prop_cont_">
          <div class="ilc_question_FileUpload">
            <a download="" href="ilias.php?file=9">loesung.pdf</a>
          </div>
        </div>
        <div id="il_prop_cont_question__102__points"><input value="0"></div>
        <span id="question__102__maxpoints">5</span>
        <input name="question__102__feedback" value="">
        </body></html>"#;

    #[test]
    fn detail_page_is_parsed_per_question() {
        let page = IliasPage::new(DETAIL_PAGE, "https://ilias.example.org/detail").unwrap();
        let results = page.manual_grading_results(&participant()).unwrap();
        assert_eq!(results.answers.len(), 2);

        let essay = &results.answers[0];
        assert_eq!(essay.question.id, "101");
        assert_eq!(essay.question.max_points, 10.0);
        assert_eq!(essay.points, 3.5);
        assert_eq!(essay.feedback.as_deref(), Some("gut gemacht"));
        assert!(!essay.finalized);
        match essay.answer.as_ref().unwrap() {
            GradingAnswer::Text(html) => assert!(html.contains("meine Antwort")),
            other => panic!("falsche Antwort: {:?}", other),
        }

        let upload = &results.answers[1];
        assert_eq!(upload.question.id, "102");
        assert!(upload.finalized);
        assert!(upload.feedback.is_none());
        match upload.answer.as_ref().unwrap() {
            GradingAnswer::Files(files) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "loesung.pdf");
            }
            other => panic!("falsche Antwort: {:?}", other),
        }
    }
}
