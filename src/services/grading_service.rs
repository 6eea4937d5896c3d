//! 人工批改数据的抓取与回传 - 业务能力层

use crate::error::AppResult;
use crate::infrastructure::{HttpSession, PageCheck, ResponseCheck};
use crate::models::grading::{ParticipantInfo, ParticipantResults};
use crate::page::{IliasPage, TestTab};
use crate::services::payload::FormPayload;

/// 批改操作能力
pub struct GradingService<'a> {
    session: &'a HttpSession,
}

impl<'a> GradingService<'a> {
    pub fn new(session: &'a HttpSession) -> Self {
        Self { session }
    }

    /// 打开"按参与者批改"列表页
    async fn open_participant_table(&self, test_page: &IliasPage) -> AppResult<IliasPage> {
        let tab_url = test_page.tab_url(TestTab::ManualGrading)?;
        let tab_page = self.session.get_page(&tab_url).await?;
        // 子视图链接存在就再跳一步，有的版本直接落在表格上
        match tab_page.manual_grading_per_participant_url()? {
            Some(url) => self.session.get_page(&url).await,
            None => Ok(tab_page),
        }
    }

    /// 列出所有有提交的参与者
    pub async fn list_participants(
        &self,
        test_page: &IliasPage,
    ) -> AppResult<Vec<ParticipantInfo>> {
        let table_page = self.open_participant_table(test_page).await?;
        table_page.manual_grading_participants()
    }

    /// 抓取全部参与者的批改数据
    pub async fn collect_results(
        &self,
        test_page: &IliasPage,
    ) -> AppResult<Vec<ParticipantResults>> {
        let participants = self.list_participants(test_page).await?;
        tracing::info!("共 {} 名参与者待抓取", participants.len());

        let mut results = Vec::new();
        for participant in participants {
            tracing::info!("📥 抓取 {} 的答卷", participant.email);
            let detail_page = self.session.get_page(&participant.detail_url).await?;
            results.push(detail_page.manual_grading_results(&participant)?);
        }
        Ok(results)
    }

    /// 回传一名参与者的分数与反馈
    ///
    /// # 参数
    /// - `scores`: (题目id, 分数, 反馈) 列表
    pub async fn save_participant_scores(
        &self,
        participant: &ParticipantInfo,
        scores: &[(String, f64, Option<String>)],
    ) -> AppResult<()> {
        tracing::info!("📤 回传 {} 的批改结果", participant.email);
        let detail_page = self.session.get_page(&participant.detail_url).await?;
        let target = detail_page.manual_grading_save_target()?;

        let mut payload = FormPayload::urlencoded().text(
            "cmd[saveManScoringParticipantScreen]",
            if target.button_value.is_empty() {
                "Speichern".to_string()
            } else {
                target.button_value.clone()
            },
        );
        for (question_id, points, feedback) in scores {
            payload = payload
                .text(format!("question__{}__points", question_id), points.to_string())
                .text(
                    format!("question__{}__feedback", question_id),
                    feedback.clone().unwrap_or_default(),
                );
        }

        self.session
            .post_form(
                &target.url,
                &payload.merge_extras(&target.extras).into_body(),
                ResponseCheck::Status2xx,
                PageCheck::SuccessAlert,
            )
            .await?;
        Ok(())
    }
}
