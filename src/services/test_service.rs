//! 测验级操作 - 业务能力层
//!
//! 创建测验、写设置、发布/下线、按标题重排题目、结束所有人的轮次。
//! 每个操作都是"抓表单 → 合并字段 → 提交 → 校验"的一轮。

use chrono::NaiveDateTime;

use crate::error::{AppError, AppResult, ValidationError};
use crate::infrastructure::{HttpSession, PageCheck, ResponseCheck};
use crate::models::spec::IliasTest;
use crate::page::{IliasPage, TestTab};
use crate::services::payload::FormPayload;

/// ILIAS 设置表单里时间的格式（德式日期）
const ILIAS_TIME_FORMAT: &str = "%d.%m.%Y %H:%M";

/// 测验操作能力
pub struct TestService<'a> {
    session: &'a HttpSession,
}

impl<'a> TestService<'a> {
    pub fn new(session: &'a HttpSession) -> Self {
        Self { session }
    }

    /// 打开任意页面
    pub async fn select_page(&self, url: &str) -> AppResult<IliasPage> {
        self.session.get_page(url).await
    }

    /// 打开指定标签页
    pub async fn select_tab(&self, page: &IliasPage, tab: TestTab) -> AppResult<IliasPage> {
        tracing::debug!("切换到标签页 {:?}", tab);
        self.session.get_page(&page.tab_url(tab)?).await
    }

    /// 在文件夹里创建一个新测验
    ///
    /// # 返回
    /// 返回创建后跳转到的测验设置页
    pub async fn create_test(
        &self,
        folder: &IliasPage,
        title: &str,
        description: &str,
    ) -> AppResult<IliasPage> {
        tracing::debug!("在 {} 中创建测验 {:?}", folder.url_str(), title);
        let create_url = folder.test_create_url()?;
        let create_page = self.session.get_page(&create_url).await?;

        let target = create_page.test_create_submit_target()?;
        let payload = FormPayload::urlencoded()
            .text("title", title)
            .text("desc", description)
            .text("save", target.button_value.clone())
            .merge_extras(&target.extras);

        // 创建成功的标志是被重定向到测验设置控制器
        self.session
            .post_form(
                &target.url,
                &payload.into_body(),
                ResponseCheck::UrlQueryContains("cmdclass=ilobjtestsettingsgeneralgui"),
                PageCheck::SuccessAlert,
            )
            .await
    }

    /// 提交测验设置表单
    ///
    /// 除了语义参数外，把设置页上抓到的 required / disabled 字段
    /// 原样回传，否则服务器会丢掉之前的配置
    pub async fn configure_test(
        &self,
        settings_page: &IliasPage,
        test: &IliasTest,
        online: bool,
    ) -> AppResult<IliasPage> {
        tracing::debug!("配置测验 {:?} (online={})", test.title, online);
        let target = settings_page.settings_form()?;

        let payload = FormPayload::multipart()
            .text("cmd[saveForm]", "Speichern")
            .text("title", test.title.as_str())
            .text("description", test.description.as_str())
            // 所有人拿到同一套题目，不使用题库
            .text("use_pool", "0")
            .text("question_set_type", "FIXED_QUEST_SET")
            .text("anonymity", "0")
            .text("online", if online { "1" } else { "0" })
            // 考试前展示简介文本
            .text("showinfo", "1")
            .text("intro_enabled", "1")
            .text("introduction", test.intro_text.as_str())
            .text("starting_time", format_time(test.starting_time))
            .text("ending_time", format_time(test.ending_time))
            .text("limitPasses", "1")
            .text("nr_of_tries", test.number_of_tries.to_string())
            // 显示标题和满分，允许修改答案
            .text("title_output", "0")
            .text("answer_fixation_handling", "none")
            // 展示上一轮的答案，不把未作答的题挪到最后
            .text("chb_use_previous_answers", "1")
            .text("postpone", "0")
            .text("autosave_ival", "30")
            .text("instant_feedback_trigger", "0")
            // 文件字段必须在场，哪怕是空的
            .empty_file("tile_image")
            .merge_extras(&target.extras);

        self.session
            .post_form(
                &target.url,
                &payload.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::SuccessAlert,
            )
            .await
    }

    /// 按标题顺序重排题目
    ///
    /// 标题在列表里找不到对应 id 时立刻报错——
    /// 这说明列表页已经过期，继续写顺序只会写坏
    pub async fn reorder_questions(
        &self,
        questions_tab: &IliasPage,
        title_order: &[String],
    ) -> AppResult<IliasPage> {
        tracing::debug!("按标题重排 {} 道题目", title_order.len());
        let ids = questions_tab.question_ids()?;

        let mut payload = FormPayload::urlencoded()
            .text("cmd[saveOrderAndObligations]", "Sortierung abspeichern");
        for (position, title) in title_order.iter().enumerate() {
            let id = ids.get(title).ok_or_else(|| {
                AppError::Validation(ValidationError::UnknownQuestionTitle {
                    title: title.clone(),
                })
            })?;
            payload = payload.text(format!("order[{}]", id), position.to_string());
        }

        let target = questions_tab.form_target_from_button("cmd[saveOrderAndObligations]")?;
        self.session
            .post_form(
                &target.url,
                &payload.merge_extras(&target.extras).into_body(),
                ResponseCheck::Status2xx,
                PageCheck::SuccessAlert,
            )
            .await
    }

    /// 结束所有用户的测验轮次
    ///
    /// 按钮不存在时视为所有轮次已经结束，不算错误
    pub async fn end_all_user_passes(&self, test_page: &IliasPage) -> AppResult<()> {
        let dashboard = self.select_tab(test_page, TestTab::Dashboard).await?;
        let Some(url) = dashboard.end_all_passes_url()? else {
            tracing::warn!("⚠️ 找不到结束轮次按钮（轮次可能都已结束）");
            return Ok(());
        };

        let confirm_page = self.session.get_page(&url).await?;
        if confirm_page.has_danger_alert() {
            return Err(AppError::element_missing(
                "结束轮次的确认页",
                confirm_page.alert_summary(),
            ));
        }

        let target = confirm_page.end_all_passes_confirm_target()?;
        let payload = FormPayload::urlencoded()
            .text("cmd[confirmFinishTestPassForAllUser]", "Fortfahren")
            .merge_extras(&target.extras);
        self.session
            .post_form(
                &target.url,
                &payload.into_body(),
                ResponseCheck::Status2xx,
                PageCheck::UrlContains("cmdclass=iltestparticipantsgui"),
            )
            .await?;
        Ok(())
    }

    /// 配置计分设置
    ///
    /// 通过 label 正则找到目标复选框（计分页的字段名不可预测），
    /// 其余字段原样回传
    pub async fn configure_scoring(
        &self,
        test_page: &IliasPage,
        label_pattern: &str,
        enabled: bool,
    ) -> AppResult<IliasPage> {
        let scoring_url = test_page.scoring_settings_url()?;
        let scoring_page = self.session.get_page(&scoring_url).await?;
        let target = scoring_page.scoring_settings_form()?;

        let names = scoring_page.input_names_for_label(label_pattern)?;
        if names.is_empty() {
            return Err(AppError::element_missing(
                format!("label 匹配 {:?} 的计分设置项", label_pattern),
                scoring_page.alert_summary(),
            ));
        }

        let mut payload = FormPayload::urlencoded().text("cmd[saveForm]", "Speichern");
        for name in names {
            payload = payload.text(name, if enabled { "1" } else { "0" });
        }

        self.session
            .post_form(
                &target.url,
                &payload.merge_extras(&target.extras).into_body(),
                ResponseCheck::Status2xx,
                PageCheck::SuccessAlert,
            )
            .await
    }
}

/// 设置表单里的时间格式，未设置时传空串
fn format_time(time: Option<NaiveDateTime>) -> String {
    time.map(|t| t.format(ILIAS_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn time_formatting_uses_german_order() {
        let time = NaiveDate::from_ymd_opt(2024, 7, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0));
        assert_eq!(format_time(time), "01.07.2024 09:30");
        assert_eq!(format_time(None), "");
    }
}
