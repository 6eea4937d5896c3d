//! 测验 Dashboard 页（结束测验轮次）的解析

use crate::error::AppResult;
use crate::page::{sel, FormTarget, IliasPage};

impl IliasPage {
    /// "结束所有用户的测验轮次"按钮的地址
    ///
    /// # 返回
    /// 按钮不存在时返回 None（通常意味着所有轮次已经结束）
    pub fn end_all_passes_url(&self) -> AppResult<Option<String>> {
        let Some(button) = self
            .html()
            .select(&sel("button[data-action]"))
            .find(|el| {
                el.value()
                    .attr("data-action")
                    .map(|a| a.to_lowercase().contains("cmd=finishalluserpasses"))
                    .unwrap_or(false)
            })
        else {
            return Ok(None);
        };
        Ok(Some(
            self.abs_url(button.value().attr("data-action").unwrap_or(""))?,
        ))
    }

    /// 结束轮次的确认表单
    pub fn end_all_passes_confirm_target(&self) -> AppResult<FormTarget> {
        self.form_target_from_button("cmd[confirmFinishTestPassForAllUser]")
    }
}

#[cfg(test)]
mod tests {
    use crate::page::IliasPage;

    #[test]
    fn end_passes_button_is_optional() {
        let with_button = IliasPage::new(
            r#"<html><body>
            <button data-action="ilias.php?cmd=finishAllUserPasses&ref_id=1">Beenden</button>
            </body></html>"#,
            "https://ilias.example.org/dashboard",
        )
        .unwrap();
        assert!(with_button.end_all_passes_url().unwrap().is_some());

        let without = IliasPage::new(
            "<html><body></body></html>",
            "https://ilias.example.org/dashboard",
        )
        .unwrap();
        assert!(without.end_all_passes_url().unwrap().is_none());
    }
}
