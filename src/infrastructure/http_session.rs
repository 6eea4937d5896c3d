//! 认证 HTTP 会话 - 基础设施层
//!
//! 持有唯一的网络会话（reqwest Client + Cookie 存储），
//! 其他层只通过这里的高层动词上网：
//!
//! - `get_page` - 取一个页面
//! - `post_form` - 提交表单（urlencoded 或 multipart）
//! - `post_json` - 提交 JSON（富文本块插入端点）
//! - `download_file` - 下载二进制文件
//!
//! 每个动词遵守同一套协议：请求前记下认证代数，失败后重新登录并
//! **只重试一次**。重新登录后仍然失败说明问题是结构性的
//! （URL 失效、权限被收回），继续重试没有意义，直接报错。

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart;
use serde_json::Value as JsonValue;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError, HttpError};
use crate::infrastructure::auth_state::AuthState;
use crate::infrastructure::cookies::CookieFile;
use crate::infrastructure::login::Authenticator;
use crate::page::IliasPage;
use crate::utils::text::sanitize_path_segment;

/// 表单字段的值
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// 普通文本
    Text(String),
    /// 真实文件上传
    File {
        bytes: Vec<u8>,
        file_name: String,
        mime: String,
    },
    /// 空文件占位（服务器要求文件字段存在，哪怕没有内容）
    EmptyFile,
}

/// 待提交的表单
///
/// 重试时需要重新构建 reqwest 的请求体，所以这里保存的是
/// 可以反复编码的字段列表而不是一次性的 multipart 对象
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    pub fields: Vec<(String, FieldValue)>,
    /// 是否按 multipart/form-data 发送
    pub multipart: bool,
}

impl FormBody {
    /// 编码为 urlencoded 键值对
    pub fn urlencoded_pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    FieldValue::Text(text) => text.clone(),
                    FieldValue::File { .. } | FieldValue::EmptyFile => String::new(),
                };
                (name.clone(), text)
            })
            .collect()
    }

    /// 编码为 multipart 表单
    pub fn to_multipart(&self) -> AppResult<multipart::Form> {
        let mut form = multipart::Form::new();
        for (name, value) in &self.fields {
            form = match value {
                FieldValue::Text(text) => form.text(name.clone(), text.clone()),
                FieldValue::File {
                    bytes,
                    file_name,
                    mime,
                } => {
                    let part = multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(mime)
                        .map_err(AppError::from)?;
                    form.part(name.clone(), part)
                }
                FieldValue::EmptyFile => {
                    let part = multipart::Part::bytes(Vec::new())
                        .file_name("")
                        .mime_str("application/octet-stream")
                        .map_err(AppError::from)?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// 对 HTTP 响应本身的校验
#[derive(Debug, Clone, Copy)]
pub enum ResponseCheck {
    /// 2xx 即可
    Status2xx,
    /// 最终 URL 的查询串里必须出现指定标记（传小写）
    UrlQueryContains(&'static str),
}

impl ResponseCheck {
    fn passes(&self, status: reqwest::StatusCode, final_url: &Url) -> bool {
        match self {
            ResponseCheck::Status2xx => status.is_success(),
            ResponseCheck::UrlQueryContains(marker) => final_url
                .query()
                .map(|q| q.to_lowercase().contains(marker))
                .unwrap_or(false),
        }
    }
}

/// 对解析后页面的语义校验
#[derive(Debug, Clone, Copy)]
pub enum PageCheck {
    /// 页面必须带成功提示（且没有失败提示）
    SuccessAlert,
    /// 页面 URL 里必须出现指定标记（传小写）
    UrlContains(&'static str),
    /// 必须是题目编辑页
    QuestionEditPage,
    /// 不做校验
    Any,
}

impl PageCheck {
    fn passes(&self, page: &IliasPage) -> bool {
        match self {
            PageCheck::SuccessAlert => page.has_success_alert(),
            PageCheck::UrlContains(marker) => page.normalized_url().contains(marker),
            PageCheck::QuestionEditPage => page.is_question_edit_page(),
            PageCheck::Any => true,
        }
    }
}

/// 认证 HTTP 会话
pub struct HttpSession {
    client: reqwest::Client,
    base_url: Url,
    auth: AuthState,
    cookies: CookieFile,
    authenticator: Box<dyn Authenticator>,
}

impl HttpSession {
    /// 建立会话：加载 Cookie、配置 HTTP 客户端
    ///
    /// 此时不主动登录——持久化的 Cookie 多半还能用，
    /// 第一个真正失败的请求会触发登录
    pub fn new(
        config: &Config,
        base_url: &str,
        authenticator: Box<dyn Authenticator>,
        cookie_path: &Path,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::Other(format!("无效的 ILIAS 地址 {:?}: {}", base_url, e)))?;
        let cookies = CookieFile::load(cookie_path, &base_url)?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_provider(cookies.shared_store())
            .connect_timeout(Duration::from_secs(config.http_timeout_secs))
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(AppError::from)?;

        Ok(Self {
            client,
            base_url,
            auth: AuthState::new(),
            cookies,
            authenticator,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// 把 Cookie 写回磁盘，正常退出时调用
    pub fn save_cookies(&self) -> AppResult<()> {
        self.cookies.save()
    }

    // ========== 动词：取页面 ==========

    /// 取一个页面并解析
    pub async fn get_page(&self, url: &str) -> AppResult<IliasPage> {
        tracing::debug!("请求页面 {}", url);
        let auth_id = self.auth.current_generation().await;

        if let Some(page) = self.try_get_page(url).await? {
            return Ok(page);
        }
        self.authenticate(auth_id).await?;
        if let Some(page) = self.try_get_page(url).await? {
            return Ok(page);
        }
        Err(AppError::Auth(AuthError::StillNotAuthenticated {
            url: url.to_string(),
        }))
    }

    async fn try_get_page(&self, url: &str) -> AppResult<Option<IliasPage>> {
        let response = self.client.get(url).send().await?;
        let final_url = response.url().to_string();
        let text = response.text().await?;
        let page = IliasPage::new(&text, &final_url)?;
        if page.is_authenticated() {
            Ok(Some(page))
        } else {
            tracing::debug!("页面 {} 处于未登录状态", url);
            Ok(None)
        }
    }

    // ========== 动词：交表单 ==========

    /// 提交表单并校验结果
    ///
    /// # 参数
    /// - `response_check`: 对 HTTP 响应的校验
    /// - `page_check`: 对返回页面的语义校验
    pub async fn post_form(
        &self,
        url: &str,
        body: &FormBody,
        response_check: ResponseCheck,
        page_check: PageCheck,
    ) -> AppResult<IliasPage> {
        tracing::debug!("提交表单到 {}", url);
        let auth_id = self.auth.current_generation().await;

        if let Some(page) = self
            .try_post_form(url, body, response_check, page_check)
            .await?
        {
            return Ok(page);
        }
        self.authenticate(auth_id).await?;
        if let Some(page) = self
            .try_post_form(url, body, response_check, page_check)
            .await?
        {
            return Ok(page);
        }
        Err(AppError::Http(HttpError::FailedValidation {
            url: url.to_string(),
            detail: "重新登录并重试一次后仍未通过校验".to_string(),
        }))
    }

    async fn try_post_form(
        &self,
        url: &str,
        body: &FormBody,
        response_check: ResponseCheck,
        page_check: PageCheck,
    ) -> AppResult<Option<IliasPage>> {
        let request = if body.multipart {
            self.client.post(url).multipart(body.to_multipart()?)
        } else {
            self.client.post(url).form(&body.urlencoded_pairs())
        };
        let response = request.send().await?;
        let status = response.status();
        let final_url = response.url().clone();

        if !response_check.passes(status, &final_url) {
            tracing::warn!("对 {} 的请求未通过响应校验（状态 {}）", url, status);
            return Ok(None);
        }

        let text = response.text().await?;
        let page = IliasPage::new(&text, final_url.as_str())?;
        if page_check.passes(&page) {
            Ok(Some(page))
        } else {
            tracing::warn!("对 {} 的请求未通过页面语义校验", url);
            Ok(None)
        }
    }

    // ========== 动词：发 JSON ==========

    /// 向 JSON 端点提交数据
    ///
    /// 即使 HTTP 2xx，返回信封里的 `error` 字段也要由调用方检查
    pub async fn post_json(&self, url: &str, payload: &JsonValue) -> AppResult<JsonValue> {
        tracing::debug!("提交 JSON 到 {}", url);
        let auth_id = self.auth.current_generation().await;

        if let Ok(value) = self.try_post_json(url, payload).await? {
            return Ok(value);
        }
        self.authenticate(auth_id).await?;
        match self.try_post_json(url, payload).await? {
            Ok(value) => Ok(value),
            Err(status) => Err(AppError::Http(HttpError::BadStatus {
                url: url.to_string(),
                status,
            })),
        }
    }

    async fn try_post_json(
        &self,
        url: &str,
        payload: &JsonValue,
    ) -> AppResult<Result<JsonValue, u16>> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            tracing::warn!("JSON 请求 {} 返回状态 {}", url, response.status());
            return Ok(Err(response.status().as_u16()));
        }
        let value = response.json::<JsonValue>().await?;
        Ok(Ok(value))
    }

    // ========== 动词：下载文件 ==========

    /// 下载文件到指定目录
    ///
    /// 文件名 = 前缀 + 响应头里的 content-description
    pub async fn download_file(
        &self,
        url: &str,
        output_folder: &Path,
        prefix: &str,
    ) -> AppResult<PathBuf> {
        tracing::debug!("下载 {} 到 {}", url, output_folder.display());
        let auth_id = self.auth.current_generation().await;
        tokio::fs::create_dir_all(output_folder)
            .await
            .map_err(|e| AppError::file_write_failed(output_folder.display().to_string(), e))?;

        if let Ok(path) = self.try_download(url, output_folder, prefix).await? {
            return Ok(path);
        }
        self.authenticate(auth_id).await?;
        match self.try_download(url, output_folder, prefix).await? {
            Ok(path) => Ok(path),
            Err(status) => Err(AppError::Http(HttpError::BadStatus {
                url: url.to_string(),
                status,
            })),
        }
    }

    async fn try_download(
        &self,
        url: &str,
        output_folder: &Path,
        prefix: &str,
    ) -> AppResult<Result<PathBuf, u16>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            tracing::warn!("下载 {} 返回状态 {}", url, response.status());
            return Ok(Err(response.status().as_u16()));
        }
        let description = response
            .headers()
            .get("content-description")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let file_name = sanitize_path_segment(&format!("{}{}", prefix, description));
        let bytes = response.bytes().await?;
        let out_path = output_folder.join(file_name);
        tokio::fs::write(&out_path, &bytes)
            .await
            .map_err(|e| AppError::file_write_failed(out_path.display().to_string(), e))?;
        tracing::debug!("已写入 {}", out_path.display());
        Ok(Ok(out_path))
    }

    // ========== 登录 ==========

    /// 认领一次登录（代数没变才真正执行）
    async fn authenticate(&self, seen_generation: u64) -> AppResult<()> {
        self.auth
            .authenticate_if_current(seen_generation, || self.login_and_persist())
            .await?;
        Ok(())
    }

    /// 真正的登录流程 + 立即持久化 Cookie
    ///
    /// 登录后马上存盘：就算之后崩溃，下次启动也不用再登一遍
    async fn login_and_persist(&self) -> AppResult<()> {
        let credentials = self.authenticator.credentials().await?;

        let login_url = self
            .base_url
            .join("login.php?cmd=force_login&lang=de")
            .map_err(|e| AppError::Other(format!("无法构造登录地址: {}", e)))?;

        let response = self.client.get(login_url.as_str()).send().await?;
        let final_url = response.url().to_string();
        let text = response.text().await?;
        let login_page = IliasPage::new(&text, &final_url)?;

        let target = login_page
            .form_target_from_button("cmd[doStandardAuthentication]")
            .map_err(|e| {
                AppError::Auth(AuthError::LoginFailed {
                    detail: format!("登录页上找不到登录表单: {}", e),
                })
            })?;

        let mut pairs: Vec<(String, String)> = vec![
            ("username".to_string(), credentials.username.clone()),
            ("password".to_string(), credentials.password.clone()),
            (
                "cmd[doStandardAuthentication]".to_string(),
                if target.button_value.is_empty() {
                    "Anmelden".to_string()
                } else {
                    target.button_value.clone()
                },
            ),
        ];
        for extra in &target.extras {
            if pairs.iter().any(|(name, _)| name == &extra.name) {
                continue;
            }
            pairs.push((extra.name.clone(), extra.value.clone()));
        }

        let response = self.client.post(&target.url).form(&pairs).send().await?;
        let final_url = response.url().to_string();
        let text = response.text().await?;
        let result_page = IliasPage::new(&text, &final_url)?;

        if !result_page.is_authenticated() {
            return Err(AppError::Auth(AuthError::LoginFailed {
                detail: {
                    let alerts = result_page.alert_summary();
                    if alerts.is_empty() {
                        "登录后页面仍处于未登录状态".to_string()
                    } else {
                        alerts
                    }
                },
            }));
        }

        tracing::info!("✓ 登录成功（用户 {}）", credentials.username);
        self.cookies.save()?;
        Ok(())
    }
}
