use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// HTTP 传输层错误
    Http(HttpError),
    /// 认证相关错误
    Auth(AuthError),
    /// 页面解析错误（ILIAS 页面结构与预期不符）
    Scrape(ScrapeError),
    /// 业务校验错误
    Validation(ValidationError),
    /// 文件操作错误
    File(FileError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Http(e) => write!(f, "HTTP错误: {}", e),
            AppError::Auth(e) => write!(f, "认证错误: {}", e),
            AppError::Scrape(e) => write!(f, "页面解析错误: {}", e),
            AppError::Validation(e) => write!(f, "校验错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Http(e) => Some(e),
            AppError::Auth(e) => Some(e),
            AppError::Scrape(e) => Some(e),
            AppError::Validation(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// HTTP 传输层错误
#[derive(Debug)]
pub enum HttpError {
    /// 网络请求失败
    RequestFailed {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 服务器返回非 2xx 状态码
    BadStatus {
        url: String,
        status: u16,
    },
    /// 响应未通过语义校验（页面缺少成功提示等）
    FailedValidation {
        url: String,
        detail: String,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::RequestFailed { url, source } => {
                write!(f, "请求失败 ({}): {}", url, source)
            }
            HttpError::BadStatus { url, status } => {
                write!(f, "服务器返回错误状态码 {} ({})", status, url)
            }
            HttpError::FailedValidation { url, detail } => {
                write!(f, "响应未通过语义校验 ({}): {}", url, detail)
            }
            HttpError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HttpError::RequestFailed { source, .. } | HttpError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 认证相关错误
#[derive(Debug)]
pub enum AuthError {
    /// 登录流程失败
    LoginFailed {
        detail: String,
    },
    /// 重新认证并重试一次后仍然失败
    StillNotAuthenticated {
        url: String,
    },
    /// 无法获取凭据
    MissingCredentials {
        detail: String,
    },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::LoginFailed { detail } => write!(f, "登录失败: {}", detail),
            AuthError::StillNotAuthenticated { url } => {
                write!(f, "重新登录后请求仍然失败 ({})", url)
            }
            AuthError::MissingCredentials { detail } => {
                write!(f, "无法获取凭据: {}", detail)
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// 页面解析错误
///
/// 出现此类错误说明我们对 ILIAS 页面结构的假设已经过期，
/// 错误信息中尽量附带页面上的警告文本方便排查。
#[derive(Debug)]
pub enum ScrapeError {
    /// 页面类型与查询不匹配（例如在非题目列表页上查询题目表格）
    PageMismatch {
        url: String,
        expected: String,
    },
    /// 预期元素缺失
    ElementMissing {
        what: String,
        alerts: String,
    },
    /// 标签（label）匹配到零个或多个输入元素
    AmbiguousLabel {
        label: String,
        count: usize,
    },
    /// 数值字段解析失败
    NumberParseFailed {
        field: String,
        value: String,
    },
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrapeError::PageMismatch { url, expected } => {
                write!(f, "页面类型不符，期望 {} ({})", expected, url)
            }
            ScrapeError::ElementMissing { what, alerts } => {
                if alerts.is_empty() {
                    write!(f, "页面缺少元素: {}", what)
                } else {
                    write!(f, "页面缺少元素: {} (页面警告: {})", what, alerts)
                }
            }
            ScrapeError::AmbiguousLabel { label, count } => {
                write!(f, "标签 {:?} 匹配到 {} 个输入元素", label, count)
            }
            ScrapeError::NumberParseFailed { field, value } => {
                write!(f, "字段 {} 的值 {:?} 无法解析为数字", field, value)
            }
        }
    }
}

impl std::error::Error for ScrapeError {}

/// 业务校验错误
#[derive(Debug)]
pub enum ValidationError {
    /// 题目标题在重排序时无法找到对应 id
    UnknownQuestionTitle {
        title: String,
    },
    /// 规格文件中引用了不存在的题目
    UnresolvedQuestionRef {
        test: String,
        reference: String,
    },
    /// 批改分数超过题目满分
    PointsExceedMax {
        question: String,
        participant: String,
        points: f64,
        max_points: f64,
    },
    /// 批改文件中各题目的参与者数量不一致
    ParticipantCountMismatch {
        question: String,
        expected: usize,
        actual: usize,
    },
    /// 同一参与者在同一题目下出现多个答案
    DuplicateParticipant {
        question: String,
        email: String,
    },
    /// 批改文件里的参与者在线上不存在
    UnknownParticipant {
        email: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownQuestionTitle { title } => {
                write!(f, "题目列表中找不到标题 {:?}（列表可能已过期）", title)
            }
            ValidationError::UnresolvedQuestionRef { test, reference } => {
                write!(f, "测验 {:?} 引用了不存在的题目 {:?}", test, reference)
            }
            ValidationError::PointsExceedMax {
                question,
                participant,
                points,
                max_points,
            } => {
                write!(
                    f,
                    "题目 {:?} 中参与者 {} 的分数 {} 超过满分 {}",
                    question, participant, points, max_points
                )
            }
            ValidationError::ParticipantCountMismatch {
                question,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "题目 {:?} 有 {} 个参与者，与其他题目的 {} 个不一致（导出文件可能不完整）",
                    question, actual, expected
                )
            }
            ValidationError::DuplicateParticipant { question, email } => {
                write!(f, "题目 {:?} 中参与者 {} 出现了多个答案", question, email)
            }
            ValidationError::UnknownParticipant { email } => {
                write!(f, "批改文件里的参与者 {} 在线上批改列表中不存在", email)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. } | FileError::WriteFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| String::from("<unknown>"));
        AppError::Http(HttpError::RequestFailed {
            url,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Http(HttpError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建"元素缺失"错误，附带页面警告文本
    pub fn element_missing(what: impl Into<String>, alerts: impl Into<String>) -> Self {
        AppError::Scrape(ScrapeError::ElementMissing {
            what: what.into(),
            alerts: alerts.into(),
        })
    }

    /// 创建"页面类型不符"错误
    pub fn page_mismatch(url: impl Into<String>, expected: impl Into<String>) -> Self {
        AppError::Scrape(ScrapeError::PageMismatch {
            url: url.into(),
            expected: expected.into(),
        })
    }

    /// 创建数值解析错误
    pub fn number_parse(field: impl Into<String>, value: impl Into<String>) -> Self {
        AppError::Scrape(ScrapeError::NumberParseFailed {
            field: field.into(),
            value: value.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
