/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// HTTP 请求超时（秒）
    pub http_timeout_secs: u64,
    /// 单次下载的总超时（秒）
    pub download_timeout_secs: u64,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: 60,
            // 30 分钟，足够在慢速线路上拉完一个大附件，
            // 又不至于让通宵批处理卡死在单个请求上
            download_timeout_secs: 30 * 60,
            user_agent: "ilias-exam-robot".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.http_timeout_secs),
            download_timeout_secs: std::env::var("DOWNLOAD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.download_timeout_secs),
            user_agent: std::env::var("USER_AGENT").unwrap_or(default.user_agent),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }
}
