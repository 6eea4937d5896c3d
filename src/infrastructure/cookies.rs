//! Cookie 的文件持久化
//!
//! 文件格式：每行一个 `Set-Cookie: ...`，启动时读入，
//! 登录成功后和正常退出时整体重写。崩溃后下次启动仍然能
//! 复用会话，省掉一次登录。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cookie_store::{CookieStore, RawCookie};
use reqwest_cookie_store::CookieStoreMutex;
use url::Url;

use crate::error::{AppError, AppResult};

/// Cookie 存储与持久化文件的组合
pub struct CookieFile {
    path: PathBuf,
    store: Arc<CookieStoreMutex>,
}

impl CookieFile {
    /// 加载 Cookie 文件并构建存储
    ///
    /// 文件不存在时从空存储开始；无法解析的行记日志后忽略
    pub fn load(path: &Path, base_url: &Url) -> AppResult<Self> {
        let mut store = CookieStore::default();

        match fs::read_to_string(path) {
            Ok(content) => {
                for (index, line) in content.lines().enumerate() {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    // 头名不区分大小写
                    if trimmed.len() < 11 || !trimmed[..11].eq_ignore_ascii_case("set-cookie:") {
                        tracing::debug!("第 {} 行不是 Set-Cookie 行，忽略", index + 1);
                        continue;
                    }
                    let raw_value = trimmed[11..].trim().to_string();
                    match RawCookie::parse(raw_value) {
                        Ok(cookie) => {
                            if let Err(e) = store.insert_raw(&cookie, base_url) {
                                tracing::debug!("第 {} 行的 Cookie 无法入库: {}", index + 1, e);
                            }
                        }
                        Err(e) => {
                            tracing::debug!("第 {} 行的 Cookie 无法解析: {}", index + 1, e);
                        }
                    }
                }
                tracing::debug!("已从 {} 加载 Cookie", path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Cookie 文件 {} 不存在，从空会话开始", path.display());
            }
            Err(e) => {
                return Err(AppError::file_read_failed(path.display().to_string(), e));
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            store: Arc::new(CookieStoreMutex::new(store)),
        })
    }

    /// 给 reqwest 用的共享存储
    pub fn shared_store(&self) -> Arc<CookieStoreMutex> {
        self.store.clone()
    }

    /// 把当前所有未过期的 Cookie 写回文件
    pub fn save(&self) -> AppResult<()> {
        let mut lines = Vec::new();
        {
            let store = self
                .store
                .lock()
                .map_err(|e| AppError::Other(format!("Cookie 存储的锁被污染: {}", e)))?;
            for cookie in store.iter_unexpired() {
                let raw: &RawCookie<'static> = cookie;
                lines.push(format!("Set-Cookie: {}", raw));
            }
        }
        // 结尾带换行是基本礼貌
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&self.path, content)
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;
        tracing::debug!("已把 Cookie 保存到 {}", self.path.display());
        Ok(())
    }
}
