//! 凭据提供与登录入口
//!
//! 凭据的长期存储（keyring 之类）不在本工具范围内，
//! 只支持命令行参数和交互式输入两种来源。

use async_trait::async_trait;
use std::io::Write;

use crate::error::{AppError, AppResult, AuthError};

/// 一组登录凭据
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// 凭据提供者
///
/// 会话层在需要登录时调用；实现可以缓存、提示输入等
#[async_trait(?Send)]
pub trait Authenticator {
    async fn credentials(&self) -> AppResult<Credentials>;
}

/// 简单凭据提供者：用户名来自命令行，密码缺失时从终端读取
pub struct SimpleAuthenticator {
    username: String,
    password: std::sync::Mutex<Option<String>>,
}

impl SimpleAuthenticator {
    pub fn new(username: String, password: Option<String>) -> Self {
        Self {
            username,
            password: std::sync::Mutex::new(password),
        }
    }
}

#[async_trait(?Send)]
impl Authenticator for SimpleAuthenticator {
    async fn credentials(&self) -> AppResult<Credentials> {
        let mut guard = self
            .password
            .lock()
            .map_err(|e| AppError::Other(format!("凭据缓存的锁被污染: {}", e)))?;
        if guard.is_none() {
            let mut input = String::new();
            eprint!("请输入用户 {} 的密码: ", self.username);
            std::io::stderr().flush().ok();
            std::io::stdin().read_line(&mut input).map_err(|e| {
                AppError::Auth(AuthError::MissingCredentials {
                    detail: format!("读取标准输入失败: {}", e),
                })
            })?;
            let trimmed = input.trim_end_matches(['\r', '\n']).to_string();
            if trimmed.is_empty() {
                return Err(AppError::Auth(AuthError::MissingCredentials {
                    detail: "密码为空".to_string(),
                }));
            }
            *guard = Some(trimmed);
        }
        Ok(Credentials {
            username: self.username.clone(),
            password: guard.clone().unwrap_or_default(),
        })
    }
}

/// 固定凭据提供者，测试里用
pub struct StaticAuthenticator {
    pub credentials: Credentials,
}

#[async_trait(?Send)]
impl Authenticator for StaticAuthenticator {
    async fn credentials(&self) -> AppResult<Credentials> {
        Ok(self.credentials.clone())
    }
}
