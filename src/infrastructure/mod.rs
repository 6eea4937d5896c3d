//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源——唯一的认证 HTTP 会话，只向上暴露能力：
//! 取页面、交表单、发 JSON、下载文件。
//!
//! - `auth_state` - 认证代数计数器，合并并发的重新登录
//! - `cookies` - Cookie 的文件持久化（Set-Cookie 行格式）
//! - `login` - 凭据提供者和表单登录流程
//! - `http_session` - 会话本体，带"失败→重新登录→重试一次"协议

pub mod auth_state;
pub mod cookies;
pub mod http_session;
pub mod login;

pub use auth_state::AuthState;
pub use cookies::CookieFile;
pub use http_session::{FieldValue, FormBody, HttpSession, PageCheck, ResponseCheck};
pub use login::{Authenticator, Credentials, SimpleAuthenticator};
