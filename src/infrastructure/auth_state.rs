//! 认证代数计数器
//!
//! 会话过期时往往有一批请求同时失败，每个失败者都想重新登录。
//! 这里用一个代数（generation）计数器合并这些登录：每个请求发出前
//! 先记下当前代数，失败后带着记下的代数来认领登录；如果全局代数
//! 已经前进，说明别人刚登录过，直接复用即可。

use std::future::Future;
use tokio::sync::Mutex;

use crate::error::AppResult;

/// 进程内唯一的认证状态
///
/// 锁的持有时间：读代数时一瞬间，真正登录时覆盖整个登录流程，
/// 保证同一次过期绝不会触发两次登录
pub struct AuthState {
    generation: Mutex<u64>,
}

impl AuthState {
    pub fn new() -> Self {
        Self {
            generation: Mutex::new(0),
        }
    }

    /// 读取当前认证代数
    ///
    /// 必须在每个可能需要认证的请求发出**之前**调用；
    /// 正在进行的登录会让这里短暂等待，避免明知会失败还发请求
    pub async fn current_generation(&self) -> u64 {
        *self.generation.lock().await
    }

    /// 带着之前记下的代数认领一次登录
    ///
    /// # 参数
    /// - `seen`: 请求发出前记下的代数
    /// - `login`: 真正的登录流程
    ///
    /// # 返回
    /// 返回本次调用是否真的执行了登录
    pub async fn authenticate_if_current<F, Fut>(&self, seen: u64, login: F) -> AppResult<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<()>>,
    {
        let mut generation = self.generation.lock().await;
        if *generation != seen {
            tracing::debug!("认证代数已前进（{} -> {}），复用他人的登录", seen, *generation);
            return Ok(false);
        }
        tracing::info!("🔑 会话失效，重新登录...");
        login().await?;
        *generation += 1;
        Ok(true)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_failures_trigger_exactly_one_login() {
        let state = AuthState::new();
        let login_count = AtomicUsize::new(0);

        // N 个请求在同一代数下同时失败
        let seen: Vec<u64> = {
            let mut seen = Vec::new();
            for _ in 0..5 {
                seen.push(state.current_generation().await);
            }
            seen
        };

        let attempts = seen.into_iter().map(|generation| {
            let state = &state;
            let login_count = &login_count;
            async move {
                state
                    .authenticate_if_current(generation, || async {
                        login_count.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }
        });
        let results = futures::future::join_all(attempts).await;

        assert_eq!(login_count.load(Ordering::SeqCst), 1);
        assert_eq!(
            results.into_iter().filter(|r| *r.as_ref().unwrap()).count(),
            1
        );
        assert_eq!(state.current_generation().await, 1);
    }

    #[tokio::test]
    async fn a_second_expiry_triggers_a_second_login() {
        let state = AuthState::new();
        let login_count = AtomicUsize::new(0);

        let first = state.current_generation().await;
        state
            .authenticate_if_current(first, || async {
                login_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        let second = state.current_generation().await;
        state
            .authenticate_if_current(second, || async {
                login_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(login_count.load(Ordering::SeqCst), 2);
    }
}
