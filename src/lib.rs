//! # ILIAS Exam Robot
//!
//! 一个把"没有 API 的 ILIAS"当成 API 来用的测验自动化工具：
//! 批量创建测验、把现有测验抓成 YAML 规格、人工批改的
//! Markdown 导出/回传。
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（认证 HTTP 会话），只暴露能力
//! - `HttpSession` - 唯一的网络出口，自带"失败→重登→重试一次"协议
//!
//! ### ② 解析层（Page Model）
//! - `page/` - HTML 文本 + URL 进，类型化结果出，纯函数无 I/O
//! - 每个脆弱的页面查询一个具名函数，改版只改一处
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `TestService` / `QuestionService` / `GradingService` - 对象操作
//! - `glob_resolver` - 远端层级的模式匹配遍历
//! - `payload` - 表单字段合并（显式值永远赢过抓取值）
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义一个完整业务流程（创建/抓取/批改）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/` - 目标 × 测验 的批量循环、统计与生命周期
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{HttpSession, SimpleAuthenticator};
pub use models::{IliasTest, PageDesignBlock, Spec, TestQuestion};
pub use orchestrator::App;
pub use page::IliasPage;
