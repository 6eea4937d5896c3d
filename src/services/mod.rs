//! 业务能力层（Services Layer）
//!
//! 描述"我能做什么"，每个文件一项能力：
//!
//! - `payload` - 表单载荷合并（显式值 + 抓取的额外字段）
//! - `test_service` - 测验的创建 / 配置 / 发布 / 重排序 / 结束轮次
//! - `question_service` - 题目创建和富文本设计块
//! - `glob_resolver` - 远端层级的 glob 匹配遍历
//! - `grading_service` - 批改数据的抓取与回传
//! - `grading_io` - 批改数据与 Markdown 文件的互转
//!
//! 本层只依赖 infrastructure（网络）、page（解析）和 models（数据），
//! 不编排流程——流程属于 workflow 层

pub mod glob_resolver;
pub mod grading_io;
pub mod grading_service;
pub mod payload;
pub mod question_service;
pub mod test_service;

pub use glob_resolver::{resolve_targets, Hierarchy, MatchedTarget, RemoteNode};
pub use grading_service::GradingService;
pub use payload::FormPayload;
pub use question_service::QuestionService;
pub use test_service::TestService;
