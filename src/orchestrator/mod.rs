//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是整个应用的入口，负责把命令行请求翻译成批量流程。
//!
//! ### `batch_runner` - 批量执行器
//! - 管理应用生命周期（建会话、执行、存 Cookie）
//! - 展开 replicate 模式得到目标文件夹列表
//! - 目标 × 测验 的双层循环与全局统计
//! - 向下委托 workflow 处理单个测验
//!
//! ## 层次关系
//!
//! ```text
//! batch_runner (处理 目标文件夹 × Vec<IliasTest>)
//!     ↓
//! workflow (处理单个流程：create / slurp / grade)
//!     ↓
//! services (能力层：test / question / grading / glob)
//!     ↓
//! infrastructure (基础设施：HttpSession)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源所有者**：只有编排层持有 HttpSession
//! 2. **无业务逻辑**：只做调度和统计
//! 3. **不回滚**：批量中途失败时已完成的部分保持原样

pub mod batch_runner;

pub use batch_runner::App;
