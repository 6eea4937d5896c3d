//! 流程层（Workflow Layer）
//!
//! 把 services 编排成完整的业务流程：
//!
//! - `create_flow` - 在一个目标文件夹里从头建好一个测验
//! - `slurp_flow` - 把远端文件夹里的测验抓成规格数据
//! - `grade_flow` - 批改数据的导出与回传
//!
//! 本层不持有任何资源，只依赖业务能力

pub mod create_flow;
pub mod grade_flow;
pub mod slurp_flow;

pub use create_flow::{add_test, TestCtx};
pub use grade_flow::{export_grading, upload_grading};
pub use slurp_flow::slurp_tests_from_folder;
