//! 人工批改相关的数据模型

/// 参与者身份信息，来自批改列表页的表格
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantInfo {
    pub last_name: String,
    pub first_name: String,
    pub email: String,
    pub username: String,
    /// 参与者批改详情页的绝对 URL
    pub detail_url: String,
}

impl ParticipantInfo {
    /// 显示名，导出文件的小节标题里使用 "姓, 名" 的形式
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

/// 一道需要人工批改的题目
#[derive(Debug, Clone, PartialEq)]
pub struct GradingQuestion {
    /// 服务器分配的题目 id
    pub id: String,
    pub title: String,
    pub max_points: f64,
}

/// 参与者提交的文件答案
#[derive(Debug, Clone, PartialEq)]
pub struct FileAnswer {
    pub name: String,
    pub url: String,
}

/// 参与者的答案
#[derive(Debug, Clone, PartialEq)]
pub enum GradingAnswer {
    /// 自由文本题的答案（HTML 片段）
    Text(String),
    /// 文件上传题的答案
    Files(Vec<FileAnswer>),
}

/// 一道题目的批改结果
#[derive(Debug, Clone, PartialEq)]
pub struct GradedQuestion {
    pub question: GradingQuestion,
    /// 未作答时为 None
    pub answer: Option<GradingAnswer>,
    pub points: f64,
    pub feedback: Option<String>,
    /// 反馈是否已定稿（定稿后页面上以只读 input 呈现）
    pub finalized: bool,
}

/// 单个参与者的全部批改结果
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantResults {
    pub participant: ParticipantInfo,
    pub answers: Vec<GradedQuestion>,
}
