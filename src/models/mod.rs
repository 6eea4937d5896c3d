pub mod grading;
pub mod loaders;
pub mod spec;

pub use grading::{
    FileAnswer, GradedQuestion, GradingAnswer, GradingQuestion, ParticipantInfo,
    ParticipantResults,
};
pub use loaders::{dump_tests_to_yaml, load_spec_from_file, save_spec_to_file};
pub use spec::{
    ChoiceAnswer, IliasTest, MultiChoiceAnswer, PageDesignBlock, QuestionType, Spec, TestQuestion,
};
