//! 作业推导领域逻辑：标签解析、步骤编译、条件求值、作业规划与日历投影

pub mod attributes;
pub mod calendar;
pub mod evaluation;
pub mod planner;
pub mod steps;

pub use attributes::{AttributeResolver, AttributeSet, ResolvedStep};
pub use calendar::{project_calendar, project_into};
pub use evaluation::{
    parameters_for, DelimiterRenderer, Evaluation, EvaluationFacade, Evaluator, EvaluatorRegistry,
    ExpressionEvaluator,
};
pub use planner::{JobPlanner, PlanningPass};
pub use steps::{StepCompiler, StepDescriptor};
