use stepwise_core_types::StepId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("task {0} is already pending")]
    DuplicateTask(StepId),
    #[error("task {0} depends on itself")]
    SelfDependency(StepId),
}

impl From<SchedulerError> for stepwise_core_types::CoreError {
    fn from(value: SchedulerError) -> Self {
        stepwise_core_types::CoreError::new(format!("scheduler error: {value}"))
    }
}
