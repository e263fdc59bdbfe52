use super::errors::TaskError;

pub type TaskResult<T> = Result<T, TaskError>;
