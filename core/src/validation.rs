//! Field-level validation for [`Task`] inputs, separate from the
//! Dependency Engine's graph-level validation in [`crate::graph`].

use crate::{
    error::{Result, TaskError},
    models::NewTask,
};

pub struct TaskValidator;

impl TaskValidator {
    pub fn validate_title(title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(TaskError::validation("title must not be empty"));
        }
        if title.len() > 500 {
            return Err(TaskError::validation("title must be at most 500 characters"));
        }
        Ok(())
    }

    pub fn validate_new_task(new: &NewTask) -> Result<()> {
        Self::validate_title(&new.title)?;
        if new.dependencies.as_ref().is_some_and(|d| d.len() > 200) {
            return Err(TaskError::validation(
                "a task may not declare more than 200 dependencies",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_title() {
        assert!(TaskValidator::validate_title("").is_err());
        assert!(TaskValidator::validate_title("   ").is_err());
    }

    #[test]
    fn accepts_reasonable_title() {
        assert!(TaskValidator::validate_title("Design the overall architecture").is_ok());
    }

    #[test]
    fn validate_new_task_delegates_to_title_check() {
        let new = NewTask {
            title: "".to_string(),
            ..Default::default()
        };
        let err = TaskValidator::validate_new_task(&new).unwrap_err();
        assert!(err.is_validation());
    }
}
