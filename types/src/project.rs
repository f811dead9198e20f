use thiserror::Error;

/// Name of a project to scaffold with `jolt init`.
///
/// Guaranteed non-blank (after trimming) and free of path separators, so it
/// always names a single directory inside the destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectName(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectNameError {
    #[error("project name must not be empty")]
    Empty,
    #[error("project name must not contain '{0}'")]
    Separator(char),
    #[error("project name must not be '.' or '..'")]
    Relative,
}

impl ProjectName {
    pub fn new(value: impl Into<String>) -> Result<Self, ProjectNameError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ProjectNameError::Empty);
        }
        if let Some(sep) = trimmed.chars().find(|c| matches!(c, '/' | '\\')) {
            return Err(ProjectNameError::Separator(sep));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(ProjectNameError::Relative);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
