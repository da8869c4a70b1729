use std::fmt;

/// 1-based line/column in the original document a value or error can be traced back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} col {}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Syntax { message: String, pos: Option<SourcePos> },
    Missing { path: String, pos: Option<SourcePos> },
    WrongType { path: String, expected: String, found: String, pos: Option<SourcePos> },
    SubstitutionCycle { paths: Vec<String>, pos: Option<SourcePos> },
    Include { message: String, pos: Option<SourcePos> },
    Io { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax { message, pos } => match pos {
                Some(pos) => write!(f, "syntax error at {}: {}", pos, message),
                None => write!(f, "syntax error: {}", message),
            },
            ConfigError::Missing { path, pos } => match pos {
                Some(pos) => write!(f, "no configuration setting found for key '{}' ({})", path, pos),
                None => write!(f, "no configuration setting found for key '{}'", path),
            },
            ConfigError::WrongType { path, expected, found, pos } => match pos {
                Some(pos) => write!(
                    f,
                    "'{}' has type {} rather than {} ({})",
                    path, found, expected, pos
                ),
                None => write!(f, "'{}' has type {} rather than {}", path, found, expected),
            },
            ConfigError::SubstitutionCycle { paths, pos } => {
                let joined = paths.join(", ");
                match pos {
                    Some(pos) => write!(f, "could not resolve substitution(s): {} ({})", joined, pos),
                    None => write!(f, "could not resolve substitution(s): {}", joined),
                }
            }
            ConfigError::Include { message, pos } => match pos {
                Some(pos) => write!(f, "include error at {}: {}", pos, message),
                None => write!(f, "include error: {}", message),
            },
            ConfigError::Io { message } => write!(f, "io error: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

pub type ConfigResult<T> = Result<T, ConfigError>;
