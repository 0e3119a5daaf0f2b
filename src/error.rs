use thiserror::Error;

#[derive(Error, Debug)]
pub enum GradeError {
    #[error("value {value} is outside [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("value {value} is not a multiple of step {step} above {min}")]
    InvalidStep { value: f64, min: f64, step: f64 },

    #[error("invalid grade definition: {0}")]
    InvalidLeaf(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("composite '{0}' has no children")]
    EmptyComposite(String),

    #[error("composite '{name}' has {children} children but {actions} actions")]
    ActionCountMismatch {
        name: String,
        children: usize,
        actions: usize,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("invalid grading request: {0}")]
    InvalidRequest(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("config parse error: {0}")]
    ConfigParse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GradeError>;
