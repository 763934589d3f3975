use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommonsError {
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to start {program}: {source}")]
    CommandSpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing required option: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Bad site record on row {row}, column {column}: {message}")]
    SiteParseError {
        row: usize,
        column: String,
        message: String,
    },

    #[error("Site name '{name}' appears more than once")]
    DuplicateSiteError { name: String },

    #[error("No usable sites: {message}")]
    NoSitesError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    HostCommand,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CommonsError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CommonsError::MissingConfigError { .. }
            | CommonsError::InvalidConfigValueError { .. }
            | CommonsError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            CommonsError::CsvError(_)
            | CommonsError::SiteParseError { .. }
            | CommonsError::DuplicateSiteError { .. }
            | CommonsError::NoSitesError { .. }
            | CommonsError::SerializationError(_)
            | CommonsError::ProcessingError { .. } => ErrorCategory::Data,
            CommonsError::CommandFailed { .. } => ErrorCategory::HostCommand,
            CommonsError::CommandSpawnError { .. } | CommonsError::IoError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::HostCommand => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Exit code used by the binary for this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            CommonsError::CommandFailed { program, .. } => match program.as_str() {
                "v.db.select" => {
                    "Check that the vector map exists and that all four column names are spelled correctly".to_string()
                }
                "r.walk" => {
                    "Check the elevation and friction maps and that every site lies inside the current region".to_string()
                }
                "r.mapcalc" | "r.category" => {
                    "Check that the output names are free or pass --overwrite".to_string()
                }
                _ => format!("Run {} by hand to see the full host diagnostic", program),
            },
            CommonsError::CommandSpawnError { .. } => {
                "Run the module from inside a GRASS session so the host commands are on PATH"
                    .to_string()
            }
            CommonsError::MissingConfigError { field } => {
                format!("Pass {} on the command line or in the run file", field)
            }
            CommonsError::InvalidConfigValueError { field, .. }
            | CommonsError::ConfigValidationError { field, .. } => {
                format!("Fix the value of {}", field)
            }
            CommonsError::SiteParseError { column, .. } => format!(
                "Make sure column '{}' holds a value for every site in the vector table",
                column
            ),
            CommonsError::DuplicateSiteError { .. } => {
                "Use a column with unique values (the cat column works) as name_column".to_string()
            }
            CommonsError::NoSitesError { .. } => {
                "Check that the vector map has sites with a positive importance index".to_string()
            }
            CommonsError::CsvError(_) => {
                "Pick a separator that does not appear inside attribute values".to_string()
            }
            CommonsError::IoError(_) | CommonsError::SerializationError(_) => {
                "Check that the report path is writable".to_string()
            }
            CommonsError::ProcessingError { .. } => "Re-run with --verbose for details".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Data => format!("Site data problem: {}", self),
            ErrorCategory::HostCommand => format!("GIS command failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, CommonsError>;
