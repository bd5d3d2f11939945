use std::path::PathBuf;

/// export 実行中に発生しうるエラーを表す。いずれも致命的で再試行しない。
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("Missing value for {0}")]
    MissingOptionValue(String),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("No files or folders specified.")]
    NoTargets,

    #[error("{0}")]
    Usage(String),

    #[error("Failed to find root directory '{name}' from '{}'", start.display())]
    RootNotFound { name: String, start: PathBuf },

    #[error("Source not found: '{}'", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Destination directory does not exist: '{}'", path.display())]
    DestinationNotFound { path: PathBuf },

    #[error("{0}")]
    Config(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive '{}': {source}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ExportError {
    /// I/O エラーに操作内容の説明を付与する。
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
