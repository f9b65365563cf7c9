pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No mirror URLs configured for library: {library}")]
    EmptyMirrorList { library: String },

    #[error("All sources for {library} failed ({attempts} mirror(s) attempted)")]
    LibraryLoadExhausted { library: String, attempts: usize },

    #[error("Document rewrite error: {message}")]
    Rewrite { message: String },

    #[error("Invalid snippet key: {key}")]
    InvalidSnippetKey { key: String },

    #[error("Unknown snippet: {key}")]
    UnknownSnippet { key: String },

    #[error("Snippet metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
