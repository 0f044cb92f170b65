use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt store row: {0}")]
    CorruptRow(String),

    #[error("Category catalog error: {0}")]
    Catalog(String),

    #[error("Persistence failing repeatedly ({0} consecutive errors)")]
    StoreUnavailable(u32),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
