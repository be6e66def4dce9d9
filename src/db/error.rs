#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}
