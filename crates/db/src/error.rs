use issuefleet_core::error::CoreError;

/// Error returned by repository operations that can fail for domain reasons
/// (lost compare-and-set, illegal transition, missing row) as well as for
/// database reasons.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
