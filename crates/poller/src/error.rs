use linewatch_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// A lookup against the line configuration failed.
    #[error(transparent)]
    Config(#[from] CoreError),

    /// Nothing has been published since startup.
    #[error("No snapshot is available yet")]
    NoData,

    /// The tick finished after a newer tick published or after polling stopped.
    #[error("Tick {0} was discarded")]
    Discarded(u64),
}
