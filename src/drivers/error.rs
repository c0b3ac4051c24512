use thiserror::Error;
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver library {library} could not be loaded: {source}")]
    LibraryLoad {
        library: String,
        #[source]
        source: libloading::Error,
    },
    #[error("driver library is missing symbol {symbol}: {source}")]
    MissingSymbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("read buffer too small: expected {expected} slots, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
}
