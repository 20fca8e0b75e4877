use rust_decimal::Decimal;
use thiserror::Error;

/// malformed subtitle input, reported to the user before any record exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("block {block}: invalid caption index '{value}'")]
    InvalidIndex { block: usize, value: String },
    #[error("block {block}: missing timing line")]
    MissingTiming { block: usize },
    #[error("block {block}: malformed timestamp '{value}'")]
    MalformedTimestamp { block: usize, value: String },
    #[error("no caption blocks found")]
    Empty,
}

/// store failures; always fatal to the operation that hit them
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
}

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("translation transport failed: {0}")]
    Transport(String),
    #[error("translation response had {got} segments, expected {expected}")]
    Alignment { expected: usize, got: usize },
    #[error("batch size must be positive")]
    InvalidBatchSize,
    #[error("cost requested before all batches finished")]
    Unfinished,
    #[error("translation cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for TranslationError {
    fn from(err: reqwest::Error) -> Self {
        TranslationError::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transaction amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("transaction must have exactly one of sender or recipient")]
    InvalidDirection,
    #[error("user {user_id} has insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds {
        user_id: i32,
        balance: Decimal,
        required: Decimal,
    },
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(err: tokio_postgres::Error) -> Self {
        LedgerError::Persistence(err.into())
    }
}

impl From<deadpool_postgres::PoolError> for LedgerError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        LedgerError::Persistence(err.into())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("file translation {0} not found")]
    NotFound(i32),
    #[error("file translation {0} is already being processed")]
    AlreadyStarted(i32),
    #[error("file translation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: i32,
        from: &'static str,
        to: &'static str,
    },
    #[error("file translation {id} does not belong to user {user_id}")]
    NotOwner { id: i32, user_id: i32 },
    #[error("unknown file status '{0}'")]
    UnknownStatus(String),
    #[error("no active translation could be created for file {0}")]
    Contended(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<tokio_postgres::Error> for LifecycleError {
    fn from(err: tokio_postgres::Error) -> Self {
        LifecycleError::Persistence(err.into())
    }
}

impl From<deadpool_postgres::PoolError> for LifecycleError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        LifecycleError::Persistence(err.into())
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("user {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<tokio_postgres::Error> for AccountError {
    fn from(err: tokio_postgres::Error) -> Self {
        AccountError::Persistence(err.into())
    }
}

impl From<deadpool_postgres::PoolError> for AccountError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AccountError::Persistence(err.into())
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment amount must be positive")]
    InvalidAmount,
    #[error("gateway rejected request: {0}")]
    Gateway(String),
    #[error("callback is missing required parameter '{0}'")]
    MissingParameter(&'static str),
    #[error("no pending receipt for track id {0}")]
    UnknownReceipt(String),
    #[error("payment {0} was not successful")]
    Unsuccessful(String),
    #[error("payment {0} failed gateway verification")]
    VerificationFailed(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Gateway(err.to_string())
    }
}

impl From<tokio_postgres::Error> for PaymentError {
    fn from(err: tokio_postgres::Error) -> Self {
        PaymentError::Persistence(err.into())
    }
}

impl From<deadpool_postgres::PoolError> for PaymentError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        PaymentError::Persistence(err.into())
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("translation queue is full")]
    Full,
    #[error("translation queue is closed")]
    Closed,
}

/// telegram side of a job: downloads, messages, document uploads
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("file download failed: {0}")]
    Download(String),
    #[error("sent message carried no document")]
    MissingDocument,
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Download(err.to_string())
    }
}
