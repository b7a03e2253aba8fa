use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_operation(name: impl Into<String>) -> Error {
        Error(ErrorKind::InvalidOperation { name: name.into() }.into())
    }

    pub fn queue_closed(queue: impl Into<String>) -> Error {
        Error(
            ErrorKind::QueueClosed {
                queue: queue.into(),
            }
            .into(),
        )
    }

    pub fn worker_panicked(worker_id: usize, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::WorkerPanicked {
                worker_id,
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn result_count_mismatch(expected: usize, actual: usize) -> Error {
        Error(ErrorKind::ResultCountMismatch { expected, actual }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` if this error reports a worker that terminated abnormally.
    pub fn is_worker_panic(&self) -> bool {
        matches!(self.kind(), ErrorKind::WorkerPanicked { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid operation {name}")]
    InvalidOperation { name: String },

    #[error("queue '{queue}' is closed")]
    QueueClosed { queue: String },

    #[error("worker {worker_id} terminated abnormally: {message}")]
    WorkerPanicked { worker_id: usize, message: String },

    #[error("expected {expected} results, collected {actual}")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}
