use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("bad request")]
    BadRequest,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("not acceptable")]
    NotAcceptable,
    #[error("range not satisfiable")]
    RangeNotSatisfiable,
    #[error("internal server error")]
    Internal,
    #[error("not implemented")]
    NotImplemented,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            HttpError::BadRequest => (400, "Bad Request"),
            HttpError::Forbidden => (403, "Forbidden"),
            HttpError::NotFound => (404, "Not Found"),
            HttpError::NotAcceptable => (406, "Not Acceptable"),
            HttpError::RangeNotSatisfiable => (416, "Range Not Satisfiable"),
            HttpError::Internal | HttpError::Io(_) => (500, "Internal Server Error"),
            HttpError::NotImplemented => (501, "Not Implemented"),
        }
    }
}
