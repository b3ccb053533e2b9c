use arbor_api::{CommentId, Error as ApiError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl Error {
    pub fn invalid_captcha() -> Error {
        Error::Api(ApiError::InvalidCaptcha)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::InvalidInput(msg.into()))
    }

    pub fn not_found(id: CommentId) -> Error {
        Error::Api(ApiError::NotFound(id))
    }

    pub fn client_info(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::ClientInfo(msg.into()))
    }

    pub fn attachment(msg: impl Into<String>) -> Error {
        Error::Api(ApiError::Attachment(msg.into()))
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let err = match self {
            Error::Anyhow(err) => {
                tracing::error!(?err, "internal server error");
                #[cfg(not(test))]
                let err =
                    ApiError::Unknown(String::from("Internal server error, see logs for details"));
                #[cfg(test)]
                let err = ApiError::Unknown(format!("Internal server error: {err:?}"));
                err
            }
            Error::Api(err) => {
                tracing::info!("returning error to client: {err}");
                err
            }
        };
        (err.status_code(), err.contents()).into_response()
    }
}
