use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::CommentId;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Invalid CAPTCHA")]
    InvalidCaptcha,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No such comment: {0:?}")]
    NotFound(CommentId),

    #[error("Failed recording client info: {0}")]
    ClientInfo(String),

    #[error("Attachment rejected: {0}")]
    Attachment(String),
}

impl Error {
    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            Error::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidCaptcha => StatusCode::BAD_REQUEST,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::ClientInfo(_) => StatusCode::BAD_REQUEST,
            Error::Attachment(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        serde_json::to_vec(&match self {
            Error::Unknown(msg) => json!({
                "success": false,
                "message": msg,
                "type": "unknown",
            }),
            Error::InvalidCaptcha => json!({
                "success": false,
                "message": "invalid captcha",
                "type": "invalid-captcha",
            }),
            Error::InvalidInput(msg) => json!({
                "success": false,
                "message": msg,
                "type": "invalid-input",
            }),
            Error::NotFound(id) => json!({
                "success": false,
                "message": "no such comment",
                "type": "not-found",
                "id": id.0,
            }),
            Error::ClientInfo(msg) => json!({
                "success": false,
                "message": msg,
                "type": "client-info",
            }),
            Error::Attachment(msg) => json!({
                "success": false,
                "message": msg,
                "type": "attachment",
            }),
        })
        .expect("serializing error contents")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let message = || {
            String::from(
                data.get("message")
                    .and_then(|msg| msg.as_str())
                    .unwrap_or(""),
            )
        };
        Ok(
            match data
                .get("type")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("error type is not a string"))?
            {
                "unknown" => Error::Unknown(message()),
                "invalid-captcha" => Error::InvalidCaptcha,
                "invalid-input" => Error::InvalidInput(message()),
                "not-found" => Error::NotFound(CommentId(
                    data.get("id")
                        .and_then(|id| id.as_str())
                        .and_then(|id| Uuid::from_str(id).ok())
                        .ok_or_else(|| anyhow!("not-found error without a proper comment id"))?,
                )),
                "client-info" => Error::ClientInfo(message()),
                "attachment" => Error::Attachment(message()),
                _ => return Err(anyhow!("error contents has unknown type")),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_contents() {
        let errors = vec![
            Error::Unknown(String::from("boom")),
            Error::InvalidCaptcha,
            Error::InvalidInput(String::from("email is too long")),
            Error::NotFound(CommentId(Uuid::new_v4())),
            Error::ClientInfo(String::from("malformed ip")),
            Error::Attachment(String::from("upload timed out")),
        ];
        for e in errors {
            assert_eq!(Error::parse(&e.contents()).unwrap(), e);
        }
    }

    #[test]
    fn client_errors_are_4xx() {
        assert_eq!(
            Error::Unknown(String::new()).status_code(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::InvalidCaptcha.status_code(),
            http::StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotFound(CommentId(Uuid::new_v4())).status_code(),
            http::StatusCode::NOT_FOUND
        );
    }
}
