use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{Error, Result};

const NAME_TAKEN_MESSAGE: &str = "has already been taken";

/// Turns a failed POST into an endpoint-specific error.
///
/// Handlers are passed per call to [`Client::post`](crate::Client::post)
/// and run in order for any status other than 200. The first one to return
/// an error ends the chain; if none does, the decoded body is returned to
/// the caller.
pub trait ErrorHandler {
    fn handle(&self, status: StatusCode, body: &Value) -> Result<()>;
}

impl<F> ErrorHandler for F
where
    F: Fn(StatusCode, &Value) -> Result<()>,
{
    fn handle(&self, status: StatusCode, body: &Value) -> Result<()> {
        self(status, body)
    }
}

/// 422 with `errors.name[0] == "has already been taken"`.
pub fn name_taken(status: StatusCode, body: &Value) -> Result<()> {
    if status != StatusCode::UNPROCESSABLE_ENTITY {
        return Ok(());
    }
    match body.pointer("/errors/name/0").and_then(Value::as_str) {
        Some(msg) if msg == NAME_TAKEN_MESSAGE => Err(Error::NameTaken(msg.to_string())),
        _ => Ok(()),
    }
}

/// Any 422 left over is reported with the raw error body.
pub fn validation_error(status: StatusCode, body: &Value) -> Result<()> {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        return Err(Error::ValidationError(body.clone()));
    }
    Ok(())
}

pub(crate) fn run_handlers(
    handlers: &[&dyn ErrorHandler],
    status: StatusCode,
    body: &Value,
) -> Result<()> {
    for handler in handlers {
        handler.handle(status, body)?;
    }
    Ok(())
}
