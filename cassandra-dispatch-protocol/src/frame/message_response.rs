use uuid::Uuid;

use crate::frame::message_error::ErrorBody;
use crate::frame::message_result::ResResultBody;

#[derive(Debug, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum ResponseBody {
    Error(ErrorBody),
    Result(ResResultBody),
    /// Answer to a schema version request.
    SchemaVersion(Uuid),
}

impl ResponseBody {
    pub fn into_error(self) -> Option<ErrorBody> {
        match self {
            ResponseBody::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<ResResultBody> {
        match self {
            ResponseBody::Result(result) => Some(result),
            _ => None,
        }
    }
}
