//! Request and response messages exchanged with a node. Encoding these into frames is the
//! responsibility of the transport collaborator.

pub mod message_error;
pub mod message_request;
pub mod message_response;
pub mod message_result;

pub use message_error::ErrorBody;
pub use message_request::RequestBody;
pub use message_response::ResponseBody;
