//! Request construction.
//!
//! Callers describe a request with [`RequestOptions`]; `build` validates and
//! normalizes it into a [`RequestDescriptor`] the rest of the engine consumes.

mod body;
mod descriptor;
mod options;

pub(crate) use body::OutgoingBody;
pub use body::RequestBody;
pub use descriptor::{Credentials, RequestDescriptor};
pub use options::RequestOptions;
