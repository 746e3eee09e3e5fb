//! Authenticated request pipeline

pub mod executor;
pub mod request;
pub mod transport;

pub use executor::RequestExecutor;
pub use request::{
    BearerSource, Method, MultipartPart, MultipartPayload, RequestBody, RequestBuilder,
    RequestDescriptor, RequestOptions,
};
pub use transport::{HttpTransport, ReqwestTransport, TransportError, TransportResponse};
