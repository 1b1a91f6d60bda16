//! Outbound HTTP/GraphQL access for operation adapters.

pub mod client;
pub mod error;

pub use client::{
    encode_query, ApiClient, ApiRequest, AuthScheme, BackendProfile, HttpApiClient, HttpMethod,
    Lookup,
};
pub use error::ApiError;
