//! Range parsing, response assembly and the file service entry point.

pub mod range;
pub mod response;
pub mod service;

pub use range::{parse_range_header, RangeSpec};
pub use response::{
    content_disposition, BodySource, EntityMeta, ErrorResponse, ResponseAssembler,
    CACHE_HIT_HEADER,
};
pub use service::{FileService, ServeRequest};
