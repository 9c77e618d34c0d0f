pub mod endpoint;
pub mod header;
pub mod request;
pub mod vote;

pub use self::endpoint::{AggregatorEndpoint, EndpointError};
pub use self::header::BlockHeader;
pub use self::request::AttestationRequest;
pub use self::vote::{Vote, VoteAck};
