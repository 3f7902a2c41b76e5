//! XCM adapters: the concrete transfer builder and signer
//!
//! The builder opens a websocket session to each selected endpoint, asks the
//! XCM API for the encoded transfer call against those same endpoints, and
//! releases both sessions on disconnect. The signer hands the call to a
//! signing service that holds the keys.

pub mod api;
pub mod builder;
pub mod signer;

pub use api::XcmApiClient;
pub use builder::XcmApiBuilder;
pub use signer::RemoteSigner;
