//! Federation signing
//!
//! Ed25519 actor key material, the HTTP message-signature codec used on
//! both ends of a federation link, and the directory of counterpart
//! public keys.

pub mod http_signature;
pub mod keys;

pub use http_signature::{
    body_digest, http_date, key_id_of, sign_request, verify_signature, SignedHeaders,
};
pub use keys::{ActorKeys, KeyDirectory};
