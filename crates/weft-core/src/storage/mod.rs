//! Document storage.
//!
//! Documents live in sled trees namespaced per entity (`data:<entity>`),
//! keyed by an order-preserving encoding of their key field. Unique indexes
//! get their own trees (`index:<entity>:<field>`).

mod codec;
mod config;
mod record;
mod store;

pub use codec::{decode_document, encode_document, encode_key};
pub use config::StoreConfig;
pub use record::{current_timestamp, StoredRecord};
pub use store::{DocumentStore, IngestFailure, IngestReport};
