//! rz-share: zero-trust link sharing
//!
//! A share grant lets a recipient read one payload without an account and
//! without the server ever being able to: the payload is encrypted under
//! a fresh random disclosure key that travels only in the link's URL
//! fragment, which browsers never transmit. The server stores ciphertext
//! plus expiry/quota bookkeeping and nothing else.
//!
//! Quota enforcement is a single atomic check-and-increment in the store,
//! so two racing redemptions of a `max_uses = 1` grant cannot both pass.

pub mod error;
pub mod grant;
pub mod link;
pub mod store;

pub use error::{ShareError, ShareResult};
pub use grant::{
    create_grant, redeem_grant, revoke_grant, unix_now, DisclosureKey, GrantOptions, ShareGrant,
};
pub use link::{encode_share_link, parse_share_link};
pub use store::{GrantStore, MemoryGrantStore};
