//! Security layer: key sessions, the session store, anti-replay and the
//! CBC/HMAC ESP codec.

mod codec;
mod keys;
mod replay;
mod store;

pub use codec::{padding_len, EspCodec};
pub use keys::{EncAlgorithm, KeySession, MacAlgorithm};
pub use replay::ReplayWindow;
pub use store::{SessionSlot, SessionStore};
