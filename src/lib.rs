#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod codec;
pub mod error;
pub mod frame;

pub mod crypto;
pub mod packet;
pub mod tls;

pub mod session;

pub use crypto::Level;
pub use error::Error;
pub use session::{ClientConfig, ConnectionIds, CryptoSession, ServerConfig, Validation};
pub use tls::Role;
