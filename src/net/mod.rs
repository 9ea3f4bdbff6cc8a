//! TCP networking primitives.
//!
//! - [`socket`]: [`Socket`], the non-blocking connection descriptor a session
//!   is driven on
//!
//! [`Socket`]: socket::Socket

pub mod socket;
