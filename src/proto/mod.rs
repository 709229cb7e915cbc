//! Wire protocols spoken over an established connection.

pub(crate) mod h1;
