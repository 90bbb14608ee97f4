//! rz-core: shared configuration schema and domain types
//!
//! Error taxonomies live with their components (`rz_crypto::CryptoError`,
//! `rz_stream::PipelineError`, `rz_relay::RelayError`,
//! `rz_share::ShareError`); this crate carries only what every layer
//! agrees on — identities and config.

pub mod config;
pub mod types;
