//! Protocol module - UF2 format definitions.

pub mod block;
pub mod constants;

pub use block::{BlockError, Uf2Block, flag_names, has_uf2_magic};
pub use constants::*;
