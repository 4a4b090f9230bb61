#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod at;
pub mod auth;
pub mod config;
pub mod identity;
pub mod modem;
pub mod tick;

#[cfg(test)]
mod testing;
