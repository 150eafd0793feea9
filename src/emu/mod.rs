//! Register-level device models that stand in for the real drivers.

mod aclint;
mod devops_impl;
mod plic;
mod uartlite;

pub use aclint::{EmuMswi, EmuMtimer};
pub use plic::EmuPlic;
pub use uartlite::EmuUartLite;
