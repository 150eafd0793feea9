//! Board descriptors.

pub mod zerocore_dual;
