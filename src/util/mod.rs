//! Small numeric helpers shared by the allocator and the transfer code.

pub mod layout;
pub mod size;
