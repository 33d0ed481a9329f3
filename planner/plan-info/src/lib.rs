//! # Planner Configuration
//!
//! Build-wide constants shared by every pass of the boot image planner. This
//! crate is the single place where the fixed parts of the image contract live,
//! so the region fitter, the frontier accountant and the orchestrator cannot
//! drift apart.
//!
//! ## Modules
//!
//! ### Memory ([`memory`])
//! * **Region unit**: the granularity of every region bitmap
//! * **Process header**: words reserved at the start of each process image
//!   before the entry-point table
//! * **Interrupt flags**: shape of the kernel's vector flag section
//!
//! ### Capabilities ([`caps`])
//! * **Reserved slots**: default capability frontiers for the kernel,
//!   runtime and process scopes
//!
//! All values are checked at compile time; a violated constraint fails the
//! build of this crate rather than producing a broken image.

#![cfg_attr(not(test), no_std)]

pub mod caps;
pub mod memory;
