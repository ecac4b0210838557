//! # vessel-core
//!
//! Linux isolation primitives for the Vessel runtime: the cgroup v2
//! resource controller, the clone-based namespace launcher, the virtual
//! network subsystem (bridge, veth pairs, address allocation, NAT and
//! port-forwarding rules), and the filesystem surface (overlay and bind
//! mounts).

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
pub mod network;
