//! # hostelwatch-server
//!
//! HTTP backend for the hostelwatch geofence attendance system.
//!
//! This library provides the API handlers, geodesic distance, and state
//! management used by the `hostelwatch-server` binary.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod geo;
pub mod state;
