//! Router Module Index
//!
//! Splits the routing table by audience. Access itself is decided by the route table in
//! `access`, applied as one middleware over the merged router; these modules only group
//! the endpoints each role owns.

/// Login, logout, the post-login dispatcher and the health probe.
pub mod public;

/// Read-only views for the STUDENT role, mounted under `/student`.
pub mod student;

/// Dashboard and directory CRUD for the TEACHER role, mounted under `/teacher`.
pub mod teacher;
