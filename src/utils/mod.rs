//! Common utilities for ezadmin

pub mod backup;
