//! Process-wide SQL echo toggle.
//!
//! When enabled, builders log every statement they render at `info` level
//! under the `sqlentity::sql` target. The toggle is purely observational:
//! it never changes what a builder returns.
//!
//! # Example
//!
//! ```
//! use sqlentity_core::echo;
//!
//! echo::set_echo_sql(true);
//! assert!(echo::echo_sql_enabled());
//! echo::set_echo_sql(false);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

use crate::value::Value;

static ECHO_SQL: AtomicBool = AtomicBool::new(false);

/// Turn SQL echo on or off for the whole process.
pub fn set_echo_sql(enabled: bool) {
    ECHO_SQL.store(enabled, Ordering::Relaxed);
}

/// Whether SQL echo is on.
pub fn echo_sql_enabled() -> bool {
    ECHO_SQL.load(Ordering::Relaxed)
}

/// Log a rendered statement if echo is on.
pub fn echo(sql: &str, params: &[Value]) {
    if echo_sql_enabled() {
        tracing::info!(target: "sqlentity::sql", params = params.len(), "{}", sql);
    }
}
