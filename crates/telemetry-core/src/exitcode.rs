//! Distinct process exit codes for the fatal error kinds of §6/§7.
//!
//! Both binaries (`telemetry-agent`, `telemetry-broker`) map a fatal
//! [`crate::error::CoreError`] to one of these before exiting non-zero.

pub const OK: i32 = 0;
pub const CONFIG_INVALID: i32 = 10;
pub const KEY_LOAD_FAILURE: i32 = 11;
pub const STORE_OPEN_FAILURE: i32 = 12;
pub const TLS_MATERIAL_FAILURE: i32 = 13;
/// SIGHUP restart-requested exit code for `telemetry-agent` (§4.3 Startup/shutdown).
pub const RESTART_REQUESTED: i32 = 20;

pub fn for_core_error(err: &crate::error::CoreError) -> i32 {
    use crate::error::CoreError::*;
    match err {
        ConfigInvalid(_) => CONFIG_INVALID,
        KeyLoadFailure(_) => KEY_LOAD_FAILURE,
        StoreOpenFailure(_) => STORE_OPEN_FAILURE,
        TlsMaterialFailure(_) => TLS_MATERIAL_FAILURE,
    }
}
