//! Operation bracketing macros
//!
//! Each public macro expands to one `tracing` event carrying `component`
//! (the calling module), `op` and `event`. Extra fields use ordinary
//! `tracing` field syntax and are appended after the canonical ones.

#[doc(hidden)]
#[macro_export]
macro_rules! __log_op_event {
    ($level:ident, $op:expr, $event:expr; $($field:tt)*) => {
        tracing::$level!(
            component = module_path!(),
            op = $op,
            event = $event,
            $($field)*
        )
    };
}

/// Mark the start of an operation
///
/// ```
/// # use sylva_core::log_op_start;
/// log_op_start!("diff_trees");
/// log_op_start!("diff_trees", node_type = "item");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::core_types::schema::EVENT_START;
            $($($field)*)?
        )
    };
}

/// Mark the successful end of an operation
///
/// ```
/// # use sylva_core::log_op_end;
/// log_op_end!("diff_trees", duration_ms = 3);
/// log_op_end!("path_recompute", duration_ms = 1, added = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {
        $crate::__log_op_event!(
            info,
            $op,
            $crate::core_types::schema::EVENT_END;
            duration_ms = $duration,
            $($($field)*)?
        )
    };
}

/// Mark the failed end of an operation with the error's kind and code
///
/// ```
/// # use sylva_core::{log_op_error, errors::SylvaError};
/// let err = SylvaError::InvalidOperation { reason: "self-parenting".to_string() };
/// log_op_error!("add_child", err, duration_ms = 0);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)*)?) => {{
        let ex_err: $crate::errors::ExError = $err.into();
        $crate::__log_op_event!(
            error,
            $op,
            $crate::core_types::schema::EVENT_END_ERROR;
            duration_ms = $duration,
            err_kind = ?ex_err.kind(),
            err_code = ex_err.code(),
            $($($field)*)?
        )
    }};
}
