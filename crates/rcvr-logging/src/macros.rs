//! ---
//! rcvr_section: "03-persistence-logging"
//! rcvr_subsection: "module"
//! rcvr_type: "source"
//! rcvr_scope: "code"
//! rcvr_description: "Structured logging adapters for incident lifecycle events."
//! rcvr_version: "v0.0.0-prealpha"
//! rcvr_owner: "tbd"
//! ---
//! Logging macros that stamp every event with the procedure, incident and
//! health check fields of a [`LogContext`](crate::LogContext). Extra
//! `tracing` fields may precede the format string.

/// Shared expansion behind the level-specific macros.
#[doc(hidden)]
#[macro_export]
macro_rules! __rcvr_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext<'_> = &$ctx;
        $crate::__tracing::event!(
            $level,
            procedure = ctx.procedure.unwrap_or(""),
            incident = ctx.incident.unwrap_or(""),
            check = ctx.check.unwrap_or(""),
            $($arg)+
        );
    }};
}

/// Emit an informational log enriched with recovery context.
#[macro_export]
macro_rules! rcvr_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with recovery context.
#[macro_export]
macro_rules! rcvr_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with recovery context.
#[macro_export]
macro_rules! rcvr_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with recovery context.
#[macro_export]
macro_rules! rcvr_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__rcvr_event!($crate::__tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}
