//! Crate-wide error taxonomy.
//!
//! `UBTag` is deliberately *not* an error type: it is a value-level flag
//! processed by the rebuild loop in [`crate::expr`]. Only genuine
//! configuration mistakes and broken internal invariants reach here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OorgenError {
    #[error("{0}")]
    Config(String),

    #[error("invariant violation at {file}:{line} in {func}: {msg}")]
    Invariant {
        file: &'static str,
        line: u32,
        func: &'static str,
        msg: String,
    },
}

pub type Result<T> = std::result::Result<T, OorgenError>;

/// Raises an [`OorgenError::Invariant`] with the call site baked in,
/// mirroring the file/line/function/reason contract from this engine.
macro_rules! bail_invariant {
    ($($arg:tt)*) => {
        return Err($crate::error::OorgenError::Invariant {
            file: file!(),
            line: line!(),
            func: {
                fn f() {}
                fn type_name_of<T>(_: T) -> &'static str { std::any::type_name::<T>() }
                let name = type_name_of(f);
                name.strip_suffix("::f").unwrap_or(name)
            },
            msg: format!($($arg)*),
        })
    };
}

pub(crate) use bail_invariant;
