// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Catch boundaries for application code.

use core::any::Any;
use core::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Run `f`, reporting a panic through `log::error!` instead of unwinding.
///
/// `context` describes what was being done, such as "while routing a pointer event".
/// Returns `None` if `f` panicked.
pub(crate) fn guard<R>(context: impl fmt::Display, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            log::error!(
                "Exception caught {context}: {}",
                panic_message(payload.as_ref())
            );
            None
        }
    }
}
