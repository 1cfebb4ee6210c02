// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::Serialize;

/// Error type returned by drive requests.
#[derive(Debug, Clone, Serialize)]
pub struct DriveError(pub String);

pub type DriveResult<T> = Result<T, DriveError>;

impl fmt::Display for DriveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DriveError {
    fn from(value: String) -> Self {
        DriveError(value)
    }
}

impl From<&str> for DriveError {
    fn from(value: &str) -> Self {
        DriveError(value.to_string())
    }
}
