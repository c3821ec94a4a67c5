// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composition root for the `ratelane` binary.

pub mod runtime;
pub mod shutdown;
