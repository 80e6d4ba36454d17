// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface of davsync.

mod cli;
mod cmd_status;
mod cmd_sync;
mod config;

pub use crate::cli::{Cli, Commands, run};
pub use crate::cmd_status::CmdStatus;
pub use crate::cmd_sync::{ArgCollectionType, CmdSync};
