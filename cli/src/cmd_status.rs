// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, sync::Arc};

use clap::{ArgMatches, Command, arg};
use colored::Colorize;
use davsync_core::{Config, LocalDb};

#[derive(Debug, Clone, Default)]
pub struct CmdStatus {
    pub account: Option<String>,
}

impl CmdStatus {
    pub const NAME: &str = "status";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Show the synchronized collections and their pending local changes")
            .arg(arg!(-a --account <ACCOUNT> "Only show this account"))
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            account: matches.get_one::<String>("account").cloned(),
        }
    }

    pub async fn run(self, _config: &Config, store: Arc<LocalDb>) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "showing status...");
        let collections: Vec<_> = store
            .all_collections()
            .await?
            .into_iter()
            .filter(|c| self.account.as_ref().is_none_or(|a| *a == c.account))
            .collect();

        if collections.is_empty() {
            println!("No collections synchronized yet");
            return Ok(());
        }

        let mut account = None;
        for collection in collections {
            if account.as_ref() != Some(&collection.account) {
                println!("{} {}", "Account".bold(), collection.account.cyan());
                account = Some(collection.account.clone());
            }

            let pending = store.pending(collection.id).await?;
            let state = match (collection.ctag.is_some(), pending.dirty + pending.deleted) {
                (_, n) if n > 0 => format!("{n} pending").yellow(),
                (true, _) => "synced".green(),
                (false, _) => "not synced".yellow(),
            };
            println!(
                "  {:<8} {} {} {}",
                collection.kind.to_string(),
                collection.display_name.bold(),
                collection.url.dimmed(),
                state
            );
        }
        Ok(())
    }
}
