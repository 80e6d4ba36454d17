// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{collections::VecDeque, error::Error, sync::Arc};

use clap::{ArgAction, ArgMatches, Command, arg, value_parser};
use colored::Colorize;
use davsync_core::{
    AccountConfig, CancelHandle, CollectionFilter, CollectionType, Config, DavRemote,
    DefaultPolicy, LocalDb, PassResult, SyncPass,
};
use tokio::task::JoinHandle;

/// Collection type as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ArgCollectionType {
    Events,
    Tasks,
    Contacts,
}

impl From<ArgCollectionType> for CollectionType {
    fn from(value: ArgCollectionType) -> Self {
        match value {
            ArgCollectionType::Events => CollectionType::Events,
            ArgCollectionType::Tasks => CollectionType::Tasks,
            ArgCollectionType::Contacts => CollectionType::Contacts,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CmdSync {
    pub account: Option<String>,
    pub types: Vec<CollectionType>,
}

impl CmdSync {
    pub const NAME: &str = "sync";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Synchronize collections with the server")
            .arg(arg!(-a --account <ACCOUNT> "Only synchronize this account"))
            .arg(
                arg!(-t --"type" <TYPE> "Only synchronize collections of this type, repeatable")
                    .value_parser(value_parser!(ArgCollectionType))
                    .action(ArgAction::Append),
            )
    }

    pub fn from(matches: &ArgMatches) -> Self {
        let types = matches
            .get_many::<ArgCollectionType>("type")
            .map(|values| values.copied().map(CollectionType::from).collect())
            .unwrap_or_default();

        Self {
            account: matches.get_one::<String>("account").cloned(),
            types,
        }
    }

    pub async fn run(self, config: &Config, store: Arc<LocalDb>) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "synchronizing...");
        let accounts: Vec<&AccountConfig> = match &self.account {
            Some(name) => vec![
                config
                    .account(name)
                    .ok_or_else(|| format!("Unknown account: {name}"))?,
            ],
            None => config.accounts.iter().collect(),
        };
        if accounts.is_empty() {
            println!("No accounts configured");
            return Ok(());
        }

        let cancel = CancelHandle::default();
        let interrupted = CancelHandle::default();
        let signals = watch_interrupts(cancel.clone(), interrupted.clone());

        let mut incomplete = 0;
        for (i, account) in accounts.iter().enumerate() {
            if interrupted.is_cancelled() {
                incomplete += accounts.len() - i;
                break;
            }
            let synced =
                Self::sync_account(config, account, &self.types, store.clone(), &cancel, &interrupted)
                    .await;
            if !synced {
                incomplete += 1;
            }
        }
        signals.abort();

        match incomplete {
            0 => Ok(()),
            n => Err(format!("{n} account(s) were not synchronized completely").into()),
        }
    }

    /// Runs the passes of one account, returning whether all of them converged.
    async fn sync_account(
        config: &Config,
        account: &AccountConfig,
        types: &[CollectionType],
        store: Arc<LocalDb>,
        cancel: &CancelHandle,
        interrupted: &CancelHandle,
    ) -> bool {
        println!("{} {}", "Account".bold(), account.name.cyan());
        let remote = match DavRemote::new(account.server.clone(), config.sync.download_batch_size)
        {
            Ok(remote) => Arc::new(remote),
            Err(e) => {
                println!("  {} {e}", "Error:".red());
                return false;
            }
        };
        let policy = Arc::new(DefaultPolicy::new(&config.sync));
        let pass = SyncPass::new(remote, store, policy, config.sync.clone())
            .with_cancel_handle(cancel.clone());

        let mut queue = PassQueue::new(&account.types, types);
        let mut complete = true;
        while let Some(kind) = queue.next(interrupted) {
            let filter = CollectionFilter::new(kind)
                .exclude(account.exclude.iter().cloned())
                .force_read_only(account.read_only.iter().cloned());
            match pass.run_filtered(&account.name, filter).await {
                Ok(result) => {
                    print_result(&result);
                    complete &= result.is_success();
                    if result.cancelled {
                        break;
                    }
                    queue.follow(&result.follow_ups);
                }
                Err(e) => {
                    println!("  {} {} {e}", kind.to_string().bold(), "Error:".red());
                    complete = false;
                    if e.is_fatal() {
                        break;
                    }
                }
            }
        }

        complete && !queue.interrupted
    }
}

/// Listens for Ctrl-C for the whole command.
///
/// The first one cancels the running pass and stops every later one, the
/// second one exits at once.
fn watch_interrupts(cancel: CancelHandle, interrupted: CancelHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupted, finishing the running collections");
        interrupted.cancel();
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted again, exiting");
            std::process::exit(130);
        }
    })
}

/// Collection types still to synchronize for one account, in order.
#[derive(Debug)]
struct PassQueue {
    allowed: Vec<CollectionType>,
    queue: VecDeque<CollectionType>,
    done: Vec<CollectionType>,
    interrupted: bool,
}

impl PassQueue {
    fn new(account_types: &[CollectionType], requested: &[CollectionType]) -> Self {
        Self {
            allowed: account_types.to_vec(),
            queue: account_types
                .iter()
                .copied()
                .filter(|kind| requested.is_empty() || requested.contains(kind))
                .collect(),
            done: Vec::new(),
            interrupted: false,
        }
    }

    /// The next pass to run, `None` once the queue is empty or the user interrupted.
    fn next(&mut self, interrupted: &CancelHandle) -> Option<CollectionType> {
        if interrupted.is_cancelled() {
            self.interrupted = !self.queue.is_empty();
            return None;
        }
        let kind = self.queue.pop_front()?;
        self.done.push(kind);
        Some(kind)
    }

    /// Queues the follow-up passes the account synchronizes and that didn't run yet.
    fn follow(&mut self, follow_ups: &[CollectionType]) {
        for &follow_up in follow_ups {
            if self.allowed.contains(&follow_up)
                && !self.done.contains(&follow_up)
                && !self.queue.contains(&follow_up)
            {
                tracing::info!(kind = %follow_up, "queueing follow-up pass");
                self.queue.push_back(follow_up);
            }
        }
    }
}

fn print_result(result: &PassResult) {
    let status = match (result.is_success(), result.cancelled) {
        (true, _) => "ok".green(),
        (false, true) => "cancelled".yellow(),
        (false, false) => "incomplete".red(),
    };
    println!("  {} {}", result.kind.to_string().bold(), status);
    println!(
        "    collections: {} created, {} updated, {} deleted",
        result.created, result.updated, result.deleted
    );
    println!(
        "    items: {} pushed, {} pulled, {} purged",
        result.pushed, result.pulled, result.purged
    );
    if result.reverted > 0 {
        println!(
            "    {} {} local change(s) dropped in read-only collections",
            "Reverted:".yellow(),
            result.reverted
        );
    }
    if result.conflicts > 0 {
        println!(
            "    {} {} item(s) changed on both sides",
            "Conflicts:".yellow(),
            result.conflicts
        );
    }
    for failed in &result.failed_collections {
        println!("    {} {} {}", "Failed:".red(), failed.url, failed.reason.dimmed());
    }
    for failed in &result.failed_items {
        println!(
            "    {} {}{} {}",
            "Failed:".red(),
            failed.collection_url,
            failed.identifier,
            failed.reason.dimmed()
        );
    }
}
