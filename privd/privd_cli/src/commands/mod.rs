//! Command implementations.

mod check;
mod policy;

use anyhow::Result;
use privd_policy::PrivilegeService;
use serde::Serialize;

use crate::Commands;

/// Run one command against an initialized service.
pub(crate) fn run(service: &PrivilegeService, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Apply => policy::apply(service, json),
        Commands::Check {
            client,
            user,
            privilege,
            session,
        } => check::check(service, &client, &session, &user, &privilege, json),
        Commands::AdminCheck {
            bucket,
            no_recursive,
            client,
            user,
            privilege,
        } => check::admin_check(
            service,
            &bucket,
            !no_recursive,
            &client,
            &user,
            &privilege,
            json,
        ),
        Commands::List {
            bucket,
            client,
            user,
            privilege,
        } => policy::list(service, &bucket, &client, &user, &privilege, json),
        Commands::Describe => policy::describe(service, json),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
