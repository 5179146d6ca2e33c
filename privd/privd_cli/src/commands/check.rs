//! Check commands.

use anyhow::{Context, Result};
use privd_policy::{AdminCaller, PolicyResult, PrivilegeService, Query};
use serde::Serialize;

use super::print_json;

#[derive(Serialize)]
struct CheckOutput<'a> {
    code: i32,
    result: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result_extra: Option<&'a str>,
}

impl<'a> From<&'a PolicyResult> for CheckOutput<'a> {
    fn from(result: &'a PolicyResult) -> Self {
        Self {
            code: result.kind.code(),
            result: result.kind.name(),
            result_extra: result.extra.as_deref(),
        }
    }
}

/// Answer a check the way a client would see it.
pub(crate) fn check(
    service: &PrivilegeService,
    client: &str,
    session: &str,
    user: &str,
    privilege: &str,
    json: bool,
) -> Result<()> {
    let query = Query::new(client, session, user, privilege);
    let decision = service
        .check(&query)
        .with_context(|| format!("checking {}", query))?;

    let result = PolicyResult::new(decision.verdict.into(), decision.extra.clone());
    if json {
        print_json(&CheckOutput::from(&result))
    } else {
        println!("{}", decision);
        Ok(())
    }
}

/// Resolve from any bucket without touching the cache.
pub(crate) fn admin_check(
    service: &PrivilegeService,
    bucket: &str,
    recursive: bool,
    client: &str,
    user: &str,
    privilege: &str,
    json: bool,
) -> Result<()> {
    let result = service
        .admin_check(
            &AdminCaller::Trusted,
            bucket,
            recursive,
            client,
            user,
            privilege,
        )
        .with_context(|| format!("checking from bucket '{}'", bucket))?;

    if json {
        print_json(&CheckOutput::from(&result))
    } else {
        println!("{}", result);
        Ok(())
    }
}
