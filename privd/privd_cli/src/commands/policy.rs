//! Policy store commands.

use anyhow::{Context, Result};
use privd_policy::{AdminCaller, PolicyKeyFilter, PolicyRecord, PrivilegeService};
use serde::Serialize;

use super::print_json;

#[derive(Serialize)]
struct Description {
    code: i32,
    name: &'static str,
}

/// Print store statistics after the batches were applied.
pub(crate) fn apply(service: &PrivilegeService, json: bool) -> Result<()> {
    let stats = service.stats();
    if json {
        return print_json(&stats);
    }

    println!(
        "{} buckets, {} policies (generation {})",
        stats.buckets, stats.policies, stats.generation
    );
    Ok(())
}

/// Print the records of a bucket selected by a filter.
pub(crate) fn list(
    service: &PrivilegeService,
    bucket: &str,
    client: &str,
    user: &str,
    privilege: &str,
    json: bool,
) -> Result<()> {
    let filter = PolicyKeyFilter::parse(client, user, privilege).context("parsing filter")?;
    let records = service
        .list_policies(&AdminCaller::Trusted, bucket, &filter)
        .with_context(|| format!("listing bucket '{}'", bucket))?;

    if json {
        let records: Vec<&PolicyRecord> = records.iter().map(|record| record.as_ref()).collect();
        return print_json(&records);
    }

    for record in records {
        println!("{}", record);
    }
    Ok(())
}

/// Print the supported result types.
pub(crate) fn describe(service: &PrivilegeService, json: bool) -> Result<()> {
    let descriptions: Vec<Description> = service
        .list_descriptions()
        .into_iter()
        .map(|(code, name)| Description { code, name })
        .collect();

    if json {
        return print_json(&descriptions);
    }

    for description in descriptions {
        println!("{}\t{}", description.code, description.name);
    }
    Ok(())
}
