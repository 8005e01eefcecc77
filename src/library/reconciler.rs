//! Merges categories that share the exact same name.
//!
//! For every group of same-named categories the lowest id survives. Each
//! other member has its media items re-pointed to the survivor and is then
//! deleted, one transaction per merged pair. Legacy category text on media
//! items is left untouched.

use super::library_store::CategoryStore;
use super::models::{DuplicateGroup, ReconcileReport};
use crate::server::metrics;
use anyhow::{anyhow, Result};
use tracing::{debug, error, info};

#[derive(Default)]
struct GroupOutcome {
    removed: usize,
    relinked: usize,
    skipped: usize,
}

fn merge_group<S: CategoryStore + ?Sized>(store: &S, group: &DuplicateGroup) -> Result<GroupOutcome> {
    let survivor = group
        .survivor()
        .ok_or_else(|| anyhow!("Duplicate group \"{}\" is empty", group.name))?;
    let mut outcome = GroupOutcome::default();
    for duplicate in group.duplicates() {
        match store.merge_category_into(&group.name, *duplicate, survivor)? {
            Some(moved) => {
                debug!(
                    "Merged category {} into {} (\"{}\"), moved {} media items",
                    duplicate, survivor, group.name, moved
                );
                outcome.removed += 1;
                outcome.relinked += moved;
            }
            None => {
                debug!(
                    "Categories {} and {} are no longer both named \"{}\", skipping",
                    duplicate, survivor, group.name
                );
                outcome.skipped += 1;
            }
        }
    }
    Ok(outcome)
}

/// Runs a reconciliation pass and reports what it did. Failures are logged
/// per group and counted, never returned.
pub fn reconcile_category_duplicates_with_report<S: CategoryStore + ?Sized>(
    store: &S,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let groups = match store.find_duplicate_category_groups() {
        Ok(groups) => groups,
        Err(err) => {
            error!("Failed to scan categories for duplicates: {:#}", err);
            return report;
        }
    };
    report.groups_found = groups.len();
    if groups.is_empty() {
        return report;
    }

    for group in &groups {
        match merge_group(store, group) {
            Ok(outcome) => {
                report.removed_duplicates += outcome.removed;
                report.relinked_items += outcome.relinked;
                report.skipped_pairs += outcome.skipped;
            }
            Err(err) => {
                report.failed_groups += 1;
                error!(
                    "Failed to reconcile duplicate categories named \"{}\" ({:?}): {:#}",
                    group.name, group.ids, err
                );
            }
        }
    }

    metrics::record_categories_merged(report.removed_duplicates);
    info!(
        "Category reconciliation: {} duplicate groups, {} categories removed, {} media items re-linked, {} pairs skipped, {} groups failed",
        report.groups_found,
        report.removed_duplicates,
        report.relinked_items,
        report.skipped_pairs,
        report.failed_groups
    );
    report
}

/// Merges every group of same-named categories into its lowest id.
/// Idempotent, and a no-op when there are no duplicates.
pub fn reconcile_category_duplicates<S: CategoryStore + ?Sized>(store: &S) {
    reconcile_category_duplicates_with_report(store);
}
