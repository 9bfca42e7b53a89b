//! Policy assembler: groups classified pages per policy, resolves each policy
//! against the reference dataset and decides routing and encryption.

use crate::models::{ReferenceDataset, ReferenceRecord};
use crate::services::classifier::PageClassification;
use crate::types::{EncryptionDirective, MatchRule, PolicyGroup, PolicyToken, RoutingOutcome};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Characters ignored by the separator-insensitive rule.
const SEPARATORS: &[char] = &['/', '-', '\\', ' '];

const RULES: [MatchRule; 3] = [
    MatchRule::Exact,
    MatchRule::SeparatorInsensitive,
    MatchRule::LeadingZeroInsensitive,
];

/// Token -> pages, insertion-ordered by first occurrence. Tokenless pages
/// contribute nothing.
pub fn group_pages(pages: &[PageClassification]) -> Vec<(PolicyToken, Vec<usize>)> {
    let mut groups: Vec<(PolicyToken, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<PolicyToken, usize> = HashMap::new();
    for page in pages {
        let Some(token) = &page.token else {
            continue;
        };
        match positions.get(token) {
            Some(&pos) => groups[pos].1.push(page.index),
            None => {
                positions.insert(token.clone(), groups.len());
                groups.push((token.clone(), vec![page.index]));
            }
        }
    }
    groups
}

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| !SEPARATORS.contains(c)).collect()
}

/// Whether a spreadsheet identifier and a token are equal under `rule`.
/// Leading zeros are stripped from both sides, so all-zero values are equal.
pub fn identifiers_match(rule: MatchRule, reference: &str, token: &str) -> bool {
    match rule {
        MatchRule::Exact => reference == token,
        MatchRule::SeparatorInsensitive => strip_separators(reference) == strip_separators(token),
        MatchRule::LeadingZeroInsensitive => {
            reference.trim_start_matches('0') == token.trim_start_matches('0')
        }
    }
}

/// Find the record for a token. Rows are scanned in sheet order and the first
/// row matching under any rule wins; the rule reported is the first that held.
pub fn resolve_record<'a>(
    token: &PolicyToken,
    dataset: &'a ReferenceDataset,
) -> Option<(&'a ReferenceRecord, MatchRule)> {
    dataset.records().iter().find_map(|r| {
        RULES
            .iter()
            .find(|&&rule| identifiers_match(rule, &r.policy_id, token.as_str()))
            .map(|&rule| (r, rule))
    })
}

/// WithEmail only for a resolved record with a plausible address.
pub fn decide_routing(record: Option<&ReferenceRecord>) -> RoutingOutcome {
    match record.and_then(|r| r.deliverable_email()) {
        Some(_) => RoutingOutcome::WithEmail,
        None => RoutingOutcome::WithoutEmail,
    }
}

pub fn encryption_directive(
    routing: RoutingOutcome,
    record: Option<&ReferenceRecord>,
) -> EncryptionDirective {
    if routing != RoutingOutcome::WithEmail {
        return EncryptionDirective::NotApplicable;
    }
    match record.and_then(|r| r.secret_key.clone()) {
        Some(password) => EncryptionDirective::Encrypt { password },
        None => EncryptionDirective::MissingKey,
    }
}

/// Build the final set of policy groups for a run.
pub fn assemble(pages: &[PageClassification], dataset: &ReferenceDataset) -> Vec<PolicyGroup> {
    group_pages(pages)
        .into_iter()
        .map(|(token, pages)| {
            let resolved = resolve_record(&token, dataset);
            let record = resolved.map(|(r, _)| r);
            let routing = decide_routing(record);
            let encryption = encryption_directive(routing, record);
            match resolved {
                Some((r, rule)) => {
                    debug!(policy = %token, reference = %r.policy_id, rule = ?rule, routing = routing.label(), "policy resolved");
                }
                None => debug!(policy = %token, "no reference record, routing to print"),
            }
            if encryption == EncryptionDirective::MissingKey {
                warn!(policy = %token, "policy has email but no key for password protection");
            }
            PolicyGroup {
                token,
                pages,
                record: record.cloned(),
                matched_by: resolved.map(|(_, rule)| rule),
                routing,
                encryption,
            }
        })
        .collect()
}
