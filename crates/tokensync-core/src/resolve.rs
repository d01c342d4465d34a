//! Bounded fixpoint resolution of deferred aliases.
//!
//! Each round resolves every alias whose target is already materialized and
//! makes those aliases visible to the following round, so a chain of length
//! `d` needs `d` rounds. The number of rounds is capped at the initial number
//! of deferred aliases; whatever survives the cap points at a missing token or
//! sits on a cycle.

use crate::{AliasToken, Diagnostic, ItemError, Severity, TokenType};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAlias {
    pub key: String,
    pub target_key: String,
    pub declared_type: Option<TokenType>,
    /// Type of the concrete token at the end of the chain.
    pub resolved_type: TokenType,
    /// 1-based round in which the alias was materialized.
    pub round: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AliasResolution {
    /// Materialization order; every target precedes the aliases pointing at it.
    pub resolved: Vec<ResolvedAlias>,
    pub unresolved: Vec<AliasToken>,
    pub rounds: usize,
}

impl AliasResolution {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = self
            .unresolved
            .iter()
            .map(|alias| {
                ItemError::AliasTargetUnresolved {
                    target: alias.target_key.clone(),
                }
                .to_diagnostic()
                .with_name(alias.key.clone())
            })
            .collect();
        diagnostics.extend(self.resolved.iter().filter_map(ResolvedAlias::type_mismatch));
        diagnostics
    }
}

impl ResolvedAlias {
    /// Warning when the alias's own `$type` disagrees with what it resolved to.
    pub fn type_mismatch(&self) -> Option<Diagnostic> {
        let declared = self.declared_type?;
        if declared.resolved_type() == self.resolved_type.resolved_type() {
            return None;
        }
        Some(
            Diagnostic::new(
                "alias_type_mismatch",
                Severity::Warning,
                format!(
                    "declared {:?} but target '{}' is {:?}",
                    declared, self.target_key, self.resolved_type
                ),
            )
            .with_name(self.key.clone()),
        )
    }
}

/// Resolves `deferred` against the keys of `materialized`.
///
/// `materialized` maps token keys to their concrete type; it is not modified.
pub fn resolve_aliases(
    deferred: Vec<AliasToken>,
    materialized: &BTreeMap<String, TokenType>,
) -> AliasResolution {
    let max_rounds = deferred.len();
    let mut known = materialized.clone();
    let mut worklist = deferred;
    let mut resolution = AliasResolution::default();

    while !worklist.is_empty() && resolution.rounds < max_rounds {
        resolution.rounds += 1;
        let round = resolution.rounds;

        let (ready, waiting): (Vec<_>, Vec<_>) = worklist
            .into_iter()
            .partition(|alias| known.contains_key(&alias.target_key));
        worklist = waiting;

        if ready.is_empty() {
            break;
        }

        let promoted: Vec<ResolvedAlias> = ready
            .into_iter()
            .filter_map(|alias| {
                let resolved_type = *known.get(&alias.target_key)?;
                Some(ResolvedAlias {
                    key: alias.key,
                    target_key: alias.target_key,
                    declared_type: alias.declared_type,
                    resolved_type,
                    round,
                })
            })
            .collect();

        for alias in promoted {
            known.entry(alias.key.clone()).or_insert(alias.resolved_type);
            resolution.resolved.push(alias);
        }
    }

    if !worklist.is_empty() {
        tracing::debug!(
            unresolved = worklist.len(),
            rounds = resolution.rounds,
            "alias resolution stopped with unresolved aliases"
        );
    }
    resolution.unresolved = worklist;
    resolution
}
