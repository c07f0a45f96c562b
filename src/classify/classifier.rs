use super::rules::RuleTable;
use crate::core::{Category, Classification, EvidenceBundle, UnknownReason};
use crate::error::Result;

/// Staged, priority-ordered decision procedure over an evidence bundle.
///
/// Stages run top to bottom and the first one that decides wins:
/// token pattern, unmatched token, resolved index, unresolved index,
/// descriptor markers, unrecognized descriptor, no descriptor.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: RuleTable,
}

impl Classifier {
    pub fn new(rules: RuleTable) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    /// Skips validation, for exercising paths a valid table cannot reach.
    #[cfg(test)]
    pub(crate) fn unchecked(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn classify(&self, evidence: &EvidenceBundle) -> Classification {
        if let Some(outcome) = self.token_stage(evidence) {
            return outcome;
        }
        if let Some(outcome) = Self::index_stage(evidence) {
            return outcome;
        }
        self.descriptor_stage(evidence)
    }

    fn token_stage(&self, evidence: &EvidenceBundle) -> Option<Classification> {
        if !evidence.is_token {
            return None;
        }
        let symbol = evidence.token_symbol.as_deref().unwrap_or_default();
        let name = evidence.token_name.as_deref().unwrap_or_default();

        Some(match self.rules.match_token(symbol) {
            Some(rule) => Classification::Identified {
                project: rule.project_for(symbol),
                category: rule.category,
                notes: format!("Auto-identified {symbol} token"),
            },
            None => Classification::Unknown {
                reason: UnknownReason::TokenUnknownProject,
                notes: format!("ICRC-1 token {name} ({symbol}) - project not identified"),
            },
        })
    }

    fn index_stage(evidence: &EvidenceBundle) -> Option<Classification> {
        let ledger = evidence.ledger_reference.as_ref()?;

        Some(match evidence.ledger_symbol() {
            Some(symbol) if !symbol.is_empty() => Classification::Identified {
                project: format!("{symbol} Index"),
                category: Category::NnsInfrastructure,
                notes: format!("Index for {symbol} ledger {ledger}"),
            },
            _ => Classification::Unknown {
                reason: UnknownReason::IndexUnresolved,
                notes: format!("Index canister for {ledger} but could not identify token"),
            },
        })
    }

    fn descriptor_stage(&self, evidence: &EvidenceBundle) -> Classification {
        let text = match (&evidence.descriptor_text, evidence.descriptor_available) {
            (Some(text), true) => text,
            _ => {
                return Classification::Unknown {
                    reason: UnknownReason::NoDescriptor,
                    notes: "No descriptor, token or index evidence - needs manual research".into(),
                }
            }
        };

        match self.rules.match_descriptor(text) {
            Some((rule, hits)) => Classification::Identified {
                project: rule.project.clone(),
                category: rule.category,
                notes: if rule.notes.is_empty() {
                    format!("Descriptor markers: {}", hits.join(", "))
                } else {
                    format!("{} (markers: {})", rule.notes, hits.join(", "))
                },
            },
            None => Classification::Unknown {
                reason: UnknownReason::DescriptorUnrecognized,
                notes: "Descriptor matched no rule - needs manual research".into(),
            },
        }
    }
}
