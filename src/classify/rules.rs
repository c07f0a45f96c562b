//! Classification rule tables.
//!
//! Consolidates the token symbol patterns and descriptor marker sets into
//! one immutable, ordered table. Order is priority: the first matching rule
//! wins, and ties between descriptor rules are settled by position alone.

use crate::core::Category;
use crate::error::{ResearchError, Result};
use serde::{Deserialize, Serialize};

/// Default number of distinct markers a descriptor rule needs.
pub const DEFAULT_MIN_MARKERS: usize = 2;

/// Placeholder replaced by the observed token symbol in project names.
pub const SYMBOL_PLACEHOLDER: &str = "{symbol}";

/// Where a token symbol pattern must appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolMatch {
    Suffix,
    Prefix,
}

/// Maps a token symbol pattern to a project name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRule {
    pub kind: SymbolMatch,
    pub pattern: String,
    /// Project name; `{symbol}` is replaced with the observed symbol
    pub project: String,
    pub category: Category,
}

impl TokenRule {
    fn new(kind: SymbolMatch, pattern: &str, project: &str) -> Self {
        Self {
            kind,
            pattern: pattern.to_string(),
            project: project.to_string(),
            category: Category::Token,
        }
    }

    pub fn matches(&self, symbol: &str) -> bool {
        match self.kind {
            SymbolMatch::Suffix => symbol.ends_with(&self.pattern),
            SymbolMatch::Prefix => symbol.starts_with(&self.pattern),
        }
    }

    pub fn project_for(&self, symbol: &str) -> String {
        self.project.replace(SYMBOL_PLACEHOLDER, symbol)
    }
}

/// Identifies a canister type from literal markers in its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRule {
    pub name: String,
    pub markers: Vec<String>,
    pub project: String,
    pub category: Category,
    #[serde(default)]
    pub notes: String,
}

impl DescriptorRule {
    fn new(name: &str, markers: &[&str], project: &str, category: Category, notes: &str) -> Self {
        Self {
            name: name.to_string(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
            project: project.to_string(),
            category,
            notes: notes.to_string(),
        }
    }

    /// Markers of this rule found in `text`, in declaration order.
    pub fn matched_markers<'a>(&'a self, text: &str) -> Vec<&'a str> {
        let hay = text.as_bytes();
        self.markers
            .iter()
            .filter(|m| memchr::memmem::find(hay, m.as_bytes()).is_some())
            .map(String::as_str)
            .collect()
    }
}

/// Ordered, immutable classification rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    /// Distinct markers a descriptor rule needs before it fires
    pub min_markers: usize,
    pub token_rules: Vec<TokenRule>,
    pub descriptor_rules: Vec<DescriptorRule>,
}

impl Default for RuleTable {
    fn default() -> Self {
        use Category::*;

        Self {
            min_markers: DEFAULT_MIN_MARKERS,
            // Suffix rules precede the prefix rule: `ck•ODIN` is an ODIN.fun token.
            token_rules: vec![
                TokenRule::new(SymbolMatch::Suffix, "•ODIN", "ODIN.fun"),
                TokenRule::new(SymbolMatch::Suffix, ".OT", "Ordi Trade"),
                TokenRule::new(SymbolMatch::Prefix, "ck", "{symbol} Ledger"),
            ],
            descriptor_rules: vec![
                DescriptorRule::new(
                    "asset_canister",
                    &["CreateAssetArguments", "SetAssetContentArguments", "ChunkId", "BatchId"],
                    "Asset Canister",
                    Infrastructure,
                    "Frontend asset canister - website hosting",
                ),
                DescriptorRule::new(
                    "orbit_station",
                    &["AssetSymbol", "NetworkId", "UUID", "RequestPolicy"],
                    "Orbit Station",
                    Infrastructure,
                    "Orbit multi-sig wallet/station",
                ),
                DescriptorRule::new(
                    "icrc1_archive",
                    &[
                        "GetTransactionsRequest",
                        "GetTransactionsResponse",
                        "ArchivedTransactionResponse",
                        "QueryArchiveFn",
                    ],
                    "ICRC-1 Archive",
                    Infrastructure,
                    "ICRC-1 token ledger archive",
                ),
                DescriptorRule::new(
                    "icpswap",
                    &["SwapArgs", "addLiquidity", "removeLiquidity", "quote", "token0", "token1"],
                    "ICPSwap",
                    Defi,
                    "ICPSwap AMM pool",
                ),
                DescriptorRule::new(
                    "sonic",
                    &["addLiquidity", "swap", "deposit", "withdraw", "getTokenBalance"],
                    "Sonic",
                    Defi,
                    "Sonic DEX pool or component",
                ),
                DescriptorRule::new(
                    "nft_dip721",
                    &["TokenMetadata", "ownerOf", "transferFrom", "balanceOf", "totalSupply", "dip721"],
                    "NFT Collection",
                    Nft,
                    "DIP-721 NFT collection",
                ),
                DescriptorRule::new(
                    "http_gateway",
                    &["http_request", "HttpRequest", "HttpResponse", "streaming_callback"],
                    "HTTP Gateway",
                    Infrastructure,
                    "HTTP gateway canister",
                ),
                DescriptorRule::new(
                    "omnity",
                    &["hub_principal", "GenerateTicketReq", "omnity_chain_id"],
                    "Omnity",
                    Defi,
                    "Omnity cross-chain hub component",
                ),
                DescriptorRule::new(
                    "omnibtc",
                    &["customs", "indexer", "RuneBalance"],
                    "OmniBTC",
                    Defi,
                    "OmniBTC customs or indexer",
                ),
                DescriptorRule::new(
                    "evm_rpc",
                    &["EthMainnetService", "EthSepoliaService", "RpcServices"],
                    "EVM RPC",
                    Infrastructure,
                    "EVM RPC canister",
                ),
                DescriptorRule::new(
                    "runes_etching",
                    &["EtchingArgs", "rune_name", "etching"],
                    "Bitcoin Runes Etching",
                    Infrastructure,
                    "Bitcoin runes etching service",
                ),
            ],
        }
    }
}

impl RuleTable {
    /// Reject tables that could never fire or would fire on nothing.
    pub fn validate(&self) -> Result<()> {
        if self.min_markers == 0 {
            return Err(ResearchError::Config(
                "rules.min_markers must be at least 1".into(),
            ));
        }
        for rule in &self.token_rules {
            if rule.pattern.is_empty() || rule.project.trim().is_empty() {
                return Err(ResearchError::Config(format!(
                    "token rule {:?} needs a pattern and a project",
                    rule.pattern
                )));
            }
        }
        for rule in &self.descriptor_rules {
            if rule.name.trim().is_empty() || rule.project.trim().is_empty() {
                return Err(ResearchError::Config(format!(
                    "descriptor rule {:?} needs a name and a project",
                    rule.name
                )));
            }
            if rule.markers.iter().any(String::is_empty) || rule.markers.len() < self.min_markers
            {
                return Err(ResearchError::Config(format!(
                    "descriptor rule '{}' needs at least {} non-empty markers",
                    rule.name, self.min_markers
                )));
            }
        }
        Ok(())
    }

    /// First token rule matching `symbol`.
    pub fn match_token(&self, symbol: &str) -> Option<&TokenRule> {
        self.token_rules.iter().find(|r| r.matches(symbol))
    }

    /// First descriptor rule reaching the marker threshold, with its matches.
    pub fn match_descriptor<'a>(&'a self, text: &str) -> Option<(&'a DescriptorRule, Vec<&'a str>)> {
        self.descriptor_rules.iter().find_map(|rule| {
            let hits = rule.matched_markers(text);
            (hits.len() >= self.min_markers).then_some((rule, hits))
        })
    }
}
