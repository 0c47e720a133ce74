//! Access-rule compilation and matching.

use std::collections::HashSet;

use regex::Regex;

use crate::limiter::LimiterError;
use crate::panel::Rules;

/// Rules compiled for matching on the hot path.
#[derive(Debug, Default)]
pub struct CompiledRules {
    destinations: Vec<Regex>,
    protocols: HashSet<String>,
}

impl CompiledRules {
    /// Compile a rule set, failing on the first invalid pattern.
    pub fn compile(rules: &Rules) -> Result<Self, LimiterError> {
        let destinations = rules
            .regexp
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| LimiterError::InvalidRule {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let protocols = rules
            .protocol
            .iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            destinations,
            protocols,
        })
    }

    pub fn is_destination_blocked(&self, destination: &str) -> bool {
        self.destinations.iter().any(|re| re.is_match(destination))
    }

    pub fn is_protocol_blocked(&self, protocol: &str) -> bool {
        self.protocols.contains(&protocol.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.destinations.len() + self.protocols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
