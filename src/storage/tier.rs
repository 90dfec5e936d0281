use std::fmt;

use serde::{Deserialize, Serialize};

use super::StorageError;

/// One of the two storage locations for submission content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "prv")]
    Private,
    #[serde(rename = "pub")]
    Public,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Private => "prv",
            Tier::Public => "pub",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The CDN base URL serving each tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierUrls {
    pub private: String,
    pub public: String,
}

impl TierUrls {
    pub fn new(private: impl Into<String>, public: impl Into<String>) -> Self {
        Self {
            private: private.into(),
            public: public.into(),
        }
    }

    pub fn reference(&self, tier: Tier) -> &str {
        match tier {
            Tier::Private => &self.private,
            Tier::Public => &self.public,
        }
    }

    /// Which tier a stored CDN reference points at.
    ///
    /// Trailing slashes are not significant. A reference may carry a path
    /// below the base URL. When one base is nested under the other, the
    /// longer base wins.
    pub fn tier_from_reference(&self, cdn: &str) -> Result<Tier, StorageError> {
        self.split_reference(cdn).map(|(tier, _)| tier)
    }

    /// Point `cdn` at the `to` tier, keeping any path below the base URL.
    pub fn rebase(&self, cdn: &str, to: Tier) -> Result<String, StorageError> {
        let (_, rest) = self.split_reference(cdn)?;
        Ok(format!("{}{rest}", self.reference(to).trim_end_matches('/')))
    }

    /// The matching tier and the path left after its base.
    fn split_reference<'a>(&self, cdn: &'a str) -> Result<(Tier, &'a str), StorageError> {
        let cdn = cdn.trim_end_matches('/');
        [Tier::Private, Tier::Public]
            .into_iter()
            .filter_map(|tier| {
                let base = self.reference(tier).trim_end_matches('/');
                if base.is_empty() {
                    return None;
                }
                let rest = cdn.strip_prefix(base)?;
                (rest.is_empty() || rest.starts_with('/')).then_some((tier, base.len(), rest))
            })
            .max_by_key(|(_, len, _)| *len)
            .map(|(tier, _, rest)| (tier, rest))
            .ok_or_else(|| StorageError::UnknownTier(cdn.to_string()))
    }
}
