use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for an application family.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

/// Opaque identifier for one running instance of a product.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Active sessions grouped by product. A session appears at most once per
/// product, and a product with no sessions has no entry at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionRegistry {
    by_product: BTreeMap<ProductId, BTreeSet<SessionId>>,
}

impl SessionRegistry {
    /// Add `session` under `product`. Returns false when the session was
    /// already listed there.
    pub fn insert(&mut self, product: ProductId, session: SessionId) -> bool {
        self.by_product.entry(product).or_default().insert(session)
    }

    /// Remove `session` from whichever product lists it, pruning the product
    /// entry if it becomes empty. Returns the product it was removed from,
    /// or None when the session was not listed anywhere.
    pub fn remove(&mut self, session: &SessionId) -> Option<ProductId> {
        let product = self
            .by_product
            .iter()
            .find(|(_, sessions)| sessions.contains(session))
            .map(|(product, _)| product.clone())?;
        if let Some(sessions) = self.by_product.get_mut(&product) {
            sessions.remove(session);
            if sessions.is_empty() {
                self.by_product.remove(&product);
            }
        }
        Some(product)
    }

    /// Rebuild the registry from a complete session→product listing,
    /// discarding everything held before.
    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (SessionId, ProductId)>,
    {
        self.by_product.clear();
        for (session, product) in entries {
            self.insert(product, session);
        }
    }

    pub fn sessions_for(&self, product: &ProductId) -> Option<&BTreeSet<SessionId>> {
        self.by_product.get(product)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProductId, &BTreeSet<SessionId>)> {
        self.by_product.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.by_product.is_empty()
    }

    pub fn product_count(&self) -> usize {
        self.by_product.len()
    }

    pub fn session_count(&self) -> usize {
        self.by_product.values().map(BTreeSet::len).sum()
    }
}
