//! Fixed-snapshot `HccReferenceProvider` test double. No TTL, no I/O — the
//! snapshot passed at construction is the snapshot forever.

use std::sync::Arc;

use hcc_domain::entities::HccEntry;
use hcc_domain::repositories::HccReferenceProvider;
use hcc_domain::services::HccLookup;

pub struct StaticHccReference {
    lookup: Arc<HccLookup>,
}

impl StaticHccReference {
    pub fn new(lookup: HccLookup) -> Self {
        Self { lookup: Arc::new(lookup) }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = HccEntry>) -> Self {
        Self::new(HccLookup::from_entries(entries))
    }

    pub fn empty() -> Self {
        Self::new(HccLookup::from_entries(Vec::new()))
    }
}

impl HccReferenceProvider for StaticHccReference {
    fn current(&self) -> Arc<HccLookup> {
        self.lookup.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_same_snapshot_every_time() {
        let reference = StaticHccReference::from_entries([HccEntry::new("E11.9", "Type 2 diabetes mellitus", Some("HCC19".to_string()))]);
        assert!(Arc::ptr_eq(&reference.current(), &reference.current()));
        assert!(reference.current().is_hcc_relevant("E119"));
    }
}
