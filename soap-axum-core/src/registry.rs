//! Memoized contract bindings.
//!
//! [`ContractRegistry`] builds a [`ServiceContract`] the first time a contract
//! type is asked for under a given SOAP version and hands every later caller
//! the same `Arc`. Construction is serialized by a build lock with a second
//! lookup after acquiring it, so concurrent first callers never build twice.
//! Failed builds are cached as well.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::contract::{ServiceContract, SoapContract};
use crate::error::ConfigurationError;
use crate::version::SoapVersion;

type Entry = Result<Arc<ServiceContract>, ConfigurationError>;

/// Owned by whoever creates clients and services; share it with an `Arc`.
#[derive(Default)]
pub struct ContractRegistry {
    entries: RwLock<HashMap<(TypeId, SoapVersion), Entry>>,
    build_lock: Mutex<()>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(&self, key: &(TypeId, SoapVersion)) -> Option<Entry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Binding of `C` for `version`, built on first use.
    pub fn get_binding<C: SoapContract>(&self, version: SoapVersion) -> Entry {
        let key = (TypeId::of::<C>(), version);
        if let Some(entry) = self.lookup(&key) {
            return entry;
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = self.lookup(&key) {
            return entry;
        }

        let entry = ServiceContract::build(C::describe(), version).map(Arc::new);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entry.clone());
        entry
    }

    /// Number of cached (contract, version) entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ContractRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ContractDescription, MethodDecl};
    use crate::value::XmlType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static DESCRIBE_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;

    impl SoapContract for Counted {
        fn describe() -> ContractDescription {
            DESCRIBE_CALLS.fetch_add(1, Ordering::SeqCst);
            // widen the race window
            std::thread::sleep(std::time::Duration::from_millis(5));
            ContractDescription::new("Counted").method(MethodDecl::new("Get").returns(XmlType::Int))
        }
    }

    struct Broken;

    impl SoapContract for Broken {
        fn describe() -> ContractDescription {
            ContractDescription::new("Broken")
                .method(MethodDecl::new("Ping").one_way().returns(XmlType::Int))
        }
    }

    #[test]
    fn test_concurrent_callers_share_one_build() {
        let registry = Arc::new(ContractRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_binding::<Counted>(SoapVersion::Soap11).unwrap())
            })
            .collect();
        let contracts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(DESCRIBE_CALLS.load(Ordering::SeqCst), 1);
        assert!(contracts.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_versions_are_separate_entries() {
        let registry = ContractRegistry::new();
        let v11 = registry.get_binding::<Broken>(SoapVersion::Soap11);
        let v12 = registry.get_binding::<Broken>(SoapVersion::Soap12);
        assert!(v11.is_err());
        assert_eq!(v11.unwrap_err(), v12.unwrap_err());
        assert_eq!(registry.len(), 2);
    }
}
