use crate::make_smart_pointer;
use std::collections::HashMap;

/// Plain key to value storage. Knows nothing about deadlines; callers guard it.
#[derive(Debug)]
pub(crate) struct PrimaryStore<K, V> {
    inner: HashMap<K, V>,
}

impl<K, V> Default for PrimaryStore<K, V> {
    fn default() -> Self {
        Self { inner: HashMap::new() }
    }
}

make_smart_pointer!(PrimaryStore<K, V>, HashMap<K, V> => inner);
