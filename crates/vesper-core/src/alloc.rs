//! Hash collections used across Vesper.
//!
//! Everything keyed by small integer ids (textures, shaders, pipelines) goes
//! through AHash rather than SipHash.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_ahash() {
        let mut map = HashMap::new();
        map.insert(7u64, "texture");
        assert_eq!(map.get(&7), Some(&"texture"));
    }

    #[test]
    fn test_hashset_ahash() {
        let mut set = HashSet::new();
        set.insert(42u32);
        assert!(set.contains(&42));
    }
}
