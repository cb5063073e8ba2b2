use std::collections::BTreeMap;
use watched_sync_config::MappingConfig;

/// User and library name equivalences between servers
///
/// A name that is not present verbatim in the counterpart tree is retried
/// case-insensitively, then through the configured mapping in either direction.
#[derive(Debug, Clone, Default)]
pub struct NameMapping {
    users: Vec<(String, String)>,
    libraries: Vec<(String, String)>,
}

impl NameMapping {
    pub fn new<U, L>(users: U, libraries: L) -> Self
    where
        U: IntoIterator<Item = (String, String)>,
        L: IntoIterator<Item = (String, String)>,
    {
        Self {
            users: users.into_iter().collect(),
            libraries: libraries.into_iter().collect(),
        }
    }

    pub fn from_config(config: &MappingConfig) -> Self {
        Self::new(config.users.clone(), config.libraries.clone())
    }

    /// Find the counterpart of user `name` among `counterpart`'s keys
    pub fn resolve_user<'a, V>(
        &self,
        name: &str,
        counterpart: &'a BTreeMap<String, V>,
    ) -> Option<(&'a String, &'a V)> {
        resolve(&self.users, name, counterpart)
    }

    /// Find the counterpart of library `name` among `counterpart`'s keys
    pub fn resolve_library<'a, V>(
        &self,
        name: &str,
        counterpart: &'a BTreeMap<String, V>,
    ) -> Option<(&'a String, &'a V)> {
        resolve(&self.libraries, name, counterpart)
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn find_named<'a, V>(name: &str, map: &'a BTreeMap<String, V>) -> Option<(&'a String, &'a V)> {
    map.get_key_value(name)
        .or_else(|| map.iter().find(|(key, _)| same_name(key, name)))
}

fn resolve<'a, V>(
    pairs: &[(String, String)],
    name: &str,
    map: &'a BTreeMap<String, V>,
) -> Option<(&'a String, &'a V)> {
    if let Some(found) = find_named(name, map) {
        return Some(found);
    }

    pairs.iter().find_map(|(left, right)| {
        if same_name(left, name) {
            find_named(right, map)
        } else if same_name(right, name) {
            find_named(left, map)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(keys: &[&str]) -> BTreeMap<String, usize> {
        keys.iter().enumerate().map(|(i, k)| (k.to_string(), i)).collect()
    }

    #[test]
    fn test_verbatim_and_case_insensitive() {
        let mapping = NameMapping::default();
        let users = tree(&["alice", "Bob"]);

        assert_eq!(mapping.resolve_user("alice", &users).map(|(k, _)| k.as_str()), Some("alice"));
        assert_eq!(mapping.resolve_user("BOB", &users).map(|(k, _)| k.as_str()), Some("Bob"));
        assert!(mapping.resolve_user("carol", &users).is_none());
    }

    #[test]
    fn test_mapping_works_in_both_directions() {
        let mapping = NameMapping::new(
            vec![("plex_dad".to_string(), "Father".to_string())],
            vec![("Movies".to_string(), "Films".to_string())],
        );

        let users = tree(&["father"]);
        assert_eq!(mapping.resolve_user("plex_dad", &users).map(|(_, v)| *v), Some(0));
        let users = tree(&["plex_dad"]);
        assert_eq!(mapping.resolve_user("Father", &users).map(|(_, v)| *v), Some(0));

        let libraries = tree(&["TV", "Films"]);
        assert_eq!(
            mapping.resolve_library("movies", &libraries).map(|(k, _)| k.as_str()),
            Some("Films")
        );
        assert!(mapping.resolve_library("Music", &libraries).is_none());
    }

    #[test]
    fn test_absent_after_mapping() {
        let mapping = NameMapping::new(vec![("a".to_string(), "b".to_string())], Vec::new());
        let users = tree(&["c"]);
        assert!(mapping.resolve_user("a", &users).is_none());
    }
}
