//! Address → location resolution over a network index and a location table.

use ahash::AHashSet;
use std::net::Ipv4Addr;

use crate::error::ResolveError;
use crate::location::{Location, LocationId, LocationTable};
use crate::network::{NetworkIndex, NetworkStore, NetworkTrie};

/// Resolver chains the network index and the location table.
///
/// Both structures are owned and never mutated, so a resolver can be shared
/// across threads (e.g. behind an `Arc`) and queried without locking.
///
/// # Examples
/// ```
/// use ipgeo::{Location, LocationEntry, LocationTable, NetworkEntry, NetworkIndex, Resolver};
/// use std::net::Ipv4Addr;
///
/// let networks: NetworkIndex = NetworkIndex::build([
///     NetworkEntry::new("1.0.0.0/24".parse().unwrap(), 10),
/// ]);
/// let canada = Location { country: "Canada".into(), ..Location::default() };
/// let locations = LocationTable::build([LocationEntry::new(10, canada.clone())]).unwrap();
///
/// let resolver = Resolver::new(networks, locations);
/// assert_eq!(resolver.resolve(Ipv4Addr::new(1, 0, 0, 5)).unwrap(), &canada);
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<S: NetworkStore = NetworkTrie> {
    networks: NetworkIndex<S>,
    locations: LocationTable,
}

impl<S: NetworkStore> Resolver<S> {
    /// Create a resolver from built structures.
    pub fn new(networks: NetworkIndex<S>, locations: LocationTable) -> Self {
        Self {
            networks,
            locations,
        }
    }

    /// Resolve an address to its most specific known location.
    ///
    /// `UnknownLocation` means no network covers the address.
    /// `DataInconsistency` means the covering network references a location
    /// that is absent from the location feed.
    pub fn resolve(&self, addr: Ipv4Addr) -> Result<&Location, ResolveError> {
        let location_id = self
            .networks
            .match_addr(addr)
            .map_err(|_| ResolveError::UnknownLocation(addr))?;

        match self.locations.get(location_id) {
            Ok(entry) => Ok(&entry.location),
            Err(_) => {
                log::error!(
                    "data inconsistency: {} matched location {} missing from the location feed",
                    addr,
                    location_id
                );
                Err(ResolveError::DataInconsistency { addr, location_id })
            }
        }
    }

    /// Location ids referenced by the network index but missing from the
    /// location table, in order of first reference.
    pub fn dangling_references(&self) -> Vec<LocationId> {
        let mut seen = AHashSet::new();
        self.networks
            .entries()
            .iter()
            .map(|entry| entry.location_id)
            .filter(|id| !self.locations.contains(*id) && seen.insert(*id))
            .collect()
    }

    /// The network index.
    pub fn networks(&self) -> &NetworkIndex<S> {
        &self.networks
    }

    /// The location table.
    pub fn locations(&self) -> &LocationTable {
        &self.locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedOptions;
    use crate::network::NetworkList;
    use std::path::Path;

    const NETWORKS: &str = "1.0.0.0/24,10\n1.0.1.0/24,20\n1.0.2.0/23,20\n";
    const LOCATIONS: &str = "10,Canada,,,\n20,Japan,,,Tokyo\n";

    fn resolver_from<S: NetworkStore>(networks: &str, locations: &str) -> Resolver<S> {
        let networks = NetworkIndex::from_reader(
            networks.as_bytes(),
            Path::new("networks"),
            FeedOptions::default(),
        )
        .unwrap();
        let locations = LocationTable::from_reader(
            locations.as_bytes(),
            Path::new("locations"),
            FeedOptions::default(),
        )
        .unwrap();
        Resolver::new(networks, locations)
    }

    fn addr(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn test_resolve_scenario() {
        let resolver: Resolver = resolver_from(NETWORKS, LOCATIONS);

        let canada = resolver.resolve(addr("1.0.0.5")).unwrap();
        assert_eq!(canada.country, "Canada");
        assert_eq!(canada.city, "");

        for ip in ["1.0.1.5", "1.0.2.5", "1.0.3.250"] {
            let japan = resolver.resolve(addr(ip)).unwrap();
            assert_eq!(japan.country, "Japan");
            assert_eq!(japan.subdivision1, "");
            assert_eq!(japan.city, "Tokyo");
        }

        assert_eq!(
            resolver.resolve(addr("8.8.8.8")),
            Err(ResolveError::UnknownLocation(addr("8.8.8.8")))
        );
    }

    #[test]
    fn test_resolve_with_linear_store() {
        let resolver: Resolver<NetworkList> = resolver_from(NETWORKS, LOCATIONS);
        assert_eq!(resolver.resolve(addr("1.0.2.5")).unwrap().city, "Tokyo");
        assert!(resolver.resolve(addr("8.8.8.8")).is_err());
    }

    #[test]
    fn test_dangling_reference_is_inconsistency() {
        let resolver: Resolver = resolver_from("1.0.0.0/24,10\n2.0.0.0/8,99\n", LOCATIONS);
        assert_eq!(
            resolver.resolve(addr("2.3.4.5")),
            Err(ResolveError::DataInconsistency {
                addr: addr("2.3.4.5"),
                location_id: 99,
            })
        );
        assert_eq!(resolver.resolve(addr("1.0.0.1")).unwrap().country, "Canada");
    }

    #[test]
    fn test_narrow_dangling_block_shadows_wide_block() {
        let resolver: Resolver = resolver_from("1.0.0.0/16,10\n1.0.0.0/24,99\n", LOCATIONS);
        assert!(matches!(
            resolver.resolve(addr("1.0.0.1")),
            Err(ResolveError::DataInconsistency { location_id: 99, .. })
        ));
        assert_eq!(resolver.resolve(addr("1.0.1.1")).unwrap().country, "Canada");
    }

    #[test]
    fn test_dangling_references() {
        let resolver: Resolver = resolver_from(
            "1.0.0.0/24,10\n2.0.0.0/8,99\n3.0.0.0/8,98\n4.0.0.0/8,99\n",
            LOCATIONS,
        );
        assert_eq!(resolver.dangling_references(), vec![99, 98]);

        let clean: Resolver = resolver_from(NETWORKS, LOCATIONS);
        assert!(clean.dangling_references().is_empty());
    }

    #[test]
    fn test_resolver_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Resolver>();
        assert_send_sync::<Resolver<NetworkList>>();
    }
}
