//! Location records and the identifier → location lookup table.

use ahash::AHashMap;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, NotFound, Result, ValidationError};
use crate::feed::{self, FeedOptions, Record};

/// Identifier shared between the network feed and the location feed.
pub type LocationId = u32;

/// A geographic region of varying size, from country down to city.
///
/// Only `country` is guaranteed to be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub country: String,
    pub subdivision1: String,
    pub subdivision2: String,
    pub city: String,
}

/// A row of the location feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationEntry {
    pub id: LocationId,
    pub location: Location,
}

impl LocationEntry {
    /// Create a new entry.
    pub fn new(id: LocationId, location: Location) -> Self {
        Self { id, location }
    }

    /// Validate a feed row of the form
    /// `<id>,<country>,<subdivision1>,<subdivision2>,<city>`.
    pub fn from_record(record: &Record) -> std::result::Result<Self, ValidationError> {
        let id = parse_location_id(record.get(0))?;
        let country = record.get(1);
        if country.is_empty() {
            return Err(ValidationError::MissingCountry(id));
        }
        Ok(Self {
            id,
            location: Location {
                country: country.to_string(),
                subdivision1: record.get(2).to_string(),
                subdivision2: record.get(3).to_string(),
                city: record.get(4).to_string(),
            },
        })
    }
}

/// Parse a location identifier column.
pub(crate) fn parse_location_id(raw: &str) -> std::result::Result<LocationId, ValidationError> {
    if raw.is_empty() {
        return Err(ValidationError::MissingLocationId);
    }
    raw.parse::<LocationId>()
        .map_err(|_| ValidationError::InvalidLocationId(raw.to_string()))
}

/// Read-only exact-match table from location id to location entry.
///
/// Built once; a duplicate identifier rejects the whole source.
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    entries: AHashMap<LocationId, LocationEntry>,
}

impl LocationTable {
    /// Build a table from already validated entries.
    pub fn build<I>(entries: I) -> std::result::Result<Self, ValidationError>
    where
        I: IntoIterator<Item = LocationEntry>,
    {
        let iter = entries.into_iter();
        let mut map = AHashMap::with_capacity(iter.size_hint().0);
        for entry in iter {
            Self::insert_unique(&mut map, entry)?;
        }
        Ok(Self { entries: map })
    }

    /// Build a table from a location feed.
    ///
    /// The first invalid row aborts the build; `source_name` is only used to
    /// label errors.
    pub fn from_reader<R: Read>(
        reader: R,
        source_name: &Path,
        options: FeedOptions,
    ) -> Result<Self> {
        let mut map = AHashMap::new();
        for row in feed::records(reader, options) {
            let (line, row) = row.map_err(|source| Error::FeedIo {
                path: source_name.to_path_buf(),
                source,
            })?;
            let feed_error = |source| Error::Feed {
                path: source_name.to_path_buf(),
                line,
                source,
            };
            let entry = row
                .and_then(|record| LocationEntry::from_record(&record))
                .map_err(feed_error)?;
            Self::insert_unique(&mut map, entry).map_err(feed_error)?;
        }
        log::info!(
            "loaded {} locations from {}",
            map.len(),
            source_name.display()
        );
        Ok(Self { entries: map })
    }

    /// Build a table from a location feed file (optionally gzipped).
    pub fn from_path(path: &Path, options: FeedOptions) -> Result<Self> {
        Self::from_reader(feed::open_feed(path)?, path, options)
    }

    fn insert_unique(
        map: &mut AHashMap<LocationId, LocationEntry>,
        entry: LocationEntry,
    ) -> std::result::Result<(), ValidationError> {
        if map.contains_key(&entry.id) {
            return Err(ValidationError::DuplicateLocation(entry.id));
        }
        map.insert(entry.id, entry);
        Ok(())
    }

    /// Look up a location entry by identifier.
    pub fn get(&self, id: LocationId) -> std::result::Result<&LocationEntry, NotFound> {
        self.entries.get(&id).ok_or(NotFound(id))
    }

    /// Check if the identifier is present.
    pub fn contains(&self, id: LocationId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of locations in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no locations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: LocationId, country: &str) -> LocationEntry {
        LocationEntry::new(
            id,
            Location {
                country: country.to_string(),
                ..Location::default()
            },
        )
    }

    #[test]
    fn test_from_record() {
        let record = Record::parse("20,Japan,,,Tokyo");
        let entry = LocationEntry::from_record(&record).unwrap();
        assert_eq!(entry.id, 20);
        assert_eq!(entry.location.country, "Japan");
        assert_eq!(entry.location.subdivision1, "");
        assert_eq!(entry.location.city, "Tokyo");
    }

    #[test]
    fn test_from_record_short_row() {
        let entry = LocationEntry::from_record(&Record::parse("10,Canada")).unwrap();
        assert_eq!(entry.location.country, "Canada");
        assert_eq!(entry.location.city, "");
    }

    #[test]
    fn test_from_record_invalid() {
        assert_eq!(
            LocationEntry::from_record(&Record::parse(",Canada,,,")),
            Err(ValidationError::MissingLocationId)
        );
        assert_eq!(
            LocationEntry::from_record(&Record::parse("ten,Canada,,,")),
            Err(ValidationError::InvalidLocationId("ten".to_string()))
        );
        assert_eq!(
            LocationEntry::from_record(&Record::parse("-4,Canada,,,")),
            Err(ValidationError::InvalidLocationId("-4".to_string()))
        );
        assert_eq!(
            LocationEntry::from_record(&Record::parse("10,,QC,,")),
            Err(ValidationError::MissingCountry(10))
        );
    }

    #[test]
    fn test_build_and_get() {
        let table = LocationTable::build(vec![entry(10, "Canada"), entry(20, "Japan")]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(20).unwrap().location.country, "Japan");
        assert!(table.contains(10));
        assert_eq!(table.get(30), Err(NotFound(30)));
    }

    #[test]
    fn test_build_duplicate_is_fatal() {
        let result = LocationTable::build(vec![
            entry(10, "Canada"),
            entry(20, "Japan"),
            entry(10, "France"),
        ]);
        assert_eq!(result.unwrap_err(), ValidationError::DuplicateLocation(10));
    }

    #[test]
    fn test_from_reader_reports_line() {
        let text = "10,Canada,,,\n20,Japan,,,Tokyo\n\n10,France,,,\n";
        let err = LocationTable::from_reader(
            text.as_bytes(),
            Path::new("locations.csv"),
            FeedOptions::default(),
        )
        .unwrap_err();
        match err {
            Error::Feed { line, source, .. } => {
                assert_eq!(line, 4);
                assert_eq!(source, ValidationError::DuplicateLocation(10));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_reader_missing_country_is_fatal() {
        let text = "10,Canada,,,\n20,,,,Tokyo\n";
        let result =
            LocationTable::from_reader(text.as_bytes(), Path::new("loc"), FeedOptions::default());
        assert!(matches!(
            result,
            Err(Error::Feed {
                source: ValidationError::MissingCountry(20),
                ..
            })
        ));
    }

    #[test]
    fn test_from_reader_invalid_utf8_is_fatal() {
        let bytes: &[u8] = b"10,Canada,,,\n20,Canada,Qu\xe9bec,,Montr\xe9al\n";
        let err =
            LocationTable::from_reader(bytes, Path::new("locations.csv"), FeedOptions::default())
                .unwrap_err();
        match err {
            Error::Feed { path, line, source } => {
                assert_eq!(path, Path::new("locations.csv"));
                assert_eq!(line, 2);
                assert_eq!(source, ValidationError::InvalidEncoding(12));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_reader_io_error_names_feed() {
        let text: &[u8] = b"10,Canada,,,\n";
        let reader = text.chain(Truncated);
        let err =
            LocationTable::from_reader(reader, Path::new("locations.csv"), FeedOptions::default())
                .unwrap_err();
        assert!(matches!(&err, Error::FeedIo { path, .. } if path == Path::new("locations.csv")));
        assert_eq!(err.to_string(), "locations.csv: unexpected end of feed");
    }

    struct Truncated;

    impl Read for Truncated {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unexpected end of feed",
            ))
        }
    }

    #[test]
    fn test_from_reader_with_header() {
        let text = "geoname_id,country,subdivision1,subdivision2,city\n10,Canada,,,\n";
        let table = LocationTable::from_reader(
            text.as_bytes(),
            Path::new("loc"),
            FeedOptions { has_header: true },
        )
        .unwrap();
        assert_eq!(table.len(), 1);
    }
}
