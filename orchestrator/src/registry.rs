use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use serde::Deserialize;

use crate::error::{ForecastError, Result};

/// The numeric identifier of a forecast location.
pub type EntityId = u64;

/// The static attributes of a location, in the order they're appended to model inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticAttributes {
    pub latitude: f64,
    pub longitude: f64,
    pub population: f64,
}

impl StaticAttributes {
    /// Returns the `(latitude, longitude, population)` triple as model features.
    pub fn to_array(&self) -> [f32; 3] {
        [
            self.latitude as f32,
            self.longitude as f32,
            self.population as f32,
        ]
    }
}

/// A single forecast location.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub attributes: StaticAttributes,
}

#[derive(Debug, Deserialize)]
struct RegistryRow {
    id: EntityId,
    #[serde(default, alias = "city")]
    name: Option<String>,
    #[serde(alias = "lat")]
    latitude: f64,
    #[serde(alias = "lng")]
    longitude: f64,
    #[serde(default)]
    population: Option<f64>,
}

/// The immutable table of per-location static attributes, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    entities: BTreeMap<EntityId, Entity>,
}

impl StaticRegistry {
    /// Loads the registry from a csv file.
    ///
    /// # Arguments
    /// * `path` - The path of the registry file.
    ///
    /// # Returns
    /// The loaded registry or an error if the file is unreadable or malformed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let registry = Self::from_reader(file)?;
        log::info!(
            "loaded {} location(s) from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Reads the registry from any csv source with a header row.
    ///
    /// Missing population values are filled with the mean of the present ones.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(rdr);
        let rows = rdr
            .deserialize::<RegistryRow>()
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let present: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.population)
            .filter(|p| p.is_finite())
            .collect();

        let fill = match (present.len(), rows.len()) {
            (_, 0) => 0.,
            (0, _) => {
                return Err(ForecastError::InvalidData(
                    "the registry has no population values to impute from".into(),
                ));
            }
            (n, _) => present.iter().sum::<f64>() / n as f64,
        };

        let entities = rows.into_iter().map(|row| Entity {
            id: row.id,
            name: row.name.unwrap_or_else(|| row.id.to_string()),
            attributes: StaticAttributes {
                latitude: row.latitude,
                longitude: row.longitude,
                population: row.population.filter(|p| p.is_finite()).unwrap_or(fill),
            },
        });

        Self::from_entities(entities)
    }

    /// Builds a registry out of already resolved entities.
    ///
    /// # Errors
    /// `InvalidData` if two entities share the same id.
    pub fn from_entities<I: IntoIterator<Item = Entity>>(entities: I) -> Result<Self> {
        let mut map = BTreeMap::new();
        for entity in entities {
            let id = entity.id;
            if map.insert(id, entity).is_some() {
                return Err(ForecastError::InvalidData(format!(
                    "duplicate location id {id} in the registry"
                )));
            }
        }

        Ok(Self { entities: map })
    }

    /// Looks up the static attributes of a location.
    pub fn lookup(&self, id: EntityId) -> Result<StaticAttributes> {
        self.entity(id).map(|entity| entity.attributes)
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities
            .get(&id)
            .ok_or_else(|| ForecastError::UnknownEntity(id.to_string()))
    }

    /// Finds the id of the location with the given display name.
    ///
    /// # Errors
    /// `UnknownEntity` when no location has that name, `AmbiguousOrder` when several do.
    pub fn resolve_name(&self, name: &str) -> Result<EntityId> {
        let mut matches = self.entities.values().filter(|e| e.name == name);

        let found = matches
            .next()
            .ok_or_else(|| ForecastError::UnknownEntity(name.to_string()))?;

        if let Some(other) = matches.next() {
            return Err(ForecastError::AmbiguousOrder(format!(
                "locations {} and {} are both named {name:?}",
                found.id, other.id
            )));
        }

        Ok(found.id)
    }

    /// Iterates over every id in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGISTRY: &str = "\
id,name,lat,lng,population
3,Hue,16.46,107.59,652572
1,Ha Noi,21.02,105.84,8053663
2,Da Nang,16.07,108.22,
";

    #[test]
    fn loads_sorted_by_id() {
        let registry = StaticRegistry::from_reader(REGISTRY.as_bytes()).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(registry.entity(1).unwrap().name, "Ha Noi");
    }

    #[test]
    fn imputes_missing_population_with_the_mean() {
        let registry = StaticRegistry::from_reader(REGISTRY.as_bytes()).unwrap();

        let attrs = registry.lookup(2).unwrap();
        assert_eq!(attrs.population, (652572. + 8053663.) / 2.);
        assert_eq!(attrs.latitude, 16.07);
    }

    #[test]
    fn unknown_id_is_reported() {
        let registry = StaticRegistry::from_reader(REGISTRY.as_bytes()).unwrap();

        let err = registry.lookup(42).unwrap_err();
        assert!(matches!(err, ForecastError::UnknownEntity(key) if key == "42"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let csv = "id,latitude,longitude,population\n1,0,0,1\n1,1,1,1\n";

        let err = StaticRegistry::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidData(_)));
    }

    #[test]
    fn names_default_to_the_id() {
        let csv = "id,latitude,longitude,population\n7,10.0,106.0,1000000\n";
        let registry = StaticRegistry::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(registry.resolve_name("7").unwrap(), 7);
        assert_eq!(
            registry.lookup(7).unwrap().to_array(),
            [10.0, 106.0, 1_000_000.0]
        );
    }

    #[test]
    fn shared_names_are_ambiguous() {
        let csv = "id,name,latitude,longitude,population\n1,X,0,0,1\n2,X,1,1,1\n";
        let registry = StaticRegistry::from_reader(csv.as_bytes()).unwrap();

        assert!(matches!(
            registry.resolve_name("X"),
            Err(ForecastError::AmbiguousOrder(_))
        ));
        assert!(matches!(
            registry.resolve_name("Y"),
            Err(ForecastError::UnknownEntity(_))
        ));
    }
}
