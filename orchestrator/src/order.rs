use ndarray::{Array2, Array3, Axis};

use crate::{
    error::{ForecastError, Result},
    registry::{EntityId, StaticRegistry},
};

/// The row order of the entities within a joint tensor.
///
/// Computed once per run from the location names of the joint source, sorted by display
/// name, and carried from window assembly to output splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOrder {
    entries: Vec<(String, EntityId)>,
}

impl EntityOrder {
    /// Creates a new `EntityOrder`.
    ///
    /// # Arguments
    /// * `names` - The location names found in the joint source, in any order.
    /// * `registry` - The registry the names are resolved against.
    ///
    /// # Returns
    /// The order, or an error if a name is repeated or unknown, or if a registry entity
    /// doesn't appear among the names.
    pub fn new<'a, I>(names: I, registry: &StaticRegistry) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names: Vec<&str> = names.into_iter().collect();
        names.sort_unstable();

        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ForecastError::AmbiguousOrder(format!(
                "location {:?} appears more than once",
                pair[0]
            )));
        }

        let entries = names
            .into_iter()
            .map(|name| Ok((name.to_string(), registry.resolve_name(name)?)))
            .collect::<Result<Vec<_>>>()?;

        if let Some(missing) = registry
            .ids()
            .find(|id| entries.iter().all(|(_, other)| other != id))
        {
            return Err(ForecastError::InsufficientHistory(format!(
                "location {missing} has no rows in the joint source"
            )));
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.iter().map(|(_, id)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Splits a tensor whose first axis follows this order into per-entity slices.
    ///
    /// # Errors
    /// `AdapterShapeMismatch` if the first axis doesn't have one row per entity.
    pub fn split(&self, tensor: &Array3<f32>) -> Result<Vec<(EntityId, Array2<f32>)>> {
        let rows = tensor.len_of(Axis(0));
        if rows != self.len() {
            return Err(ForecastError::shape("joint output entities", rows, self.len()));
        }

        Ok(self
            .ids()
            .zip(tensor.outer_iter())
            .map(|(id, slice)| (id, slice.to_owned()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array;

    use super::*;

    fn registry() -> StaticRegistry {
        let csv = "\
id,name,latitude,longitude,population
10,Hue,16.4,107.5,1
20,Da Nang,16.0,108.2,1
30,Ha Noi,21.0,105.8,1
";
        StaticRegistry::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn sorts_by_display_name() {
        let order = EntityOrder::new(["Hue", "Ha Noi", "Da Nang"], &registry()).unwrap();

        assert_eq!(order.names().collect::<Vec<_>>(), vec!["Da Nang", "Ha Noi", "Hue"]);
        assert_eq!(order.ids().collect::<Vec<_>>(), vec![20, 30, 10]);
    }

    #[test]
    fn split_uses_every_id_once() {
        let order = EntityOrder::new(["Hue", "Ha Noi", "Da Nang"], &registry()).unwrap();
        let tensor = Array::from_shape_fn((3, 2, 6), |(e, _, _)| e as f32);

        let slices = order.split(&tensor).unwrap();

        let mut ids: Vec<_> = slices.iter().map(|(id, _)| *id).collect();
        ids.sort();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(slices[1], (30, Array2::from_elem((2, 6), 1.)));
    }

    #[test]
    fn split_rejects_a_wrong_entity_count() {
        let order = EntityOrder::new(["Hue", "Ha Noi", "Da Nang"], &registry()).unwrap();
        let tensor = Array3::zeros((2, 2, 6));

        assert!(matches!(
            order.split(&tensor),
            Err(ForecastError::AdapterShapeMismatch(_))
        ));
    }

    #[test]
    fn repeated_names_are_ambiguous() {
        let err = EntityOrder::new(["Hue", "Hue", "Ha Noi", "Da Nang"], &registry()).unwrap_err();
        assert!(matches!(err, ForecastError::AmbiguousOrder(_)));
    }

    #[test]
    fn unknown_and_missing_locations_fail() {
        let err = EntityOrder::new(["Hue", "Ha Noi", "Da Nang", "Vinh"], &registry()).unwrap_err();
        assert!(matches!(err, ForecastError::UnknownEntity(_)));

        let err = EntityOrder::new(["Hue", "Ha Noi"], &registry()).unwrap_err();
        assert!(err.is_out_of_range());
    }
}
