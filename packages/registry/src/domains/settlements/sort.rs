//! Sort resolution for settlement listings.
//!
//! Two request shapes are supported. The token-list form takes ordered
//! `field[,asc|desc]` tokens (a leading `-` also marks descending) and is
//! lenient: unknown field names are dropped. The single-key `sort_by` + `dir`
//! form is strict and rejects unknown names. When a non-blank `sort_by` is
//! supplied it wins and the token list is ignored.
//!
//! Resolution always appends an ascending id tiebreak unless the request
//! already names id, so pagination stays deterministic.

use std::cmp::Ordering;
use tracing::debug;

use crate::common::RegistryError;
use crate::domains::settlements::data::SettlementData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

/// Logical sort fields, including one-hop relation paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortField {
    Id,
    Name,
    Area,
    Population,
    Capital,
    MetersAboveSeaLevel,
    TelephoneCode,
    Climate,
    Government,
    CreationDate,
    EstablishmentDate,
    LocationId,
    LocationX,
    LocationY,
    StewardId,
    StewardHeight,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "id" => Some(SortField::Id),
            "name" => Some(SortField::Name),
            "area" => Some(SortField::Area),
            "population" => Some(SortField::Population),
            "capital" => Some(SortField::Capital),
            "metersAboveSeaLevel" => Some(SortField::MetersAboveSeaLevel),
            "telephoneCode" => Some(SortField::TelephoneCode),
            "climate" => Some(SortField::Climate),
            "government" => Some(SortField::Government),
            "creationDate" => Some(SortField::CreationDate),
            "establishmentDate" => Some(SortField::EstablishmentDate),
            "locationId" => Some(SortField::LocationId),
            "locationX" => Some(SortField::LocationX),
            "locationY" => Some(SortField::LocationY),
            "stewardId" => Some(SortField::StewardId),
            "stewardHeight" => Some(SortField::StewardHeight),
            _ => None,
        }
    }
}

/// A resolved ordering over settlement listings.
#[derive(Debug, Clone)]
pub struct SortSpec {
    keys: Vec<(SortField, SortDirection)>,
}

impl SortSpec {
    /// Resolve from the two request shapes. A non-blank `sort_by` takes the
    /// strict single-key path and the token list is ignored.
    pub fn resolve(
        tokens: &[String],
        sort_by: Option<&str>,
        dir: Option<&str>,
    ) -> Result<SortSpec, RegistryError> {
        match sort_by {
            Some(key) if !key.trim().is_empty() => Self::from_single(key, dir),
            _ => Ok(Self::from_tokens(tokens)),
        }
    }

    /// Lenient token-list parsing. Unknown fields and directions are
    /// dropped, never rejected.
    pub fn from_tokens(tokens: &[String]) -> SortSpec {
        let mut keys = Vec::new();
        for token in tokens {
            let (field_part, dir_part) = match token.split_once(',') {
                Some((f, d)) => (f, Some(d)),
                None => (token.as_str(), None),
            };
            let field_part = field_part.trim();
            let (field_part, mut direction) = match field_part.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (field_part, SortDirection::Asc),
            };
            if let Some(d) = dir_part.and_then(SortDirection::parse) {
                direction = d;
            }
            match SortField::parse(field_part) {
                Some(field) => keys.push((field, direction)),
                None => debug!(field = field_part, "dropping unknown sort field"),
            }
        }
        SortSpec { keys }.with_tiebreak()
    }

    /// Strict single-key parsing. Unknown field or direction text is an
    /// `InvalidArgument`.
    pub fn from_single(sort_by: &str, dir: Option<&str>) -> Result<SortSpec, RegistryError> {
        let field = SortField::parse(sort_by).ok_or_else(|| {
            RegistryError::InvalidArgument(format!("unknown sort field '{}'", sort_by.trim()))
        })?;
        let direction = match dir {
            Some(raw) if !raw.trim().is_empty() => SortDirection::parse(raw).ok_or_else(|| {
                RegistryError::InvalidArgument(format!(
                    "unknown sort direction '{}', allowed: asc, desc",
                    raw.trim()
                ))
            })?,
            _ => SortDirection::Asc,
        };
        Ok(SortSpec {
            keys: vec![(field, direction)],
        }
        .with_tiebreak())
    }

    fn with_tiebreak(mut self) -> Self {
        if !self.keys.iter().any(|(f, _)| *f == SortField::Id) {
            self.keys.push((SortField::Id, SortDirection::Asc));
        }
        self
    }

    /// Sort resolved settlements in place.
    pub fn sort(&self, items: &mut [SettlementData]) {
        items.sort_by(|a, b| self.compare(a, b));
    }

    fn compare(&self, a: &SettlementData, b: &SettlementData) -> Ordering {
        for (field, direction) in &self.keys {
            let ordering = compare_field(a, b, *field, *direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Compare an optional key. A missing value counts as the largest, so it
/// lands last ascending and first descending.
fn compare_nullable<T, F>(a: Option<T>, b: Option<T>, direction: SortDirection, cmp: F) -> Ordering
where
    F: Fn(&T, &T) -> Ordering,
{
    let ordering = match (&a, &b) {
        (Some(x), Some(y)) => cmp(x, y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    };
    directed(ordering, direction)
}

fn compare_field(
    a: &SettlementData,
    b: &SettlementData,
    field: SortField,
    direction: SortDirection,
) -> Ordering {
    match field {
        SortField::Id => directed(a.id.cmp(&b.id), direction),
        SortField::Name => directed(a.name.cmp(&b.name), direction),
        SortField::Area => directed(a.area.cmp(&b.area), direction),
        SortField::Population => directed(a.population.cmp(&b.population), direction),
        SortField::Capital => directed(a.capital.cmp(&b.capital), direction),
        SortField::MetersAboveSeaLevel => compare_nullable(
            a.meters_above_sea_level,
            b.meters_above_sea_level,
            direction,
            i32::cmp,
        ),
        SortField::TelephoneCode => {
            compare_nullable(a.telephone_code, b.telephone_code, direction, i32::cmp)
        }
        SortField::Climate => directed(a.climate.as_str().cmp(b.climate.as_str()), direction),
        SortField::Government => compare_nullable(
            a.government.map(|g| g.as_str()),
            b.government.map(|g| g.as_str()),
            direction,
            |x, y| x.cmp(y),
        ),
        SortField::CreationDate => directed(a.creation_date.cmp(&b.creation_date), direction),
        SortField::EstablishmentDate => compare_nullable(
            a.establishment_date,
            b.establishment_date,
            direction,
            chrono::NaiveDate::cmp,
        ),
        SortField::LocationId => directed(a.location.id.cmp(&b.location.id), direction),
        SortField::LocationX => directed(a.location.x.total_cmp(&b.location.x), direction),
        SortField::LocationY => directed(a.location.y.total_cmp(&b.location.y), direction),
        SortField::StewardId => compare_nullable(
            a.steward.as_ref().map(|s| s.id),
            b.steward.as_ref().map(|s| s.id),
            direction,
            |x, y| x.cmp(y),
        ),
        SortField::StewardHeight => compare_nullable(
            a.steward.as_ref().map(|s| s.height),
            b.steward.as_ref().map(|s| s.height),
            direction,
            f32::total_cmp,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;
    use crate::domains::locations::models::Location;
    use crate::domains::settlements::models::Climate;
    use crate::domains::stewards::models::Steward;
    use chrono::NaiveDate;

    fn data(name: &str, area: i32, steward_height: Option<f32>) -> SettlementData {
        SettlementData {
            id: Id::new(),
            name: name.to_string(),
            area,
            population: 1000,
            capital: false,
            meters_above_sea_level: None,
            telephone_code: None,
            climate: Climate::Tundra,
            government: None,
            creation_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            establishment_date: None,
            location: Location {
                id: Id::new(),
                x: 1.0,
                y: 2.0,
            },
            steward: steward_height.map(|height| Steward {
                id: Id::new(),
                height,
            }),
        }
    }

    #[test]
    fn test_empty_tokens_fall_back_to_id_ascending() {
        let spec = SortSpec::from_tokens(&[]);
        let mut items = vec![data("B", 1, None), data("A", 2, None)];
        let expected: Vec<_> = {
            let mut ids: Vec<_> = items.iter().map(|i| i.id).collect();
            ids.sort();
            ids
        };
        spec.sort(&mut items);
        let got: Vec<_> = items.iter().map(|i| i.id).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_unknown_token_fields_are_dropped() {
        let spec = SortSpec::from_tokens(&[
            "flavor,desc".to_string(),
            "name".to_string(),
        ]);
        let mut items = vec![data("B", 1, None), data("A", 2, None)];
        spec.sort(&mut items);
        assert_eq!(items[0].name, "A");
    }

    #[test]
    fn test_dash_prefix_means_descending() {
        let spec = SortSpec::from_tokens(&["-area".to_string()]);
        let mut items = vec![data("A", 1, None), data("B", 9, None)];
        spec.sort(&mut items);
        assert_eq!(items[0].area, 9);
    }

    #[test]
    fn test_single_key_rejects_unknown_field() {
        let result = SortSpec::from_single("flavor", None);
        assert!(matches!(result, Err(RegistryError::InvalidArgument(_))));
    }

    #[test]
    fn test_single_key_rejects_unknown_direction() {
        let result = SortSpec::from_single("name", Some("sideways"));
        assert!(matches!(result, Err(RegistryError::InvalidArgument(_))));
    }

    #[test]
    fn test_sort_by_wins_over_token_list() {
        let spec = SortSpec::resolve(
            &["area,desc".to_string()],
            Some("name"),
            Some("asc"),
        )
        .unwrap();
        let mut items = vec![data("B", 9, None), data("A", 1, None)];
        spec.sort(&mut items);
        assert_eq!(items[0].name, "A");
    }

    #[test]
    fn test_nullable_relation_sorts_nulls_last_ascending() {
        let spec = SortSpec::from_single("stewardHeight", Some("asc")).unwrap();
        let mut items = vec![
            data("A", 1, None),
            data("B", 1, Some(1.8)),
            data("C", 1, Some(1.6)),
        ];
        spec.sort(&mut items);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_nullable_relation_sorts_nulls_first_descending() {
        let spec = SortSpec::from_single("stewardHeight", Some("desc")).unwrap();
        let mut items = vec![
            data("A", 1, Some(1.6)),
            data("B", 1, None),
            data("C", 1, Some(1.8)),
        ];
        spec.sort(&mut items);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }
}
