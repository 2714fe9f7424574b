//! Standalone location CRUD.
//!
//! Locations are shared rows: many settlements may point at one. Direct
//! deletion is guarded by the usage count and reports the referencing
//! settlement ids, unlike the orphan-cleanup path on settlement deletion
//! which pre-checks and skips silently.

use futures::FutureExt;

use crate::common::errors::rule;
use crate::common::{LocationId, PageDto, PageRequest, RegistryError};
use crate::domains::locations::models::{Location, LocationInput};
use crate::kernel::events::{json_payload, ChangeEvent, EntityKind};
use crate::kernel::RegistryDeps;

/// Sparse exact-match filter over locations.
#[derive(Debug, Clone, Default)]
pub struct LocationFilter {
    pub id: Option<LocationId>,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

impl LocationFilter {
    fn matches(&self, location: &Location) -> bool {
        self.id.map_or(true, |id| location.id == id)
            && self.x.map_or(true, |x| location.x == x)
            && self.y.map_or(true, |y| location.y == y)
    }
}

#[derive(Clone)]
pub struct LocationService {
    deps: RegistryDeps,
}

impl LocationService {
    pub fn new(deps: RegistryDeps) -> Self {
        Self { deps }
    }

    pub async fn create(&self, input: LocationInput) -> Result<Location, RegistryError> {
        validate(&input)?;
        let input = &input;
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    if tx.location_at(input.x, input.y, None).await?.is_some() {
                        return Err(RegistryError::business_rule(
                            rule::LOCATION_NOT_UNIQUE,
                            format!("a location at ({}, {}) already exists", input.x, input.y),
                        ));
                    }
                    let location = tx.insert_location(input).await?;
                    tx.queue_event(ChangeEvent::created(
                        EntityKind::Location,
                        location.id.into_uuid(),
                        json_payload(&location),
                    ));
                    Ok(location)
                }
                .boxed()
            })
            .await
    }

    pub async fn update(
        &self,
        id: LocationId,
        input: LocationInput,
    ) -> Result<Location, RegistryError> {
        validate(&input)?;
        let input = &input;
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    let mut location = tx
                        .find_location(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Location", id))?;
                    if tx.location_at(input.x, input.y, Some(id)).await?.is_some() {
                        return Err(RegistryError::business_rule(
                            rule::LOCATION_NOT_UNIQUE,
                            format!("a location at ({}, {}) already exists", input.x, input.y),
                        ));
                    }
                    location.x = input.x;
                    location.y = input.y;
                    tx.update_location(&location).await?;
                    tx.queue_event(ChangeEvent::updated(
                        EntityKind::Location,
                        location.id.into_uuid(),
                        json_payload(&location),
                    ));
                    Ok(location)
                }
                .boxed()
            })
            .await
    }

    /// Delete a location, refusing while settlements still reference it.
    pub async fn delete(&self, id: LocationId) -> Result<(), RegistryError> {
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    tx.find_location(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Location", id))?;
                    let usage_count = tx.count_settlements_by_location(id).await?;
                    if usage_count > 0 {
                        let blocking_ids = tx.settlement_ids_by_location(id).await?;
                        return Err(RegistryError::DeletionBlocked {
                            entity: "Location".to_string(),
                            id: id.into_uuid(),
                            usage_count,
                            blocking_ids,
                        });
                    }
                    tx.delete_location(id).await?;
                    tx.queue_event(ChangeEvent::deleted(EntityKind::Location, id.into_uuid()));
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    pub async fn get(&self, id: LocationId) -> Result<Location, RegistryError> {
        self.deps
            .runner
            .read_only(move |tx| {
                async move {
                    tx.find_location(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Location", id))
                }
                .boxed()
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<Location>, RegistryError> {
        self.deps
            .runner
            .read_only(|tx| {
                async move {
                    let mut locations = tx.all_locations().await?;
                    locations.sort_by_key(|l| l.id);
                    Ok(locations)
                }
                .boxed()
            })
            .await
    }

    pub async fn page(
        &self,
        filter: &LocationFilter,
        sort_by: Option<&str>,
        dir: Option<&str>,
        page: PageRequest,
    ) -> Result<PageDto<Location>, RegistryError> {
        let key = SortKey::parse(sort_by)?;
        let descending = parse_direction(dir)?;
        let window = page.validate();
        let mut locations = self.list().await?;
        locations.retain(|l| filter.matches(l));
        locations.sort_by(|a, b| {
            let ordering = match key {
                SortKey::Id => a.id.cmp(&b.id),
                SortKey::X => a.x.total_cmp(&b.x),
                SortKey::Y => a.y.total_cmp(&b.y),
            };
            let ordering = if descending {
                ordering.reverse()
            } else {
                ordering
            };
            ordering.then(a.id.cmp(&b.id))
        });
        Ok(PageDto::from_sorted(locations, window))
    }
}

fn validate(input: &LocationInput) -> Result<(), RegistryError> {
    let fields = input.field_errors();
    if fields.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::ValidationFailed { fields })
    }
}

#[derive(Debug, Clone, Copy)]
enum SortKey {
    Id,
    X,
    Y,
}

impl SortKey {
    fn parse(sort_by: Option<&str>) -> Result<Self, RegistryError> {
        match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("id") => Ok(SortKey::Id),
            Some("x") => Ok(SortKey::X),
            Some("y") => Ok(SortKey::Y),
            Some(other) => Err(RegistryError::InvalidArgument(format!(
                "unknown sort field '{other}'"
            ))),
        }
    }
}

fn parse_direction(dir: Option<&str>) -> Result<bool, RegistryError> {
    match dir.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(false),
        Some(d) if d.eq_ignore_ascii_case("asc") => Ok(false),
        Some(d) if d.eq_ignore_ascii_case("desc") => Ok(true),
        Some(other) => Err(RegistryError::InvalidArgument(format!(
            "unknown sort direction '{other}', allowed: asc, desc"
        ))),
    }
}
