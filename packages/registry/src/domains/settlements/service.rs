//! Settlement mutations, reads, and analytics.
//!
//! All mutations run inside a retried SERIALIZABLE transaction. Relationship
//! resolution happens first, then the uniqueness and capital invariants,
//! then the persist; change events are queued on the transaction and only
//! published after commit. The read-then-check uniqueness logic is safe
//! because the store rejects conflicting concurrent writers at commit.

use futures::FutureExt;

use crate::common::errors::rule;
use crate::common::{
    LocationId, PageDto, PageRequest, Patch, RegistryError, RelationInput, SettlementId, StewardId,
};
use crate::domains::locations::models::{Location, LocationInput};
use crate::domains::settlements::data::SettlementData;
use crate::domains::settlements::filter::SettlementFilter;
use crate::domains::settlements::models::{
    normalize_name, NewSettlement, Settlement, SettlementInput, SettlementUpdate,
};
use crate::domains::settlements::sort::SortSpec;
use crate::domains::stewards::models::{Steward, StewardInput};
use crate::kernel::events::{json_payload, ChangeEvent, EntityKind};
use crate::kernel::store::Tx;
use crate::kernel::RegistryDeps;

/// Orphan-cleanup switches for settlement deletion. When set, the related
/// row is removed only if nothing references it after the settlement is
/// gone; otherwise it is left in place without error.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrphanFlags {
    pub delete_location: bool,
    pub delete_steward: bool,
}

#[derive(Clone)]
pub struct SettlementService {
    deps: RegistryDeps,
}

impl SettlementService {
    pub fn new(deps: RegistryDeps) -> Self {
        Self { deps }
    }

    pub async fn create(&self, input: SettlementInput) -> Result<SettlementData, RegistryError> {
        input.validate()?;
        let input = &input;
        self.deps
            .runner
            .serializable(move |tx| Self::create_in_tx(tx, input).boxed())
            .await
    }

    /// Create one settlement inside an already-open transaction. Also used
    /// by the bulk importer, which runs many of these under one unit.
    pub(crate) async fn create_in_tx(
        tx: &mut Tx<'_>,
        input: &SettlementInput,
    ) -> Result<SettlementData, RegistryError> {
        let location = resolve_location(tx, &input.location).await?;
        let steward = resolve_steward(tx, &input.steward).await?;

        let name = normalize_name(&input.name);
        if tx.settlement_name_taken(&name, None).await? {
            return Err(RegistryError::business_rule(
                rule::NAME_NOT_UNIQUE,
                format!("a settlement named '{name}' already exists"),
            ));
        }
        if input.capital && steward.is_none() {
            return Err(RegistryError::business_rule(
                rule::CAPITAL_REQUIRES_GOVERNOR,
                "a capital settlement requires a steward",
            ));
        }

        let settlement = tx
            .insert_settlement(NewSettlement {
                name,
                area: input.area,
                population: input.population,
                capital: input.capital,
                meters_above_sea_level: input.meters_above_sea_level,
                telephone_code: input.telephone_code,
                climate: input.climate,
                government: input.government,
                establishment_date: input.establishment_date,
                location_id: location.id,
                steward_id: steward.as_ref().map(|s| s.id),
            })
            .await?;

        let data = SettlementData::assemble(settlement, location, steward);
        tx.queue_event(ChangeEvent::created(
            EntityKind::Settlement,
            data.id.into_uuid(),
            json_payload(&data),
        ));
        Ok(data)
    }

    pub async fn update(
        &self,
        id: SettlementId,
        update: SettlementUpdate,
    ) -> Result<SettlementData, RegistryError> {
        update.validate()?;
        let update = &update;
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    let existing = tx
                        .find_settlement(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Settlement", id))?;

                    let location = apply_location_patch(tx, &existing, update).await?;
                    let steward = apply_steward_patch(tx, &existing, update).await?;

                    let name = normalize_name(&update.name);
                    if tx.settlement_name_taken(&name, Some(id)).await? {
                        return Err(RegistryError::business_rule(
                            rule::NAME_NOT_UNIQUE,
                            format!("a settlement named '{name}' already exists"),
                        ));
                    }
                    if update.capital && steward.is_none() {
                        return Err(RegistryError::business_rule(
                            rule::CAPITAL_REQUIRES_GOVERNOR,
                            "a capital settlement requires a steward",
                        ));
                    }

                    let settlement = Settlement {
                        id,
                        name,
                        area: update.area,
                        population: update.population,
                        capital: update.capital,
                        meters_above_sea_level: update.meters_above_sea_level,
                        telephone_code: update.telephone_code,
                        climate: update.climate,
                        government: update.government,
                        creation_date: existing.creation_date,
                        establishment_date: update.establishment_date,
                        location_id: location.id,
                        steward_id: steward.as_ref().map(|s| s.id),
                    };
                    tx.update_settlement(&settlement).await?;

                    let data = SettlementData::assemble(settlement, location, steward);
                    tx.queue_event(ChangeEvent::updated(
                        EntityKind::Settlement,
                        data.id.into_uuid(),
                        json_payload(&data),
                    ));
                    Ok(data)
                }
                .boxed()
            })
            .await
    }

    pub async fn delete(&self, id: SettlementId, orphans: OrphanFlags) -> Result<(), RegistryError> {
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    let settlement = tx
                        .find_settlement(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Settlement", id))?;
                    tx.delete_settlement(id).await?;
                    tx.queue_event(ChangeEvent::deleted(
                        EntityKind::Settlement,
                        id.into_uuid(),
                    ));

                    // Orphan cleanup pre-checks usage and skips silently when
                    // another settlement still holds the reference.
                    if orphans.delete_location {
                        let usage = tx
                            .count_settlements_by_location(settlement.location_id)
                            .await?;
                        if usage == 0 && tx.delete_location(settlement.location_id).await? {
                            tx.queue_event(ChangeEvent::deleted(
                                EntityKind::Location,
                                settlement.location_id.into_uuid(),
                            ));
                        }
                    }
                    if orphans.delete_steward {
                        if let Some(steward_id) = settlement.steward_id {
                            let usage = tx.count_settlements_by_steward(steward_id).await?;
                            if usage == 0 && tx.delete_steward(steward_id).await? {
                                tx.queue_event(ChangeEvent::deleted(
                                    EntityKind::Steward,
                                    steward_id.into_uuid(),
                                ));
                            }
                        }
                    }
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    pub async fn get(&self, id: SettlementId) -> Result<SettlementData, RegistryError> {
        self.deps
            .runner
            .read_only(move |tx| {
                async move {
                    let settlement = tx
                        .find_settlement(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Settlement", id))?;
                    resolve_view(tx, settlement).await
                }
                .boxed()
            })
            .await
    }

    /// All settlements resolved, ordered by ascending id.
    pub async fn list(&self) -> Result<Vec<SettlementData>, RegistryError> {
        self.deps
            .runner
            .read_only(|tx| {
                async move {
                    let mut settlements = tx.all_settlements().await?;
                    settlements.sort_by_key(|s| s.id);
                    let mut out = Vec::with_capacity(settlements.len());
                    for settlement in settlements {
                        out.push(resolve_view(tx, settlement).await?);
                    }
                    Ok(out)
                }
                .boxed()
            })
            .await
    }

    /// Filtered, sorted, paginated listing.
    pub async fn page(
        &self,
        filter: &SettlementFilter,
        sort_tokens: &[String],
        sort_by: Option<&str>,
        dir: Option<&str>,
        page: PageRequest,
    ) -> Result<PageDto<SettlementData>, RegistryError> {
        let predicate = filter.build()?;
        let spec = SortSpec::resolve(sort_tokens, sort_by, dir)?;
        let window = page.validate();

        let predicate = &predicate;
        let spec = &spec;
        self.deps
            .runner
            .read_only(move |tx| {
                async move {
                    let settlements = tx.all_settlements().await?;
                    let mut views = Vec::new();
                    for settlement in settlements {
                        if predicate(&settlement) {
                            views.push(resolve_view(tx, settlement).await?);
                        }
                    }
                    spec.sort(&mut views);
                    Ok(PageDto::from_sorted(views, window))
                }
                .boxed()
            })
            .await
    }

    // -- analytics reads --

    /// Mean of the telephone codes that are set; 0.0 when none are.
    pub async fn average_telephone_code(&self) -> Result<f64, RegistryError> {
        let settlements = self.all().await?;
        let codes: Vec<i32> = settlements.iter().filter_map(|s| s.telephone_code).collect();
        if codes.is_empty() {
            return Ok(0.0);
        }
        Ok(codes.iter().map(|&c| c as f64).sum::<f64>() / codes.len() as f64)
    }

    pub async fn find_by_name_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<SettlementData>, RegistryError> {
        let mut all = self.list().await?;
        all.retain(|s| s.name.starts_with(prefix));
        Ok(all)
    }

    /// Distinct elevations across all settlements, ascending.
    pub async fn distinct_elevations(&self) -> Result<Vec<i32>, RegistryError> {
        let settlements = self.all().await?;
        let mut elevations: Vec<i32> = settlements
            .iter()
            .filter_map(|s| s.meters_above_sea_level)
            .collect();
        elevations.sort_unstable();
        elevations.dedup();
        Ok(elevations)
    }

    /// Distance from `(x, y)` to the settlement with the largest area.
    pub async fn distance_to_largest_area(&self, x: f32, y: f32) -> Result<f64, RegistryError> {
        let views = self.list().await?;
        let largest = views
            .iter()
            .max_by_key(|v| v.area)
            .ok_or(RegistryError::NotFound {
                entity: "Settlement".to_string(),
                id: None,
            })?;
        Ok(distance(x, y, largest.location.x, largest.location.y))
    }

    /// Distance from the origin to the settlement with the earliest
    /// establishment date. Settlements without one are ignored.
    pub async fn distance_from_origin_to_oldest(&self) -> Result<f64, RegistryError> {
        let views = self.list().await?;
        let oldest = views
            .iter()
            .filter(|v| v.establishment_date.is_some())
            .min_by_key(|v| v.establishment_date)
            .ok_or(RegistryError::NotFound {
                entity: "Settlement".to_string(),
                id: None,
            })?;
        Ok(distance(0.0, 0.0, oldest.location.x, oldest.location.y))
    }

    async fn all(&self) -> Result<Vec<Settlement>, RegistryError> {
        self.deps
            .runner
            .read_only(|tx| async move { Ok(tx.all_settlements().await?) }.boxed())
            .await
    }
}

fn distance(x0: f32, y0: f32, x1: f32, y1: f32) -> f64 {
    let dx = (x1 - x0) as f64;
    let dy = (y1 - y0) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Expand a settlement row into its resolved representation. A missing
/// location or steward row here means the store's references are broken.
async fn resolve_view(tx: &mut Tx<'_>, settlement: Settlement) -> Result<SettlementData, RegistryError> {
    let location = tx
        .find_location(settlement.location_id)
        .await?
        .ok_or_else(|| {
            RegistryError::Internal(format!(
                "settlement {} references missing location {}",
                settlement.id, settlement.location_id
            ))
        })?;
    let steward = match settlement.steward_id {
        Some(steward_id) => Some(tx.find_steward(steward_id).await?.ok_or_else(|| {
            RegistryError::Internal(format!(
                "settlement {} references missing steward {}",
                settlement.id, steward_id
            ))
        })?),
        None => None,
    };
    Ok(SettlementData::assemble(settlement, location, steward))
}

async fn resolve_location(
    tx: &mut Tx<'_>,
    relation: &RelationInput<LocationId, LocationInput>,
) -> Result<Location, RegistryError> {
    match relation {
        RelationInput::ById(id) => tx
            .find_location(*id)
            .await?
            .ok_or_else(|| RegistryError::related_not_found("Location", *id)),
        RelationInput::Inline(input) => {
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
        RelationInput::Absent => Err(RegistryError::InvalidArgument(
            "a location reference or inline location is required".to_string(),
        )),
    }
}

async fn resolve_steward(
    tx: &mut Tx<'_>,
    relation: &RelationInput<StewardId, StewardInput>,
) -> Result<Option<Steward>, RegistryError> {
    match relation {
        RelationInput::ById(id) => Ok(Some(
            tx.find_steward(*id)
                .await?
                .ok_or_else(|| RegistryError::related_not_found("Steward", *id))?,
        )),
        RelationInput::Inline(input) => {
            let steward = tx.insert_steward(input).await?;
            tx.queue_event(ChangeEvent::created(
                EntityKind::Steward,
                steward.id.into_uuid(),
                json_payload(&steward),
            ));
            Ok(Some(steward))
        }
        RelationInput::Absent => Ok(None),
    }
}

/// Resolve the location the updated settlement should point at. The
/// location is required, so an explicit null is rejected; an inline payload
/// mutates the currently referenced row in place.
async fn apply_location_patch(
    tx: &mut Tx<'_>,
    existing: &Settlement,
    update: &SettlementUpdate,
) -> Result<Location, RegistryError> {
    match &update.location {
        Patch::Unset => tx
            .find_location(existing.location_id)
            .await?
            .ok_or_else(|| RegistryError::related_not_found("Location", existing.location_id)),
        Patch::Null => Err(RegistryError::InvalidArgument(
            "location cannot be cleared; settlements always have one".to_string(),
        )),
        Patch::Value(RelationInput::ById(id)) => tx
            .find_location(*id)
            .await?
            .ok_or_else(|| RegistryError::related_not_found("Location", *id)),
        Patch::Value(RelationInput::Inline(input)) => {
            let mut location = tx
                .find_location(existing.location_id)
                .await?
                .ok_or_else(|| {
                    RegistryError::related_not_found("Location", existing.location_id)
                })?;
            if tx
                .location_at(input.x, input.y, Some(location.id))
                .await?
                .is_some()
            {
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
        Patch::Value(RelationInput::Absent) => Err(RegistryError::InvalidArgument(
            "provide either location_id or an inline location, not an empty relation".to_string(),
        )),
    }
}

/// Resolve the steward the updated settlement should point at. Null clears
/// the reference; an inline payload mutates the current steward row in
/// place, or creates one when the settlement had none.
async fn apply_steward_patch(
    tx: &mut Tx<'_>,
    existing: &Settlement,
    update: &SettlementUpdate,
) -> Result<Option<Steward>, RegistryError> {
    match &update.steward {
        Patch::Unset => match existing.steward_id {
            Some(id) => Ok(Some(tx.find_steward(id).await?.ok_or_else(|| {
                RegistryError::related_not_found("Steward", id)
            })?)),
            None => Ok(None),
        },
        Patch::Null => Ok(None),
        Patch::Value(RelationInput::ById(id)) => Ok(Some(
            tx.find_steward(*id)
                .await?
                .ok_or_else(|| RegistryError::related_not_found("Steward", *id))?,
        )),
        Patch::Value(RelationInput::Inline(input)) => match existing.steward_id {
            Some(id) => {
                let mut steward = tx
                    .find_steward(id)
                    .await?
                    .ok_or_else(|| RegistryError::related_not_found("Steward", id))?;
                steward.height = input.height;
                tx.update_steward(&steward).await?;
                tx.queue_event(ChangeEvent::updated(
                    EntityKind::Steward,
                    steward.id.into_uuid(),
                    json_payload(&steward),
                ));
                Ok(Some(steward))
            }
            None => {
                let steward = tx.insert_steward(input).await?;
                tx.queue_event(ChangeEvent::created(
                    EntityKind::Steward,
                    steward.id.into_uuid(),
                    json_payload(&steward),
                ));
                Ok(Some(steward))
            }
        },
        Patch::Value(RelationInput::Absent) => Err(RegistryError::InvalidArgument(
            "provide either steward_id or an inline steward, not an empty relation".to_string(),
        )),
    }
}
