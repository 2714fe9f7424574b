//! Standalone steward CRUD.
//!
//! Same shared-row rules as locations: direct deletion while settlements
//! still reference the steward fails with `DeletionBlocked` carrying the
//! referencing settlement ids.

use futures::FutureExt;

use crate::common::{PageDto, PageRequest, RegistryError, StewardId};
use crate::domains::stewards::models::{Steward, StewardInput};
use crate::kernel::events::{json_payload, ChangeEvent, EntityKind};
use crate::kernel::RegistryDeps;

/// Sparse exact-match filter over stewards.
#[derive(Debug, Clone, Default)]
pub struct StewardFilter {
    pub id: Option<StewardId>,
    pub height: Option<f32>,
}

impl StewardFilter {
    fn matches(&self, steward: &Steward) -> bool {
        self.id.map_or(true, |id| steward.id == id)
            && self.height.map_or(true, |h| steward.height == h)
    }
}

#[derive(Clone)]
pub struct StewardService {
    deps: RegistryDeps,
}

impl StewardService {
    pub fn new(deps: RegistryDeps) -> Self {
        Self { deps }
    }

    pub async fn create(&self, input: StewardInput) -> Result<Steward, RegistryError> {
        validate(&input)?;
        let input = &input;
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    let steward = tx.insert_steward(input).await?;
                    tx.queue_event(ChangeEvent::created(
                        EntityKind::Steward,
                        steward.id.into_uuid(),
                        json_payload(&steward),
                    ));
                    Ok(steward)
                }
                .boxed()
            })
            .await
    }

    pub async fn update(
        &self,
        id: StewardId,
        input: StewardInput,
    ) -> Result<Steward, RegistryError> {
        validate(&input)?;
        let input = &input;
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    let mut steward = tx
                        .find_steward(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Steward", id))?;
                    steward.height = input.height;
                    tx.update_steward(&steward).await?;
                    tx.queue_event(ChangeEvent::updated(
                        EntityKind::Steward,
                        steward.id.into_uuid(),
                        json_payload(&steward),
                    ));
                    Ok(steward)
                }
                .boxed()
            })
            .await
    }

    /// Delete a steward, refusing while settlements still reference them.
    pub async fn delete(&self, id: StewardId) -> Result<(), RegistryError> {
        self.deps
            .runner
            .serializable(move |tx| {
                async move {
                    tx.find_steward(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Steward", id))?;
                    let usage_count = tx.count_settlements_by_steward(id).await?;
                    if usage_count > 0 {
                        let blocking_ids = tx.settlement_ids_by_steward(id).await?;
                        return Err(RegistryError::DeletionBlocked {
                            entity: "Steward".to_string(),
                            id: id.into_uuid(),
                            usage_count,
                            blocking_ids,
                        });
                    }
                    tx.delete_steward(id).await?;
                    tx.queue_event(ChangeEvent::deleted(EntityKind::Steward, id.into_uuid()));
                    Ok(())
                }
                .boxed()
            })
            .await
    }

    pub async fn get(&self, id: StewardId) -> Result<Steward, RegistryError> {
        self.deps
            .runner
            .read_only(move |tx| {
                async move {
                    tx.find_steward(id)
                        .await?
                        .ok_or_else(|| RegistryError::not_found("Steward", id))
                }
                .boxed()
            })
            .await
    }

    pub async fn list(&self) -> Result<Vec<Steward>, RegistryError> {
        self.deps
            .runner
            .read_only(|tx| {
                async move {
                    let mut stewards = tx.all_stewards().await?;
                    stewards.sort_by_key(|s| s.id);
                    Ok(stewards)
                }
                .boxed()
            })
            .await
    }

    pub async fn page(
        &self,
        filter: &StewardFilter,
        sort_by: Option<&str>,
        dir: Option<&str>,
        page: PageRequest,
    ) -> Result<PageDto<Steward>, RegistryError> {
        let by_height = match sort_by.map(str::trim).filter(|s| !s.is_empty()) {
            None | Some("id") => false,
            Some("height") => true,
            Some(other) => {
                return Err(RegistryError::InvalidArgument(format!(
                    "unknown sort field '{other}'"
                )))
            }
        };
        let descending = match dir.map(str::trim).filter(|s| !s.is_empty()) {
            None => false,
            Some(d) if d.eq_ignore_ascii_case("asc") => false,
            Some(d) if d.eq_ignore_ascii_case("desc") => true,
            Some(other) => {
                return Err(RegistryError::InvalidArgument(format!(
                    "unknown sort direction '{other}', allowed: asc, desc"
                )))
            }
        };
        let window = page.validate();
        let mut stewards = self.list().await?;
        stewards.retain(|s| filter.matches(s));
        stewards.sort_by(|a, b| {
            let ordering = if by_height {
                a.height.total_cmp(&b.height)
            } else {
                a.id.cmp(&b.id)
            };
            let ordering = if descending {
                ordering.reverse()
            } else {
                ordering
            };
            ordering.then(a.id.cmp(&b.id))
        });
        Ok(PageDto::from_sorted(stewards, window))
    }
}

fn validate(input: &StewardInput) -> Result<(), RegistryError> {
    let fields = input.field_errors();
    if fields.is_empty() {
        Ok(())
    } else {
        Err(RegistryError::ValidationFailed { fields })
    }
}
