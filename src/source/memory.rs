//! In-memory primary store.
//!
//! Holds records keyed by [`EntityRef`]. On fetch, embedded summaries are
//! refreshed from the rows they point at, the way a join would load them,
//! so a renamed company shows up in the contacts and orders that embed it.
//! A summary whose row was deleted keeps its last loaded value.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use super::{EntitySource, SourceError};
use crate::entity::{
    AdviserRef, CompanyRef, ContactRef, Entity, EntityKind, EntityRef, IdName,
};

#[derive(Default)]
pub struct InMemorySource {
    rows: RwLock<BTreeMap<EntityRef, Entity>>,
    unavailable: AtomicBool,
}

const RELATIONS: &[(EntityKind, &[&str])] = &[
    (EntityKind::Company, &["account_manager", "global_headquarters"]),
    (EntityKind::Contact, &["company", "adviser"]),
    (EntityKind::Interaction, &["company", "contact", "dit_adviser"]),
    (
        EntityKind::Order,
        &["company", "contact", "created_by", "subscribers", "assignees"],
    ),
];

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn put(&self, entity: impl Into<Entity>) -> EntityRef {
        let entity = entity.into();
        let key = entity.entity_ref();
        self.rows.write().insert(key, entity);
        key
    }

    pub fn remove(&self, key: EntityRef) -> Option<Entity> {
        self.rows.write().remove(&key)
    }

    /// Stored row as written, without refreshing summaries.
    pub fn get(&self, key: EntityRef) -> Option<Entity> {
        self.rows.read().get(&key).cloned()
    }

    /// Mutate a stored row in place. Returns false when it does not exist.
    pub fn update(&self, key: EntityRef, f: impl FnOnce(&mut Entity)) -> bool {
        match self.rows.write().get_mut(&key) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Make every read fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("in-memory source switched off".into()))
        } else {
            Ok(())
        }
    }

    fn hydrate(rows: &BTreeMap<EntityRef, Entity>, mut entity: Entity) -> Entity {
        let adviser = |a: &mut AdviserRef| {
            if let Some(Entity::Adviser(current)) = rows.get(&EntityRef::new(EntityKind::Adviser, a.id)) {
                *a = AdviserRef::from(current);
            }
        };
        let company_name = |c: &mut IdName| {
            if let Some(Entity::Company(current)) = rows.get(&EntityRef::new(EntityKind::Company, c.id)) {
                c.name = current.name.clone();
            }
        };
        let contact = |c: &mut ContactRef| {
            if let Some(Entity::Contact(current)) = rows.get(&EntityRef::new(EntityKind::Contact, c.id)) {
                *c = ContactRef::from(current);
            }
        };

        match &mut entity {
            Entity::Company(company) => {
                company.account_manager.iter_mut().for_each(adviser);
                company.global_headquarters.iter_mut().for_each(company_name);
            }
            Entity::Contact(c) => {
                if let Some(company) = c.company.as_mut() {
                    if let Some(Entity::Company(current)) =
                        rows.get(&EntityRef::new(EntityKind::Company, company.id))
                    {
                        *company = CompanyRef::from(current);
                    }
                }
                c.adviser.iter_mut().for_each(adviser);
            }
            Entity::Interaction(i) => {
                i.company.iter_mut().for_each(company_name);
                i.contact.iter_mut().for_each(contact);
                i.dit_adviser.iter_mut().for_each(adviser);
            }
            Entity::Order(o) => {
                o.company.iter_mut().for_each(company_name);
                o.contact.iter_mut().for_each(contact);
                o.created_by.iter_mut().for_each(adviser);
                o.subscribers.iter_mut().for_each(adviser);
                o.assignees.iter_mut().for_each(adviser);
            }
            Entity::Adviser(_) => {}
        }
        entity
    }
}

#[async_trait]
impl EntitySource for InMemorySource {
    async fn fetch(&self, entity: EntityRef) -> Result<Option<Entity>, SourceError> {
        self.check_available()?;
        let rows = self.rows.read();
        Ok(rows.get(&entity).cloned().map(|e| Self::hydrate(&rows, e)))
    }

    async fn scan(&self, kind: EntityKind, offset: usize, limit: usize) -> Result<Vec<Entity>, SourceError> {
        self.check_available()?;
        let rows = self.rows.read();
        let lower = EntityRef::new(kind, Uuid::nil());
        Ok(rows
            .range(lower..)
            .take_while(|(key, _)| key.kind == kind)
            .skip(offset)
            .take(limit)
            .map(|(_, e)| Self::hydrate(&rows, e.clone()))
            .collect())
    }

    async fn count(&self, kind: EntityKind) -> Result<usize, SourceError> {
        self.check_available()?;
        Ok(self.rows.read().keys().filter(|key| key.kind == kind).count())
    }

    async fn referencing(
        &self,
        source_kind: EntityKind,
        relation: &str,
        target: Uuid,
    ) -> Result<Vec<Uuid>, SourceError> {
        self.check_available()?;
        let known = RELATIONS
            .iter()
            .any(|(kind, relations)| *kind == source_kind && relations.contains(&relation));
        if !known {
            return Err(SourceError::UnknownRelation {
                kind: source_kind,
                relation: relation.to_string(),
            });
        }
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|(key, _)| key.kind == source_kind)
            .filter(|(_, e)| e.references(relation).contains(&target))
            .map(|(key, _)| key.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Company, Contact, Interaction};

    #[tokio::test]
    async fn test_fetch_refreshes_embedded_company() {
        let source = InMemorySource::new();
        let mut company = Company::new(Uuid::new_v4(), "Old Name");
        source.put(company.clone());

        let mut interaction = Interaction::new(Uuid::new_v4(), "Meeting");
        interaction.company = Some(IdName::new(company.id, "Old Name"));
        let key = source.put(interaction);

        company.name = "New Name".into();
        source.put(company);

        let fetched = source.fetch(key).await.unwrap().unwrap();
        let company = fetched.as_interaction().unwrap().company.as_ref().unwrap();
        assert_eq!(company.name, "New Name");
    }

    #[tokio::test]
    async fn test_deleted_row_keeps_snapshot() {
        let source = InMemorySource::new();
        let company = Company::new(Uuid::new_v4(), "Gone Ltd");
        let company_key = source.put(company.clone());

        let mut contact = Contact::new(Uuid::new_v4(), "Ada", "Lovelace");
        contact.company = Some(CompanyRef::from(&company));
        let key = source.put(contact);

        source.remove(company_key);
        let fetched = source.fetch(key).await.unwrap().unwrap();
        assert_eq!(fetched.as_contact().unwrap().company.as_ref().unwrap().name, "Gone Ltd");
        assert!(source.fetch(company_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_pages_by_kind_in_id_order() {
        let source = InMemorySource::new();
        for i in 0..5 {
            source.put(Company::new(Uuid::new_v4(), format!("c{}", i)));
        }
        source.put(Contact::new(Uuid::new_v4(), "Ada", "Lovelace"));

        let first = source.scan(EntityKind::Company, 0, 3).await.unwrap();
        let rest = source.scan(EntityKind::Company, 3, 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(rest.len(), 2);
        let ids: Vec<Uuid> = first.iter().chain(rest.iter()).map(Entity::id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(source.count(EntityKind::Company).await.unwrap(), 5);
        assert_eq!(source.count(EntityKind::Contact).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_referencing() {
        let source = InMemorySource::new();
        let company = Company::new(Uuid::new_v4(), "Acme");
        source.put(company.clone());

        let mut linked = Contact::new(Uuid::new_v4(), "Ada", "Lovelace");
        linked.company = Some(CompanyRef::from(&company));
        source.put(linked.clone());
        source.put(Contact::new(Uuid::new_v4(), "Alan", "Turing"));

        let ids = source
            .referencing(EntityKind::Contact, "company", company.id)
            .await
            .unwrap();
        assert_eq!(ids, vec![linked.id]);

        assert!(matches!(
            source.referencing(EntityKind::Contact, "spouse", company.id).await,
            Err(SourceError::UnknownRelation { .. })
        ));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let source = InMemorySource::new();
        source.set_unavailable(true);
        assert!(matches!(
            source.count(EntityKind::Company).await,
            Err(SourceError::Unavailable(_))
        ));
        source.set_unavailable(false);
        assert_eq!(source.count(EntityKind::Company).await.unwrap(), 0);
    }
}
