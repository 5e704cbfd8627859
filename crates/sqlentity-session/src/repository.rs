//! Generic CRUD repository.
//!
//! A [`Repository<E>`] is built once per entity type from its registered
//! metadata. Writes run on the [`TransactionManager`]'s thread-bound
//! connection and fail outside a transaction; reads use that connection
//! when a transaction is active and an ad hoc one otherwise.
//!
//! Row mapping starts from `E::default()`, assigns every scalar column by
//! case-insensitive label, then wires each relationship through its
//! [`Binding`](sqlentity_core::Binding). Relationship failures leave the
//! attribute unset and are logged, with one exception: an eager
//! relationship whose target has no repository fails the whole mapping.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use sqlentity_core::error::{MetadataErrorKind, StaleEntityError};
use sqlentity_core::{
    Accessor, BindRequest, Binding, ColumnDescriptor, Entity, EntityDescriptor, EntityLoader,
    EntityMetadata, Error, FetchMode, Lookup, Registry, RelationshipDescriptor,
    RepositoryResolver, Result, Row, Value,
};
use sqlentity_query::{
    ClauseBuilder, DeleteBuilder, InsertBuilder, IntoClause, Page, PageRequest, SelectBuilder,
    UpdateBuilder,
};

use crate::transaction::TransactionManager;

/// CRUD operations for one entity type.
pub struct Repository<E: Entity> {
    metadata: Arc<EntityMetadata>,
    descriptor: EntityDescriptor<E>,
    key: ColumnDescriptor,
    registry: Registry,
    manager: TransactionManager,
    resolver: Arc<dyn RepositoryResolver>,
}

impl<E: Entity> Repository<E> {
    /// Build a repository over the global registry.
    ///
    /// Fails if `E` does not scan, or scans without a key column.
    pub fn new(manager: TransactionManager, resolver: Arc<dyn RepositoryResolver>) -> Result<Self> {
        Self::with_registry(Registry::global(), manager, resolver)
    }

    /// Build a repository whose entity and relationship targets are
    /// registered in `registry`.
    pub fn with_registry(
        registry: &Registry,
        manager: TransactionManager,
        resolver: Arc<dyn RepositoryResolver>,
    ) -> Result<Self> {
        let metadata = registry.register::<E>()?;
        let key = metadata.require_key()?.clone();
        let descriptor = E::descriptor();
        if descriptor.accessor(key.attribute()).is_none() {
            return Err(Error::metadata(
                MetadataErrorKind::MissingKey,
                metadata.entity_type().name(),
                format!("key attribute '{}' has no accessor", key.attribute()),
            ));
        }
        Ok(Self {
            metadata,
            descriptor,
            key,
            registry: registry.clone(),
            manager,
            resolver,
        })
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn manager(&self) -> &TransactionManager {
        &self.manager
    }

    fn table(&self) -> &str {
        self.metadata.table_name()
    }

    fn accessor(&self, column: &ColumnDescriptor) -> Result<&Accessor<E>> {
        self.descriptor.accessor(column.attribute()).ok_or_else(|| {
            Error::metadata(
                MetadataErrorKind::InvalidEntity,
                self.metadata.entity_type().name(),
                format!("attribute '{}' has no accessor", column.attribute()),
            )
        })
    }

    fn key_of(&self, entity: &E) -> Result<Value> {
        Ok(self.accessor(&self.key)?.read(entity))
    }

    fn key_filter(&self, id: Value) -> Result<sqlentity_query::Clause> {
        if id.is_null() {
            return Err(Error::Custom(format!(
                "{} key must not be NULL",
                self.metadata.entity_type().name()
            )));
        }
        ClauseBuilder::new().equal(self.key.name(), id).build()
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::debug!(table = self.table(), sql, params = params.len(), "Query");
        self.manager
            .with_read_connection(|conn| conn.query(sql, params))
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::debug!(table = self.table(), sql, params = params.len(), "Execute");
        self.manager
            .with_connection(|conn| conn.execute(sql, params))
    }

    fn cache_put(&self, id: Value, entity: &E) {
        if self.manager.is_active() {
            let entity = entity.clone();
            if let Err(e) = self.manager.with_cache(|cache| cache.put(id, entity)) {
                tracing::warn!(table = self.table(), error = %e, "Entity cache unavailable");
            }
        }
    }

    fn cache_get(&self, id: &Value) -> Option<E> {
        if !self.manager.is_active() {
            return None;
        }
        self.manager
            .with_cache(|cache| cache.get::<E>(id))
            .ok()
            .flatten()
    }

    fn cache_evict(&self, id: &Value) {
        if self.manager.is_active() {
            let _ = self.manager.with_cache(|cache| cache.remove::<E>(id));
        }
    }

    fn row_values(&self, entity: &E) -> Result<Vec<Value>> {
        self.metadata
            .columns()
            .iter()
            .map(|column| Ok(self.accessor(column)?.read(entity)))
            .collect()
    }

    /// Insert `entity` and return it.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn save(&self, entity: E) -> Result<E> {
        let (sql, params) = InsertBuilder::for_entity(&self.metadata)
            .values(self.row_values(&entity)?)
            .build_with_echo()?;
        self.execute(&sql, &params)?;
        self.cache_put(self.key_of(&entity)?, &entity);
        Ok(entity)
    }

    /// Insert every entity with one multi-row INSERT.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name(), count = entities.len()))]
    pub fn save_all(&self, entities: Vec<E>) -> Result<Vec<E>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let mut values = Vec::with_capacity(entities.len() * self.metadata.columns().len());
        for entity in &entities {
            values.extend(self.row_values(entity)?);
        }
        let (sql, params) = InsertBuilder::for_entity(&self.metadata)
            .values(values)
            .build_with_echo()?;
        self.execute(&sql, &params)?;
        for entity in &entities {
            self.cache_put(self.key_of(entity)?, entity);
        }
        Ok(entities)
    }

    /// Update every non-key column of the row with `entity`'s key.
    ///
    /// Fails with a stale-entity error if no row was affected.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn update(&self, entity: E) -> Result<E> {
        let id = self.key_of(&entity)?;
        let mut builder = UpdateBuilder::for_entity(&self.metadata);
        for column in self.metadata.columns().iter().filter(|c| !c.is_key()) {
            builder = builder.set(column.name(), self.accessor(column)?.read(&entity));
        }
        let (sql, params) = builder
            .filter(self.key_filter(id.clone())?)
            .build_with_echo()?;

        if self.execute(&sql, &params)? == 0 {
            return Err(Error::StaleEntity(StaleEntityError {
                table: self.table().to_string(),
                key: id.to_string(),
            }));
        }
        self.cache_put(id, &entity);
        Ok(entity)
    }

    /// Delete the row with key `id`. Returns the affected row count.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn delete_by_id(&self, id: impl Into<Value>) -> Result<u64> {
        let id = id.into();
        let (sql, params) = DeleteBuilder::for_entity(&self.metadata)
            .filter(self.key_filter(id.clone())?)
            .build_with_echo()?;
        let affected = self.execute(&sql, &params)?;
        self.cache_evict(&id);
        Ok(affected)
    }

    /// Delete every row matching `condition`.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn delete_with_condition(&self, condition: impl IntoClause) -> Result<u64> {
        let (sql, params) = DeleteBuilder::for_entity(&self.metadata)
            .filter(condition.into_clause()?)
            .build_with_echo()?;
        let affected = self.execute(&sql, &params)?;
        if affected > 0 {
            self.manager
                .with_cache(|cache| cache.clear_type::<E>())
                .ok();
        }
        Ok(affected)
    }

    /// Find by key, consulting the transaction cache first.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<E>> {
        let id = id.into();
        if let Some(cached) = self.cache_get(&id) {
            return Ok(Some(cached));
        }

        let (sql, params) = SelectBuilder::for_entity(&self.metadata)
            .filter(self.key_filter(id.clone())?)
            .build_with_echo()?;
        let Some(row) = self.query(&sql, &params)?.into_iter().next() else {
            return Ok(None);
        };
        let entity = self.map_row(&row)?;
        self.cache_put(id, &entity);
        Ok(Some(entity))
    }

    /// Whether a row with key `id` exists.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn is_exist(&self, id: impl Into<Value>) -> Result<bool> {
        let (sql, params) = SelectBuilder::for_entity(&self.metadata)
            .columns(["1"])
            .filter(self.key_filter(id.into())?)
            .limit(1)
            .build_with_echo()?;
        Ok(!self.query(&sql, &params)?.is_empty())
    }

    /// Number of rows in the table.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn count(&self) -> Result<u64> {
        let (sql, params) = SelectBuilder::for_entity(&self.metadata)
            .columns(["COUNT(*) AS total"])
            .build_with_echo()?;
        read_total(&self.query(&sql, &params)?)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn find_all(&self) -> Result<Vec<E>> {
        self.fetch(SelectBuilder::for_entity(&self.metadata))
    }

    /// One page of all rows.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name(), page = request.page()))]
    pub fn find_all_paged(&self, request: &PageRequest) -> Result<Page<E>> {
        self.fetch_page(SelectBuilder::for_entity(&self.metadata), request)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name()))]
    pub fn find_with_condition(&self, condition: impl IntoClause) -> Result<Vec<E>> {
        self.fetch(SelectBuilder::for_entity(&self.metadata).filter(condition.into_clause()?))
    }

    /// One page of the rows matching `condition`.
    #[tracing::instrument(level = "debug", skip_all, fields(table = %self.metadata.table_name(), page = request.page()))]
    pub fn find_with_condition_paged(
        &self,
        condition: impl IntoClause,
        request: &PageRequest,
    ) -> Result<Page<E>> {
        self.fetch_page(
            SelectBuilder::for_entity(&self.metadata).filter(condition.into_clause()?),
            request,
        )
    }

    /// Rows whose `column` equals `value`.
    pub fn find_by_column(&self, column: &str, value: impl Into<Value>) -> Result<Vec<E>> {
        let value = value.into();
        if value.is_null() {
            return Ok(Vec::new());
        }
        let filter = ClauseBuilder::new().equal(column, value).build()?;
        self.fetch(SelectBuilder::for_entity(&self.metadata).filter(filter))
    }

    fn fetch(&self, select: SelectBuilder) -> Result<Vec<E>> {
        let (sql, params) = select.build_with_echo()?;
        let rows = self.query(&sql, &params)?;
        rows.iter().map(|row| self.map_row(row)).collect()
    }

    fn fetch_page(&self, select: SelectBuilder, request: &PageRequest) -> Result<Page<E>> {
        let (count_sql, count_params) = select.count_wrapped()?;
        let total = read_total(&self.query(&count_sql, &count_params)?)?;
        let content = self.fetch(select.page(request))?;
        Ok(Page::new(content, total, request.clone()))
    }

    /// Materialize one row.
    pub fn map_row(&self, row: &Row) -> Result<E> {
        let mut entity = E::default();
        for column in self.metadata.columns() {
            if let Some(value) = row.get_ignore_case(column.name()) {
                self.accessor(column)?.write(&mut entity, value.clone())?;
            }
        }

        let key = row.get_ignore_case(self.key.name()).cloned();
        for relationship in self.metadata.relationships() {
            let Some(binding) = self.descriptor.binding(relationship.attribute()) else {
                continue;
            };
            let result = self
                .lookup_for(relationship, binding, row, key.as_ref())
                .and_then(|lookup| {
                    binding.bind(
                        &mut entity,
                        BindRequest {
                            fetch: relationship.fetch(),
                            lookup,
                            resolver: Arc::clone(&self.resolver),
                        },
                    )
                });
            match result {
                Ok(()) => {}
                Err(e @ Error::RepositoryNotFound(_))
                    if relationship.fetch() == FetchMode::Eager =>
                {
                    return Err(e);
                }
                Err(e) => tracing::warn!(
                    table = self.table(),
                    attribute = relationship.attribute(),
                    error = %e,
                    "Relationship left unset"
                ),
            }
        }
        Ok(entity)
    }

    /// Where the target rows of `relationship` live, given this row.
    fn lookup_for(
        &self,
        relationship: &RelationshipDescriptor,
        binding: &Binding<E>,
        row: &Row,
        key: Option<&Value>,
    ) -> Result<Option<Lookup>> {
        if relationship.is_owning_side() {
            let Some(join_column) = relationship.join_column() else {
                return Ok(None);
            };
            return Ok(row
                .get_ignore_case(join_column)
                .filter(|fk| !fk.is_null())
                .map(|fk| Lookup::ById(fk.clone())));
        }

        let Some(key) = key.filter(|k| !k.is_null()) else {
            return Ok(None);
        };
        let column = match (relationship.mapped_by(), relationship.join_column()) {
            (Some(mapped_by), _) => {
                let Some(target) = binding.target_metadata(&self.registry)? else {
                    return Ok(None);
                };
                target
                    .relationship(mapped_by)
                    .and_then(RelationshipDescriptor::join_column)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Error::metadata(
                            MetadataErrorKind::InvalidRelationship,
                            self.metadata.entity_type().name(),
                            format!(
                                "'{}' is mapped by '{}.{}', which has no join column",
                                relationship.attribute(),
                                target.entity_type(),
                                mapped_by
                            ),
                        )
                    })?
            }
            (None, Some(join_column)) => join_column.to_string(),
            (None, None) => return Ok(None),
        };
        Ok(Some(Lookup::ByColumn {
            column,
            value: key.clone(),
        }))
    }
}

fn read_total(rows: &[Row]) -> Result<u64> {
    let Some(row) = rows.first() else {
        return Ok(0);
    };
    let total: i64 = row.get_named("total")?;
    Ok(u64::try_from(total).unwrap_or(0))
}

impl<E: Entity> EntityLoader for Repository<E> {
    fn load(&self, lookup: &Lookup) -> Result<Vec<Box<dyn Any + Send>>> {
        let found = match lookup {
            Lookup::ById(id) => self.find_by_id(id.clone())?.into_iter().collect(),
            Lookup::ByColumn { column, value } => self.find_by_column(column, value.clone())?,
        };
        Ok(found
            .into_iter()
            .map(|entity| Box::new(entity) as Box<dyn Any + Send>)
            .collect())
    }
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &self.metadata.entity_type())
            .field("table", &self.metadata.table_name())
            .field("key", &self.key.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, PoisonError};

    use sqlentity_core::error::TransactionErrorKind;
    use sqlentity_core::{
        ColumnDef, Connection, ConnectionFactory, EntityType, LazyCollection, LazyReference,
        RelationshipDef,
    };
    use sqlentity_query::{Order, Sort};

    use crate::registry::RepositoryRegistry;

    #[derive(Debug, Default, Clone)]
    struct Team {
        id: i64,
        name: String,
        heroes: LazyCollection<Hero>,
    }

    impl Entity for Team {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|t: &Team| t.id, |t, v| t.id = v),
                )
                .column(
                    "name",
                    ColumnDef::new(),
                    Accessor::new(|t: &Team| t.name.clone(), |t, v| t.name = v),
                )
                .relationship(
                    "heroes",
                    RelationshipDef::one_to_many().mapped_by("team"),
                    Binding::collection(|t: &mut Team, c| t.heroes = c),
                )
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Hero {
        id: i64,
        name: String,
        team_id: Option<i64>,
        team: LazyReference<Team>,
    }

    impl Entity for Hero {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .table("heroes")
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|h: &Hero| h.id, |h, v| h.id = v),
                )
                .column(
                    "name",
                    ColumnDef::new().nullable(false),
                    Accessor::new(|h: &Hero| h.name.clone(), |h, v| h.name = v),
                )
                .column(
                    "team_id",
                    ColumnDef::new().sql_type("BIGINT"),
                    Accessor::new(|h: &Hero| h.team_id, |h, v| h.team_id = v),
                )
                .relationship(
                    "team",
                    RelationshipDef::many_to_one("team_id"),
                    Binding::lazy(|h: &mut Hero, r| h.team = r),
                )
        }
    }

    /// Two relationships to an entity with no registered repository.
    #[derive(Debug, Default, Clone)]
    struct Mission {
        id: i64,
        hero_id: Option<i64>,
        lead: Option<Hero>,
    }

    impl Entity for Mission {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|m: &Mission| m.id, |m, v| m.id = v),
                )
                .column(
                    "hero_id",
                    ColumnDef::new().sql_type("BIGINT"),
                    Accessor::new(|m: &Mission| m.hero_id, |m, v| m.hero_id = v),
                )
                .relationship(
                    "lead",
                    RelationshipDef::many_to_one("hero_id").eager(),
                    Binding::direct(|m: &mut Mission, h| m.lead = h),
                )
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Report {
        id: i64,
        hero_id: Option<i64>,
        author: LazyReference<Hero>,
    }

    impl Entity for Report {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|r: &Report| r.id, |r, v| r.id = v),
                )
                .column(
                    "hero_id",
                    ColumnDef::new().sql_type("BIGINT"),
                    Accessor::new(|r: &Report| r.hero_id, |r, v| r.hero_id = v),
                )
                .relationship(
                    "author",
                    RelationshipDef::many_to_one("hero_id"),
                    Binding::lazy(|r: &mut Report, h| r.author = h),
                )
        }
    }

    /// Inverse side naming an attribute `Hero` does not have.
    #[derive(Debug, Default, Clone)]
    struct Crew {
        id: i64,
        heroes: LazyCollection<Hero>,
    }

    impl Entity for Crew {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|c: &Crew| c.id, |c, v| c.id = v),
                )
                .relationship(
                    "heroes",
                    RelationshipDef::one_to_many().mapped_by("nickname"),
                    Binding::collection(|c: &mut Crew, h| c.heroes = h),
                )
        }
    }

    /// Only ever registered in a local registry.
    #[derive(Debug, Default, Clone)]
    struct Squad {
        id: i64,
        recruits: LazyCollection<Recruit>,
    }

    impl Entity for Squad {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|s: &Squad| s.id, |s, v| s.id = v),
                )
                .relationship(
                    "recruits",
                    RelationshipDef::one_to_many().mapped_by("squad"),
                    Binding::collection(|s: &mut Squad, r| s.recruits = r),
                )
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Recruit {
        id: i64,
        squad_id: Option<i64>,
        squad: LazyReference<Squad>,
    }

    impl Entity for Recruit {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity()
                .column(
                    "id",
                    ColumnDef::new().sql_type("BIGINT").key(),
                    Accessor::new(|r: &Recruit| r.id, |r, v| r.id = v),
                )
                .column(
                    "squad_id",
                    ColumnDef::new().sql_type("BIGINT"),
                    Accessor::new(|r: &Recruit| r.squad_id, |r, v| r.squad_id = v),
                )
                .relationship(
                    "squad",
                    RelationshipDef::many_to_one("squad_id"),
                    Binding::lazy(|r: &mut Recruit, s| r.squad = s),
                )
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Keyless {
        name: String,
    }

    impl Entity for Keyless {
        fn descriptor() -> EntityDescriptor<Self> {
            EntityDescriptor::entity().column(
                "name",
                ColumnDef::new(),
                Accessor::new(|k: &Keyless| k.name.clone(), |k, v| k.name = v),
            )
        }
    }

    #[derive(Default)]
    struct MockState {
        statements: Vec<(String, Vec<Value>)>,
        results: HashMap<String, Vec<Row>>,
        affected: u64,
    }

    #[derive(Clone, Default)]
    struct Mock {
        state: Arc<Mutex<MockState>>,
    }

    impl Mock {
        fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn on(&self, sql: &str, rows: Vec<Row>) {
            self.state().results.insert(sql.to_string(), rows);
        }

        fn affect(&self, n: u64) {
            self.state().affected = n;
        }

        fn statements(&self) -> Vec<(String, Vec<Value>)> {
            self.state().statements.clone()
        }

        fn count(&self, sql: &str) -> usize {
            self.state().statements.iter().filter(|(s, _)| s == sql).count()
        }
    }

    struct MockConnection {
        state: Arc<Mutex<MockState>>,
    }

    impl Connection for MockConnection {
        fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.statements.push((sql.to_string(), params.to_vec()));
            Ok(state.results.get(sql).cloned().unwrap_or_default())
        }

        fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.statements.push((sql.to_string(), params.to_vec()));
            Ok(state.affected)
        }

        fn set_auto_commit(&mut self, _enabled: bool) -> Result<()> {
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            Ok(())
        }

        fn rollback(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    impl ConnectionFactory for Mock {
        fn connect(&self) -> Result<Box<dyn Connection>> {
            Ok(Box::new(MockConnection {
                state: Arc::clone(&self.state),
            }))
        }
    }

    fn row(columns: &[&str], values: Vec<Value>) -> Row {
        Row::new(columns.iter().map(|c| (*c).to_string()).collect(), values)
    }

    fn hero_row(id: i64, name: &str, team_id: Option<i64>) -> Row {
        row(
            &["ID", "Name", "TEAM_ID"],
            vec![Value::BigInt(id), Value::from(name), Value::from(team_id)],
        )
    }

    struct Fixture {
        mock: Mock,
        tx: TransactionManager,
        heroes: Arc<Repository<Hero>>,
        registry: Arc<RepositoryRegistry>,
    }

    fn fixture() -> Fixture {
        let mock = Mock::default();
        mock.affect(1);
        let tx = TransactionManager::new(mock.clone());
        let registry = RepositoryRegistry::new();
        registry.repository::<Team>(&tx).unwrap();
        let heroes = registry.repository::<Hero>(&tx).unwrap();
        Fixture {
            mock,
            tx,
            heroes,
            registry,
        }
    }

    fn hero(id: i64, name: &str, team_id: Option<i64>) -> Hero {
        Hero {
            id,
            name: name.to_string(),
            team_id,
            ..Hero::default()
        }
    }

    #[test]
    fn writes_require_a_transaction() {
        let f = fixture();
        let err = f.heroes.save(hero(1, "Deadpond", None)).unwrap_err();
        assert_eq!(
            err.transaction_kind(),
            Some(TransactionErrorKind::NoActiveTransaction)
        );
        assert!(f.mock.statements().is_empty());
    }

    #[test]
    fn save_binds_every_column() {
        let f = fixture();
        f.tx.in_transaction(|| f.heroes.save(hero(1, "Deadpond", Some(3))))
            .unwrap();
        assert_eq!(
            f.mock.statements(),
            vec![(
                "INSERT INTO heroes (id, name, team_id) VALUES (?, ?, ?)".to_string(),
                vec![Value::BigInt(1), Value::from("Deadpond"), Value::BigInt(3)],
            )]
        );
    }

    #[test]
    fn save_all_is_one_statement() {
        let f = fixture();
        f.tx.in_transaction(|| {
            f.heroes
                .save_all(vec![hero(1, "Deadpond", None), hero(2, "Rusty-Man", Some(3))])
        })
        .unwrap();
        let statements = f.mock.statements();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].0,
            "INSERT INTO heroes (id, name, team_id) VALUES (?, ?, ?), (?, ?, ?)"
        );
        assert_eq!(statements[0].1[2], Value::Null);
        assert_eq!(statements[0].1.len(), 6);
    }

    #[test]
    fn update_reports_stale_entities() {
        let f = fixture();
        f.tx.begin().unwrap();
        f.heroes.update(hero(1, "Deadpond", None)).unwrap();
        f.mock.affect(0);
        let err = f.heroes.update(hero(9, "Nobody", None)).unwrap_err();
        f.tx.rollback().unwrap();

        assert!(err.is_stale());
        let (sql, params) = &f.mock.statements()[0];
        assert_eq!(sql, "UPDATE heroes SET name = ?, team_id = ? WHERE id = ?");
        assert_eq!(
            params,
            &vec![Value::from("Deadpond"), Value::Null, Value::BigInt(1)]
        );
    }

    #[test]
    fn find_by_id_maps_case_insensitively_and_defers_relationships() {
        let f = fixture();
        f.mock.on(
            "SELECT * FROM heroes WHERE id = ?",
            vec![hero_row(1, "Deadpond", Some(3))],
        );
        f.mock.on(
            "SELECT * FROM teams WHERE id = ?",
            vec![row(&["id", "name"], vec![Value::BigInt(3), Value::from("Preventers")])],
        );

        let found = f.heroes.find_by_id(1_i64).unwrap().unwrap();
        assert_eq!(found.name, "Deadpond");
        assert_eq!(found.team_id, Some(3));
        assert!(found.team.peek().is_none());
        assert_eq!(f.mock.count("SELECT * FROM teams WHERE id = ?"), 0);

        let team = found.team.get().unwrap().unwrap();
        assert_eq!(team.name, "Preventers");
        found.team.get().unwrap();
        assert_eq!(f.mock.count("SELECT * FROM teams WHERE id = ?"), 1);
        assert_eq!(
            f.mock.statements()[1].1,
            vec![Value::BigInt(3)],
            "lazy lookup binds the foreign key"
        );
    }

    #[test]
    fn inverse_collections_query_the_owning_side() {
        let f = fixture();
        f.mock.on(
            "SELECT * FROM teams WHERE id = ?",
            vec![row(&["id", "name"], vec![Value::BigInt(3), Value::from("Preventers")])],
        );
        f.mock.on(
            "SELECT * FROM heroes WHERE team_id = ?",
            vec![hero_row(1, "Deadpond", Some(3)), hero_row(2, "Rusty-Man", Some(3))],
        );
        let resolver: Arc<dyn RepositoryResolver> = Arc::clone(&f.registry) as _;
        let teams = Repository::<Team>::new(f.tx.clone(), resolver).unwrap();

        let team = teams.find_by_id(3_i64).unwrap().unwrap();
        assert!(!team.heroes.is_loaded());
        assert_eq!(team.heroes.len().unwrap(), 2);
        assert_eq!(team.heroes.get(1).unwrap().unwrap().name, "Rusty-Man");
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE team_id = ?"), 1);
    }

    #[test]
    fn null_foreign_key_leaves_reference_empty() {
        let f = fixture();
        f.mock.on(
            "SELECT * FROM heroes WHERE id = ?",
            vec![hero_row(1, "Deadpond", None)],
        );
        let found = f.heroes.find_by_id(1_i64).unwrap().unwrap();
        assert!(found.team.is_loaded());
        assert!(found.team.get().unwrap().is_none());
    }

    #[test]
    fn transaction_cache_serves_repeat_lookups() {
        let f = fixture();
        f.mock.on(
            "SELECT * FROM heroes WHERE id = ?",
            vec![hero_row(1, "Deadpond", None)],
        );
        f.tx.begin().unwrap();
        f.heroes.find_by_id(1_i64).unwrap();
        f.heroes.find_by_id(1_i64).unwrap();
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE id = ?"), 1);

        f.heroes.delete_by_id(1_i64).unwrap();
        f.heroes.find_by_id(1_i64).unwrap();
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE id = ?"), 2);
        assert_eq!(f.mock.count("DELETE FROM heroes WHERE id = ?"), 1);
        f.tx.commit().unwrap();

        // A new transaction starts with an empty cache.
        f.tx.in_transaction(|| f.heroes.find_by_id(1_i64)).unwrap();
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE id = ?"), 3);
    }

    #[test]
    fn count_and_exists() {
        let f = fixture();
        f.mock.on(
            "SELECT COUNT(*) AS total FROM heroes",
            vec![row(&["TOTAL"], vec![Value::BigInt(25)])],
        );
        assert_eq!(f.heroes.count().unwrap(), 25);
        assert!(!f.heroes.is_exist(4_i64).unwrap());

        f.mock.on(
            "SELECT 1 FROM heroes WHERE id = ? LIMIT 1",
            vec![row(&["1"], vec![Value::Int(1)])],
        );
        assert!(f.heroes.is_exist(4_i64).unwrap());
    }

    #[test]
    fn paging_counts_then_slices() {
        let f = fixture();
        f.mock.on(
            "SELECT COUNT(1) AS total FROM (SELECT * FROM heroes WHERE team_id = ?) AS count_table",
            vec![row(&["total"], vec![Value::BigInt(25)])],
        );
        f.mock.on(
            "SELECT * FROM heroes WHERE team_id = ? ORDER BY name ASC LIMIT 10 OFFSET 20",
            (21..=25).map(|i| hero_row(i, "Extra", Some(3))).collect(),
        );

        let request = PageRequest::of(3, 10)
            .unwrap()
            .with_sort(Sort::by(vec![Order::asc("name")]).unwrap());
        let page = f
            .heroes
            .find_with_condition_paged(ClauseBuilder::new().equal("team_id", 3), &request)
            .unwrap();

        assert_eq!(page.total_elements(), 25);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.content().len(), 5);
        assert!(page.is_last());
        assert_eq!(page.content()[0].id, 21);
    }

    #[test]
    fn find_all_and_conditions() {
        let f = fixture();
        f.mock.on(
            "SELECT * FROM heroes",
            vec![hero_row(1, "Deadpond", None), hero_row(2, "Rusty-Man", None)],
        );
        assert_eq!(f.heroes.find_all().unwrap().len(), 2);

        let none = f
            .heroes
            .find_with_condition(ClauseBuilder::new().like("name", "Spider%"))
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE name LIKE ?"), 1);

        let removed = f
            .tx
            .in_transaction(|| {
                f.heroes
                    .delete_with_condition(ClauseBuilder::new().is_null("team_id"))
            })
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(f.mock.count("DELETE FROM heroes WHERE team_id IS NULL"), 1);
    }

    #[test]
    fn eager_relationship_without_repository_fails() {
        let f = fixture();
        let lonely = RepositoryRegistry::new();
        let missions = lonely.repository::<Mission>(&f.tx).unwrap();
        f.mock.on(
            "SELECT * FROM missions",
            vec![row(&["id", "hero_id"], vec![Value::BigInt(1), Value::BigInt(5)])],
        );
        let err = missions.find_all().unwrap_err();
        assert!(matches!(err, Error::RepositoryNotFound(ref e) if e.entity == "Hero"));
    }

    #[test]
    fn lazy_relationship_waits_for_first_access() {
        let f = fixture();
        let reports = f.registry.repository::<Report>(&f.tx).unwrap();
        f.mock.on(
            "SELECT * FROM reports",
            vec![row(&["id", "hero_id"], vec![Value::BigInt(1), Value::BigInt(5)])],
        );
        f.mock.on(
            "SELECT * FROM heroes WHERE id = ?",
            vec![hero_row(5, "Deadpond", None)],
        );

        let found = reports.find_all().unwrap();
        assert_eq!(found[0].hero_id, Some(5));
        assert!(!found[0].author.is_loaded());
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE id = ?"), 0);

        let author = found[0].author.get().unwrap().unwrap();
        assert_eq!(author.name, "Deadpond");
        assert_eq!(f.mock.count("SELECT * FROM heroes WHERE id = ?"), 1);
    }

    #[test]
    fn lazy_relationship_without_repository_fails_on_access() {
        let f = fixture();
        let lonely = RepositoryRegistry::new();
        let reports = lonely.repository::<Report>(&f.tx).unwrap();
        f.mock.on(
            "SELECT * FROM reports",
            vec![row(&["id", "hero_id"], vec![Value::BigInt(1), Value::BigInt(5)])],
        );
        let found = reports.find_all().unwrap();
        let err = found[0].author.get().unwrap_err();
        assert!(matches!(err, Error::RepositoryNotFound(ref e) if e.entity == "Hero"));
    }

    #[test]
    fn lazy_relationship_failures_are_swallowed() {
        let f = fixture();
        let crews = f.registry.repository::<Crew>(&f.tx).unwrap();
        f.mock.on(
            "SELECT * FROM crews",
            vec![row(&["id"], vec![Value::BigInt(1)])],
        );
        let found = crews.find_all().unwrap();
        assert_eq!(found[0].id, 1);
        assert!(found[0].heroes.is_empty().unwrap());
        assert_eq!(f.mock.statements().len(), 1);
    }

    #[test]
    fn local_registry_resolves_inverse_targets_locally() {
        let f = fixture();
        let local = Registry::new();
        let resolver: Arc<dyn RepositoryResolver> = RepositoryRegistry::new();
        let squads = Repository::<Squad>::with_registry(&local, f.tx.clone(), resolver).unwrap();
        f.mock.on(
            "SELECT * FROM squads",
            vec![row(&["id"], vec![Value::BigInt(4)])],
        );

        let found = squads.find_all().unwrap();
        assert!(!found[0].recruits.is_loaded());
        assert!(squads.registry().contains(EntityType::of::<Recruit>()));
        assert!(!Registry::global().contains(EntityType::of::<Recruit>()));
        assert!(!Registry::global().contains(EntityType::of::<Squad>()));
    }

    #[test]
    fn eager_relationship_resolves_during_mapping() {
        let f = fixture();
        let missions = f.registry.repository::<Mission>(&f.tx).unwrap();
        f.mock.on(
            "SELECT * FROM missions WHERE id = ?",
            vec![row(&["id", "hero_id"], vec![Value::BigInt(1), Value::BigInt(5)])],
        );
        f.mock.on(
            "SELECT * FROM heroes WHERE id = ?",
            vec![hero_row(5, "Deadpond", None)],
        );
        let mission = missions.find_by_id(1_i64).unwrap().unwrap();
        assert_eq!(mission.lead.map(|h| h.name), Some("Deadpond".to_string()));
    }

    #[test]
    fn keyless_entities_have_no_repository() {
        let err = Repository::<Keyless>::new(
            TransactionManager::new(Mock::default()),
            RepositoryRegistry::new(),
        )
        .unwrap_err();
        assert_eq!(err.metadata_kind(), Some(MetadataErrorKind::MissingKey));
    }
}
