//! Schema generation over every registered entity.

use std::collections::HashMap;
use std::sync::Arc;

use sqlentity_core::error::{SchemaError, SchemaErrorKind};
use sqlentity_core::{Connection, EntityMetadata, Error, ReferentialAction, Registry, Result};

use crate::create::{ForeignKey, create_table, foreign_keys};
use crate::order::creation_order;

/// Schema generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Drop every table (in reverse creation order) before creating.
    pub drop_if_exists: bool,
    /// Log each statement at `info` level as it is executed.
    pub print_ddl: bool,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            drop_if_exists: true,
            print_ddl: true,
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::Cascade,
        }
    }
}

impl SchemaOptions {
    pub fn drop_if_exists(mut self, enabled: bool) -> Self {
        self.drop_if_exists = enabled;
        self
    }

    pub fn print_ddl(mut self, enabled: bool) -> Self {
        self.print_ddl = enabled;
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// The statements a generation run executes, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    /// Table names in creation order.
    pub creation_order: Vec<String>,
    pub statements: Vec<String>,
    /// Whether the relationship graph had a cycle, so foreign keys are
    /// added with `ALTER TABLE` after every table exists.
    pub cyclic: bool,
}

/// Emits DDL for the entities of a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct SchemaGenerator<'r> {
    registry: &'r Registry,
    options: SchemaOptions,
}

impl SchemaGenerator<'static> {
    /// Generator over the global registry.
    pub fn new(options: SchemaOptions) -> Self {
        Self::with_registry(Registry::global(), options)
    }

    /// Generator over the global registry with default options.
    pub fn with_defaults() -> Self {
        Self::new(SchemaOptions::default())
    }
}

impl<'r> SchemaGenerator<'r> {
    pub fn with_registry(registry: &'r Registry, options: SchemaOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Compute the statements without executing anything.
    pub fn plan(&self) -> Result<SchemaPlan> {
        let entities = self.registry.all_registered();
        if entities.is_empty() {
            return Err(Error::Schema(SchemaError {
                kind: SchemaErrorKind::NoEntitiesRegistered,
                message: "there is no entity registered".to_string(),
                source: None,
            }));
        }

        let registered: HashMap<_, Arc<EntityMetadata>> = entities
            .iter()
            .map(|m| (m.entity_type(), Arc::clone(m)))
            .collect();
        let sorted = creation_order(&entities);
        let ordered: Vec<&Arc<EntityMetadata>> =
            sorted.order.iter().map(|&i| &entities[i]).collect();

        let mut statements = Vec::new();
        if self.options.drop_if_exists {
            statements.push("SET FOREIGN_KEY_CHECKS = 0".to_string());
            statements.extend(
                ordered
                    .iter()
                    .rev()
                    .map(|m| format!("DROP TABLE IF EXISTS {}", m.table_name())),
            );
            statements.push("SET FOREIGN_KEY_CHECKS = 1".to_string());
        }

        let SchemaOptions {
            on_delete,
            on_update,
            ..
        } = self.options;
        let mut deferred: Vec<ForeignKey> = Vec::new();
        for metadata in &ordered {
            let keys = foreign_keys(metadata, &registered);
            if sorted.cyclic {
                statements.push(create_table(metadata, &[], on_delete, on_update));
                deferred.extend(keys);
            } else {
                statements.push(create_table(metadata, &keys, on_delete, on_update));
            }
        }
        if sorted.cyclic {
            tracing::warn!(
                entities = entities.len(),
                foreign_keys = deferred.len(),
                "Cycle detected in relationships; foreign keys will be added after table creation"
            );
            statements.extend(deferred.iter().map(|fk| fk.alter_sql(on_delete, on_update)));
        }

        Ok(SchemaPlan {
            creation_order: ordered.iter().map(|m| m.table_name().to_string()).collect(),
            statements,
            cyclic: sorted.cyclic,
        })
    }

    /// Plan and execute every statement on `conn`.
    ///
    /// Stops at the first failing statement.
    #[tracing::instrument(level = "debug", skip(self, conn))]
    pub fn generate(&self, conn: &mut dyn Connection) -> Result<SchemaPlan> {
        let plan = self.plan()?;
        for statement in &plan.statements {
            if self.options.print_ddl {
                tracing::info!("{};", statement);
            }
            conn.execute(statement, &[]).map_err(|e| {
                Error::Schema(SchemaError {
                    kind: SchemaErrorKind::Execution,
                    message: format!("failed to execute: {}", statement),
                    source: Some(Box::new(e)),
                })
            })?;
        }
        tracing::debug!(
            tables = plan.creation_order.len(),
            statements = plan.statements.len(),
            "Schema generated"
        );
        Ok(plan)
    }
}
