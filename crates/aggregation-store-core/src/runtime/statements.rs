// crates/aggregation-store-core/src/runtime/statements.rs
// ============================================================================
// Module: Aggregation Store Statement Set
// Description: The five repository statements, described and compiled.
// Purpose: Build templates once from settings and prepare them at start.
// Dependencies: thiserror, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`StatementTemplates`] derives the insert, point select, point delete,
//! prefix scan, and conditional delete from the repository settings. Reads
//! carry the read consistency level and writes carry the write level; only the
//! insert carries the time-to-live. [`StatementSet::compile`] prepares all
//! five and fails on the first statement the session rejects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::KeyComposer;
use crate::core::RepositorySettings;
use crate::core::StatementKind;
use crate::core::StatementTemplate;
use crate::interfaces::PreparedStatement;
use crate::interfaces::Session;
use crate::interfaces::SessionError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// A statement the session refused to prepare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to prepare {kind} statement: {source}")]
pub struct StatementError {
    /// Statement that failed.
    pub kind: StatementKind,
    /// Session failure.
    pub source: SessionError,
}

// ============================================================================
// SECTION: Templates
// ============================================================================

/// Uncompiled descriptions of the repository statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplates {
    /// Upsert of every column.
    pub insert: StatementTemplate,
    /// Point read of every column.
    pub select_by_key: StatementTemplate,
    /// Unconditional point delete.
    pub delete_by_key: StatementTemplate,
    /// Key and exchange id scan under the fixed prefix.
    pub select_key_and_id: StatementTemplate,
    /// Point delete predicated on the exchange id.
    pub conditional_delete: StatementTemplate,
}

impl StatementTemplates {
    /// Derives every template from validated settings.
    #[must_use]
    pub fn build(settings: &RepositorySettings, composer: &KeyComposer) -> Self {
        let layout = Arc::new(composer.layout(&settings.table));
        let all_columns = composer.all_columns();
        let primary_key = composer.primary_key_columns();
        let template = |kind: StatementKind| StatementTemplate {
            kind,
            layout: Arc::clone(&layout),
            projection: Vec::new(),
            filter: Vec::new(),
            condition: None,
            ttl_seconds: None,
            consistency: if kind.is_read() {
                settings.read_consistency
            } else {
                settings.write_consistency
            },
        };
        Self {
            insert: StatementTemplate {
                projection: all_columns.clone(),
                ttl_seconds: settings.ttl_seconds,
                ..template(StatementKind::Insert)
            },
            select_by_key: StatementTemplate {
                projection: all_columns,
                filter: primary_key.clone(),
                ..template(StatementKind::SelectByKey)
            },
            delete_by_key: StatementTemplate {
                filter: primary_key.clone(),
                ..template(StatementKind::DeleteByKey)
            },
            select_key_and_id: StatementTemplate {
                projection: vec![
                    composer.key_column().clone(),
                    composer.exchange_id_column().clone(),
                ],
                filter: composer.prefix_columns().to_vec(),
                ..template(StatementKind::SelectKeyAndId)
            },
            conditional_delete: StatementTemplate {
                filter: primary_key,
                condition: Some(composer.exchange_id_column().clone()),
                ..template(StatementKind::ConditionalDelete)
            },
        }
    }

    /// Returns the templates in compilation order.
    #[must_use]
    pub const fn all(&self) -> [&StatementTemplate; 5] {
        [
            &self.insert,
            &self.select_by_key,
            &self.delete_by_key,
            &self.select_key_and_id,
            &self.conditional_delete,
        ]
    }
}

// ============================================================================
// SECTION: Compiled Set
// ============================================================================

/// Prepared repository statements, reusable across calls and threads.
#[derive(Debug, Clone)]
pub struct StatementSet {
    /// Prepared upsert.
    pub insert: PreparedStatement,
    /// Prepared point read.
    pub select_by_key: PreparedStatement,
    /// Prepared unconditional delete.
    pub delete_by_key: PreparedStatement,
    /// Prepared prefix scan.
    pub select_key_and_id: PreparedStatement,
    /// Prepared conditional delete.
    pub conditional_delete: PreparedStatement,
}

impl StatementSet {
    /// Prepares every template against a session.
    ///
    /// # Errors
    ///
    /// Returns [`StatementError`] for the first statement that fails to prepare.
    pub fn compile(
        session: &dyn Session,
        templates: &StatementTemplates,
    ) -> Result<Self, StatementError> {
        let prepare = |template: &StatementTemplate| {
            session.prepare(template).map_err(|source| StatementError {
                kind: template.kind,
                source,
            })
        };
        Ok(Self {
            insert: prepare(&templates.insert)?,
            select_by_key: prepare(&templates.select_by_key)?,
            delete_by_key: prepare(&templates.delete_by_key)?,
            select_key_and_id: prepare(&templates.select_key_and_id)?,
            conditional_delete: prepare(&templates.conditional_delete)?,
        })
    }

    /// Returns the prepared statements in compilation order.
    #[must_use]
    pub const fn all(&self) -> [&PreparedStatement; 5] {
        [
            &self.insert,
            &self.select_by_key,
            &self.delete_by_key,
            &self.select_key_and_id,
            &self.conditional_delete,
        ]
    }
}
