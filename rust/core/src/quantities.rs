// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element quantity table and its bridge to the highlighter.
//!
//! Rows come from a pluggable [`QuantityProvider`] and are fetched once per
//! table construction. Level amounts are flattened into one column per level,
//! keyed by the level name with its first space removed (`Level 1` -> `Level1`).

use crate::error::Result;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const COLUMN_ELEMENT_TYPE: &str = "ElementType";
pub const COLUMN_UNIT: &str = "UnitOfMeasure";
pub const COLUMN_TOTAL: &str = "TotalAmountInProject";

/// Quantities of one element type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityRow {
    pub element_type: String,
    pub unit_of_measure: String,
    pub total_amount_in_project: f64,
    pub total_amount_per_level: BTreeMap<String, f64>,
}

/// Source of quantity rows.
pub trait QuantityProvider {
    fn rows(&self) -> LocalBoxFuture<'static, Result<Vec<QuantityRow>>>;
}

/// Provider returning a fixed row set.
#[derive(Debug, Clone, Default)]
pub struct StaticQuantityProvider {
    rows: Vec<QuantityRow>,
}

fn row(element_type: &str, unit: &str, total: f64, levels: [f64; 3]) -> QuantityRow {
    QuantityRow {
        element_type: element_type.into(),
        unit_of_measure: unit.into(),
        total_amount_in_project: total,
        total_amount_per_level: ["Level 1", "Level 2", "Level 3"]
            .iter()
            .zip(levels)
            .map(|(level, amount)| (level.to_string(), amount))
            .collect(),
    }
}

impl StaticQuantityProvider {
    pub fn new(rows: Vec<QuantityRow>) -> Self {
        Self { rows }
    }

    /// Wall, Column and Slab example quantities over three levels.
    pub fn reference() -> Self {
        Self::new(vec![
            row("Wall", "m²", 100.0, [20.0, 30.0, 50.0]),
            row("Column", "m", 50.0, [15.0, 20.0, 15.0]),
            row("Slab", "m³", 75.0, [25.0, 25.0, 25.0]),
        ])
    }
}

impl QuantityProvider for StaticQuantityProvider {
    fn rows(&self) -> LocalBoxFuture<'static, Result<Vec<QuantityRow>>> {
        let rows = self.rows.clone();
        async move { Ok(rows) }.boxed_local()
    }
}

/// Column key for a level name.
pub fn level_column_key(level: &str) -> String {
    level.replacen(' ', "", 1)
}

/// One flattened table row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub element_type: String,
    pub unit_of_measure: String,
    pub total_amount_in_project: f64,
    /// Amounts aligned with [`QuantityTable::levels`]; missing levels are 0.
    pub per_level: Vec<f64>,
}

/// A level shown as a table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelColumn {
    pub key: String,
    pub level: String,
}

/// Loaded quantities table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuantityTable {
    levels: Vec<LevelColumn>,
    rows: Vec<TableRow>,
}

/// Interaction on the quantities table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TableEvent {
    RowClick {
        #[serde(rename = "elementType")]
        element_type: String,
    },
    ColumnHeaderClick { column: String },
}

/// What a table interaction should highlight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightTarget {
    ElementType(String),
    Level(String),
}

impl QuantityTable {
    /// Fetch rows from `provider` and flatten them for `levels`.
    pub async fn load(provider: &dyn QuantityProvider, levels: &[String]) -> Result<Self> {
        let rows = provider.rows().await?;
        let table = Self::from_rows(rows, levels);
        tracing::debug!(rows = table.rows.len(), levels = table.levels.len(), "Quantity table loaded");
        Ok(table)
    }

    pub fn from_rows(rows: Vec<QuantityRow>, levels: &[String]) -> Self {
        let levels: Vec<LevelColumn> = levels
            .iter()
            .map(|level| LevelColumn {
                key: level_column_key(level),
                level: level.clone(),
            })
            .collect();

        let rows = rows
            .into_iter()
            .map(|row| TableRow {
                per_level: levels
                    .iter()
                    .map(|col| row.total_amount_per_level.get(&col.level).copied().unwrap_or(0.0))
                    .collect(),
                element_type: row.element_type,
                unit_of_measure: row.unit_of_measure,
                total_amount_in_project: row.total_amount_in_project,
            })
            .collect();

        Self { levels, rows }
    }

    pub fn columns(&self) -> Vec<String> {
        [COLUMN_ELEMENT_TYPE, COLUMN_UNIT, COLUMN_TOTAL]
            .into_iter()
            .map(String::from)
            .chain(self.levels.iter().map(|col| col.key.clone()))
            .collect()
    }

    pub fn levels(&self) -> &[LevelColumn] {
        &self.levels
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Rows as flat records keyed by column name.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                record.insert(COLUMN_ELEMENT_TYPE.into(), Value::from(row.element_type.clone()));
                record.insert(COLUMN_UNIT.into(), Value::from(row.unit_of_measure.clone()));
                record.insert(COLUMN_TOTAL.into(), Value::from(row.total_amount_in_project));
                for (col, amount) in self.levels.iter().zip(&row.per_level) {
                    record.insert(col.key.clone(), Value::from(*amount));
                }
                record
            })
            .collect()
    }

    /// Level name behind a column key, if the column is a level column.
    pub fn level_for_column(&self, column: &str) -> Option<&str> {
        self.levels
            .iter()
            .find(|col| col.key == column || col.level == column)
            .map(|col| col.level.as_str())
    }

    /// Map a table interaction to a highlight. Non-level headers map to nothing.
    pub fn resolve(&self, event: &TableEvent) -> Option<HighlightTarget> {
        match event {
            TableEvent::RowClick { element_type } => Some(HighlightTarget::ElementType(element_type.clone())),
            TableEvent::ColumnHeaderClick { column } => self
                .level_for_column(column)
                .map(|level| HighlightTarget::Level(level.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<String> {
        vec!["Level 1".into(), "Level 2".into(), "Level 3".into()]
    }

    #[tokio::test]
    async fn test_reference_table_flattens_levels() {
        let table = QuantityTable::load(&StaticQuantityProvider::reference(), &levels())
            .await
            .unwrap();

        assert_eq!(
            table.columns(),
            vec!["ElementType", "UnitOfMeasure", "TotalAmountInProject", "Level1", "Level2", "Level3"]
        );
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.rows()[0].per_level, vec![20.0, 30.0, 50.0]);

        let records = table.records();
        assert_eq!(records[2]["ElementType"], "Slab");
        assert_eq!(records[2]["UnitOfMeasure"], "m³");
        assert_eq!(records[1]["Level2"], 20.0);
    }

    #[test]
    fn test_missing_level_amounts_default_to_zero() {
        let rows = vec![QuantityRow {
            element_type: "Beam".into(),
            unit_of_measure: "m".into(),
            total_amount_in_project: 12.0,
            total_amount_per_level: [("Level 1".to_string(), 12.0)].into_iter().collect(),
        }];
        let table = QuantityTable::from_rows(rows, &levels());
        assert_eq!(table.rows()[0].per_level, vec![12.0, 0.0, 0.0]);
    }

    #[test]
    fn test_resolve_table_events() {
        let table = QuantityTable::from_rows(Vec::new(), &levels());

        assert_eq!(
            table.resolve(&TableEvent::RowClick {
                element_type: "Wall".into()
            }),
            Some(HighlightTarget::ElementType("Wall".into()))
        );
        assert_eq!(
            table.resolve(&TableEvent::ColumnHeaderClick { column: "Level2".into() }),
            Some(HighlightTarget::Level("Level 2".into()))
        );
        assert_eq!(
            table.resolve(&TableEvent::ColumnHeaderClick {
                column: "Level 3".into()
            }),
            Some(HighlightTarget::Level("Level 3".into()))
        );
        assert_eq!(
            table.resolve(&TableEvent::ColumnHeaderClick {
                column: "UnitOfMeasure".into()
            }),
            None
        );
    }

    #[test]
    fn test_table_event_json_shape() {
        let event: TableEvent = serde_json::from_str(r#"{"type":"row-click","elementType":"Wall"}"#).unwrap();
        assert_eq!(
            event,
            TableEvent::RowClick {
                element_type: "Wall".into()
            }
        );

        let event: TableEvent = serde_json::from_str(r#"{"type":"column-header-click","column":"Level1"}"#).unwrap();
        assert_eq!(event, TableEvent::ColumnHeaderClick { column: "Level1".into() });
    }

    #[test]
    fn test_level_column_key_removes_first_space_only() {
        assert_eq!(level_column_key("Level 1"), "Level1");
        assert_eq!(level_column_key("Roof Level 2"), "RoofLevel 2");
    }
}
