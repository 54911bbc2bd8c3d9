//! Join-key inference between two tables.
//!
//! Rules are tried in order and the first hit wins:
//! 1. a source field whose foreign key targets a field of the target
//! 2. the same, from target to source
//! 3. source `id` paired with target `{source}_id` / `{source}id`
//! 4. target `id` paired with source `{target}_id` / `{target}id`

use serde::Serialize;

use crate::catalog::CatalogTable;
use crate::model::{CanvasTable, FieldId, FieldMeta};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSuggestion {
    pub source_field_id: FieldId,
    pub target_field_id: FieldId,
}

/// The parts of a table the heuristic looks at.
#[derive(Debug, Clone, Copy)]
pub struct JoinSide<'a> {
    pub name: &'a str,
    pub fields: &'a [FieldMeta],
}

impl<'a> From<&'a CanvasTable> for JoinSide<'a> {
    fn from(table: &'a CanvasTable) -> Self {
        Self {
            name: &table.table_name,
            fields: &table.fields,
        }
    }
}

impl<'a> From<&'a CatalogTable> for JoinSide<'a> {
    fn from(table: &'a CatalogTable) -> Self {
        Self {
            name: &table.name,
            fields: &table.fields,
        }
    }
}

/// Propose a join-key pair, or `None` to leave the choice to the user.
pub fn suggest<'a, 'b>(
    source: impl Into<JoinSide<'a>>,
    target: impl Into<JoinSide<'b>>,
) -> Option<JoinSuggestion> {
    let source = source.into();
    let target = target.into();

    if let Some((s, t)) = foreign_key(source, target) {
        return Some(JoinSuggestion {
            source_field_id: s,
            target_field_id: t,
        });
    }
    if let Some((t, s)) = foreign_key(target, source) {
        return Some(JoinSuggestion {
            source_field_id: s,
            target_field_id: t,
        });
    }
    if let Some((s, t)) = naming_convention(source, target) {
        return Some(JoinSuggestion {
            source_field_id: s,
            target_field_id: t,
        });
    }
    naming_convention(target, source).map(|(t, s)| JoinSuggestion {
        source_field_id: s,
        target_field_id: t,
    })
}

/// A field of `from` whose FK points at a field of `to`: `(from_field, to_field)`.
fn foreign_key(from: JoinSide<'_>, to: JoinSide<'_>) -> Option<(FieldId, FieldId)> {
    from.fields.iter().find_map(|f| {
        let target = f.fk_target_field_id?;
        to.fields.iter().find(|t| t.id == target).map(|t| (f.id, t.id))
    })
}

/// `owner.id` paired with `other.{owner}_id`: `(owner_field, other_field)`.
fn naming_convention(owner: JoinSide<'_>, other: JoinSide<'_>) -> Option<(FieldId, FieldId)> {
    let id = owner.fields.iter().find(|f| f.name.eq_ignore_ascii_case("id"))?;
    let prefix = owner.name.to_lowercase();
    let snake = format!("{prefix}_id");
    let joined = format!("{prefix}id");

    other
        .fields
        .iter()
        .find(|f| {
            let name = f.name.to_lowercase();
            name == snake || name == joined
        })
        .map(|f| (id.id, f.id))
}
