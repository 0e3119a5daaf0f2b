use crate::error::{GradeError, Result};
use crate::grading::{CompositeNode, GradableKind, GradeLeaf, Gradable, Operation};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Storage identity of a persisted gradable node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRef {
    pub id: String,
    pub kind: GradableKind,
}

/// Child slot of a composite row, recovered from a `"<kind>:<index>"` key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ComponentKey {
    kind: GradableKind,
    index: usize,
}

impl ComponentKey {
    fn encode(&self) -> String {
        format!("{}:{}", self.kind, self.index)
    }

    fn parse(key: &str) -> Result<Self> {
        let (kind, index) = key
            .split_once(':')
            .ok_or_else(|| GradeError::Corrupt(format!("component key '{key}'")))?;
        let kind = kind
            .parse::<GradableKind>()
            .map_err(|_| GradeError::Corrupt(format!("component key '{key}'")))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| GradeError::Corrupt(format!("component key '{key}'")))?;
        Ok(Self { kind, index })
    }
}

struct CompositeRow {
    name: String,
    template_id: Option<String>,
    component_map: String,
    actions: String,
}

/// Persists a tree depth-first, children before their parent, and returns the root's ref.
///
/// Callers wrap this in a transaction; rows written before a failure are only
/// discarded if that transaction rolls back.
pub fn store_gradable(conn: &Connection, node: &Gradable) -> Result<StoredRef> {
    let stored = match node {
        Gradable::Grade(leaf) => StoredRef {
            id: store_leaf(conn, leaf)?,
            kind: GradableKind::Grade,
        },
        Gradable::Composite(composite) => store_composite(conn, composite)?,
    };
    debug!(id = %stored.id, kind = %stored.kind, name = node.name(), "stored gradable");
    Ok(stored)
}

fn store_leaf(conn: &Connection, leaf: &GradeLeaf) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let normalized = leaf
        .current_value()
        .map(|_| leaf.evaluate().normalized());
    conn.execute(
        "INSERT INTO grades (entity_id, name, min_grade, max_grade, grade, step_amount, normalized_grade)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &id,
            leaf.name(),
            leaf.min_grade(),
            leaf.max_grade(),
            leaf.current_value(),
            leaf.step_amount(),
            normalized
        ],
    )?;
    Ok(id)
}

fn store_composite(conn: &Connection, node: &CompositeNode) -> Result<StoredRef> {
    let evaluation = node.evaluate()?;

    let mut component_map = BTreeMap::new();
    for (index, child) in node.children().iter().enumerate() {
        let stored = store_gradable(conn, child)?;
        let key = ComponentKey {
            kind: stored.kind,
            index,
        };
        component_map.insert(key.encode(), stored.id);
    }
    let component_map = serde_json::to_string(&component_map)?;
    let actions = serde_json::to_string(node.actions())?;

    let id = Uuid::new_v4().to_string();
    match node.template_id() {
        Some(template_id) => {
            conn.execute(
                "INSERT INTO grading_method_instances
                 (entity_id, template_id, name, min_grade, max_grade, grade, normalized_grade, component_map, actions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    &id,
                    template_id,
                    node.name(),
                    evaluation.min,
                    evaluation.max,
                    evaluation.current,
                    evaluation.normalized(),
                    &component_map,
                    &actions
                ],
            )?;
            Ok(StoredRef {
                id,
                kind: GradableKind::Method,
            })
        }
        None => {
            conn.execute(
                "INSERT INTO grading_blocks
                 (entity_id, name, min_grade, max_grade, grade, normalized_grade, component_map, actions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &id,
                    node.name(),
                    evaluation.min,
                    evaluation.max,
                    evaluation.current,
                    evaluation.normalized(),
                    &component_map,
                    &actions
                ],
            )?;
            Ok(StoredRef {
                id,
                kind: GradableKind::Block,
            })
        }
    }
}

/// Rebuilds the tree rooted at `id`. Any dangling reference is a `NotFound` error.
pub fn load_gradable(conn: &Connection, kind: GradableKind, id: &str) -> Result<Gradable> {
    let node = match kind {
        GradableKind::Grade => Gradable::Grade(load_leaf(conn, id)?),
        GradableKind::Block | GradableKind::Method => {
            Gradable::Composite(load_composite(conn, kind, id)?)
        }
    };
    debug!(id, kind = %kind, name = node.name(), "loaded gradable");
    Ok(node)
}

fn load_leaf(conn: &Connection, id: &str) -> Result<GradeLeaf> {
    let row = conn
        .query_row(
            "SELECT name, min_grade, max_grade, step_amount, grade FROM grades WHERE entity_id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            },
        )
        .optional()?;
    let (name, min_grade, max_grade, step_amount, grade) =
        row.ok_or_else(|| GradeError::NotFound(format!("grade {id}")))?;
    GradeLeaf::restore(name, min_grade, max_grade, step_amount, grade)
        .map_err(|e| GradeError::Corrupt(format!("grade {id}: {e}")))
}

fn load_composite(conn: &Connection, kind: GradableKind, id: &str) -> Result<CompositeNode> {
    let row = read_composite_row(conn, kind, id)?
        .ok_or_else(|| GradeError::NotFound(format!("{kind} {id}")))?;

    let component_map: BTreeMap<String, String> = serde_json::from_str(&row.component_map)?;
    let mut components = component_map
        .iter()
        .map(|(key, child_id)| ComponentKey::parse(key).map(|key| (key, child_id)))
        .collect::<Result<Vec<_>>>()?;
    // Keys compare as strings ("10" < "2"); order by the embedded index instead.
    components.sort_by_key(|(key, _)| key.index);

    let children = components
        .into_iter()
        .map(|(key, child_id)| load_gradable(conn, key.kind, child_id))
        .collect::<Result<Vec<_>>>()?;

    let tokens: Vec<String> = serde_json::from_str(&row.actions)?;
    let actions = tokens
        .iter()
        .map(|token| token.parse::<Operation>())
        .collect::<Result<Vec<_>>>()?;

    let node = match row.template_id {
        Some(template_id) => CompositeNode::method(template_id, row.name),
        None => CompositeNode::block(row.name),
    };
    node.attach(children, actions)
}

fn read_composite_row(
    conn: &Connection,
    kind: GradableKind,
    id: &str,
) -> Result<Option<CompositeRow>> {
    let row = match kind {
        GradableKind::Method => conn
            .query_row(
                "SELECT name, template_id, component_map, actions
                 FROM grading_method_instances WHERE entity_id = ?1",
                params![id],
                |row| {
                    Ok(CompositeRow {
                        name: row.get(0)?,
                        template_id: Some(row.get(1)?),
                        component_map: row.get(2)?,
                        actions: row.get(3)?,
                    })
                },
            )
            .optional()?,
        GradableKind::Block => conn
            .query_row(
                "SELECT name, component_map, actions FROM grading_blocks WHERE entity_id = ?1",
                params![id],
                |row| {
                    Ok(CompositeRow {
                        name: row.get(0)?,
                        template_id: None,
                        component_map: row.get(1)?,
                        actions: row.get(2)?,
                    })
                },
            )
            .optional()?,
        GradableKind::Grade => None,
    };
    Ok(row)
}

/// Removes the node at `id` and everything below it.
pub fn delete_gradable(conn: &Connection, kind: GradableKind, id: &str) -> Result<()> {
    if kind != GradableKind::Grade {
        let row = read_composite_row(conn, kind, id)?
            .ok_or_else(|| GradeError::NotFound(format!("{kind} {id}")))?;
        let component_map: BTreeMap<String, String> = serde_json::from_str(&row.component_map)?;
        for (key, child_id) in &component_map {
            let key = ComponentKey::parse(key)?;
            delete_gradable(conn, key.kind, child_id)?;
        }
    }
    let table = table_for(kind);
    let deleted = conn.execute(
        &format!("DELETE FROM {table} WHERE entity_id = ?1"),
        params![id],
    )?;
    if deleted == 0 {
        return Err(GradeError::NotFound(format!("{kind} {id}")));
    }
    debug!(id, kind = %kind, "deleted gradable");
    Ok(())
}

/// Finds which table holds `id`, for rows whose recorded kind is missing.
pub fn locate_gradable(conn: &Connection, id: &str) -> Result<Option<GradableKind>> {
    for kind in [GradableKind::Grade, GradableKind::Block, GradableKind::Method] {
        let found = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE entity_id = ?1", table_for(kind)),
                params![id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if found {
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

fn table_for(kind: GradableKind) -> &'static str {
    match kind {
        GradableKind::Grade => "grades",
        GradableKind::Block => "grading_blocks",
        GradableKind::Method => "grading_method_instances",
    }
}
