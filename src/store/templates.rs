use crate::error::{GradeError, Result};
use crate::grading::{CompositeNode, Gradable};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// A reusable grading method: a composite definition without values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodTemplate {
    pub template_id: String,
    pub name: String,
    pub definition: CompositeNode,
    pub created_at: DateTime<Utc>,
}

impl MethodTemplate {
    /// A fresh, unvalued instance of this method ready to be attached to a rating.
    pub fn instantiate(&self) -> Gradable {
        let mut node = self.definition.clone();
        node.set_template_id(Some(self.template_id.clone()));
        Gradable::Composite(node)
    }
}

impl Store {
    pub fn save_template(&self, name: &str, tree: &Gradable) -> Result<MethodTemplate> {
        let Gradable::Composite(node) = tree else {
            return Err(GradeError::InvalidRequest(
                "a grading method must be a composite".to_string(),
            ));
        };
        tree.validate()?;

        let mut definition = node.clone();
        definition.clear_values();
        definition.set_template_id(None);

        let template = MethodTemplate {
            template_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            definition,
            created_at: Utc::now(),
        };
        self.conn.execute(
            "INSERT INTO grading_methods (template_id, name, definition, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &template.template_id,
                &template.name,
                serde_json::to_string(&template.definition)?,
                template.created_at
            ],
        )?;
        info!(template_id = %template.template_id, name, "saved grading method");
        Ok(template)
    }

    pub fn load_template(&self, template_id: &str) -> Result<MethodTemplate> {
        let row = self
            .conn
            .query_row(
                "SELECT template_id, name, definition, created_at
                 FROM grading_methods WHERE template_id = ?1",
                params![template_id],
                template_row,
            )
            .optional()?
            .ok_or_else(|| GradeError::NotFound(format!("grading method {template_id}")))?;
        row.into_template()
    }

    pub fn list_templates(&self) -> Result<Vec<MethodTemplate>> {
        let mut stmt = self.conn.prepare(
            "SELECT template_id, name, definition, created_at
             FROM grading_methods ORDER BY name, created_at",
        )?;
        let rows = stmt
            .query_map([], template_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(TemplateRow::into_template).collect()
    }
}

struct TemplateRow {
    template_id: String,
    name: String,
    definition: String,
    created_at: DateTime<Utc>,
}

impl TemplateRow {
    fn into_template(self) -> Result<MethodTemplate> {
        let definition: CompositeNode = serde_json::from_str(&self.definition)?;
        Ok(MethodTemplate {
            template_id: self.template_id,
            name: self.name,
            definition,
            created_at: self.created_at,
        })
    }
}

fn template_row(row: &Row<'_>) -> rusqlite::Result<TemplateRow> {
    Ok(TemplateRow {
        template_id: row.get(0)?,
        name: row.get(1)?,
        definition: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{GradableKind, GradeLeaf, Operation};
    use crate::types::interaction::{Interaction, ItemType, Rating};

    fn valued_tree() -> Gradable {
        CompositeNode::block("Album method")
            .attach(
                vec![
                    GradeLeaf::new("Lyrics", 1.0, 10.0, 1.0)
                        .and_then(|leaf| leaf.with_value(9.0))
                        .expect("valid")
                        .into(),
                    GradeLeaf::new("Beat", 1.0, 10.0, 1.0)
                        .and_then(|leaf| leaf.with_value(4.0))
                        .expect("valid")
                        .into(),
                ],
                vec![Operation::Add],
            )
            .expect("valid shape")
            .into()
    }

    #[test]
    fn saved_template_drops_values() {
        let store = Store::open_in_memory().expect("store should open");
        let template = store
            .save_template("Album method", &valued_tree())
            .expect("save should succeed");
        let loaded = store
            .load_template(&template.template_id)
            .expect("load should succeed");
        assert_eq!(loaded, template);
        let evaluation = Gradable::Composite(loaded.definition)
            .evaluate()
            .expect("evaluates");
        assert_eq!(evaluation.current, 2.0);
    }

    #[test]
    fn instances_carry_the_template_id_and_persist_as_methods() {
        let mut store = Store::open_in_memory().expect("store should open");
        let template = store
            .save_template("Album method", &valued_tree())
            .expect("save should succeed");
        let instance = template.instantiate();
        assert_eq!(instance.kind(), GradableKind::Method);

        let mut interaction = Interaction::new("user-1", "album-1", ItemType::Album);
        interaction.rating = Some(Rating::complex(instance));
        store
            .save_interaction(&interaction)
            .expect("save should succeed");
        let loaded = store
            .load_interaction(&interaction.aggregate_id)
            .expect("load should succeed");
        let Some(Rating {
            gradable: Gradable::Composite(node),
            ..
        }) = loaded.rating
        else {
            panic!("expected composite rating");
        };
        assert_eq!(node.template_id(), Some(template.template_id.as_str()));
    }

    #[test]
    fn leaf_cannot_become_a_template() {
        let store = Store::open_in_memory().expect("store should open");
        let leaf: Gradable = GradeLeaf::new("x", 0.0, 1.0, 1.0).expect("valid").into();
        assert!(matches!(
            store.save_template("x", &leaf),
            Err(GradeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn missing_template_is_not_found() {
        let store = Store::open_in_memory().expect("store should open");
        assert!(matches!(
            store.load_template("missing"),
            Err(GradeError::NotFound(_))
        ));
        assert!(store.list_templates().expect("list").is_empty());
    }
}
