use crate::error::{GradeError, Result};
use crate::grading::{evaluate, GradableKind, GradeLeaf, Gradable};
use crate::store::mapper;
use crate::store::Store;
use crate::types::interaction::{Interaction, ItemType, Rating, Review};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};

impl Store {
    /// Writes the whole aggregate in one transaction: interaction, review, the rating's
    /// grading tree (innermost nodes first) and finally the rating row.
    ///
    /// An existing aggregate with the same id is replaced. Nothing is visible unless
    /// every write succeeds.
    pub fn save_interaction(&mut self, interaction: &Interaction) -> Result<()> {
        let score = match &interaction.rating {
            Some(rating) => {
                rating.gradable.validate()?;
                Some(evaluate(&rating.gradable, self.display_precision())?)
            }
            None => None,
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let replaced = remove_aggregate(&tx, &interaction.aggregate_id)?;

        tx.execute(
            "INSERT INTO interactions (aggregate_id, user_id, item_id, item_type, created_at, is_liked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &interaction.aggregate_id,
                &interaction.user_id,
                &interaction.item_id,
                interaction.item_type.as_str(),
                interaction.created_at,
                interaction.is_liked
            ],
        )?;

        if let Some(review) = &interaction.review {
            tx.execute(
                "INSERT INTO reviews (review_id, content, created_at, aggregate_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    &review.review_id,
                    &review.content,
                    review.created_at,
                    &interaction.aggregate_id
                ],
            )?;
        }

        if let (Some(rating), Some(score)) = (&interaction.rating, score) {
            let root = mapper::store_gradable(&tx, &rating.gradable)?;
            tx.execute(
                "INSERT INTO ratings
                 (rating_id, grade, min_grade, max_grade, normalized_grade, is_complex_grading,
                  gradable_id, gradable_type, created_at, aggregate_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    &rating.rating_id,
                    score.current,
                    score.min,
                    score.max,
                    score.normalized,
                    rating.is_complex_grading,
                    &root.id,
                    root.kind.as_str(),
                    rating.created_at,
                    &interaction.aggregate_id
                ],
            )?;
        }

        tx.commit()?;
        info!(
            aggregate_id = %interaction.aggregate_id,
            replaced,
            nodes = interaction
                .rating
                .as_ref()
                .map_or(0, |rating| rating.gradable.node_count()),
            depth = interaction
                .rating
                .as_ref()
                .map_or(0, |rating| rating.gradable.depth()),
            reviewed = interaction.review.is_some(),
            "saved interaction"
        );
        Ok(())
    }

    pub fn load_interaction(&self, aggregate_id: &str) -> Result<Interaction> {
        load_interaction(&self.conn, aggregate_id)
    }

    pub fn list_interactions(&self) -> Result<Vec<Interaction>> {
        let mut stmt = self
            .conn
            .prepare("SELECT aggregate_id FROM interactions ORDER BY created_at, aggregate_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids.iter()
            .map(|id| load_interaction(&self.conn, id))
            .collect()
    }

    /// Removes an aggregate together with its review, rating and grading tree.
    pub fn delete_interaction(&mut self, aggregate_id: &str) -> Result<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !remove_aggregate(&tx, aggregate_id)? {
            return Err(GradeError::NotFound(format!("interaction {aggregate_id}")));
        }
        tx.commit()?;
        info!(aggregate_id, "deleted interaction");
        Ok(())
    }
}

fn load_interaction(conn: &Connection, aggregate_id: &str) -> Result<Interaction> {
    let row = conn
        .query_row(
            "SELECT user_id, item_id, item_type, created_at, is_liked
             FROM interactions WHERE aggregate_id = ?1",
            params![aggregate_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, DateTime<Utc>>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            },
        )
        .optional()?;
    let (user_id, item_id, item_type, created_at, is_liked) =
        row.ok_or_else(|| GradeError::NotFound(format!("interaction {aggregate_id}")))?;
    let item_type = item_type
        .parse::<ItemType>()
        .map_err(|e| GradeError::Corrupt(format!("interaction {aggregate_id}: {e}")))?;

    Ok(Interaction {
        aggregate_id: aggregate_id.to_string(),
        user_id,
        item_id,
        item_type,
        created_at,
        is_liked,
        review: load_review(conn, aggregate_id)?,
        rating: load_rating(conn, aggregate_id)?,
    })
}

fn load_review(conn: &Connection, aggregate_id: &str) -> Result<Option<Review>> {
    let review = conn
        .query_row(
            "SELECT review_id, content, created_at FROM reviews WHERE aggregate_id = ?1",
            params![aggregate_id],
            |row| {
                Ok(Review {
                    review_id: row.get(0)?,
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(review)
}

struct RatingRow {
    rating_id: String,
    is_complex_grading: bool,
    gradable_id: Option<String>,
    gradable_type: Option<String>,
    created_at: DateTime<Utc>,
}

fn load_rating(conn: &Connection, aggregate_id: &str) -> Result<Option<Rating>> {
    let row = conn
        .query_row(
            "SELECT rating_id, is_complex_grading, gradable_id, gradable_type, created_at
             FROM ratings WHERE aggregate_id = ?1",
            params![aggregate_id],
            |row| {
                Ok(RatingRow {
                    rating_id: row.get(0)?,
                    is_complex_grading: row.get(1)?,
                    gradable_id: row.get(2)?,
                    gradable_type: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    let Some(row) = row else {
        return Ok(None);
    };

    let kind = row
        .gradable_type
        .as_deref()
        .and_then(|value| value.parse::<GradableKind>().ok());
    let gradable = match (kind, row.gradable_id.as_deref()) {
        (Some(kind), Some(id)) => mapper::load_gradable(conn, kind, id)?,
        _ => {
            // TODO: decide whether an unresolvable gradable should fail the load instead.
            warn!(
                rating_id = %row.rating_id,
                gradable_type = ?row.gradable_type,
                "rating has no resolvable gradable; substituting a zero-bound grade"
            );
            Gradable::Grade(GradeLeaf::default())
        }
    };

    Ok(Some(Rating {
        rating_id: row.rating_id,
        is_complex_grading: row.is_complex_grading,
        gradable,
        created_at: row.created_at,
    }))
}

/// Deletes every row belonging to an aggregate. Returns whether it existed.
fn remove_aggregate(conn: &Connection, aggregate_id: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM interactions WHERE aggregate_id = ?1",
            params![aggregate_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !exists {
        return Ok(false);
    }

    let root = conn
        .query_row(
            "SELECT gradable_id, gradable_type FROM ratings WHERE aggregate_id = ?1",
            params![aggregate_id],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;
    if let Some((Some(id), kind)) = root {
        let kind = match kind.as_deref().map(str::parse::<GradableKind>) {
            Some(Ok(kind)) => kind,
            _ => {
                let located = mapper::locate_gradable(conn, &id)?.ok_or_else(|| {
                    GradeError::Corrupt(format!(
                        "rating of {aggregate_id} references unknown gradable {id}"
                    ))
                })?;
                warn!(
                    aggregate_id,
                    gradable_id = %id,
                    kind = %located,
                    "rating has no usable gradable type; located gradable by id"
                );
                located
            }
        };
        mapper::delete_gradable(conn, kind, &id)?;
    }

    conn.execute(
        "DELETE FROM ratings WHERE aggregate_id = ?1",
        params![aggregate_id],
    )?;
    conn.execute(
        "DELETE FROM reviews WHERE aggregate_id = ?1",
        params![aggregate_id],
    )?;
    conn.execute(
        "DELETE FROM interactions WHERE aggregate_id = ?1",
        params![aggregate_id],
    )?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{CompositeNode, Operation};
    use crate::types::config::GradingSettings;
    use crate::types::interaction::GradingRequest;

    fn leaf(name: &str, value: f64) -> Gradable {
        GradeLeaf::new(name, 0.0, 10.0, 1.0)
            .and_then(|leaf| leaf.with_value(value))
            .expect("valid leaf")
            .into()
    }

    /// Root block over three leaves: four grading rows in total.
    fn four_node_tree() -> Gradable {
        CompositeNode::block("Album")
            .attach(
                vec![leaf("Lyrics", 8.0), leaf("Vocals", 6.0), leaf("Beat", 9.0)],
                vec![Operation::Add, Operation::Add],
            )
            .expect("valid shape")
            .into()
    }

    fn full_interaction() -> Interaction {
        let mut interaction = Interaction::new("user-1", "album-42", ItemType::Album);
        interaction.is_liked = true;
        interaction.review = Some(Review::new("Great record"));
        interaction.rating = Some(Rating::complex(four_node_tree()));
        interaction
    }

    fn count(store: &Store, table: &str) -> i64 {
        store
            .connection()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count should succeed")
    }

    fn total_rows(store: &Store) -> i64 {
        [
            "interactions",
            "reviews",
            "ratings",
            "grades",
            "grading_blocks",
            "grading_method_instances",
        ]
        .iter()
        .map(|table| count(store, table))
        .sum()
    }

    #[test]
    fn save_then_load_reconstructs_the_aggregate() {
        let mut store = Store::open_in_memory().expect("store should open");
        let interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("save should succeed");

        let loaded = store
            .load_interaction(&interaction.aggregate_id)
            .expect("load should succeed");
        assert_eq!(loaded, interaction);
    }

    #[test]
    fn rating_row_stores_the_normalized_root_score() {
        let mut store = Store::open_in_memory().expect("store should open");
        let interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("save should succeed");

        let (grade, min, max, normalized, kind): (f64, f64, f64, f64, String) = store
            .connection()
            .query_row(
                "SELECT grade, min_grade, max_grade, normalized_grade, gradable_type FROM ratings",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .expect("rating row should exist");
        assert_eq!((grade, min, max), (23.0, 0.0, 30.0));
        assert_eq!(normalized, 7.9);
        assert_eq!(kind, "block");
    }

    #[test]
    fn simple_rating_is_stored_as_a_single_grade() {
        let mut store = Store::open_in_memory().expect("store should open");
        let mut interaction = Interaction::new("user-1", "track-7", ItemType::Track);
        let basic = GradeLeaf::new("Basic grade", 1.0, 10.0, 0.5)
            .and_then(|leaf| leaf.with_value(7.5))
            .expect("valid leaf");
        interaction.rating = Some(Rating::simple(basic));
        store
            .save_interaction(&interaction)
            .expect("save should succeed");

        assert_eq!(count(&store, "grades"), 1);
        let loaded = store
            .load_interaction(&interaction.aggregate_id)
            .expect("load should succeed");
        assert_eq!(loaded.rating, interaction.rating);
        assert!(loaded.review.is_none());
    }

    #[test]
    fn fault_midway_through_the_tree_rolls_back_everything() {
        let mut store = Store::open_in_memory().expect("store should open");
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER fail_third_grade BEFORE INSERT ON grades
                 WHEN (SELECT COUNT(*) FROM grades) >= 2
                 BEGIN SELECT RAISE(ABORT, 'simulated fault'); END;",
            )
            .expect("trigger should install");

        let result = store.save_interaction(&full_interaction());
        assert!(matches!(result, Err(GradeError::Persistence(_))));
        assert_eq!(total_rows(&store), 0);
    }

    #[test]
    fn saving_again_replaces_the_previous_aggregate_state() {
        let mut store = Store::open_in_memory().expect("store should open");
        let mut interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("first save should succeed");

        interaction.review = None;
        interaction.rating = Some(Rating::complex(leaf("Overall", 4.0)));
        store
            .save_interaction(&interaction)
            .expect("second save should succeed");

        assert_eq!(count(&store, "interactions"), 1);
        assert_eq!(count(&store, "reviews"), 0);
        assert_eq!(count(&store, "grades"), 1);
        assert_eq!(count(&store, "grading_blocks"), 0);
        let loaded = store
            .load_interaction(&interaction.aggregate_id)
            .expect("load should succeed");
        assert_eq!(loaded, interaction);
    }

    #[test]
    fn invalid_tree_is_rejected_before_any_write() {
        let mut store = Store::open_in_memory().expect("store should open");
        let mut interaction = full_interaction();
        interaction.rating = Some(Rating::complex(CompositeNode::block("empty").into()));
        assert!(matches!(
            store.save_interaction(&interaction),
            Err(GradeError::EmptyComposite(_))
        ));
        assert_eq!(total_rows(&store), 0);
    }

    #[test]
    fn unknown_aggregate_is_not_found() {
        let mut store = Store::open_in_memory().expect("store should open");
        assert!(matches!(
            store.load_interaction("missing"),
            Err(GradeError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_interaction("missing"),
            Err(GradeError::NotFound(_))
        ));
    }

    #[test]
    fn unknown_gradable_type_falls_back_to_default_grade() {
        let mut store = Store::open_in_memory().expect("store should open");
        let interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("save should succeed");
        store
            .connection()
            .execute("UPDATE ratings SET gradable_type = NULL", [])
            .expect("update should succeed");

        let loaded = store
            .load_interaction(&interaction.aggregate_id)
            .expect("load should succeed");
        let rating = loaded.rating.expect("rating should remain");
        assert_eq!(rating.gradable, Gradable::Grade(GradeLeaf::default()));
    }

    #[test]
    fn delete_cleans_up_tree_when_gradable_type_is_missing() {
        let mut store = Store::open_in_memory().expect("store should open");
        let interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("save should succeed");
        store
            .connection()
            .execute("UPDATE ratings SET gradable_type = NULL", [])
            .expect("update should succeed");

        store
            .delete_interaction(&interaction.aggregate_id)
            .expect("delete should succeed");
        assert_eq!(total_rows(&store), 0);
    }

    #[test]
    fn replacing_an_untyped_rating_leaves_no_orphaned_rows() {
        let mut store = Store::open_in_memory().expect("store should open");
        let mut interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("first save should succeed");
        store
            .connection()
            .execute("UPDATE ratings SET gradable_type = NULL", [])
            .expect("update should succeed");

        interaction.rating = Some(Rating::complex(leaf("Overall", 4.0)));
        store
            .save_interaction(&interaction)
            .expect("second save should succeed");
        assert_eq!(count(&store, "grades"), 1);
        assert_eq!(count(&store, "grading_blocks"), 0);
    }

    #[test]
    fn unresolvable_rating_tree_aborts_delete() {
        let mut store = Store::open_in_memory().expect("store should open");
        let interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("save should succeed");
        store
            .connection()
            .execute(
                "UPDATE ratings SET gradable_type = NULL, gradable_id = 'nowhere'",
                [],
            )
            .expect("update should succeed");

        assert!(matches!(
            store.delete_interaction(&interaction.aggregate_id),
            Err(GradeError::Corrupt(_))
        ));
        assert_eq!(count(&store, "interactions"), 1);
        assert_eq!(count(&store, "ratings"), 1);
        assert_eq!(count(&store, "grades"), 3);
    }

    #[test]
    fn submitted_off_step_values_are_stored_rounded() {
        let mut store = Store::open_in_memory().expect("store should open");
        let request: GradingRequest = serde_json::from_str(
            r#"{
                "use_complex_grading": true,
                "gradable": {"kind": "grade", "name": "Overall", "min_grade": 0, "max_grade": 5, "step_amount": 1, "current_value": 4.3}
            }"#,
        )
        .expect("request should parse");
        let mut interaction = Interaction::new("user-1", "album-42", ItemType::Album);
        interaction.rating = Some(
            request
                .into_rating(&GradingSettings::default())
                .expect("rating should build"),
        );
        store
            .save_interaction(&interaction)
            .expect("save should succeed");

        let stored: f64 = store
            .connection()
            .query_row("SELECT grade FROM grades", [], |row| row.get(0))
            .expect("grade row should exist");
        assert_eq!(stored, 4.0);
    }

    #[test]
    fn delete_removes_every_row_of_the_aggregate() {
        let mut store = Store::open_in_memory().expect("store should open");
        let interaction = full_interaction();
        store
            .save_interaction(&interaction)
            .expect("save should succeed");
        store
            .delete_interaction(&interaction.aggregate_id)
            .expect("delete should succeed");
        assert_eq!(total_rows(&store), 0);
    }

    #[test]
    fn list_returns_every_aggregate() {
        let mut store = Store::open_in_memory().expect("store should open");
        let first = full_interaction();
        let second = Interaction::new("user-2", "artist-1", ItemType::Artist);
        store.save_interaction(&first).expect("save should succeed");
        store.save_interaction(&second).expect("save should succeed");

        let listed = store.list_interactions().expect("list should succeed");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|item| item == &first));
        assert!(listed.iter().any(|item| item == &second));
    }

    #[test]
    fn independent_aggregates_can_be_written_concurrently() {
        let dir = tempfile::TempDir::new().expect("temp dir should be created");
        let settings = crate::types::config::StorageSettings {
            database: dir.path().join("grades.db"),
            busy_timeout: std::time::Duration::from_secs(5),
        };
        Store::open(&settings).expect("schema should initialize");

        let handles = (0..4)
            .map(|_| {
                let settings = settings.clone();
                std::thread::spawn(move || {
                    let mut store = Store::open(&settings).expect("store should open");
                    store
                        .save_interaction(&full_interaction())
                        .expect("save should succeed");
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("writer thread should finish");
        }

        let store = Store::open(&settings).expect("store should open");
        assert_eq!(store.list_interactions().expect("list").len(), 4);
    }
}
