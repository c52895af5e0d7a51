use crate::column::ColumnType;
use crate::contract::QueryContract;
use crate::model::{GlobalScope, Model, ModelSchema, Scope, SoftDelete};
use crate::query_builder::sql_generation::SqlGenerator;
use crate::query_builder::{JoinClause, Query, QueryFilter, QueryOperator, SortOrder};
use crate::relation::Relation;
use serde_json::{json, Value};
use std::sync::Arc;

struct Team;

impl Model for Team {
    fn table_name() -> &'static str {
        "teams"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("id", ColumnType::Integer),
            ("name", ColumnType::Text),
            ("city", ColumnType::Text),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::has_many::<Player>("players", "team_id"),
            Relation::belongs_to_many::<Sponsor>(
                "sponsors",
                "team_sponsor",
                "team_id",
                "sponsor_id",
            ),
        ]
    }

    fn scopes() -> Vec<Scope> {
        vec![Scope::new("named", |query, args| {
            let name = args.first().cloned().unwrap_or(Value::Null);
            Ok(query.where_op("name", QueryOperator::Eq, name))
        })]
    }
}

struct Player;

impl Model for Player {
    fn table_name() -> &'static str {
        "players"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("id", ColumnType::Integer),
            ("team_id", ColumnType::Integer),
            ("is_active", ColumnType::Boolean),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<Team>("team", "team_id"),
            Relation::has_many::<Goal>("goals", "player_id"),
        ]
    }

    fn soft_delete() -> Option<SoftDelete> {
        Some(SoftDelete::ActiveFlag("is_active".to_string()))
    }
}

struct Goal;

impl Model for Goal {
    fn table_name() -> &'static str {
        "goals"
    }

    fn columns() -> Vec<(&'static str, ColumnType)> {
        vec![
            ("player_id", ColumnType::Integer),
            ("minute", ColumnType::Integer),
            ("disallowed", ColumnType::Boolean),
        ]
    }

    fn global_scopes() -> Vec<GlobalScope> {
        vec![GlobalScope::new("counted", QueryFilter::eq("disallowed", json!(false)))]
    }
}

struct Sponsor;

impl Model for Sponsor {
    fn table_name() -> &'static str {
        "sponsors"
    }
}

// ========================================
// SQL Generation Edge Cases
// ========================================

#[test]
fn test_sql_generation_empty_conditions() {
    let mut generator = SqlGenerator::new();
    let where_clause = generator.build_where_clause(&[]);
    assert_eq!(where_clause, "");
    assert!(generator.into_values().is_empty());
}

#[test]
fn test_sql_generation_empty_arrays() {
    let mut generator = SqlGenerator::new();
    let where_clause = generator.build_where_clause(&[QueryFilter::in_values("status", vec![])]);
    assert_eq!(where_clause, "WHERE 1=0");

    let where_clause =
        generator.build_where_clause(&[QueryFilter::not_in_values("status", vec![])]);
    assert_eq!(where_clause, "WHERE 1=1");
    assert!(generator.into_values().is_empty());
}

#[test]
fn test_sql_generation_empty_groups() {
    let mut generator = SqlGenerator::new();
    let where_clause =
        generator.build_where_clause(&[QueryFilter::and(vec![]), QueryFilter::or(vec![])]);
    assert_eq!(where_clause, "WHERE 1=1 AND 1=0");
}

#[test]
fn test_sql_generation_null_values_become_null_checks() {
    let mut generator = SqlGenerator::new();
    let where_clause = generator.build_where_clause(&[
        QueryFilter::eq("deleted_at", Value::Null),
        QueryFilter::ne("deleted_at", Value::Null),
    ]);
    assert_eq!(where_clause, "WHERE deleted_at IS NULL AND deleted_at IS NOT NULL");
    assert!(generator.into_values().is_empty());
}

#[test]
fn test_sql_generation_invalid_operator_value_combinations() {
    let mut generator = SqlGenerator::new();

    let where_clause =
        generator.build_where_clause(&[QueryFilter::condition("amount", QueryOperator::Gt, None)]);
    assert_eq!(where_clause, "WHERE 1=0");

    let where_clause = generator.build_where_clause(&[QueryFilter::condition(
        "status",
        QueryOperator::In,
        Some(json!("not_an_array")),
    )]);
    assert_eq!(where_clause, "WHERE 1=0");
    assert!(generator.into_values().is_empty());
}

#[test]
fn test_sql_generation_parameter_numbering() {
    let mut generator = SqlGenerator::new();
    let where_clause = generator.build_where_clause(&[
        QueryFilter::or(vec![
            QueryFilter::eq("name", json!("a")),
            QueryFilter::in_values("rank", vec![json!(1), json!(2)]),
        ]),
        QueryFilter::gt("age", json!(25)),
    ]);

    assert_eq!(
        where_clause,
        "WHERE (name::text = $1 OR rank IN ($2, $3)) AND age > $4"
    );
    assert_eq!(
        generator.into_values(),
        vec![json!("a"), json!(1), json!(2), json!(25)]
    );
}

// ========================================
// Query Rendering
// ========================================

#[test]
fn test_query_empty_state() {
    let (sql, values) = Query::for_model::<Team>().build();
    assert_eq!(sql, "SELECT teams.* FROM teams");
    assert!(values.is_empty());
}

#[test]
fn test_query_clauses_in_order() {
    let query = Query::for_model::<Team>()
        .where_op("name", QueryOperator::Eq, json!("Ajax"))
        .join_if_absent(JoinClause::inner("players", "players.team_id", "teams.id"))
        .order_by("players.name", SortOrder::Desc)
        .limit(10)
        .offset(20);

    assert_eq!(
        query.to_sql(),
        "SELECT teams.* FROM teams INNER JOIN players ON players.team_id = teams.id \
         WHERE teams.name = $1 ORDER BY players.name DESC LIMIT 10 OFFSET 20"
    );
}

#[test]
fn test_join_if_absent_is_idempotent() {
    let join = JoinClause::inner("players", "players.team_id", "teams.id");
    let query = Query::for_model::<Team>()
        .join_if_absent(join.clone())
        .join_if_absent(join.clone());

    assert_eq!(query.joins(), &[join]);
}

#[test]
fn test_join_if_absent_keeps_first_clause_per_table() {
    let query = Query::for_model::<Team>()
        .join_if_absent(JoinClause::inner("players", "players.team_id", "teams.id"))
        .join_if_absent(JoinClause::left("players", "players.team_id", "teams.id"))
        .join_if_absent(JoinClause::inner("players", "teams.id", "players.team_id"));

    assert_eq!(query.joins().len(), 1);
    assert_eq!(
        query.to_sql(),
        "SELECT teams.* FROM teams INNER JOIN players ON players.team_id = teams.id"
    );
}

#[test]
fn test_select_qualifies_and_deduplicates() {
    let query = Query::for_model::<Team>().select(vec![
        "id".to_string(),
        "name".to_string(),
        "id".to_string(),
    ]);
    assert_eq!(query.to_sql(), "SELECT teams.id, teams.name FROM teams");

    let query = query.ensure_selected("city").ensure_selected("id");
    assert_eq!(query.to_sql(), "SELECT teams.id, teams.name, teams.city FROM teams");
}

#[test]
fn test_clone_isolation() {
    let base = Query::for_model::<Team>().where_op("city", QueryOperator::Eq, json!("Amsterdam"));

    let first = base.clone().where_op("name", QueryOperator::Eq, json!("Ajax"));
    let second = base.clone().order_by("name", SortOrder::Asc);

    assert_eq!(base.to_sql(), "SELECT teams.* FROM teams WHERE teams.city = $1");
    assert_eq!(
        first.to_sql(),
        "SELECT teams.* FROM teams WHERE teams.city = $1 AND teams.name = $2"
    );
    assert_eq!(
        second.to_sql(),
        "SELECT teams.* FROM teams WHERE teams.city = $1 ORDER BY teams.name ASC"
    );
}

#[test]
fn test_where_has_nested_path_applies_defaults_and_constraint() {
    let query = Query::for_model::<Team>()
        .where_has("players.goals", Some(QueryFilter::gt("minute", json!(80))))
        .unwrap();

    let (sql, values) = query.build();
    assert_eq!(
        sql,
        "SELECT teams.* FROM teams WHERE EXISTS (SELECT 1 FROM players \
         WHERE players.team_id = teams.id AND players.is_active = $1::boolean \
         AND EXISTS (SELECT 1 FROM goals WHERE goals.player_id = players.id \
         AND goals.disallowed = $2::boolean AND goals.minute > $3::bigint))"
    );
    assert_eq!(values, vec![json!(true), json!(false), json!(80)]);
}

#[test]
fn test_where_doesnt_have_through_pivot() {
    let query = Query::for_model::<Team>()
        .where_doesnt_have("sponsors", None)
        .unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT teams.* FROM teams WHERE NOT EXISTS (SELECT 1 FROM sponsors \
         INNER JOIN team_sponsor ON sponsors.id = team_sponsor.sponsor_id \
         WHERE team_sponsor.team_id = teams.id)"
    );
}

#[test]
fn test_where_has_unknown_relation() {
    let result = Query::for_model::<Team>().where_has("coaches", None);
    assert!(result.is_err());
}

#[test]
fn test_where_belongs_to() {
    let query = Query::for_model::<Player>()
        .where_belongs_to("team", vec![json!(1), json!(2)])
        .unwrap();
    assert_eq!(
        query.to_sql(),
        "SELECT players.* FROM players WHERE players.team_id IN ($1::bigint, $2::bigint) \
         AND players.is_active = $3::boolean"
    );

    assert!(Query::for_model::<Player>()
        .where_belongs_to("goals", vec![json!(1)])
        .is_err());
}

#[test]
fn test_soft_delete_modes() {
    let live = Query::for_model::<Player>();
    assert_eq!(
        live.to_sql(),
        "SELECT players.* FROM players WHERE players.is_active = $1::boolean"
    );

    let all = Query::for_model::<Player>().with_trashed();
    assert_eq!(all.to_sql(), "SELECT players.* FROM players");

    let (sql, values) = Query::for_model::<Player>().only_trashed().build();
    assert_eq!(sql, "SELECT players.* FROM players WHERE players.is_active = $1::boolean");
    assert_eq!(values, vec![json!(false)]);
}

#[test]
fn test_global_scope_toggles() {
    assert_eq!(
        Query::for_model::<Goal>().to_sql(),
        "SELECT goals.* FROM goals WHERE goals.disallowed = $1::boolean"
    );
    assert_eq!(
        Query::for_model::<Goal>().without_global_scopes().to_sql(),
        "SELECT goals.* FROM goals"
    );
    assert_eq!(
        Query::for_model::<Goal>()
            .without_global_scope("counted")
            .to_sql(),
        "SELECT goals.* FROM goals"
    );
    assert_eq!(
        Query::for_model::<Goal>()
            .without_global_scope("other")
            .to_sql(),
        "SELECT goals.* FROM goals WHERE goals.disallowed = $1::boolean"
    );
}

#[test]
fn test_call_scope() {
    let query = Query::for_model::<Team>()
        .call_scope("named", &[json!("Ajax")])
        .unwrap();
    assert_eq!(query.to_sql(), "SELECT teams.* FROM teams WHERE teams.name = $1");

    assert!(Query::for_model::<Team>().call_scope("missing", &[]).is_err());
}

#[test]
fn test_with_count_and_exists_columns() {
    let query = Query::for_model::<Team>()
        .with_count("players", "players_count")
        .unwrap()
        .with_exists("sponsors", "sponsors_exists")
        .unwrap()
        .with_count("players", "players_count")
        .unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT teams.*, (SELECT COUNT(*) FROM players WHERE players.team_id = teams.id \
         AND players.is_active = $1::boolean) AS players_count, EXISTS (SELECT 1 FROM sponsors \
         INNER JOIN team_sponsor ON sponsors.id = team_sponsor.sponsor_id \
         WHERE team_sponsor.team_id = teams.id) AS sponsors_exists FROM teams"
    );
}

#[test]
fn test_with_builds_eager_tree() {
    let constraint: crate::contract::EagerConstraint<Query> =
        Arc::new(|query: Query| query.order_by("name", SortOrder::Asc));

    let query = Query::for_model::<Team>()
        .with("players", None)
        .unwrap()
        .with("players.goals", Some(constraint))
        .unwrap();

    assert_eq!(query.eager_loads().len(), 1);
    assert_eq!(
        query.eager_loads()[0].paths(),
        vec!["players", "players.goals"]
    );
    assert!(query.eager_loads()[0].nested[0].constraint.is_some());

    assert!(Query::for_model::<Team>().with("players.assists", None).is_err());
}

#[test]
fn test_count_query_ignores_order_and_pagination() {
    let query = Query::for_model::<Team>()
        .where_op("name", QueryOperator::Eq, json!("Ajax"))
        .order_by("name", SortOrder::Asc)
        .limit(5);

    let (sql, values) = query.build_count();
    assert_eq!(
        sql,
        "SELECT COUNT(*) AS aggregate FROM teams WHERE teams.name = $1"
    );
    assert_eq!(values, vec![json!("Ajax")]);
}

#[test]
fn test_runtime_schema() {
    let schema = ModelSchema::new("leagues").with_primary_key("code");
    let query = Query::new(schema.clone()).where_op("code", QueryOperator::Eq, json!("ERE"));
    assert_eq!(query.to_sql(), "SELECT leagues.* FROM leagues WHERE leagues.code::text = $1");

    let schema = schema.with_column("code", ColumnType::Text);
    let query = Query::new(schema).where_op("code", QueryOperator::Eq, json!("ERE"));
    assert_eq!(query.to_sql(), "SELECT leagues.* FROM leagues WHERE leagues.code = $1");
}

// ========================================
// Typed Placeholders
// ========================================

#[test]
fn test_declared_types_cast_client_strings() {
    let query = Query::for_model::<Team>()
        .where_op("id", QueryOperator::Eq, json!("7"))
        .where_in("id", vec![json!("1"), json!(2)])
        .where_op("name", QueryOperator::Eq, json!(true));

    let (sql, values) = query.build();
    assert_eq!(
        sql,
        "SELECT teams.* FROM teams WHERE teams.id = $1::bigint \
         AND teams.id IN ($2::bigint, $3::bigint) AND teams.name = $4::text"
    );
    assert_eq!(values, vec![json!("7"), json!("1"), json!(2), json!(true)]);
}

#[test]
fn test_untyped_columns_compare_strings_as_text() {
    let query = Query::for_model::<Sponsor>()
        .where_op("external_id", QueryOperator::Eq, json!("67e55044-10b1-426f-9247-bb680e5fe0c8"))
        .where_in("tier", vec![json!("gold"), json!(1)])
        .where_op("rank", QueryOperator::Lt, json!(3));

    assert_eq!(
        query.to_sql(),
        "SELECT sponsors.* FROM sponsors WHERE sponsors.external_id::text = $1 \
         AND sponsors.tier::text IN ($2, $3::text) AND sponsors.rank < $4"
    );
}

#[test]
fn test_pattern_match_on_typed_column_reads_text() {
    let query = Query::for_model::<Team>()
        .where_filter(QueryFilter::condition("id", QueryOperator::ILike, Some(json!("%12%"))))
        .where_filter(QueryFilter::condition("name", QueryOperator::Like, Some(json!("Aj%"))));

    assert_eq!(
        query.to_sql(),
        "SELECT teams.* FROM teams WHERE teams.id::text ILIKE $1 AND teams.name LIKE $2"
    );
}

#[test]
fn test_relation_constraint_is_typed_against_related_model() {
    let query = Query::for_model::<Team>()
        .where_has("players", Some(QueryFilter::eq("id", json!("9"))))
        .unwrap();

    assert_eq!(
        query.to_sql(),
        "SELECT teams.* FROM teams WHERE EXISTS (SELECT 1 FROM players \
         WHERE players.team_id = teams.id AND players.is_active = $1::boolean \
         AND players.id = $2::bigint)"
    );
    assert_eq!(query.column_type("players.team_id"), Some(ColumnType::Integer));
    assert_eq!(query.column_type("teams.name"), Some(ColumnType::Text));
    assert_eq!(query.column_type("coaches.name"), None);
}
