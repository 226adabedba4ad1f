use super::*;
use crate::condition::{Condition, Expr, Op};

fn mysql(table: &str) -> Query {
    Query::new(Dialect::MySql, table).unwrap()
}

fn pg(table: &str) -> Query {
    Query::new(Dialect::Postgres, table).unwrap()
}

#[test]
fn select_quotes_functions() {
    let q = mysql("users").select(["MIN(id)", "COUNT(*)"]).unwrap();
    assert_eq!(q.to_sql(), "SELECT MIN(`id`),COUNT(*) FROM `users`");
}

#[test]
fn select_rejects_bad_identifiers() {
    assert!(matches!(
        mysql("users").select(["na`me"]),
        Err(DbError::InvalidIdentifier(_))
    ));
}

#[test]
fn dotted_table_is_quoted_per_segment() {
    let q = mysql("app.users").select(["id"]).unwrap();
    assert_eq!(q.to_sql(), "SELECT `id` FROM `app`.`users`");
}

#[test]
fn where_mixes_inline_and_bound_values() {
    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .filter(Where::new().field("three", Value::now()).field("four", ["a", "b"]))
        .unwrap();
    let built = q.build();
    assert_eq!(built.sql, "SELECT * FROM `t` WHERE `three` = NOW() AND `four` IN (?,?)");
    assert_eq!(built.args, vec![Value::from("a"), Value::from("b")]);
}

#[test]
fn postgres_numbers_placeholders_across_filters() {
    let q = pg("t")
        .select(["id"])
        .unwrap()
        .filter(Condition::eq("a", "x"))
        .unwrap()
        .filter(Condition::eq("b", "y"))
        .unwrap();
    assert_eq!(
        q.to_sql(),
        r#"SELECT "id" FROM "t" WHERE "a" = $1 AND "b" = $2"#
    );
}

#[test]
fn in_list_is_deduplicated_and_inlined() {
    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .filter(Where::new().field("id", [1, 2, 2, 3]))
        .unwrap();
    let built = q.build();
    assert_eq!(built.sql, "SELECT * FROM `t` WHERE `id` IN (1,2,3)");
    assert!(built.args.is_empty());
}

#[test]
fn always_quote_wraps_numbers() {
    let q = mysql("t")
        .always_quote(true)
        .select(["*"])
        .unwrap()
        .filter(Where::new().field("id", 5))
        .unwrap();
    assert_eq!(q.to_sql(), "SELECT * FROM `t` WHERE `id` = '5'");
}

#[test]
fn null_and_negation() {
    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .filter(Where::new().field("deleted_at", Value::Null))
        .unwrap();
    assert_eq!(q.to_sql(), "SELECT * FROM `t` WHERE `deleted_at` IS NULL");

    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .filter_not(Where::new().field("deleted_at", Value::Null))
        .unwrap()
        .filter_not(Condition::gt("age", 18))
        .unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT * FROM `t` WHERE `deleted_at` IS NOT NULL AND `age` <= 18"
    );

    assert!(matches!(
        mysql("t").filter_not(Condition::new("body", Op::Match, "x")),
        Err(DbError::NotNegatable(_))
    ));
}

#[test]
fn or_groups_are_parenthesized() {
    let expr = Expr::or([
        Condition::eq("a", 1).into(),
        Expr::and([Condition::eq("b", 2).into(), Condition::eq("c", 3).into()]),
    ]);
    let q = mysql("t").select(["*"]).unwrap().filter(expr).unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT * FROM `t` WHERE (`a` = 1 OR (`b` = 2 AND `c` = 3))"
    );
}

#[test]
fn json_where_input() {
    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .filter(Where::from_json(&serde_json::json!({"a": 1, "b": ["x", "y"]})).unwrap())
        .unwrap();
    assert_eq!(q.to_sql(), "SELECT * FROM `t` WHERE `a` = 1 AND `b` IN (?,?)");

    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .filter(Where::from_json(&serde_json::json!([["a", ">", 3], ["b", "like", "x%"]])).unwrap())
        .unwrap();
    assert_eq!(q.to_sql(), "SELECT * FROM `t` WHERE `a` > 3 AND `b` LIKE ?");
}

#[test]
fn regexp_operator_follows_dialect() {
    let q = pg("t")
        .select(["*"])
        .unwrap()
        .filter(Condition::new("name", Op::Regexp, "^a"))
        .unwrap();
    assert_eq!(q.to_sql(), r#"SELECT * FROM "t" WHERE "name" ~ $1"#);
}

#[test]
fn group_having_distinct() {
    let q = mysql("t")
        .select(["kind"])
        .unwrap()
        .distinct()
        .group(["kind"])
        .unwrap()
        .having("COUNT(*) > 1");
    assert_eq!(
        q.to_sql(),
        "SELECT DISTINCT `kind` FROM `t` GROUP BY `kind` HAVING COUNT(*) > 1"
    );
}

#[test]
fn limit_and_offset() {
    let q = mysql("t").select(["*"]).unwrap().offset(5);
    assert_eq!(q.to_sql(), "SELECT * FROM `t`");

    let q = mysql("t").select(["*"]).unwrap().limit(10).offset(5);
    assert_eq!(q.to_sql(), "SELECT * FROM `t` LIMIT 10 OFFSET 5");

    let q = mysql("t").select(["*"]).unwrap().limit(-3).offset(-1);
    assert_eq!(q.to_sql(), "SELECT * FROM `t` LIMIT 0");
}

#[test]
fn order_validation_and_values() {
    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .order([("name", "ASC")])
        .unwrap()
        .order_by_values("id", [3, 1])
        .unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT * FROM `t` ORDER BY `name` ASC, FIELD(`id`, 3,1)"
    );

    let q = pg("t")
        .select(["*"])
        .unwrap()
        .order_by_values("id", [3, 1])
        .unwrap();
    assert_eq!(
        q.to_sql(),
        r#"SELECT * FROM "t" ORDER BY "id"=3 DESC,"id"=1 DESC"#
    );

    let q = mysql("t")
        .select(["*"])
        .unwrap()
        .order_by_values("id", [3])
        .unwrap();
    assert_eq!(q.to_sql(), "SELECT * FROM `t`");

    assert!(matches!(
        mysql("t").order([("name", "asc")]),
        Err(DbError::InvalidSortDirection(_))
    ));
}

#[test]
fn union_requires_same_dialect() {
    let q = mysql("a")
        .select(["id"])
        .unwrap()
        .union(mysql("b").select(["id"]).unwrap())
        .unwrap();
    assert_eq!(q.to_sql(), "(SELECT `id` FROM `a`) UNION (SELECT `id` FROM `b`)");

    assert!(mysql("a").union(pg("b")).is_err());
    assert!(matches!(
        mysql("a").select(["id"]).unwrap().union(mysql("b")),
        Err(DbError::InvalidArgument(_))
    ));
}

#[test]
fn insert_variants() {
    let data = record([("name", Value::from("ann")), ("age", Value::from(30))]);

    let q = mysql("users").insert(data.clone()).unwrap();
    let built = q.build();
    assert_eq!(built.sql, "INSERT INTO `users` (`name`,`age`) VALUES (?,30)");
    assert_eq!(built.args, vec![Value::from("ann")]);

    let q = mysql("users").insert_ignore(data.clone()).unwrap();
    assert_eq!(q.to_sql(), "INSERT IGNORE INTO `users` (`name`,`age`) VALUES (?,30)");

    let q = pg("users").insert_ignore(data.clone()).unwrap();
    assert_eq!(
        q.to_sql(),
        r#"INSERT INTO "users" ("name","age") VALUES ($1,30) ON CONFLICT DO NOTHING"#
    );

    let q = mysql("users").insert(data.clone()).unwrap().delayed();
    assert_eq!(q.to_sql(), "INSERT DELAYED INTO `users` (`name`,`age`) VALUES (?,30)");

    let q = pg("users").insert(data).unwrap().delayed();
    assert_eq!(q.to_sql(), r#"INSERT INTO "users" ("name","age") VALUES ($1,30)"#);
}

#[test]
fn insert_get_id_uses_returning_on_postgres() {
    let q = pg("users")
        .insert_get_id(record([("name", "ann")]))
        .unwrap();
    assert_eq!(
        q.to_sql(),
        r#"INSERT INTO "users" ("name") VALUES ($1) RETURNING "id""#
    );

    let q = mysql("users")
        .insert_get_id(record([("name", "ann")]))
        .unwrap();
    assert_eq!(q.to_sql(), "INSERT INTO `users` (`name`) VALUES (?)");
}

#[test]
fn empty_insert() {
    assert_eq!(
        mysql("users").insert(Record::new()).unwrap().to_sql(),
        "INSERT INTO `users` () VALUES ()"
    );
    assert_eq!(
        pg("users").insert(Record::new()).unwrap().to_sql(),
        r#"INSERT INTO "users" DEFAULT VALUES"#
    );
}

#[test]
fn upsert_is_mysql_only() {
    let data = record([("uid", Value::from(1)), ("name", Value::from("john"))]);
    let q = mysql("users").upsert(data.clone(), ["uid"]).unwrap();
    assert_eq!(
        q.to_sql(),
        "INSERT INTO `users` (`uid`,`name`) VALUES (1,?) ON DUPLICATE KEY UPDATE `name`=VALUES(`name`)"
    );

    assert!(matches!(
        pg("users").upsert(data, ["uid"]),
        Err(DbError::UnsupportedOperation(_))
    ));
}

#[test]
fn update_and_increment() {
    let q = mysql("users")
        .update(record([("name", "x")]))
        .unwrap()
        .filter(Condition::eq("id", 5))
        .unwrap();
    assert_eq!(q.to_sql(), "UPDATE `users` SET `name`=? WHERE `id` = 5");

    let q = mysql("users")
        .increment([("hits", 1), ("score", -2)], true)
        .unwrap();
    assert_eq!(
        q.to_sql(),
        "UPDATE `users` SET `hits`=COALESCE(`hits`, 0) + 1, `score`=COALESCE(`score`, 0) - 2"
    );

    let q = mysql("users").increment([("hits", 1)], false).unwrap();
    assert_eq!(q.to_sql(), "UPDATE `users` SET `hits`=`hits` + 1");

    assert!(matches!(
        mysql("users").increment([("hits", "x")], true),
        Err(DbError::InvalidValueType(_))
    ));

    assert_eq!(mysql("users").update(Record::new()).unwrap().to_sql(), "");
}

#[test]
fn delete_uses_filter_rules() {
    let q = mysql("users")
        .delete(Where::new().field("id", [3, 4]))
        .unwrap();
    assert_eq!(q.to_sql(), "DELETE FROM `users` WHERE `id` IN (3,4)");
}

#[test]
fn allow_list_blocks_operations() {
    let q = mysql("users").allow_operations([Operation::Select]);
    assert!(q.clone().select(["id"]).is_ok());
    assert!(matches!(
        q.delete(Where::new().field("id", 1)),
        Err(DbError::OperationNotAllowed(_))
    ));
}

#[test]
fn unset_operation_renders_staged_statement() {
    assert_eq!(mysql("t").to_sql(), "");
    let q = mysql("t").with_statement("SELECT 1", Vec::new());
    assert_eq!(q.to_sql(), "SELECT 1");
}

#[test]
fn supplied_id_ignores_empty_values() {
    let q = mysql("t").insert_get_id(record([("id", 0)])).unwrap();
    assert!(q.supplied_id().is_none());
    let q = mysql("t").insert_get_id(record([("id", 42)])).unwrap();
    assert_eq!(q.supplied_id(), Some(&Value::Int(42)));
}
