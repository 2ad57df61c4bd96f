//! Builds parameterized SELECT, INSERT, UPDATE, DELETE from the resolved model.
//!
//! Identifiers come from declarations only and are always quoted; values are always bound
//! as text parameters and cast to the attribute's type in SQL.

use crate::config::{EntityModel, IncludeNode, Record};
use crate::graph::AssociationEdge;
use crate::search::{Condition, Filter, Operator, PredicateNode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub type Entities = HashMap<String, Arc<EntityModel>>;

/// Quote identifier for PostgreSQL (safe: only from declarations).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(entity: &EntityModel) -> String {
    match &entity.schema_name {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&entity.table_name)),
        None => quoted(&entity.table_name),
    }
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
    aliases: u32,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }

    /// Placeholder cast to the attribute's type, e.g. `$3::bigint`.
    fn typed_param(&mut self, entity: &EntityModel, attribute: &str, v: Value) -> String {
        let n = self.push_param(v);
        match entity.attribute(attribute).and_then(|a| a.type_.pg_cast()) {
            Some(cast) => format!("${}::{}", n, cast),
            None => format!("${}", n),
        }
    }

    fn alias(&mut self) -> String {
        self.aliases += 1;
        format!("t{}", self.aliases)
    }
}

/// Escape LIKE metacharacters; the pattern is used with `ESCAPE '\'`.
pub fn like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn column_list(entity: &EntityModel, alias: &str) -> Vec<String> {
    entity
        .attributes
        .iter()
        .map(|a| format!("{}.{} AS {}", alias, quoted(&a.name), quoted(&a.name)))
        .collect()
}

fn returning_list(entity: &EntityModel) -> String {
    entity
        .attributes
        .iter()
        .map(|a| quoted(&a.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn condition_sql(q: &mut QueryBuf, alias: &str, c: &Condition) -> String {
    let col = format!("CAST({}.{} AS TEXT)", alias, quoted(&c.attribute));
    match c.operator {
        Operator::Contains => {
            let n = q.push_param(Value::String(like_pattern(&c.value)));
            format!("{} ILIKE ${} ESCAPE '\\'", col, n)
        }
        Operator::Equals => {
            let n = q.push_param(Value::String(c.value.clone()));
            format!("{} = ${}", col, n)
        }
    }
}

fn filter_sql(q: &mut QueryBuf, alias: &str, f: &Filter) -> String {
    match f {
        Filter::Condition(c) => condition_sql(q, alias, c),
        Filter::AnyOf(cs) if cs.is_empty() => "FALSE".to_string(),
        Filter::AnyOf(cs) => {
            let parts: Vec<String> = cs.iter().map(|c| condition_sql(q, alias, c)).collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

/// FROM clause and link predicate selecting the records related to `parent_alias` via `edge`.
fn related_from(q: &mut QueryBuf, edge: &AssociationEdge, parent_alias: &str, alias: &str, entities: &Entities) -> Option<(String, String)> {
    let target = entities.get(&edge.to_entity)?;
    match &edge.through {
        Some(through) => {
            let join_entity = entities.get(&through.entity)?;
            let link = q.alias();
            let from = format!(
                "{} {} JOIN {} {} ON {}.{} = {}.{}",
                qualified_table(target),
                alias,
                qualified_table(join_entity),
                link,
                link,
                quoted(&through.target_key),
                alias,
                quoted(&edge.target_key)
            );
            let on = format!(
                "{}.{} = {}.{}",
                link,
                quoted(&through.source_key),
                parent_alias,
                quoted(&edge.source_key)
            );
            Some((from, on))
        }
        None => {
            let from = format!("{} {}", qualified_table(target), alias);
            let on = format!(
                "{}.{} = {}.{}",
                alias,
                quoted(&edge.target_key),
                parent_alias,
                quoted(&edge.source_key)
            );
            Some((from, on))
        }
    }
}

/// Local filters of `node` plus one EXISTS sub-query per child relation.
fn predicate_parts(q: &mut QueryBuf, node: &PredicateNode, alias: &str, entities: &Entities) -> Vec<String> {
    let mut parts: Vec<String> = node.filters.iter().map(|f| filter_sql(q, alias, f)).collect();
    for child in &node.children {
        let Some(edge) = &child.edge else { continue };
        let child_alias = q.alias();
        let Some((from, on)) = related_from(q, edge, alias, &child_alias, entities) else {
            parts.push("FALSE".to_string());
            continue;
        };
        let mut inner = vec![on];
        inner.extend(predicate_parts(q, child, &child_alias, entities));
        parts.push(format!("EXISTS (SELECT 1 FROM {} WHERE {})", from, inner.join(" AND ")));
    }
    parts
}

/// Scalar sub-select producing the JSON for one include (array for to-many, object for to-one).
fn include_sql(q: &mut QueryBuf, inc: &IncludeNode, parent_alias: &str, filter: Option<&PredicateNode>, entities: &Entities) -> Option<String> {
    let target = entities.get(&inc.edge.to_entity)?;
    let alias = q.alias();
    let (from, on) = related_from(q, &inc.edge, parent_alias, &alias, entities)?;
    let sub_filter = filter.and_then(|f| f.child(inc.relation()));

    let mut cols = column_list(target, &alias);
    for nested in &inc.children {
        if let Some(sql) = include_sql(q, nested, &alias, sub_filter, entities) {
            cols.push(format!("{} AS {}", sql, quoted(nested.relation())));
        }
    }
    let mut where_parts = vec![on];
    if let Some(f) = sub_filter {
        where_parts.extend(predicate_parts(q, f, &alias, entities));
    }
    let inner = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}.{}",
        cols.join(", "),
        from,
        where_parts.join(" AND "),
        alias,
        quoted(&target.primary_key)
    );
    Some(if inc.edge.is_singular() {
        format!("(SELECT row_to_json(sub) FROM ({} LIMIT 1) sub)", inner)
    } else {
        format!("(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM ({}) sub)", inner)
    })
}

/// SELECT root records matching exact `criteria` and `filter`, with every include as a JSON
/// column named after its relation. Ordered by primary key.
pub fn select_find(
    entity: &EntityModel,
    criteria: &Record,
    filter: &PredicateNode,
    includes: &[IncludeNode],
    limit: Option<u32>,
    entities: &Entities,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let alias = q.alias();
    let filter_opt = (!filter.is_empty()).then_some(filter);

    let mut select_parts = column_list(entity, &alias);
    for inc in includes {
        if let Some(sql) = include_sql(&mut q, inc, &alias, filter_opt, entities) {
            select_parts.push(format!("{} AS {}", sql, quoted(inc.relation())));
        }
    }

    let mut where_parts = Vec::new();
    for (col, val) in criteria {
        if entity.has_attribute(col) {
            let ph = q.typed_param(entity, col, val.clone());
            where_parts.push(format!("{}.{} = {}", alias, quoted(col), ph));
        }
    }
    where_parts.extend(predicate_parts(&mut q, filter, &alias, entities));

    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {} {}{} ORDER BY {}.{}{}",
        select_parts.join(", "),
        qualified_table(entity),
        alias,
        where_clause,
        alias,
        quoted(&entity.primary_key),
        limit_clause
    );
    q
}

/// INSERT declared attributes present in `values`; generated attributes without a value are
/// left to the database default.
pub fn insert(entity: &EntityModel, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for a in &entity.attributes {
        let val = values.get(&a.name).filter(|v| !(v.is_null() && a.generated));
        let Some(val) = val else { continue };
        placeholders.push(q.typed_param(entity, &a.name, val.clone()));
        cols.push(quoted(&a.name));
    }
    q.sql = if cols.is_empty() {
        format!(
            "INSERT INTO {} DEFAULT VALUES RETURNING {}",
            qualified_table(entity),
            returning_list(entity)
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            qualified_table(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning_list(entity)
        )
    };
    q
}

/// UPDATE by primary key: SET every declared non-key attribute present in `values`.
pub fn update(entity: &EntityModel, id: &Value, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &entity.primary_key;
    let mut sets = Vec::new();
    for a in &entity.attributes {
        if a.name == *pk {
            continue;
        }
        let Some(v) = values.get(&a.name) else { continue };
        let rhs = q.typed_param(entity, &a.name, v.clone());
        sets.push(format!("{} = {}", quoted(&a.name), rhs));
    }
    let id_ph = q.typed_param(entity, pk, id.clone());
    q.sql = if sets.is_empty() {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            returning_list(entity),
            qualified_table(entity),
            quoted(pk),
            id_ph
        )
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            qualified_table(entity),
            sets.join(", "),
            quoted(pk),
            id_ph,
            returning_list(entity)
        )
    };
    q
}

/// DELETE by primary key.
pub fn delete(entity: &EntityModel, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &entity.primary_key;
    let id_ph = q.typed_param(entity, pk, id.clone());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        quoted(pk),
        id_ph,
        quoted(pk)
    );
    q
}
