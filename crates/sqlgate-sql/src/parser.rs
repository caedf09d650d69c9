//! Parser boundary: raw SQL text in, [`StatementTree`] out.
//!
//! [`PostgresParser`] lowers `sqlparser` output into the typed tree. Table
//! factors and queries embedded in expressions are gathered with a
//! depth-aware AST visitor that records only the outermost occurrences;
//! anything deeper is reached through the lowered subquery itself.

use crate::error::SqlError;
use crate::tree::{
    Create, CreateKind, Cte, Delete, FromItem, Insert, Query, QueryBody, Select, StatementTree,
    Update,
};
use sqlparser::ast::{self, SetExpr, Statement, TableFactor, Visit, Visitor};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::ops::ControlFlow;

/// Turns SQL text into a statement tree.
pub trait SqlParser: Send + Sync {
    /// Parse exactly one statement.
    fn parse(&self, sql: &str) -> Result<StatementTree, SqlError>;
}

/// Default parser backed by the PostgreSQL dialect of `sqlparser`.
pub struct PostgresParser {
    dialect: PostgreSqlDialect,
}

impl Clone for PostgresParser {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Default for PostgresParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PostgresParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PostgresParser")
    }
}

impl PostgresParser {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }
}

impl SqlParser for PostgresParser {
    fn parse(&self, sql: &str) -> Result<StatementTree, SqlError> {
        if sql.trim().is_empty() {
            return Err(SqlError::Parse("Empty query".to_string()));
        }
        let mut statements =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
        match statements.len() {
            0 => Err(SqlError::Parse("Empty query".to_string())),
            1 => lower_statement(&statements.remove(0)),
            n => Err(SqlError::Parse(format!(
                "Expected a single statement, found {}",
                n
            ))),
        }
    }
}

fn lower_statement(stmt: &Statement) -> Result<StatementTree, SqlError> {
    let tree = match stmt {
        Statement::Query(query) => StatementTree::Query(lower_query(query)?),
        Statement::Insert(insert) => {
            let source = insert.source.as_deref().map(lower_query).transpose()?;
            let mut subqueries = top_level_queries(&insert.on)?;
            subqueries.extend(top_level_queries(&insert.returning)?);
            StatementTree::Insert(Insert {
                table: relation_name(&insert.table.to_string()),
                source,
                subqueries,
            })
        }
        Statement::Update(update) => {
            let target = top_level_factors(&update.table)?;
            let mut from = TopLevel::with_factors();
            walk(&update.from, &mut from)?;
            let mut subqueries = from.queries;
            subqueries.extend(top_level_queries(&update.assignments)?);
            subqueries.extend(top_level_queries(&update.selection)?);
            subqueries.extend(top_level_queries(&update.returning)?);
            StatementTree::Update(Update {
                target: target.factors,
                from: from.factors,
                subqueries,
            })
        }
        Statement::Delete(delete) => {
            let mut targets = top_level_factors(&delete.from)?;
            let using = top_level_factors(&delete.using)?;
            targets
                .factors
                .extend(delete.tables.iter().map(|t| FromItem::table(relation_name(&t.to_string()))));
            let mut subqueries = targets.queries;
            subqueries.extend(using.queries);
            subqueries.extend(top_level_queries(&delete.selection)?);
            subqueries.extend(top_level_queries(&delete.returning)?);
            StatementTree::Delete(Delete {
                targets: targets.factors,
                using: using.factors,
                subqueries,
            })
        }
        Statement::CreateView { .. } => StatementTree::Create(Create {
            kind: CreateKind::View,
            name: created_name(&stmt.to_string(), "VIEW"),
            queries: top_level_queries(stmt)?,
        }),
        Statement::CreateTable { .. } => StatementTree::Create(Create {
            kind: CreateKind::Table,
            name: created_name(&stmt.to_string(), "TABLE"),
            queries: top_level_queries(stmt)?,
        }),
        Statement::Drop { object_type, .. } => StatementTree::Drop(object_type.to_string()),
        other => lower_by_keyword(other)?,
    };
    Ok(tree)
}

/// Statements without a dedicated arm, sorted by their leading keywords.
fn lower_by_keyword(stmt: &Statement) -> Result<StatementTree, SqlError> {
    let rendered = stmt.to_string();
    let mut words = rendered.split_whitespace().map(str::to_ascii_uppercase);
    let keyword = words.next().unwrap_or_default();
    let mut object = || {
        words
            .find(|w| !OBJECT_MODIFIERS.contains(&w.as_str()))
            .unwrap_or_default()
    };
    let tree = match keyword.as_str() {
        "CREATE" => StatementTree::Create(Create {
            kind: CreateKind::Other(object()),
            name: None,
            queries: top_level_queries(stmt)?,
        }),
        "DROP" => StatementTree::Drop(object()),
        "ALTER" => StatementTree::Alter(object()),
        _ => StatementTree::Other(keyword.clone()),
    };
    Ok(tree)
}

/// Name following the object keyword of a rendered CREATE statement,
/// e.g. `settings.x` in `CREATE TABLE IF NOT EXISTS settings.x (id INT)`.
fn created_name(rendered: &str, object: &str) -> Option<String> {
    let words = identifier_words(rendered);
    let at = words.iter().position(|w| w.eq_ignore_ascii_case(object))?;
    words[at + 1..]
        .iter()
        .find(|w| !OBJECT_MODIFIERS.iter().any(|m| w.eq_ignore_ascii_case(m)))
        .map(|w| relation_name(w))
}

/// Split on whitespace and `(` outside double quotes.
fn identifier_words(rendered: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in rendered.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            '(' if !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
                break;
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

const OBJECT_MODIFIERS: &[&str] = &[
    "OR", "REPLACE", "UNIQUE", "TEMP", "TEMPORARY", "GLOBAL", "LOCAL", "UNLOGGED", "IF", "NOT",
    "EXISTS",
];

fn lower_query(query: &ast::Query) -> Result<Query, SqlError> {
    let (ctes, recursive) = match &query.with {
        Some(with) => {
            let ctes = with
                .cte_tables
                .iter()
                .map(|cte| {
                    Ok(Cte {
                        name: cte.alias.name.value.clone(),
                        query: lower_query(&cte.query)?,
                    })
                })
                .collect::<Result<Vec<_>, SqlError>>()?;
            (ctes, with.recursive)
        }
        None => (Vec::new(), false),
    };

    let body = lower_set_expr(&query.body)?;

    let mut subqueries = top_level_queries(&query.order_by)?;
    subqueries.extend(top_level_queries(&query.limit_clause)?);
    subqueries.extend(top_level_queries(&query.fetch)?);

    Ok(Query {
        ctes,
        recursive,
        body,
        subqueries,
    })
}

fn lower_set_expr(expr: &SetExpr) -> Result<QueryBody, SqlError> {
    let body = match expr {
        SetExpr::Select(select) => {
            let found = top_level_factors(&**select)?;
            QueryBody::Select(Box::new(Select {
                from: found.factors,
                subqueries: found.queries,
                into: select
                    .into
                    .as_ref()
                    .map(|into| relation_name(&into.name.to_string())),
            }))
        }
        SetExpr::Query(query) => QueryBody::Nested(Box::new(lower_query(query)?)),
        SetExpr::SetOperation {
            op, left, right, ..
        } => QueryBody::SetOperation {
            op: op.to_string(),
            left: Box::new(lower_set_expr(left)?),
            right: Box::new(lower_set_expr(right)?),
        },
        SetExpr::Values(values) => QueryBody::Values {
            subqueries: top_level_queries(values)?,
        },
        SetExpr::Insert(stmt) | SetExpr::Update(stmt) => {
            QueryBody::Modify(Box::new(lower_statement(stmt)?))
        }
        SetExpr::Table(table) => {
            let rendered = table.to_string();
            let name = rendered
                .strip_prefix("TABLE ")
                .unwrap_or(rendered.as_str());
            QueryBody::Table {
                name: relation_name(name),
            }
        }
        other => {
            let rendered = other.to_string();
            let keyword = rendered.split_whitespace().next().unwrap_or_default();
            return Err(SqlError::Parse(format!(
                "Unsupported query body '{}'",
                keyword.to_ascii_uppercase()
            )));
        }
    };
    Ok(body)
}

fn lower_factor(factor: &TableFactor) -> Result<FromItem, SqlError> {
    let item = match factor {
        TableFactor::Table {
            name, args: None, ..
        } => FromItem::table(relation_name(&name.to_string())),
        TableFactor::Table {
            name,
            args: Some(args),
            ..
        } => FromItem::Function {
            name: relation_name(&name.to_string()),
            subqueries: top_level_queries(args)?,
        },
        TableFactor::Derived {
            subquery, alias, ..
        } => FromItem::Subquery {
            query: Box::new(lower_query(subquery)?),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        },
        other => {
            let mut inner = TopLevel::inside_factor();
            walk(other, &mut inner)?;
            FromItem::Other {
                subqueries: inner.queries,
            }
        }
    };
    Ok(item)
}

/// Strip identifier quoting from a rendered, possibly qualified name.
pub fn relation_name(rendered: &str) -> String {
    rendered
        .chars()
        .filter(|c| !matches!(c, '"' | '`'))
        .collect()
}

/// Collects the outermost queries and table factors under an AST node.
///
/// A query is outermost when no other query encloses it and it does not sit
/// inside a recorded table factor. Nested joins are transparent: the factors
/// they group are recorded individually.
struct TopLevel {
    query_depth: usize,
    factor_depth: usize,
    factor_floor: usize,
    collect_factors: bool,
    queries: Vec<Query>,
    factors: Vec<FromItem>,
}

impl TopLevel {
    fn queries_only() -> Self {
        Self {
            query_depth: 0,
            factor_depth: 0,
            factor_floor: 0,
            collect_factors: false,
            queries: Vec::new(),
            factors: Vec::new(),
        }
    }

    fn with_factors() -> Self {
        Self {
            collect_factors: true,
            ..Self::queries_only()
        }
    }

    /// For walking a factor that is itself the root of the visit.
    fn inside_factor() -> Self {
        Self {
            factor_floor: 1,
            ..Self::queries_only()
        }
    }
}

impl Visitor for TopLevel {
    type Break = SqlError;

    fn pre_visit_query(&mut self, query: &ast::Query) -> ControlFlow<SqlError> {
        if self.query_depth == 0 && self.factor_depth <= self.factor_floor {
            match lower_query(query) {
                Ok(q) => self.queries.push(q),
                Err(e) => return ControlFlow::Break(e),
            }
        }
        self.query_depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &ast::Query) -> ControlFlow<SqlError> {
        self.query_depth = self.query_depth.saturating_sub(1);
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<SqlError> {
        if matches!(factor, TableFactor::NestedJoin { .. }) {
            return ControlFlow::Continue(());
        }
        if self.collect_factors && self.query_depth == 0 && self.factor_depth == 0 {
            match lower_factor(factor) {
                Ok(item) => self.factors.push(item),
                Err(e) => return ControlFlow::Break(e),
            }
        }
        self.factor_depth += 1;
        ControlFlow::Continue(())
    }

    fn post_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<SqlError> {
        if !matches!(factor, TableFactor::NestedJoin { .. }) {
            self.factor_depth = self.factor_depth.saturating_sub(1);
        }
        ControlFlow::Continue(())
    }
}

fn walk<V: Visit>(node: &V, collector: &mut TopLevel) -> Result<(), SqlError> {
    match node.visit(collector) {
        ControlFlow::Break(e) => Err(e),
        ControlFlow::Continue(()) => Ok(()),
    }
}

fn top_level_queries<V: Visit>(node: &V) -> Result<Vec<Query>, SqlError> {
    let mut collector = TopLevel::queries_only();
    walk(node, &mut collector)?;
    Ok(collector.queries)
}

fn top_level_factors<V: Visit>(node: &V) -> Result<TopLevel, SqlError> {
    let mut collector = TopLevel::with_factors();
    walk(node, &mut collector)?;
    Ok(collector)
}
