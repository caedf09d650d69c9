//! Typed statement tree.
//!
//! The parser lowers whatever its grammar produces into this small sum type.
//! Each statement kind carries only what relation extraction and
//! classification need: relation names (quotes stripped), nested queries,
//! and the kind of object a DDL statement touches.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// One parsed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "statement", rename_all = "snake_case")]
pub enum StatementTree {
    Query(Query),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Create(Create),
    /// DROP of any object; the payload names the object type.
    Drop(String),
    /// ALTER of any object; the payload names the object type.
    Alter(String),
    /// Anything else, keyed by its leading keyword.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub ctes: Vec<Cte>,
    /// `WITH RECURSIVE`: every CTE name is visible inside every CTE body.
    pub recursive: bool,
    pub body: QueryBody,
    /// Queries embedded in ORDER BY, LIMIT, OFFSET or FETCH.
    pub subqueries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cte {
    pub name: String,
    pub query: Query,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryBody {
    Select(Box<Select>),
    SetOperation {
        op: String,
        left: Box<QueryBody>,
        right: Box<QueryBody>,
    },
    Nested(Box<Query>),
    /// `VALUES (...)` rows; only the subqueries inside them matter.
    Values { subqueries: Vec<Query> },
    /// `TABLE name`.
    Table { name: String },
    /// Data-modifying statement used as a query body (`WITH x AS (DELETE ...)`).
    Modify(Box<StatementTree>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Select {
    /// FROM items with joins flattened, in source order.
    pub from: Vec<FromItem>,
    /// Queries in the projection, WHERE, GROUP BY, HAVING and JOIN constraints.
    pub subqueries: Vec<Query>,
    /// Target of `SELECT ... INTO`, a table the statement creates.
    pub into: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FromItem {
    Table {
        name: String,
    },
    Subquery {
        query: Box<Query>,
        alias: Option<String>,
    },
    /// Set-returning function call such as `generate_series(1, 10)`.
    Function {
        name: String,
        subqueries: Vec<Query>,
    },
    /// Any other table factor; only embedded queries are kept.
    Other {
        subqueries: Vec<Query>,
    },
}

impl FromItem {
    pub fn table(name: impl Into<String>) -> Self {
        FromItem::Table { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Insert {
    pub table: String,
    pub source: Option<Query>,
    /// Queries in ON CONFLICT and RETURNING.
    pub subqueries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Update {
    /// The row source being modified (a table, possibly aliased).
    pub target: Vec<FromItem>,
    /// `UPDATE ... FROM` items.
    pub from: Vec<FromItem>,
    /// Queries in SET, WHERE and RETURNING.
    pub subqueries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delete {
    pub targets: Vec<FromItem>,
    /// `DELETE ... USING` items.
    pub using: Vec<FromItem>,
    /// Queries in WHERE and RETURNING.
    pub subqueries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Create {
    pub kind: CreateKind,
    /// The object being created, when the statement names a relation.
    pub name: Option<String>,
    /// Queries the new object is defined by (view body, `CREATE TABLE AS`).
    pub queries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateKind {
    View,
    Table,
    Other(String),
}

/// Named sections a statement may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Section {
    Select,
    /// Any set operation (UNION, INTERSECT, EXCEPT).
    Union,
    From,
    Insert,
    Update,
    Delete,
    Create,
    View,
    Table,
    Drop,
    Alter,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::Select => "SELECT",
            Section::Union => "UNION",
            Section::From => "FROM",
            Section::Insert => "INSERT",
            Section::Update => "UPDATE",
            Section::Delete => "DELETE",
            Section::Create => "CREATE",
            Section::View => "VIEW",
            Section::Table => "TABLE",
            Section::Drop => "DROP",
            Section::Alter => "ALTER",
        };
        f.write_str(s)
    }
}

impl StatementTree {
    /// Sections present anywhere in the statement.
    pub fn sections(&self) -> BTreeSet<Section> {
        let mut out = BTreeSet::new();
        self.collect_sections(&mut out);
        out
    }

    fn collect_sections(&self, out: &mut BTreeSet<Section>) {
        match self {
            StatementTree::Query(q) => q.collect_sections(out),
            StatementTree::Insert(insert) => {
                out.insert(Section::Insert);
                if let Some(source) = &insert.source {
                    source.collect_sections(out);
                }
                collect_all(&insert.subqueries, out);
            }
            StatementTree::Update(update) => {
                out.insert(Section::Update);
                from_sections(&update.target, out);
                if !update.from.is_empty() {
                    out.insert(Section::From);
                }
                from_sections(&update.from, out);
                collect_all(&update.subqueries, out);
            }
            StatementTree::Delete(delete) => {
                out.insert(Section::Delete);
                out.insert(Section::From);
                from_sections(&delete.targets, out);
                from_sections(&delete.using, out);
                collect_all(&delete.subqueries, out);
            }
            StatementTree::Create(create) => {
                out.insert(Section::Create);
                match create.kind {
                    CreateKind::View => {
                        out.insert(Section::View);
                    }
                    CreateKind::Table => {
                        out.insert(Section::Table);
                    }
                    CreateKind::Other(_) => {}
                }
                collect_all(&create.queries, out);
            }
            StatementTree::Drop(_) => {
                out.insert(Section::Drop);
            }
            StatementTree::Alter(_) => {
                out.insert(Section::Alter);
            }
            StatementTree::Other(_) => {}
        }
    }

    /// True when the statement, or a query nested in it, modifies data.
    pub fn is_modification(&self) -> bool {
        match self {
            StatementTree::Insert(_) | StatementTree::Update(_) | StatementTree::Delete(_) => true,
            StatementTree::Query(q) => q.contains_modification(),
            _ => false,
        }
    }

    /// Leading keyword, used in log lines and rejections.
    pub fn keyword(&self) -> &str {
        match self {
            StatementTree::Query(_) => "SELECT",
            StatementTree::Insert(_) => "INSERT",
            StatementTree::Update(_) => "UPDATE",
            StatementTree::Delete(_) => "DELETE",
            StatementTree::Create(_) => "CREATE",
            StatementTree::Drop(_) => "DROP",
            StatementTree::Alter(_) => "ALTER",
            StatementTree::Other(keyword) => keyword,
        }
    }
}

impl Query {
    /// A query with no CTEs and no trailing clauses.
    pub fn simple(body: QueryBody) -> Self {
        Self {
            ctes: Vec::new(),
            recursive: false,
            body,
            subqueries: Vec::new(),
        }
    }

    fn collect_sections(&self, out: &mut BTreeSet<Section>) {
        for cte in &self.ctes {
            cte.query.collect_sections(out);
        }
        self.body.collect_sections(out);
        collect_all(&self.subqueries, out);
    }

    /// True when a data-modifying statement hides inside this query.
    pub fn contains_modification(&self) -> bool {
        self.ctes.iter().any(|c| c.query.contains_modification())
            || self.body.contains_modification()
    }

    /// Table created by a `SELECT ... INTO` in the query body.
    pub fn created_table(&self) -> Option<&str> {
        self.body.created_table()
    }
}

impl QueryBody {
    fn collect_sections(&self, out: &mut BTreeSet<Section>) {
        match self {
            QueryBody::Select(select) => {
                out.insert(Section::Select);
                if !select.from.is_empty() {
                    out.insert(Section::From);
                }
                from_sections(&select.from, out);
                collect_all(&select.subqueries, out);
            }
            QueryBody::SetOperation { left, right, .. } => {
                out.insert(Section::Union);
                left.collect_sections(out);
                right.collect_sections(out);
            }
            QueryBody::Nested(q) => q.collect_sections(out),
            QueryBody::Values { subqueries } => collect_all(subqueries, out),
            QueryBody::Table { .. } => {
                out.insert(Section::Select);
                out.insert(Section::From);
            }
            QueryBody::Modify(stmt) => stmt.collect_sections(out),
        }
    }

    fn contains_modification(&self) -> bool {
        match self {
            QueryBody::Modify(_) => true,
            QueryBody::SetOperation { left, right, .. } => {
                left.contains_modification() || right.contains_modification()
            }
            QueryBody::Nested(q) => q.contains_modification(),
            _ => false,
        }
    }

    fn created_table(&self) -> Option<&str> {
        match self {
            QueryBody::Select(select) => select.into.as_deref(),
            QueryBody::SetOperation { left, right, .. } => {
                left.created_table().or_else(|| right.created_table())
            }
            QueryBody::Nested(q) => q.created_table(),
            _ => None,
        }
    }
}

fn collect_all(queries: &[Query], out: &mut BTreeSet<Section>) {
    for q in queries {
        q.collect_sections(out);
    }
}

fn from_sections(items: &[FromItem], out: &mut BTreeSet<Section>) {
    for item in items {
        match item {
            FromItem::Table { .. } => {}
            FromItem::Subquery { query, .. } => query.collect_sections(out),
            FromItem::Function { subqueries, .. } | FromItem::Other { subqueries } => {
                collect_all(subqueries, out)
            }
        }
    }
}
