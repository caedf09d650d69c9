//! Relation extraction.
//!
//! Walks a [`StatementTree`] per statement kind and records every relation
//! it reads or writes, however deeply nested. Forbidden relations abort the
//! walk at the first hit.

use crate::error::SqlError;
use crate::policy::{ForbiddenRelations, Role};
use crate::tree::{FromItem, Query, QueryBody, StatementTree};
use serde::Serialize;
use std::collections::HashSet;

/// Where a relation was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExprType {
    /// In the statement's own clauses.
    Table,
    /// Inside a subquery, CTE body or view definition.
    Subquery,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationRef {
    pub name: String,
    pub role: Role,
    pub expr_type: ExprType,
}

/// Relations referenced by one statement, unique by name, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RelationSet {
    relations: Vec<RelationRef>,
}

impl RelationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relation. A repeated name keeps its position; a write upgrades
    /// an earlier read.
    pub fn insert(&mut self, relation: RelationRef) {
        match self.relations.iter_mut().find(|r| r.name == relation.name) {
            Some(existing) => {
                if relation.role == Role::Write {
                    existing.role = Role::Write;
                }
            }
            None => self.relations.push(relation),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationRef> {
        self.relations.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.relations.iter().map(|r| r.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RelationRef> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn writes(&self) -> impl Iterator<Item = &RelationRef> {
        self.relations.iter().filter(|r| r.role == Role::Write)
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

impl<'a> IntoIterator for &'a RelationSet {
    type Item = &'a RelationRef;
    type IntoIter = std::slice::Iter<'a, RelationRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.relations.iter()
    }
}

/// CTE names visible at some point of the walk, lowercased.
#[derive(Debug, Clone, Default)]
struct Scope {
    ctes: HashSet<String>,
}

impl Scope {
    fn shadows(&self, name: &str) -> bool {
        !name.contains('.') && self.ctes.contains(&name.to_ascii_lowercase())
    }

    fn with(&self, name: &str) -> Scope {
        let mut next = self.clone();
        next.ctes.insert(name.to_ascii_lowercase());
        next
    }
}

/// Collects the relations of a statement, enforcing the forbidden list.
#[derive(Debug, Clone, Default)]
pub struct RelationExtractor {
    forbidden: ForbiddenRelations,
}

impl RelationExtractor {
    pub fn new(forbidden: ForbiddenRelations) -> Self {
        Self { forbidden }
    }

    pub fn forbidden(&self) -> &ForbiddenRelations {
        &self.forbidden
    }

    pub fn extract(&self, tree: &StatementTree) -> Result<RelationSet, SqlError> {
        let mut set = RelationSet::new();
        self.walk_statement(tree, &Scope::default(), ExprType::Table, &mut set)?;
        Ok(set)
    }

    fn walk_statement(
        &self,
        tree: &StatementTree,
        scope: &Scope,
        expr_type: ExprType,
        set: &mut RelationSet,
    ) -> Result<(), SqlError> {
        match tree {
            StatementTree::Query(query) => self.walk_query(query, scope, expr_type, set),
            StatementTree::Insert(insert) => {
                self.record(&insert.table, Role::Write, expr_type, scope, set)?;
                if let Some(source) = &insert.source {
                    self.walk_query(source, scope, ExprType::Subquery, set)?;
                }
                self.walk_queries(&insert.subqueries, scope, set)
            }
            StatementTree::Update(update) => {
                self.walk_from(&update.target, Role::Write, scope, expr_type, set)?;
                self.walk_from(&update.from, Role::Read, scope, expr_type, set)?;
                self.walk_queries(&update.subqueries, scope, set)
            }
            StatementTree::Delete(delete) => {
                self.walk_from(&delete.targets, Role::Write, scope, expr_type, set)?;
                self.walk_from(&delete.using, Role::Read, scope, expr_type, set)?;
                self.walk_queries(&delete.subqueries, scope, set)
            }
            StatementTree::Create(create) => {
                if let Some(name) = &create.name {
                    self.record(name, Role::Write, expr_type, scope, set)?;
                }
                self.walk_queries(&create.queries, scope, set)
            }
            StatementTree::Drop(_) | StatementTree::Alter(_) | StatementTree::Other(_) => Ok(()),
        }
    }

    fn walk_query(
        &self,
        query: &Query,
        outer: &Scope,
        expr_type: ExprType,
        set: &mut RelationSet,
    ) -> Result<(), SqlError> {
        // Without RECURSIVE a CTE body only sees the CTEs declared before it.
        let mut scope = outer.clone();
        if query.recursive {
            for cte in &query.ctes {
                scope = scope.with(&cte.name);
            }
            for cte in &query.ctes {
                self.walk_query(&cte.query, &scope, ExprType::Subquery, set)?;
            }
        } else {
            for cte in &query.ctes {
                self.walk_query(&cte.query, &scope, ExprType::Subquery, set)?;
                scope = scope.with(&cte.name);
            }
        }

        self.walk_body(&query.body, &scope, expr_type, set)?;
        self.walk_queries(&query.subqueries, &scope, set)
    }

    fn walk_body(
        &self,
        body: &QueryBody,
        scope: &Scope,
        expr_type: ExprType,
        set: &mut RelationSet,
    ) -> Result<(), SqlError> {
        match body {
            QueryBody::Select(select) => {
                if let Some(into) = &select.into {
                    self.record(into, Role::Write, expr_type, scope, set)?;
                }
                self.walk_from(&select.from, Role::Read, scope, expr_type, set)?;
                self.walk_queries(&select.subqueries, scope, set)
            }
            QueryBody::SetOperation { left, right, .. } => {
                self.walk_body(left, scope, expr_type, set)?;
                self.walk_body(right, scope, expr_type, set)
            }
            QueryBody::Nested(query) => self.walk_query(query, scope, expr_type, set),
            QueryBody::Values { subqueries } => self.walk_queries(subqueries, scope, set),
            QueryBody::Table { name } => self.record(name, Role::Read, expr_type, scope, set),
            QueryBody::Modify(stmt) => self.walk_statement(stmt, scope, ExprType::Subquery, set),
        }
    }

    fn walk_from(
        &self,
        items: &[FromItem],
        role: Role,
        scope: &Scope,
        expr_type: ExprType,
        set: &mut RelationSet,
    ) -> Result<(), SqlError> {
        for item in items {
            match item {
                FromItem::Table { name } => self.record(name, role, expr_type, scope, set)?,
                FromItem::Subquery { query, .. } => {
                    self.walk_query(query, scope, ExprType::Subquery, set)?
                }
                FromItem::Function { subqueries, .. } | FromItem::Other { subqueries } => {
                    self.walk_queries(subqueries, scope, set)?
                }
            }
        }
        Ok(())
    }

    fn walk_queries(
        &self,
        queries: &[Query],
        scope: &Scope,
        set: &mut RelationSet,
    ) -> Result<(), SqlError> {
        for query in queries {
            self.walk_query(query, scope, ExprType::Subquery, set)?;
        }
        Ok(())
    }

    fn record(
        &self,
        name: &str,
        role: Role,
        expr_type: ExprType,
        scope: &Scope,
        set: &mut RelationSet,
    ) -> Result<(), SqlError> {
        if role == Role::Read && scope.shadows(name) {
            return Ok(());
        }
        self.forbidden.check(name, role)?;
        set.insert(RelationRef {
            name: name.to_string(),
            role,
            expr_type,
        });
        Ok(())
    }
}
