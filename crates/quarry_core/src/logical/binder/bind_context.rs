use std::collections::{BTreeSet, HashSet};
use std::fmt;

use quarry_error::{DbError, Result};
use tracing::trace;

use super::scope_stack::{FrameKind, ScopeEntry, ScopeStack};
use crate::config::session::GlobalVariables;
use crate::expr::Expression;
use crate::logical::operator::LogicalOperator;
use crate::types::datatype::DataType;

/// Reference to a bind scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindScopeRef {
    pub context_idx: usize,
}

impl fmt::Display for BindScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SCOPE_{}", self.context_idx)
    }
}

/// Reference to a table in a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef {
    pub table_idx: usize,
}

impl From<usize> for TableRef {
    fn from(value: usize) -> Self {
        TableRef { table_idx: value }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.table_idx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CteRef {
    pub cte_idx: usize,
}

impl fmt::Display for CteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CTE_{}", self.cte_idx)
    }
}

/// Per-statement binding state.
///
/// Scopes, tables, and CTEs are only ever appended to and are addressed by
/// index. Everything is dropped along with the context once the statement is
/// compiled.
#[derive(Debug)]
pub struct BindContext {
    /// All scopes used for binding.
    ///
    /// Initialized with a single scope (root).
    scopes: Vec<BindScope>,
    /// All tables in the bind context. Tables may or may not be inside a scope.
    tables: Vec<Table>,
    /// All CTEs in the statement.
    ctes: Vec<BoundCte>,
    /// Declared variables, parameters, and CTE names.
    frames: ScopeStack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelatedColumn {
    /// Reference to an outer scope the column is referencing.
    pub outer: BindScopeRef,
    pub table: TableRef,
    /// Index of the column in the table.
    pub col_idx: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundCte {
    /// Scope used for binding the CTE body.
    pub bind_scope: BindScopeRef,
    pub materialized: bool,
    /// Normalized name of the CTE.
    pub name: String,
    /// Column names, possibly aliased.
    pub column_names: Vec<String>,
    pub column_types: Vec<DataType>,
    /// Planned body. Each reference gets its own copy.
    pub plan: LogicalOperator,
    /// Table holding the output of `plan`.
    pub output: TableRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsingColumn {
    /// Normalized column name.
    pub column: String,
    /// Column unqualified references resolve to.
    pub table_ref: TableRef,
    pub col_idx: usize,
    /// Matching column on the other side, left out of `*` expansion.
    pub hidden: (TableRef, usize),
}

/// Aggregation state of a SELECT being bound.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingState {
    /// Table holding aggregate outputs, both those pushed up from nested
    /// subqueries and those extracted from the select list.
    pub aggregates_table: TableRef,
    /// Aggregates pushed into this scope from nested subqueries, bound
    /// relative to this scope.
    pub pushed_aggregates: Vec<Expression>,
    pub group_table: Option<TableRef>,
    pub group_exprs: Vec<Expression>,
    /// Set while the select list, HAVING, and ORDER BY are being bound.
    pub accepting: bool,
    /// Outer columns referenced by subqueries while accepting without a
    /// GROUP BY. These only become violations if the select turns out to be
    /// aggregated.
    pub ungrouped_outer_refs: Vec<String>,
}

impl GroupingState {
    pub fn new(aggregates_table: TableRef) -> Self {
        GroupingState {
            aggregates_table,
            pushed_aggregates: Vec::new(),
            group_table: None,
            group_exprs: Vec::new(),
            accepting: false,
            ungrouped_outer_refs: Vec::new(),
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_table.is_some()
    }
}

#[derive(Debug, Default)]
struct BindScope {
    /// Index to the parent scope.
    ///
    /// Will be None if this is the root or an orphan.
    parent: Option<BindScopeRef>,
    /// Columns resolved through a boundary scope are outer references.
    ///
    /// Subqueries get a boundary scope, join sides don't.
    boundary: bool,
    /// Columns resolved in some parent of this scope.
    correlated_columns: Vec<CorrelatedColumn>,
    /// Columns that are used in a USING join condition.
    using_columns: Vec<UsingColumn>,
    /// Tables currently in scope.
    tables: Vec<TableRef>,
    grouping: Option<GroupingState>,
}

/// Reference to a table inside a scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableAlias {
    pub schema: Option<String>,
    pub table: String,
}

impl TableAlias {
    pub fn new(schema: Option<String>, table: impl Into<String>) -> Self {
        TableAlias {
            schema,
            table: table.into(),
        }
    }

    pub fn matches(&self, other: &TableAlias) -> bool {
        match (&self.schema, &other.schema) {
            (Some(a), Some(b)) if a != b => return false,
            _ => (),
        }

        self.table == other.table
    }
}

impl fmt::Display for TableAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{schema}.")?;
        }
        write!(f, "{}", self.table)
    }
}

/// A "table" in the context.
///
/// These may have a direct relationship to an underlying base table, but may
/// also be used for generated columns like aggregate outputs or projections.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub reference: TableRef,
    pub alias: Option<TableAlias>,
    pub column_types: Vec<DataType>,
    pub column_names: Vec<String>,
    /// Columns `*` doesn't expand to.
    pub hidden: BTreeSet<usize>,
    /// Some column of this table is referenced from a nested subquery.
    pub outer_referenced: bool,
}

impl Table {
    pub fn num_columns(&self) -> usize {
        self.column_types.len()
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_columns()).filter(|idx| !self.hidden.contains(idx))
    }
}

/// A column found in an enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterColumn {
    /// Scope the column was found in.
    pub scope: BindScopeRef,
    pub table: TableRef,
    pub col_idx: usize,
    /// Number of subquery boundaries crossed.
    pub depth: usize,
}

/// What a non-column name resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Variable { datatype: DataType },
    Parameter { datatype: DataType },
    OuterColumn(OuterColumn),
    Global { datatype: DataType },
}

impl Default for BindContext {
    fn default() -> Self {
        Self::new()
    }
}

impl BindContext {
    pub fn new() -> Self {
        Self::new_with_globals(&GlobalVariables::default())
    }

    pub fn new_with_globals(globals: &GlobalVariables) -> Self {
        BindContext {
            scopes: vec![BindScope {
                boundary: true,
                ..Default::default()
            }],
            tables: Vec::new(),
            ctes: Vec::new(),
            frames: ScopeStack::new(globals),
        }
    }

    pub fn root_scope_ref(&self) -> BindScopeRef {
        BindScopeRef { context_idx: 0 }
    }

    /// Creates a new scope for a subquery, with current being the parent
    /// scope.
    ///
    /// Columns resolved from the parent are outer references.
    pub fn new_child_scope(&mut self, current: BindScopeRef) -> BindScopeRef {
        self.push_scope(Some(current), true)
    }

    /// Creates a new scope for one side of a join.
    ///
    /// Tables bound in the scope are later appended to the parent, and
    /// columns resolved from the parent aren't outer references.
    pub fn new_join_scope(&mut self, current: BindScopeRef) -> BindScopeRef {
        self.push_scope(Some(current), false)
    }

    /// Creates a new scope that has no parents, and thus no visibility into any
    /// other scope.
    pub fn new_orphan_scope(&mut self) -> BindScopeRef {
        self.push_scope(None, true)
    }

    fn push_scope(&mut self, parent: Option<BindScopeRef>, boundary: bool) -> BindScopeRef {
        let idx = self.scopes.len();
        self.scopes.push(BindScope {
            parent,
            boundary,
            ..Default::default()
        });
        BindScopeRef { context_idx: idx }
    }

    pub fn frames(&self) -> &ScopeStack {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut ScopeStack {
        &mut self.frames
    }

    pub fn push_frame(&mut self, kind: FrameKind, label: impl Into<String>) {
        self.frames.push_frame(kind, label)
    }

    pub fn pop_frame(&mut self) -> Result<()> {
        self.frames.pop_frame()
    }

    /// Run `f` inside a new frame.
    ///
    /// The frame is popped whether or not `f` succeeds.
    pub fn with_frame<T, F>(&mut self, kind: FrameKind, label: impl Into<String>, f: F) -> Result<T>
    where
        F: FnOnce(&mut BindContext) -> Result<T>,
    {
        self.frames.push_frame(kind, label);
        let result = f(self);
        let popped = self.frames.pop_frame();
        let out = result?;
        popped?;
        Ok(out)
    }

    pub fn frames_pushed(&self) -> usize {
        self.frames.frames_pushed()
    }

    pub fn frames_popped(&self) -> usize {
        self.frames.frames_popped()
    }

    /// Adds a CTE, declaring its name in the current frame.
    ///
    /// Errors if a CTE with the same name was already declared in the frame.
    pub fn add_cte(&mut self, cte: BoundCte) -> Result<CteRef> {
        let cte_ref = CteRef {
            cte_idx: self.ctes.len(),
        };
        self.frames.declare_view(cte.name.clone(), cte_ref)?;
        self.ctes.push(cte);
        Ok(cte_ref)
    }

    /// Find a CTE by name in the current frames.
    pub fn find_cte(&self, name: &str) -> Option<CteRef> {
        self.frames.resolve_view(name)
    }

    pub fn get_cte(&self, cte_ref: CteRef) -> Result<&BoundCte> {
        self.ctes
            .get(cte_ref.cte_idx)
            .ok_or_else(|| DbError::new(format!("Missing CTE for ref: {cte_ref}")))
    }

    pub fn iter_ctes(&self) -> impl Iterator<Item = &BoundCte> {
        self.ctes.iter()
    }

    pub fn get_parent_ref(&self, bind_ref: BindScopeRef) -> Result<Option<BindScopeRef>> {
        let child = self.get_scope(bind_ref)?;
        Ok(child.parent)
    }

    pub fn is_boundary(&self, bind_ref: BindScopeRef) -> Result<bool> {
        Ok(self.get_scope(bind_ref)?.boundary)
    }

    pub fn table_is_in_scope(&self, current: BindScopeRef, table_ref: TableRef) -> Result<bool> {
        let current = self.get_scope(current)?;
        Ok(current.tables.iter().any(|&t| t == table_ref))
    }

    pub fn correlated_columns(&self, bind_ref: BindScopeRef) -> Result<&Vec<CorrelatedColumn>> {
        let child = self.get_scope(bind_ref)?;
        Ok(&child.correlated_columns)
    }

    /// Appends `other` scope's tables and USING columns to `current`.
    ///
    /// Errors on duplicate table aliases.
    pub fn append_context(&mut self, current: BindScopeRef, other: BindScopeRef) -> Result<()> {
        let left_aliases: HashSet<_> = self
            .iter_tables(current)?
            .filter_map(|t| t.alias.as_ref())
            .collect();

        for right_alias in self.iter_tables(other)?.filter_map(|t| t.alias.as_ref()) {
            if left_aliases.contains(right_alias) {
                return Err(duplicate_alias(right_alias));
            }
        }

        let (other_tables, other_using, other_correlations) = {
            let other = self.get_scope(other)?;
            (
                other.tables.clone(),
                other.using_columns.clone(),
                other.correlated_columns.clone(),
            )
        };

        let current_ref = current;
        let current = self.get_scope_mut(current)?;
        current.tables.extend(other_tables);
        current.using_columns.extend(other_using);
        for corr in other_correlations {
            // Columns of tables now part of current aren't correlated relative
            // to it (lateral references to the left side of a join).
            if corr.outer == current_ref || current.tables.contains(&corr.table) {
                continue;
            }
            if !current.correlated_columns.contains(&corr) {
                current.correlated_columns.push(corr);
            }
        }

        Ok(())
    }

    /// Create a table that belongs to no scope.
    pub fn new_ephemeral_table(&mut self) -> Result<TableRef> {
        self.new_ephemeral_table_with_columns(Vec::new(), Vec::new())
    }

    pub fn new_ephemeral_table_with_columns(
        &mut self,
        column_types: Vec<DataType>,
        column_names: Vec<String>,
    ) -> Result<TableRef> {
        let reference = TableRef {
            table_idx: self.tables.len(),
        };
        self.tables.push(Table {
            reference,
            alias: None,
            column_types,
            column_names,
            hidden: BTreeSet::new(),
            outer_referenced: false,
        });

        Ok(reference)
    }

    /// Creates a new table with generated column names from a list of
    /// datatypes.
    pub fn new_ephemeral_table_from_types(
        &mut self,
        generated_prefix: &str,
        types: Vec<DataType>,
    ) -> Result<TableRef> {
        let names = (0..types.len())
            .map(|idx| format!("{generated_prefix}_{idx}"))
            .collect();

        self.new_ephemeral_table_with_columns(types, names)
    }

    pub fn new_ephemeral_table_from_expressions<'a>(
        &mut self,
        generated_prefix: &str,
        exprs: impl IntoIterator<Item = &'a Expression>,
    ) -> Result<TableRef> {
        let types = exprs.into_iter().map(|e| e.datatype()).collect();
        self.new_ephemeral_table_from_types(generated_prefix, types)
    }

    pub fn push_column_for_table(
        &mut self,
        table: TableRef,
        name: impl Into<String>,
        datatype: DataType,
    ) -> Result<usize> {
        let table = self.get_table_mut(table)?;
        let idx = table.column_types.len();
        table.column_names.push(name.into());
        table.column_types.push(datatype);
        Ok(idx)
    }

    /// Get the name and type of a column.
    pub fn get_column(&self, table_ref: TableRef, col_idx: usize) -> Result<(&str, &DataType)> {
        let table = self.get_table(table_ref)?;
        match (table.column_names.get(col_idx), table.column_types.get(col_idx)) {
            (Some(name), Some(datatype)) => Ok((name.as_str(), datatype)),
            _ => Err(DbError::new(format!(
                "Missing column {col_idx} in table {table_ref}"
            ))),
        }
    }

    pub fn get_table(&self, table_ref: TableRef) -> Result<&Table> {
        self.tables
            .get(table_ref.table_idx)
            .ok_or_else(|| DbError::new(format!("Missing table {table_ref} in bind context")))
    }

    pub fn get_table_mut(&mut self, table_ref: TableRef) -> Result<&mut Table> {
        self.tables
            .get_mut(table_ref.table_idx)
            .ok_or_else(|| DbError::new(format!("Missing table {table_ref} in bind context")))
    }

    /// Push a table into a scope.
    ///
    /// Errors if a table with the same alias is already in the scope.
    pub fn push_table(
        &mut self,
        idx: BindScopeRef,
        alias: Option<TableAlias>,
        column_types: Vec<DataType>,
        column_names: Vec<String>,
    ) -> Result<TableRef> {
        if let Some(alias) = &alias {
            for have_alias in self.iter_tables(idx)?.filter_map(|t| t.alias.as_ref()) {
                if have_alias == alias {
                    return Err(duplicate_alias(alias));
                }
            }
        }

        let reference = TableRef {
            table_idx: self.tables.len(),
        };
        self.tables.push(Table {
            reference,
            alias,
            column_types,
            column_names,
            hidden: BTreeSet::new(),
            outer_referenced: false,
        });

        let scope = self.get_scope_mut(idx)?;
        scope.tables.push(reference);

        Ok(reference)
    }

    pub fn append_table_to_scope(&mut self, scope: BindScopeRef, table: TableRef) -> Result<()> {
        let scope = self.get_scope_mut(scope)?;
        scope.tables.push(table);
        Ok(())
    }

    pub fn mark_outer_referenced(&mut self, table: TableRef) -> Result<()> {
        self.get_table_mut(table)?.outer_referenced = true;
        Ok(())
    }

    /// Record a correlation in every scope from `from` up to, but not
    /// including, the scope the column was found in.
    pub fn push_correlation(&mut self, from: BindScopeRef, correlation: CorrelatedColumn) -> Result<()> {
        let mut current = Some(from);
        while let Some(scope_ref) = current {
            if scope_ref == correlation.outer {
                break;
            }
            let scope = self.get_scope_mut(scope_ref)?;
            if !scope.correlated_columns.contains(&correlation) {
                scope.correlated_columns.push(correlation);
            }
            current = scope.parent;
        }
        Ok(())
    }

    /// Tries to find the table in this scope that has a matching column name.
    ///
    /// This first searches any USING columns if `alias` is None, then proceeds
    /// to search all tables in this scope. Outer scopes are not searched.
    ///
    /// Returns the table reference containing the column, and the relative
    /// index of the column within that table.
    pub fn find_table_for_column(
        &self,
        current: BindScopeRef,
        alias: Option<&TableAlias>,
        column: &str,
    ) -> Result<Option<(TableRef, usize)>> {
        if alias.is_none() {
            let using = self
                .get_using_columns(current)?
                .iter()
                .find(|&using| using.column == column);
            if let Some(using) = using {
                return Ok(Some((using.table_ref, using.col_idx)));
            }
        }

        let mut found = None;

        for table in self.iter_tables(current)? {
            match (&table.alias, &alias) {
                (Some(a1), Some(a2)) => {
                    if !a1.matches(a2) {
                        continue;
                    }
                }
                (None, Some(_)) => continue,
                _ => (),
            }

            for (col_idx, col_name) in table.column_names.iter().enumerate() {
                if col_name == column {
                    if found.is_some() {
                        return Err(DbError::ambiguous(format!(
                            "Ambiguous column name '{column}'"
                        ))
                        .with_field("column", column));
                    }
                    found = Some((table.reference, col_idx));
                }
            }
        }

        Ok(found)
    }

    /// Search parent scopes for a column, innermost first.
    pub fn find_outer_column(
        &self,
        current: BindScopeRef,
        alias: Option<&TableAlias>,
        column: &str,
    ) -> Result<Option<OuterColumn>> {
        let mut depth = 0;
        let mut scope_ref = current;

        loop {
            let scope = self.get_scope(scope_ref)?;
            if scope.boundary {
                depth += 1;
            }
            let parent = match scope.parent {
                Some(parent) => parent,
                None => return Ok(None),
            };

            if let Some((table, col_idx)) = self.find_table_for_column(parent, alias, column)? {
                trace!(%column, %table, col_idx, depth, "resolved column in outer scope");
                return Ok(Some(OuterColumn {
                    scope: parent,
                    table,
                    col_idx,
                    depth,
                }));
            }
            scope_ref = parent;
        }
    }

    /// Resolve a name that isn't a column of the current scope.
    ///
    /// Declared variables and parameters come first, then columns of outer
    /// scopes, then session globals.
    pub fn resolve_name(
        &self,
        current: BindScopeRef,
        alias: Option<&TableAlias>,
        name: &str,
    ) -> Result<Option<Resolution>> {
        if alias.is_none() {
            match self.frames.resolve_local(name) {
                Some(ScopeEntry::Variable { datatype }) => {
                    return Ok(Some(Resolution::Variable { datatype }));
                }
                Some(ScopeEntry::Parameter { datatype }) => {
                    return Ok(Some(Resolution::Parameter { datatype }));
                }
                _ => (),
            }
        }

        if let Some(outer) = self.find_outer_column(current, alias, name)? {
            return Ok(Some(Resolution::OuterColumn(outer)));
        }

        if alias.is_none() {
            if let Some(datatype) = self.frames.resolve_global(name) {
                return Ok(Some(Resolution::Global { datatype }));
            }
        }

        Ok(None)
    }

    /// Number of subquery boundaries between `child` and `parent`.
    pub fn distance_child_to_parent(&self, child: BindScopeRef, parent: BindScopeRef) -> Result<usize> {
        let mut distance = 0;
        let mut current = child;
        while current != parent {
            let scope = self.get_scope(current)?;
            if scope.boundary {
                distance += 1;
            }
            current = scope
                .parent
                .ok_or_else(|| DbError::new("No connection between child and parent scope"))?;
        }
        Ok(distance)
    }

    /// Walk up from `current` until `depth` subquery boundaries have been
    /// crossed, returning the scope reached.
    pub fn ancestor_at_depth(&self, current: BindScopeRef, depth: usize) -> Result<BindScopeRef> {
        let mut crossed = 0;
        let mut scope_ref = current;
        while crossed < depth {
            let scope = self.get_scope(scope_ref)?;
            if scope.boundary {
                crossed += 1;
            }
            scope_ref = scope.parent.ok_or_else(|| {
                DbError::new(format!("No scope {depth} levels above {current}"))
            })?;
        }
        Ok(scope_ref)
    }

    /// Find the closest visible column name to `column`, for error messages.
    pub fn suggest_column(&self, current: BindScopeRef, column: &str) -> Option<String> {
        const SIMILARITY_THRESHOLD: f64 = 0.7;

        let mut best: Option<(f64, &str)> = None;
        let mut scope_ref = Some(current);
        while let Some(idx) = scope_ref {
            let scope = self.scopes.get(idx.context_idx)?;
            for table in scope.tables.iter().filter_map(|t| self.tables.get(t.table_idx)) {
                for name in &table.column_names {
                    let score = strsim::jaro(name, column);
                    if score > SIMILARITY_THRESHOLD && best.is_none_or(|(s, _)| score > s) {
                        best = Some((score, name));
                    }
                }
            }
            scope_ref = scope.parent;
        }

        best.map(|(_, name)| name.to_string())
    }

    pub fn get_table_by_alias(
        &self,
        current: BindScopeRef,
        alias: &TableAlias,
    ) -> Result<Option<&Table>> {
        let mut found = None;
        for table in self.iter_tables(current)? {
            if let Some(have) = &table.alias {
                if have.matches(alias) {
                    if found.is_some() {
                        return Err(DbError::ambiguous(format!(
                            "Ambiguous table reference '{alias}'"
                        )));
                    }
                    found = Some(table);
                }
            }
        }
        Ok(found)
    }

    /// Iterate tables in the given bind scope.
    pub fn iter_tables(&self, current: BindScopeRef) -> Result<impl Iterator<Item = &Table>> {
        let context = self.get_scope(current)?;
        Ok(context
            .tables
            .iter()
            .filter_map(|table| self.tables.get(table.table_idx)))
    }

    /// Column names and types of all tables in a scope, in order.
    pub fn scope_columns(&self, current: BindScopeRef) -> Result<(Vec<String>, Vec<DataType>)> {
        let mut names = Vec::new();
        let mut types = Vec::new();
        for table in self.iter_tables(current)? {
            names.extend(table.column_names.iter().cloned());
            types.extend(table.column_types.iter().cloned());
        }
        Ok((names, types))
    }

    /// Appends a USING column to the current scope.
    pub fn append_using_column(&mut self, current: BindScopeRef, col: UsingColumn) -> Result<()> {
        let scope = self.get_scope_mut(current)?;
        scope.using_columns.push(col);
        Ok(())
    }

    pub fn get_using_columns(&self, current: BindScopeRef) -> Result<&[UsingColumn]> {
        let scope = self.get_scope(current)?;
        Ok(&scope.using_columns)
    }

    /// If a column is the hidden side of a USING pair in this scope.
    pub fn is_hidden_using_column(&self, current: BindScopeRef, table: TableRef, col_idx: usize) -> Result<bool> {
        Ok(self
            .get_using_columns(current)?
            .iter()
            .any(|using| using.hidden == (table, col_idx)))
    }

    pub fn set_grouping(&mut self, current: BindScopeRef, grouping: GroupingState) -> Result<()> {
        self.get_scope_mut(current)?.grouping = Some(grouping);
        Ok(())
    }

    pub fn get_grouping(&self, current: BindScopeRef) -> Result<Option<&GroupingState>> {
        Ok(self.get_scope(current)?.grouping.as_ref())
    }

    pub fn get_grouping_mut(&mut self, current: BindScopeRef) -> Result<Option<&mut GroupingState>> {
        Ok(self.get_scope_mut(current)?.grouping.as_mut())
    }

    pub fn take_grouping(&mut self, current: BindScopeRef) -> Result<Option<GroupingState>> {
        Ok(self.get_scope_mut(current)?.grouping.take())
    }

    fn get_scope(&self, bind_ref: BindScopeRef) -> Result<&BindScope> {
        self.scopes
            .get(bind_ref.context_idx)
            .ok_or_else(|| DbError::new(format!("Missing bind scope {bind_ref}")))
    }

    fn get_scope_mut(&mut self, bind_ref: BindScopeRef) -> Result<&mut BindScope> {
        self.scopes
            .get_mut(bind_ref.context_idx)
            .ok_or_else(|| DbError::new(format!("Missing bind scope {bind_ref}")))
    }
}

fn duplicate_alias(alias: &TableAlias) -> DbError {
    DbError::already_exists(format!("Duplicate table name: {alias}")).with_field("table", alias)
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Test utilities for the bind context.

    use super::*;

    /// Collect all (name, type) pairs for columns in the current scope.
    pub fn columns_in_scope(
        bind_context: &BindContext,
        scope: BindScopeRef,
    ) -> Vec<(String, DataType)> {
        bind_context
            .iter_tables(scope)
            .unwrap()
            .flat_map(|t| {
                t.column_names
                    .iter()
                    .cloned()
                    .zip(t.column_types.iter().cloned())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use quarry_error::ErrorKind;

    use super::*;

    fn alias(name: &str) -> Option<TableAlias> {
        Some(TableAlias::new(None, name))
    }

    #[test]
    fn duplicate_alias_in_scope() {
        let mut context = BindContext::new();
        let root = context.root_scope_ref();
        context
            .push_table(root, alias("t"), vec![DataType::Int32], vec!["a".to_string()])
            .unwrap();
        let err = context
            .push_table(root, alias("t"), vec![DataType::Int32], vec!["a".to_string()])
            .unwrap_err();
        assert_eq!(ErrorKind::AlreadyExists, err.kind());
    }

    #[test]
    fn ambiguous_column() {
        let mut context = BindContext::new();
        let root = context.root_scope_ref();
        context
            .push_table(root, alias("t1"), vec![DataType::Int32], vec!["a".to_string()])
            .unwrap();
        context
            .push_table(root, alias("t2"), vec![DataType::Int32], vec!["a".to_string()])
            .unwrap();

        let err = context.find_table_for_column(root, None, "a").unwrap_err();
        assert_eq!(ErrorKind::AmbiguousReference, err.kind());

        let found = context
            .find_table_for_column(root, alias("t2").as_ref(), "a")
            .unwrap();
        assert_eq!(Some((TableRef::from(1), 0)), found);
    }

    #[test]
    fn outer_depth_counts_boundaries() {
        let mut context = BindContext::new();
        let root = context.root_scope_ref();
        let t1 = context
            .push_table(root, alias("t1"), vec![DataType::Int32], vec!["y".to_string()])
            .unwrap();

        // Join scopes don't add depth, subquery scopes do.
        let join_side = context.new_join_scope(root);
        let subquery = context.new_child_scope(join_side);
        let nested = context.new_child_scope(subquery);

        let found = context.find_outer_column(subquery, None, "y").unwrap().unwrap();
        assert_eq!(t1, found.table);
        assert_eq!(1, found.depth);
        assert_eq!(root, found.scope);

        let found = context.find_outer_column(nested, None, "y").unwrap().unwrap();
        assert_eq!(2, found.depth);

        let found = context.find_outer_column(join_side, None, "y").unwrap().unwrap();
        assert_eq!(0, found.depth);

        assert_eq!(2, context.distance_child_to_parent(nested, root).unwrap());
    }

    #[test]
    fn correlation_recorded_along_path() {
        let mut context = BindContext::new();
        let root = context.root_scope_ref();
        let t1 = context
            .push_table(root, alias("t1"), vec![DataType::Int32], vec!["y".to_string()])
            .unwrap();
        let sub = context.new_child_scope(root);
        let nested = context.new_child_scope(sub);

        let corr = CorrelatedColumn {
            outer: root,
            table: t1,
            col_idx: 0,
        };
        context.push_correlation(nested, corr).unwrap();
        context.push_correlation(nested, corr).unwrap();

        assert_eq!(&vec![corr], context.correlated_columns(nested).unwrap());
        assert_eq!(&vec![corr], context.correlated_columns(sub).unwrap());
        assert!(context.correlated_columns(root).unwrap().is_empty());
    }

    #[test]
    fn frames_balance_on_error() {
        let mut context = BindContext::new();
        let result: Result<()> = context.with_frame(FrameKind::Statement, "stmt", |ctx| {
            ctx.frames_mut().declare_variable("x", DataType::Int32)?;
            ctx.frames_mut().declare_variable("x", DataType::Int32)
        });
        result.unwrap_err();
        assert_eq!(1, context.frames_pushed());
        assert_eq!(1, context.frames_popped());
        assert_eq!(1, context.frames().depth());
    }

    #[test]
    fn suggest_similar_column() {
        let mut context = BindContext::new();
        let root = context.root_scope_ref();
        context
            .push_table(
                root,
                alias("t"),
                vec![DataType::Int32, DataType::Int32],
                vec!["amount".to_string(), "other".to_string()],
            )
            .unwrap();
        assert_eq!(Some("amount".to_string()), context.suggest_column(root, "amout"));
        assert_eq!(None, context.suggest_column(root, "zzz"));
    }
}
