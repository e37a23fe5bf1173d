use quarry_ast::ast;
use quarry_error::{DbError, Result};
use tracing::debug;

use super::{DmlBinder, resolve_column_list};
use crate::catalog::privilege::Privileges;
use crate::expr::literal_expr::LiteralExpr;
use crate::expr::{self, Expression};
use crate::functions::{FunctionKind, PlannedFunction};
use crate::logical::binder::bind_context::BindContext;
use crate::logical::binder::bind_query::plan_query;
use crate::logical::binder::column_binder::ErroringColumnBinder;
use crate::logical::binder::expr_binder::{BaseExpressionBinder, BindClause, RecursionContext};
use crate::logical::logical_copy::{CopyFormat, CopyLocation, LogicalCopyFrom, LogicalCopyTo};
use crate::logical::operator::{LogicalOperator, Node};
use crate::types::datatype::DataType;

/// Name passed to a loader reading from standard input.
const STDIN_SOURCE: &str = "stdin";

impl<'a> DmlBinder<'a> {
    pub fn bind_copy_from(&self, bind_context: &mut BindContext, copy: &ast::CopyFrom) -> Result<LogicalOperator> {
        let (schema, entry) = self.resolve_target(&copy.table, "copy into")?;

        let columns = if copy.columns.is_empty() {
            entry.visible_columns().map(|(idx, _)| idx).collect()
        } else {
            resolve_column_list(&entry, &copy.columns)?
        };
        self.require_column_privs(&schema, &entry, &columns, Privileges::INSERT)?;

        let source = match &copy.source {
            ast::CopySource::Files(files) if files.is_empty() => {
                return Err(DbError::invalid_input("COPY FROM needs at least one file"));
            }
            ast::CopySource::Files(files) => CopyLocation::Files(files.clone()),
            ast::CopySource::Stdin => CopyLocation::Stdio,
        };

        let loader = match &copy.loader {
            Some(reference) => Some(self.plan_loader(reference, &source)?),
            None => None,
        };

        let format = copy_format(&copy.options)?;
        let offset = self.bind_row_count(bind_context, copy.options.offset.as_ref(), "COPY OFFSET")?;
        let record_count = self.bind_row_count(bind_context, copy.options.record_count.as_ref(), "COPY RECORDS")?;

        debug!(
            table = %entry.name,
            %source,
            columns = columns.len(),
            loader = loader.as_ref().map(|l| l.name),
            "bound copy from"
        );

        Ok(LogicalOperator::CopyFrom(Node::leaf(LogicalCopyFrom {
            schema,
            table: entry.name.clone(),
            columns,
            source,
            loader,
            format,
            offset,
            record_count,
            best_effort: copy.options.best_effort,
        })))
    }

    pub fn bind_copy_to(&self, bind_context: &mut BindContext, copy: &ast::CopyTo) -> Result<LogicalOperator> {
        let options = &copy.options;
        if options.offset.is_some() || options.record_count.is_some() || options.best_effort {
            return Err(DbError::invalid_input(
                "OFFSET, RECORDS and BEST EFFORT only apply to COPY FROM",
            ));
        }

        let query = match &copy.source {
            ast::CopyToSource::Query(query) => query.clone(),
            ast::CopyToSource::Table(reference) => table_query(reference),
        };

        let scope = bind_context.new_orphan_scope();
        let plan = plan_query(self.ctx, bind_context, scope, &query)?;

        let target = match &copy.target {
            ast::CopyTarget::File(path) => CopyLocation::Files(vec![path.clone()]),
            ast::CopyTarget::Stdout => CopyLocation::Stdio,
        };
        debug!(%target, "bound copy to");

        Ok(LogicalOperator::CopyTo(Node::new(
            LogicalCopyTo {
                target,
                format: copy_format(options)?,
            },
            vec![plan],
        )))
    }

    /// Resolve a loader function and plan it over the source names.
    fn plan_loader(&self, reference: &ast::ObjectReference, source: &CopyLocation) -> Result<PlannedFunction> {
        let (schema, name) = reference.schema_and_name()?;
        let inputs: Vec<Expression> = match source {
            CopyLocation::Files(files) => files.iter().map(|f| expr::lit(f.as_str())).collect(),
            CopyLocation::Stdio => vec![expr::lit(STDIN_SOURCE)],
        };
        let types: Vec<DataType> = inputs.iter().map(|e| e.datatype()).collect();

        let resolved = self
            .ctx
            .functions()
            .resolve_overload(schema.as_deref(), &name, &types, FunctionKind::Loader)?;
        resolved.plan(inputs)
    }

    /// OFFSET and RECORDS, non-negative integer constants.
    fn bind_row_count(
        &self,
        bind_context: &mut BindContext,
        expr: Option<&ast::Expr>,
        clause: &'static str,
    ) -> Result<Option<i64>> {
        let Some(expr) = expr else {
            return Ok(None);
        };

        let scope = bind_context.new_orphan_scope();
        let bound = BaseExpressionBinder::new(scope, self.ctx).bind_expression(
            bind_context,
            expr,
            &mut ErroringColumnBinder::new(clause),
            RecursionContext::new(BindClause::Limit),
        )?;

        let Expression::Literal(LiteralExpr { literal }) = &bound else {
            return Err(DbError::invalid_input(format!(
                "{clause} must be a constant integer"
            )));
        };
        let value = literal.try_as_i64().map_err(|_| {
            DbError::type_mismatch(format!("{clause} must be an integer, got {}", literal.datatype()))
        })?;
        if value < 0 {
            return Err(DbError::invalid_input(format!(
                "{clause} must not be negative, got {value}"
            )));
        }
        Ok(Some(value))
    }
}

/// `SELECT * FROM <reference>`
fn table_query(reference: &ast::ObjectReference) -> ast::QueryNode {
    let from = ast::FromNode {
        alias: None,
        body: ast::FromNodeBody::BaseTable(ast::FromBaseTable {
            reference: reference.clone(),
        }),
    };
    ast::QueryNode::select(ast::SelectNode::new(vec![ast::SelectExpr::Wildcard]).from(from))
}

fn copy_format(options: &ast::CopyOptions) -> Result<CopyFormat> {
    let mut format = CopyFormat::default();

    if let Some(delimiter) = &options.delimiter {
        if delimiter.is_empty() {
            return Err(DbError::invalid_input("COPY delimiter can't be empty"));
        }
        format.delimiter = delimiter.clone();
    }
    if let Some(record_delimiter) = &options.record_delimiter {
        if record_delimiter.is_empty() {
            return Err(DbError::invalid_input("COPY record delimiter can't be empty"));
        }
        format.record_delimiter = record_delimiter.clone();
    }
    if format.delimiter == format.record_delimiter {
        return Err(DbError::invalid_input(
            "COPY field and record delimiters must differ",
        ));
    }
    // An empty quote turns quoting off.
    if let Some(quote) = &options.quote {
        format.quote = (!quote.is_empty()).then(|| quote.clone());
    }
    if let Some(null_string) = &options.null_string {
        format.null_string = null_string.clone();
    }
    format.header = options.header;

    Ok(format)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use quarry_ast::statement::Statement;
    use quarry_error::ErrorKind;

    use super::*;
    use crate::logical::binder::bind_ddl::testutil::compile;
    use crate::testutil::Fixture;

    fn fixture() -> Fixture {
        Fixture::new().with_table("t", &[("a", DataType::Int32), ("b", DataType::varchar(10))])
    }

    fn copy_from(loader: Option<&str>, options: ast::CopyOptions) -> Statement {
        Statement::CopyFrom(ast::CopyFrom {
            table: ast::ObjectReference::from("t"),
            columns: Vec::new(),
            source: ast::CopySource::Files(vec!["/tmp/t.csv".to_string()]),
            loader: loader.map(ast::ObjectReference::from),
            options,
        })
    }

    #[test]
    fn copy_from_file_with_options() {
        let options = ast::CopyOptions {
            delimiter: Some(",".to_string()),
            header: true,
            offset: Some(ast::Expr::number(2)),
            ..Default::default()
        };
        let compiled = compile(&fixture(), copy_from(None, options)).unwrap();
        match &compiled.plan {
            LogicalOperator::CopyFrom(node) => {
                assert_eq!(vec![0, 1], node.node.columns);
                assert_eq!(CopyLocation::Files(vec!["/tmp/t.csv".to_string()]), node.node.source);
                assert_eq!(",", node.node.format.delimiter);
                assert!(node.node.format.header);
                assert_eq!(Some(2), node.node.offset);
                assert_eq!(None, node.node.record_count);
                assert!(node.node.loader.is_none());
            }
            other => panic!("expected copy from, got {other:?}"),
        }
    }

    #[test]
    fn copy_from_with_loader() {
        let compiled = compile(&fixture(), copy_from(Some("csv"), ast::CopyOptions::default())).unwrap();
        match &compiled.plan {
            LogicalOperator::CopyFrom(node) => {
                let loader = node.node.loader.as_ref().unwrap();
                assert_eq!("csv", loader.name);
            }
            other => panic!("expected copy from, got {other:?}"),
        }
    }

    #[test]
    fn copy_from_rejects_non_loader() {
        let err = compile(&fixture(), copy_from(Some("abs"), ast::CopyOptions::default())).unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
    }

    #[test]
    fn copy_from_rejects_bad_options() {
        let negative = ast::CopyOptions {
            offset: Some(ast::Expr::UnaryExpr {
                op: ast::UnaryOperator::Minus,
                expr: Box::new(ast::Expr::number(1)),
            }),
            ..Default::default()
        };
        let err = compile(&fixture(), copy_from(None, negative)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        let column = ast::CopyOptions {
            record_count: Some(ast::Expr::ident("a")),
            ..Default::default()
        };
        let err = compile(&fixture(), copy_from(None, column)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());

        let same_delimiters = ast::CopyOptions {
            delimiter: Some("\n".to_string()),
            ..Default::default()
        };
        let err = compile(&fixture(), copy_from(None, same_delimiters)).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn copy_from_empty_file_list() {
        let statement = Statement::CopyFrom(ast::CopyFrom {
            table: ast::ObjectReference::from("t"),
            columns: Vec::new(),
            source: ast::CopySource::Files(Vec::new()),
            loader: None,
            options: ast::CopyOptions::default(),
        });
        let err = compile(&fixture(), statement).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn copy_table_to_stdout() {
        let statement = Statement::CopyTo(ast::CopyTo {
            source: ast::CopyToSource::Table(ast::ObjectReference::from("t")),
            target: ast::CopyTarget::Stdout,
            options: ast::CopyOptions {
                quote: Some(String::new()),
                ..Default::default()
            },
        });
        let compiled = compile(&fixture(), statement).unwrap();
        match &compiled.plan {
            LogicalOperator::CopyTo(node) => {
                assert_eq!(CopyLocation::Stdio, node.node.target);
                assert_eq!(None, node.node.format.quote);
                assert_eq!(1, node.children.len());
            }
            other => panic!("expected copy to, got {other:?}"),
        }
    }

    #[test]
    fn copy_to_rejects_load_options() {
        let statement = Statement::CopyTo(ast::CopyTo {
            source: ast::CopyToSource::Table(ast::ObjectReference::from("t")),
            target: ast::CopyTarget::File("/tmp/out".to_string()),
            options: ast::CopyOptions {
                best_effort: true,
                ..Default::default()
            },
        });
        let err = compile(&fixture(), statement).unwrap_err();
        assert_eq!(ErrorKind::InvalidInput, err.kind());
    }
}
