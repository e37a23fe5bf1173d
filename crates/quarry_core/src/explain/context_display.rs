use std::fmt;

use crate::logical::binder::bind_context::BindContext;

/// How column and table references are rendered.
#[derive(Debug, Clone, Copy)]
pub enum ContextDisplayMode<'a> {
    /// Look up names in the bind context.
    Enriched(&'a BindContext),
    /// Print the numeric references.
    Raw,
}

impl<'a> From<&'a BindContext> for ContextDisplayMode<'a> {
    fn from(context: &'a BindContext) -> Self {
        ContextDisplayMode::Enriched(context)
    }
}

/// Display for values holding references into a bind context.
///
/// Plans only store table and column indexes. With a bind context available
/// these can be printed using the names the query used.
pub trait ContextDisplay {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result;
}

impl<D: ContextDisplay> ContextDisplay for &D {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        ContextDisplay::fmt_using_context(*self, mode, f)
    }
}

/// Adapts a [`ContextDisplay`] value to `fmt::Display`.
#[derive(Debug)]
pub struct ContextDisplayWrapper<'a, D> {
    pub mode: ContextDisplayMode<'a>,
    pub item: D,
}

impl<'a, D> ContextDisplayWrapper<'a, D> {
    pub fn with_mode(item: D, mode: impl Into<ContextDisplayMode<'a>>) -> Self {
        ContextDisplayWrapper {
            mode: mode.into(),
            item,
        }
    }
}

impl<D: ContextDisplay> fmt::Display for ContextDisplayWrapper<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.item.fmt_using_context(self.mode, f)
    }
}
