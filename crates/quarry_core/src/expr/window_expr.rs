use std::fmt;

use super::Expression;
use super::scalar_function_expr::fmt_function_call;
use crate::explain::context_display::{ContextDisplay, ContextDisplayMode, ContextDisplayWrapper};
use crate::functions::PlannedFunction;
use crate::logical::logical_order::OrderByExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowFrameUnit {
    Rows,
    Range,
    Groups,
}

impl WindowFrameUnit {
    /// Integer code passed to `window_bound`.
    pub const fn code(self) -> i32 {
        match self {
            Self::Rows => 0,
            Self::Range => 1,
            Self::Groups => 2,
        }
    }
}

impl fmt::Display for WindowFrameUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows => write!(f, "ROWS"),
            Self::Range => write!(f, "RANGE"),
            Self::Groups => write!(f, "GROUPS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowFrameBound {
    UnboundedPreceding,
    Preceding(Box<Expression>),
    CurrentRow,
    Following(Box<Expression>),
    UnboundedFollowing,
}

impl WindowFrameBound {
    /// Position of the bound kind in frame order. A frame's start may not
    /// come after its end.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::UnboundedPreceding => 0,
            Self::Preceding(_) => 1,
            Self::CurrentRow => 2,
            Self::Following(_) => 3,
            Self::UnboundedFollowing => 4,
        }
    }

    /// Integer code passed to `window_bound`, same as the rank.
    pub const fn code(&self) -> i32 {
        self.rank() as i32
    }

    pub fn offset(&self) -> Option<&Expression> {
        match self {
            Self::Preceding(e) | Self::Following(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowFrameExclusion {
    CurrentRow,
    Group,
    Ties,
    #[default]
    NoOthers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub unit: WindowFrameUnit,
    pub start: WindowFrameBound,
    pub end: WindowFrameBound,
    pub exclusion: WindowFrameExclusion,
}

impl WindowFrame {
    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`, the frame used
    /// for windows with an ORDER BY.
    pub const fn default_ordered() -> Self {
        WindowFrame {
            unit: WindowFrameUnit::Range,
            start: WindowFrameBound::UnboundedPreceding,
            end: WindowFrameBound::CurrentRow,
            exclusion: WindowFrameExclusion::NoOthers,
        }
    }

    /// The whole partition, used for windows without an ORDER BY.
    pub const fn default_unordered() -> Self {
        WindowFrame {
            unit: WindowFrameUnit::Rows,
            start: WindowFrameBound::UnboundedPreceding,
            end: WindowFrameBound::UnboundedFollowing,
            exclusion: WindowFrameExclusion::NoOthers,
        }
    }
}

impl ContextDisplay for WindowFrameBound {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::UnboundedPreceding => write!(f, "UNBOUNDED PRECEDING"),
            Self::Preceding(e) => write!(
                f,
                "{} PRECEDING",
                ContextDisplayWrapper::with_mode(e.as_ref(), mode)
            ),
            Self::CurrentRow => write!(f, "CURRENT ROW"),
            Self::Following(e) => write!(
                f,
                "{} FOLLOWING",
                ContextDisplayWrapper::with_mode(e.as_ref(), mode)
            ),
            Self::UnboundedFollowing => write!(f, "UNBOUNDED FOLLOWING"),
        }
    }
}

/// A window function call.
///
/// Partition and order boundaries are also available as `diff` chains, and
/// the frame as two `window_bound` expressions computing row positions.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpr {
    pub agg: PlannedFunction,
    pub partition_by: Vec<Expression>,
    pub order_by: Vec<OrderByExpr>,
    pub frame: WindowFrame,
    /// True whenever the partition changes. None when not partitioned.
    pub partition_diff: Option<Box<Expression>>,
    /// True whenever the partition or the ordering key changes. None when
    /// not ordered.
    pub order_diff: Option<Box<Expression>>,
    pub frame_start: Box<Expression>,
    pub frame_end: Box<Expression>,
}

impl ContextDisplay for WindowExpr {
    fn fmt_using_context(
        &self,
        mode: ContextDisplayMode,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        fmt_function_call(self.agg.name, &self.agg.inputs, mode, f)?;
        write!(f, " OVER (")?;

        if !self.partition_by.is_empty() {
            let parts: Vec<_> = self
                .partition_by
                .iter()
                .map(|e| ContextDisplayWrapper::with_mode(e, mode).to_string())
                .collect();
            write!(f, "PARTITION BY {} ", parts.join(", "))?;
        }

        if !self.order_by.is_empty() {
            let parts: Vec<_> = self
                .order_by
                .iter()
                .map(|e| ContextDisplayWrapper::with_mode(e, mode).to_string())
                .collect();
            write!(f, "ORDER BY {} ", parts.join(", "))?;
        }

        write!(
            f,
            "{} BETWEEN {} AND {})",
            self.frame.unit,
            ContextDisplayWrapper::with_mode(&self.frame.start, mode),
            ContextDisplayWrapper::with_mode(&self.frame.end, mode),
        )
    }
}
