//! Frames of named objects visible while binding a statement.
//!
//! The bottom frame always holds the session's global variables and is never
//! popped. Every other frame is pushed and popped by the binder as it walks
//! into and out of queries, views, and statements.
use std::fmt;

use indexmap::IndexMap;
use quarry_error::{DbError, Result};
use tracing::trace;

use super::bind_context::CteRef;
use crate::config::session::GlobalVariables;
use crate::types::datatype::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Session variables.
    Global,
    /// A single statement. Holds DECLAREd variables and parameters.
    Statement,
    /// A query with a WITH clause.
    Query,
    /// Body of a view. Names declared below a view frame aren't visible
    /// inside it, except for globals.
    View,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Statement => write!(f, "statement"),
            Self::Query => write!(f, "query"),
            Self::View => write!(f, "view"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeEntry {
    View(CteRef),
    Variable { datatype: DataType },
    Parameter { datatype: DataType },
    Global { datatype: DataType },
}

#[derive(Debug, Clone)]
struct Frame {
    kind: FrameKind,
    label: String,
    variables: IndexMap<String, DataType>,
    parameters: IndexMap<String, DataType>,
    views: IndexMap<String, CteRef>,
}

impl Frame {
    fn new(kind: FrameKind, label: impl Into<String>) -> Self {
        Frame {
            kind,
            label: label.into(),
            variables: IndexMap::new(),
            parameters: IndexMap::new(),
            views: IndexMap::new(),
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            || self.parameters.contains_key(name)
            || self.views.contains_key(name)
    }
}

#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<Frame>,
    pushed: usize,
    popped: usize,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new(&GlobalVariables::default())
    }
}

impl ScopeStack {
    /// Create a stack with only the global frame, seeded from the session
    /// variables.
    pub fn new(globals: &GlobalVariables) -> Self {
        let mut global = Frame::new(FrameKind::Global, "global");
        for (name, var) in globals.iter() {
            global.variables.insert(name.to_string(), var.datatype.clone());
        }

        ScopeStack {
            frames: vec![global],
            pushed: 0,
            popped: 0,
        }
    }

    pub fn push_frame(&mut self, kind: FrameKind, label: impl Into<String>) {
        let frame = Frame::new(kind, label);
        trace!(kind = %frame.kind, label = %frame.label, depth = self.frames.len(), "push frame");
        self.frames.push(frame);
        self.pushed += 1;
    }

    pub fn pop_frame(&mut self) -> Result<()> {
        if self.frames.len() <= 1 {
            return Err(DbError::new("Cannot pop the global frame"));
        }
        // Length checked above.
        if let Some(frame) = self.frames.pop() {
            trace!(kind = %frame.kind, label = %frame.label, "pop frame");
        }
        self.popped += 1;
        Ok(())
    }

    /// Number of frames, including the global frame.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn frames_pushed(&self) -> usize {
        self.pushed
    }

    pub fn frames_popped(&self) -> usize {
        self.popped
    }

    pub fn current_kind(&self) -> FrameKind {
        self.frames
            .last()
            .map(|f| f.kind)
            .unwrap_or(FrameKind::Global)
    }

    pub fn declare_variable(&mut self, name: impl Into<String>, datatype: DataType) -> Result<()> {
        let name = name.into();
        let frame = self.current_frame_mut()?;
        if frame.is_declared(&name) {
            return Err(already_declared("Variable", &name));
        }
        frame.variables.insert(name, datatype);
        Ok(())
    }

    /// Declare a parameter in the statement frame.
    pub fn declare_parameter(&mut self, name: impl Into<String>, datatype: DataType) -> Result<()> {
        let name = name.into();
        let frame = self.statement_frame_mut()?;
        if frame.is_declared(&name) {
            return Err(already_declared("Parameter", &name));
        }
        frame.parameters.insert(name, datatype);
        Ok(())
    }

    pub fn declare_view(&mut self, name: impl Into<String>, cte: CteRef) -> Result<()> {
        let name = name.into();
        let frame = self.current_frame_mut()?;
        if frame.is_declared(&name) {
            return Err(already_declared("View", &name));
        }
        frame.views.insert(name, cte);
        Ok(())
    }

    /// Resolve a name using only the frames.
    ///
    /// Views are searched first, then variables and parameters, then the
    /// global frame.
    pub fn resolve(&self, name: &str) -> Option<ScopeEntry> {
        if let Some(cte) = self.resolve_view(name) {
            return Some(ScopeEntry::View(cte));
        }
        if let Some(local) = self.resolve_local(name) {
            return Some(local);
        }
        self.resolve_global(name)
            .map(|datatype| ScopeEntry::Global { datatype })
    }

    /// Find a view (CTE) by name, innermost frame first.
    pub fn resolve_view(&self, name: &str) -> Option<CteRef> {
        for frame in self.visible_frames() {
            if let Some(cte) = frame.views.get(name) {
                return Some(*cte);
            }
        }
        None
    }

    /// Find a declared variable or parameter outside of the global frame.
    pub fn resolve_local(&self, name: &str) -> Option<ScopeEntry> {
        for frame in self.visible_frames() {
            if let Some(datatype) = frame.variables.get(name) {
                return Some(ScopeEntry::Variable {
                    datatype: datatype.clone(),
                });
            }
            if let Some(datatype) = frame.parameters.get(name) {
                return Some(ScopeEntry::Parameter {
                    datatype: datatype.clone(),
                });
            }
        }
        None
    }

    pub fn resolve_global(&self, name: &str) -> Option<DataType> {
        self.frames
            .first()
            .and_then(|global| global.variables.get(name))
            .cloned()
    }

    /// Iterate non-global frames from the innermost out, stopping after the
    /// first view frame.
    fn visible_frames(&self) -> impl Iterator<Item = &Frame> {
        let mut stop = false;
        self.frames
            .iter()
            .skip(1)
            .rev()
            .take_while(move |frame| {
                if stop {
                    return false;
                }
                stop = frame.kind == FrameKind::View;
                true
            })
    }

    fn current_frame_mut(&mut self) -> Result<&mut Frame> {
        if self.frames.len() <= 1 {
            return Err(DbError::new("No frame to declare into"));
        }
        self.frames
            .last_mut()
            .ok_or_else(|| DbError::new("Scope stack is empty"))
    }

    fn statement_frame_mut(&mut self) -> Result<&mut Frame> {
        self.frames
            .iter_mut()
            .skip(1)
            .rev()
            .find(|f| f.kind == FrameKind::Statement)
            .ok_or_else(|| DbError::new("Missing statement frame"))
    }
}

fn already_declared(what: &str, name: &str) -> DbError {
    DbError::already_exists(format!("{what} '{name}' already declared")).with_field("name", name)
}
