use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{EvalErrorKind, EvalResult, EvaluationError};
use crate::runtime::Value;

/// Chain of lexical scope frames
///
/// Each frame keeps mutable (`var`) and immutable (`val`) bindings apart.
/// Cloning the stack clones the handle to the innermost frame, so closures
/// share frames with the scope they were defined in.
#[derive(Clone, Default)]
pub struct VariableStack {
    frame: Rc<Frame>,
}

/// Single scope in the chain
#[derive(Default)]
struct Frame {
    /// `var` bindings
    mutable: RefCell<HashMap<String, Value>>,
    /// `val` bindings
    immutable: RefCell<HashMap<String, Value>>,
    /// Enclosing scope (None for the outermost scope)
    parent: Option<Rc<Frame>>,
}

impl Frame {
    fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.mutable.borrow().get(name) {
            return Some(value.clone());
        }
        self.immutable.borrow().get(name).cloned()
    }

    fn holds(&self, name: &str) -> bool {
        self.mutable.borrow().contains_key(name) || self.immutable.borrow().contains_key(name)
    }
}

impl VariableStack {
    /// Creates a stack with one empty frame
    pub fn new() -> Self {
        VariableStack::default()
    }

    /// New frame whose parent is the current innermost frame
    pub fn child(&self) -> Self {
        VariableStack {
            frame: Rc::new(Frame {
                parent: Some(self.frame.clone()),
                ..Frame::default()
            }),
        }
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(Some(self.frame.as_ref()), |frame| frame.parent.as_deref())
    }

    /// Whether `name` is visible from the current frame
    pub fn contains(&self, name: &str) -> bool {
        self.frames().any(|frame| frame.holds(name))
    }

    /// Looks a variable up through the chain, innermost first
    pub fn get(&self, name: &str) -> Option<Value> {
        self.frames().find_map(|frame| frame.get(name))
    }

    /// Creates a binding in the current frame.
    ///
    /// Fails when the name is visible anywhere in the chain: nested scopes
    /// may not shadow.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) -> EvalResult<()> {
        if self.contains(name) {
            return Err(EvaluationError::new(EvalErrorKind::DuplicateVariable {
                name: name.to_string(),
            }));
        }
        self.bind(name, value, mutable);
        Ok(())
    }

    /// Binds a function parameter; unlike [`declare`](Self::declare) this may shadow
    pub fn bind_parameter(&self, name: &str, value: Value) {
        self.bind(name, value, true);
    }

    fn bind(&self, name: &str, value: Value, mutable: bool) {
        let map = if mutable {
            &self.frame.mutable
        } else {
            &self.frame.immutable
        };
        map.borrow_mut().insert(name.to_string(), value);
    }

    /// Updates the nearest binding of `name`
    pub fn assign(&self, name: &str, value: Value) -> EvalResult<()> {
        for frame in self.frames() {
            if let Some(slot) = frame.mutable.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            if frame.immutable.borrow().contains_key(name) {
                return Err(EvaluationError::new(EvalErrorKind::ImmutableAssignment {
                    name: name.to_string(),
                }));
            }
        }
        Err(EvaluationError::new(EvalErrorKind::UndefinedVariable {
            name: name.to_string(),
        }))
    }

    /// Removes the nearest binding of `name`, returning its value
    pub fn remove(&self, name: &str) -> EvalResult<Value> {
        for frame in self.frames() {
            if let Some(value) = frame.mutable.borrow_mut().remove(name) {
                return Ok(value);
            }
            if frame.immutable.borrow().contains_key(name) {
                return Err(EvaluationError::new(EvalErrorKind::ImmutableAssignment {
                    name: name.to_string(),
                }));
            }
        }
        Err(EvaluationError::new(EvalErrorKind::UndefinedVariable {
            name: name.to_string(),
        }))
    }

    /// Number of frames in the chain
    pub fn depth(&self) -> usize {
        self.frames().count()
    }
}

impl std::fmt::Debug for VariableStack {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let names: Vec<Vec<String>> = self
            .frames()
            .map(|frame| {
                let mut names: Vec<String> = frame
                    .mutable
                    .borrow()
                    .keys()
                    .chain(frame.immutable.borrow().keys())
                    .cloned()
                    .collect();
                names.sort();
                names
            })
            .collect();
        f.debug_struct("VariableStack").field("frames", &names).finish()
    }
}
