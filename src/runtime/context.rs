use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::environment::VariableStack;
use super::value::{ObjectRef, Value};
use crate::error::{EvalErrorKind, EvalResult, EvaluationError};
use crate::lexer::SourceSpan;
use crate::library::Libraries;

/// Default limit on nested function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// State shared by every context of one execution
struct ExecutionState {
    libraries: Libraries,
    /// Loaded libraries by name
    imports: RefCell<HashMap<String, Value>>,
    /// Libraries currently being loaded, outermost first
    in_flight: RefCell<Vec<String>>,
    /// Every closure captured during the execution
    closures: RefCell<Vec<Weak<Closure>>>,
    call_depth: Cell<usize>,
    max_call_depth: usize,
}

/// Root object, variable scope and library resolver of running code
///
/// Contexts are cheap to clone; clones share the variable frames and the
/// execution state.
///
/// A script function keeps its definition context alive, and that context
/// usually reaches the function again (through its frame, the root or a
/// loaded library). Call [`Context::release`] once the results have been
/// read, or the whole value tree stays allocated.
#[derive(Clone)]
pub struct Context {
    root: ObjectRef,
    variables: VariableStack,
    state: Rc<ExecutionState>,
}

impl Context {
    /// Creates a top-level context over `root`
    pub fn new(root: ObjectRef, libraries: Libraries) -> Self {
        Context::with_call_limit(root, libraries, DEFAULT_MAX_CALL_DEPTH)
    }

    /// Creates a top-level context with a custom call depth limit
    pub fn with_call_limit(root: ObjectRef, libraries: Libraries, max_call_depth: usize) -> Self {
        Context {
            root,
            variables: VariableStack::new(),
            state: Rc::new(ExecutionState {
                libraries,
                imports: RefCell::new(HashMap::new()),
                in_flight: RefCell::new(Vec::new()),
                closures: RefCell::new(Vec::new()),
                call_depth: Cell::new(0),
                max_call_depth,
            }),
        }
    }

    /// Object addressed by bare identifiers and `this`
    pub fn root(&self) -> &ObjectRef {
        &self.root
    }

    /// Innermost variable scope
    pub fn variables(&self) -> &VariableStack {
        &self.variables
    }

    /// Library locators available to `import`
    pub fn libraries(&self) -> &Libraries {
        &self.state.libraries
    }

    /// Same scope, different root
    pub fn with_root(&self, root: ObjectRef) -> Context {
        Context {
            root,
            variables: self.variables.clone(),
            state: self.state.clone(),
        }
    }

    /// Same root, new child scope
    pub fn new_scope(&self) -> Context {
        Context {
            root: self.root.clone(),
            variables: self.variables.child(),
            state: self.state.clone(),
        }
    }

    /// Fresh variable chain over `root`, sharing imports and limits.
    /// Script libraries are executed in one of these.
    pub fn isolated(&self, root: ObjectRef) -> Context {
        Context {
            root,
            variables: VariableStack::new(),
            state: self.state.clone(),
        }
    }

    /// Captures this context for a function defined here
    pub fn capture(&self) -> Rc<Closure> {
        let closure = Rc::new(Closure {
            context: RefCell::new(Some(self.clone())),
        });
        let mut closures = self.state.closures.borrow_mut();
        if closures.len() == closures.capacity() {
            closures.retain(|closure| closure.strong_count() > 0);
        }
        closures.push(Rc::downgrade(&closure));
        closure
    }

    /// Ends the execution: detaches every closure it captured and forgets
    /// loaded libraries, which breaks the reference cycles between
    /// functions, scopes and the root.
    ///
    /// Values already produced stay readable; functions among them fail
    /// when called.
    pub fn release(&self) {
        let closures = std::mem::take(&mut *self.state.closures.borrow_mut());
        let mut detached = 0usize;
        for closure in closures.iter().filter_map(Weak::upgrade) {
            let context = closure.context.borrow_mut().take();
            if context.is_some() {
                detached += 1;
            }
            drop(context);
        }
        let imports = std::mem::take(&mut *self.state.imports.borrow_mut());
        drop(imports);
        tracing::trace!(closures = detached, "execution released");
    }

    /// Counts a function call; the call ends when the guard is dropped
    pub fn enter_call(&self) -> EvalResult<CallGuard<'_>> {
        let depth = self.state.call_depth.get();
        if depth >= self.state.max_call_depth {
            return Err(EvaluationError::new(EvalErrorKind::CallDepthExceeded {
                limit: self.state.max_call_depth,
            }));
        }
        self.state.call_depth.set(depth + 1);
        Ok(CallGuard { state: &self.state })
    }

    /// Resolves a library by name, loading it on first use
    pub fn import(&self, name: &str, span: &SourceSpan) -> EvalResult<Value> {
        if let Some(library) = self.state.imports.borrow().get(name) {
            tracing::trace!(library = name, "library cache hit");
            return Ok(library.clone());
        }

        {
            let mut in_flight = self.state.in_flight.borrow_mut();
            if in_flight.iter().any(|loading| loading == name) {
                let mut chain = in_flight.clone();
                chain.push(name.to_string());
                return Err(EvaluationError::at(
                    EvalErrorKind::CyclicImport {
                        chain: chain.join(" -> "),
                    },
                    span,
                ));
            }
            in_flight.push(name.to_string());
        }

        let out = Value::new_object();
        let located = self.state.libraries.locate(name, &out, self, span);
        self.state.in_flight.borrow_mut().pop();

        match located {
            Ok(true) => {
                tracing::debug!(library = name, "library loaded");
                let library = Value::Object(out);
                self.state
                    .imports
                    .borrow_mut()
                    .insert(name.to_string(), library.clone());
                Ok(library)
            }
            Ok(false) => Err(EvaluationError::at(
                EvalErrorKind::UnknownLibrary {
                    name: name.to_string(),
                },
                span,
            )),
            Err(error) => Err(error.wrap(
                EvalErrorKind::InLibrary {
                    name: name.to_string(),
                },
                span,
            )),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root_keys", &self.root.borrow().len())
            .field("variables", &self.variables)
            .field("call_depth", &self.state.call_depth.get())
            .finish()
    }
}

/// Definition-site context of a script function
pub struct Closure {
    context: RefCell<Option<Context>>,
}

impl Closure {
    /// Context the function body runs in; fails once the execution was released
    pub fn context(&self) -> EvalResult<Context> {
        self.context.borrow().clone().ok_or_else(|| {
            EvaluationError::runtime("Function belongs to an execution that was released")
        })
    }
}

/// Marks one active function call
pub struct CallGuard<'a> {
    state: &'a ExecutionState,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.state.call_depth.set(self.state.call_depth.get() - 1);
    }
}
