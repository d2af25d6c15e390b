//! Step predicates
//!
//! A predicate filters the candidates of one path step. Besides the test
//! itself it reports what it depends on, so a live path listener knows which
//! attribute writes can change its result and can subscribe to the
//! predicate's own external inputs (variables) through expression listeners.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::errors::Result;
use crate::node::{value_text, Node, Value};
use crate::variables::{VariableListener, VariableScope};

/// Candidate under test with its 1-based position among the step's candidates
pub struct PredicateContext<'a> {
    pub node: &'a Node,
    pub position: usize,
    pub size: usize,
}

/// Attributes whose writes may change a predicate's result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeWatch {
    #[default]
    None,
    Names(Vec<String>),
    All,
}

impl AttributeWatch {
    pub fn watches(&self, name: &str) -> bool {
        match self {
            AttributeWatch::None => false,
            AttributeWatch::Names(names) => names.iter().any(|n| n == name),
            AttributeWatch::All => true,
        }
    }

    pub fn union(self, other: AttributeWatch) -> AttributeWatch {
        match (self, other) {
            (AttributeWatch::All, _) | (_, AttributeWatch::All) => AttributeWatch::All,
            (AttributeWatch::None, other) | (other, AttributeWatch::None) => other,
            (AttributeWatch::Names(mut a), AttributeWatch::Names(b)) => {
                for name in b {
                    if !a.contains(&name) {
                        a.push(name);
                    }
                }
                AttributeWatch::Names(a)
            }
        }
    }
}

/// Told when a predicate's inputs outside the tree change
pub trait ExpressionListener {
    fn notify_expression_changed(&self);
}

/// Filter applied to the candidates of one step
pub trait Predicate: fmt::Display {
    fn test(&self, context: &PredicateContext<'_>) -> bool;

    /// Depends on positions rather than on the candidate alone
    fn is_position_sensitive(&self) -> bool {
        false
    }

    /// Depends on state reachable only from the root
    fn is_absolute(&self) -> bool {
        false
    }

    fn watched_attributes(&self) -> AttributeWatch {
        AttributeWatch::None
    }

    /// Depends on the candidate's children
    fn watches_children(&self) -> bool {
        false
    }

    fn add_expression_listener(&self, _listener: &Rc<dyn ExpressionListener>) {}

    fn remove_expression_listener(&self, _listener: &Rc<dyn ExpressionListener>) {}
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write!(f, "'{}'", s),
        other => write!(f, "{}", other),
    }
}

/// `[@name]` or `[@name='value']`
pub struct AttributePredicate {
    name: String,
    value: Option<Value>,
}

impl AttributePredicate {
    pub fn exists(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl Predicate for AttributePredicate {
    fn test(&self, context: &PredicateContext<'_>) -> bool {
        match (&self.value, context.node.attribute(&self.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(expected), Some(actual)) => {
                actual == *expected || value_text(&actual) == value_text(expected)
            }
        }
    }

    fn watched_attributes(&self) -> AttributeWatch {
        AttributeWatch::Names(vec![self.name.clone()])
    }
}

impl fmt::Display for AttributePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[@{}", self.name)?;
        if let Some(value) = &self.value {
            write!(f, "=")?;
            write_literal(f, value)?;
        }
        write!(f, "]")
    }
}

/// `[n]` (1-based) or `[last()]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPredicate {
    Index(usize),
    Last,
}

impl Predicate for PositionPredicate {
    fn test(&self, context: &PredicateContext<'_>) -> bool {
        match self {
            PositionPredicate::Index(n) => context.position == *n,
            PositionPredicate::Last => context.position == context.size,
        }
    }

    fn is_position_sensitive(&self) -> bool {
        true
    }
}

impl fmt::Display for PositionPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionPredicate::Index(n) => write!(f, "[{}]", n),
            PositionPredicate::Last => write!(f, "[last()]"),
        }
    }
}

/// `[type]`: the candidate has a child of the type (`*` for any)
pub struct ChildPredicate {
    node_type: String,
}

impl ChildPredicate {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
        }
    }
}

impl Predicate for ChildPredicate {
    fn test(&self, context: &PredicateContext<'_>) -> bool {
        if self.node_type == "*" {
            return context.node.child_count() > 0;
        }
        context.node.first_child(&self.node_type).is_some()
    }

    fn watches_children(&self) -> bool {
        true
    }
}

impl fmt::Display for ChildPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.node_type)
    }
}

/// Forwards writes of one variable to an expression listener
struct VariableWatch {
    variable: String,
    listener: Weak<dyn ExpressionListener>,
}

impl VariableListener for VariableWatch {
    fn notify_variable(
        &self,
        _scope: &VariableScope,
        name: &str,
        _new_value: Option<&Value>,
        _old_value: Option<&Value>,
    ) -> Result<()> {
        if name == self.variable {
            if let Some(listener) = self.listener.upgrade() {
                listener.notify_expression_changed();
            }
        }
        Ok(())
    }
}

/// `[@name=$variable]`
pub struct VariablePredicate {
    attribute: String,
    variable: String,
    scope: VariableScope,
    watches: RefCell<Vec<(Weak<dyn ExpressionListener>, Rc<dyn VariableListener>)>>,
}

impl VariablePredicate {
    pub fn new(
        attribute: impl Into<String>,
        variable: impl Into<String>,
        scope: &VariableScope,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            variable: variable.into(),
            scope: scope.clone(),
            watches: RefCell::new(Vec::new()),
        }
    }
}

impl Predicate for VariablePredicate {
    fn test(&self, context: &PredicateContext<'_>) -> bool {
        match (
            context.node.attribute(&self.attribute),
            self.scope.get(&self.variable),
        ) {
            (Some(actual), Some(expected)) => {
                actual == expected || value_text(&actual) == value_text(&expected)
            }
            _ => false,
        }
    }

    fn watched_attributes(&self) -> AttributeWatch {
        AttributeWatch::Names(vec![self.attribute.clone()])
    }

    fn add_expression_listener(&self, listener: &Rc<dyn ExpressionListener>) {
        let watch: Rc<dyn VariableListener> = Rc::new(VariableWatch {
            variable: self.variable.clone(),
            listener: Rc::downgrade(listener),
        });
        self.scope.add_listener(&watch);
        self.watches
            .borrow_mut()
            .push((Rc::downgrade(listener), watch));
    }

    fn remove_expression_listener(&self, listener: &Rc<dyn ExpressionListener>) {
        let target = Rc::as_ptr(listener) as *const ();
        let mut watches = self.watches.borrow_mut();
        watches.retain(|(owner, watch)| {
            let keep = owner.as_ptr() as *const () != target && owner.strong_count() > 0;
            if !keep {
                self.scope.remove_listener(watch);
            }
            keep
        });
    }
}

impl fmt::Display for VariablePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[@{}=${}]", self.attribute, self.variable)
    }
}

/// Predicate backed by a closure, for conditions the syntax cannot express
pub struct FnPredicate {
    label: String,
    test: Box<dyn Fn(&PredicateContext<'_>) -> bool>,
    watch: AttributeWatch,
    absolute: bool,
}

impl FnPredicate {
    pub fn new(
        label: impl Into<String>,
        test: impl Fn(&PredicateContext<'_>) -> bool + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            test: Box::new(test),
            watch: AttributeWatch::All,
            absolute: false,
        }
    }

    /// Mark the test as reading state reachable only from the root
    pub fn anchored(mut self) -> Self {
        self.absolute = true;
        self
    }

    /// Narrow the attributes whose writes re-evaluate this predicate
    pub fn watching(mut self, watch: AttributeWatch) -> Self {
        self.watch = watch;
        self
    }
}

impl Predicate for FnPredicate {
    fn test(&self, context: &PredicateContext<'_>) -> bool {
        (self.test)(context)
    }

    fn is_absolute(&self) -> bool {
        self.absolute
    }

    fn watched_attributes(&self) -> AttributeWatch {
        self.watch.clone()
    }
}

impl fmt::Display for FnPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}()]", self.label)
    }
}
