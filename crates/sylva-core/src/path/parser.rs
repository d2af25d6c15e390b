//! Location-path text to path elements
//!
//! Grammar (whitespace allowed between tokens):
//!
//! ```text
//! path      := '/' | ('/' | '//')? step (('/' | '//') step)*
//! step      := '.' | '..' | '@' name | (axis '::')? name predicate?
//! name      := '*' | [A-Za-z0-9_.-]+
//! predicate := '[' ( integer | 'last()' | '@' name ('=' literal)? | name ) ']'
//! literal   := quoted string | number | 'true' | 'false' | '$' variable
//! ```

use std::rc::Rc;

use crate::errors::PathSyntaxError;
use crate::node::Value;
use crate::variables::VariableScope;

use super::axis::Axis;
use super::element::PathElement;
use super::predicate::{
    AttributePredicate, ChildPredicate, PositionPredicate, Predicate, VariablePredicate,
};

type ParseResult<T> = std::result::Result<T, PathSyntaxError>;

pub(crate) fn parse(
    text: &str,
    scope: Option<&VariableScope>,
) -> ParseResult<Vec<PathElement>> {
    Parser {
        text,
        pos: 0,
        scope,
    }
    .parse_path()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    scope: Option<&'a VariableScope>,
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> PathSyntaxError {
        PathSyntaxError {
            path: self.text.to_string(),
            position: self.pos,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> ParseResult<()> {
        self.skip_ws();
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", token)))
        }
    }

    fn parse_path(&mut self) -> ParseResult<Vec<PathElement>> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.error("empty path"));
        }

        let mut elements = Vec::new();
        let mut absolute = false;
        let mut descend = false;
        if self.eat("//") {
            absolute = true;
            descend = true;
        } else if self.eat("/") {
            absolute = true;
            self.skip_ws();
            if self.at_end() {
                return Ok(vec![PathElement::new(Axis::ROOT, None)]);
            }
        }

        loop {
            self.skip_ws();
            let step = self.parse_step()?;
            if elements.is_empty() && absolute {
                anchor(step, descend, &mut elements);
            } else if descend {
                descendant(step, &mut elements);
            } else {
                elements.push(step);
            }

            self.skip_ws();
            if self.at_end() {
                break;
            }
            if self.eat("//") {
                descend = true;
            } else if self.eat("/") {
                descend = false;
            } else {
                return Err(self.error("expected '/' between steps"));
            }
        }
        Ok(elements)
    }

    fn parse_step(&mut self) -> ParseResult<PathElement> {
        let mut element = if self.eat("..") {
            PathElement::new(Axis::PARENT, None)
        } else if self.eat(".") {
            PathElement::new(Axis::SELF, None)
        } else if self.eat("@") {
            let name = self.parse_name()?;
            PathElement::new(Axis::ATTRIBUTE, Some(name))
        } else {
            let start = self.pos;
            let name = self.parse_name()?;
            if self.eat("::") {
                let axis = Axis::from_axis_name(name).ok_or_else(|| PathSyntaxError {
                    path: self.text.to_string(),
                    position: start,
                    message: format!("unknown axis '{}'", name),
                })?;
                let node_type = self.parse_name()?;
                PathElement::new(axis, Some(node_type))
            } else {
                PathElement::new(Axis::CHILD, Some(name))
            }
        };

        self.skip_ws();
        if self.peek() == Some('[') {
            element.predicate = Some(self.parse_predicate()?);
            self.skip_ws();
            if self.peek() == Some('[') {
                return Err(self.error("only one predicate per step"));
            }
        }
        Ok(element)
    }

    fn parse_name(&mut self) -> ParseResult<&'a str> {
        let start = self.pos;
        if self.eat("*") {
            return Ok("*");
        }
        let len: usize = self
            .rest()
            .chars()
            .take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
            .map(char::len_utf8)
            .sum();
        if len == 0 {
            return Err(self.error("expected a node test"));
        }
        self.pos += len;
        Ok(&self.text[start..start + len])
    }

    fn parse_predicate(&mut self) -> ParseResult<Rc<dyn Predicate>> {
        self.expect("[")?;
        self.skip_ws();

        let predicate: Rc<dyn Predicate> = match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let index = self.parse_integer()?;
                if index == 0 {
                    return Err(self.error("positions start at 1"));
                }
                Rc::new(PositionPredicate::Index(index))
            }
            Some('@') => {
                self.pos += 1;
                let name = self.parse_name()?.to_string();
                self.skip_ws();
                if self.eat("=") {
                    self.skip_ws();
                    if self.eat("$") {
                        let variable = self.parse_name()?;
                        let scope = self
                            .scope
                            .ok_or_else(|| self.error("variables need a scope"))?;
                        Rc::new(VariablePredicate::new(name, variable, scope))
                    } else {
                        let value = self.parse_literal()?;
                        Rc::new(AttributePredicate::equals(name, value))
                    }
                } else {
                    Rc::new(AttributePredicate::exists(name))
                }
            }
            _ if self.eat("last()") => Rc::new(PositionPredicate::Last),
            _ => Rc::new(ChildPredicate::new(self.parse_name()?)),
        };

        self.expect("]")?;
        Ok(predicate)
    }

    fn parse_integer(&mut self) -> ParseResult<usize> {
        let len = self.rest().chars().take_while(char::is_ascii_digit).count();
        let digits = &self.text[self.pos..self.pos + len];
        let value = digits
            .parse()
            .map_err(|_| self.error(format!("invalid position '{}'", digits)))?;
        self.pos += len;
        Ok(value)
    }

    fn parse_literal(&mut self) -> ParseResult<Value> {
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let len = self
                    .rest()
                    .find(quote)
                    .ok_or_else(|| self.error("unterminated string"))?;
                let value = self.text[self.pos..self.pos + len].to_string();
                self.pos += len + 1;
                Ok(Value::String(value))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let len = self
                    .rest()
                    .char_indices()
                    .take_while(|(i, c)| {
                        c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+') || (*i == 0 && *c == '-')
                    })
                    .count();
                let text = &self.text[self.pos..self.pos + len];
                let value = serde_json::from_str::<Value>(text)
                    .map_err(|_| self.error(format!("invalid number '{}'", text)))?;
                self.pos += len;
                Ok(value)
            }
            _ if self.eat("true") => Ok(Value::Bool(true)),
            _ if self.eat("false") => Ok(Value::Bool(false)),
            _ => Err(self.error("expected a literal")),
        }
    }
}

/// First step after a leading `/` or `//`
fn anchor(mut step: PathElement, descend: bool, out: &mut Vec<PathElement>) {
    if descend {
        if step.axis == Axis::CHILD {
            step.axis = Axis::ROOT | Axis::SELF | Axis::DESCENDANT;
            out.push(step);
        } else {
            out.push(PathElement::new(Axis::ROOT | Axis::SELF | Axis::DESCENDANT, None));
            out.push(step);
        }
        return;
    }
    if step.axis == Axis::CHILD {
        step.axis = Axis::ROOT;
        out.push(step);
    } else if step.axis.contains(Axis::DESCENDANT) && !step.axis.intersects(!(Axis::SELF | Axis::DESCENDANT)) {
        step.axis = Axis::ROOT | Axis::SELF | Axis::DESCENDANT;
        out.push(step);
    } else {
        out.push(PathElement::new(Axis::ROOT, None));
        out.push(step);
    }
}

/// Step written after `//`
fn descendant(mut step: PathElement, out: &mut Vec<PathElement>) {
    if step.axis == Axis::CHILD {
        step.axis = Axis::DESCENDANT;
        out.push(step);
    } else {
        out.push(PathElement::new(Axis::SELF | Axis::DESCENDANT, None));
        out.push(step);
    }
}
