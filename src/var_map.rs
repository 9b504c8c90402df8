use indexmap::IndexMap;
use log::debug;
use std::any::{type_name, Any};
use std::cell::RefCell;
use std::io::Write;

use crate::environment::Environment;
use crate::error::{syntax_error, Error, Result};
use crate::init::Initialize;
use crate::tokenizer::{TokenKind, TokenStream};
use crate::value::FormatValue;

/// A mapping from variables of one type to their values, as held by an
/// [`Environment`]. Tables never keep a reference to their environment;
/// operations that resolve other variables receive it as an argument.
pub trait VarMap: Any {
    fn is_primitive(&self) -> bool;

    fn name(&self) -> &str;

    fn defined(&self, varname: &str) -> bool;

    fn read_and_set(&self, varname: &str, stream: &mut TokenStream, env: &Environment)
        -> Result<()>;

    fn print(&self, out: &mut dyn Write) -> Result<()>;

    fn copy(&self) -> Box<dyn VarMap>;

    fn remove(&self, varname: &str) -> bool;

    fn value_any(&self, varname: &str) -> Option<Box<dyn Any>>;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Clone)]
pub struct Bindings<T> {
    name: String,
    is_primitive: bool,
    vars: RefCell<IndexMap<String, T>>,
}

impl<T: Clone + FormatValue> Bindings<T> {
    pub fn new(name: impl Into<String>, is_primitive: bool) -> Self {
        Self {
            name: name.into(),
            is_primitive,
            vars: RefCell::new(IndexMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_primitive(&self) -> bool {
        self.is_primitive
    }

    pub fn get(&self, varname: &str) -> Option<T> {
        self.vars.borrow().get(varname).cloned()
    }

    pub fn set(&self, varname: &str, value: T) {
        self.vars.borrow_mut().insert(varname.to_string(), value);
    }

    pub fn defined(&self, varname: &str) -> bool {
        self.vars.borrow().contains_key(varname)
    }

    pub fn remove(&self, varname: &str) -> bool {
        self.vars.borrow_mut().shift_remove(varname).is_some()
    }

    pub fn print(&self, out: &mut dyn Write) -> Result<()> {
        for (varname, value) in self.vars.borrow().iter() {
            writeln!(out, "{} {} = {};", self.name, varname, value.format_value())?;
        }
        out.flush()?;
        Ok(())
    }
}

trait TypedVarMap: VarMap + Sized {
    type Value: Clone + FormatValue + 'static;

    fn bindings(&self) -> &Bindings<Self::Value>;

    /// If the next token names a variable already bound in `env`, consumes
    /// it and sets `varname` to a copy of that variable's value.
    ///
    /// Returns `Ok(false)` without consuming anything when the next token is
    /// not a bound variable. Fails if the variable lives in a table of a
    /// different kind, or if it has no stored value.
    fn read_and_set_from_existing_variable(
        &self,
        varname: &str,
        stream: &mut TokenStream,
        env: &Environment,
    ) -> Result<bool> {
        let rhs = match stream.peek().identifier() {
            Some(name) if env.defined(name) => name.to_string(),
            _ => return Ok(false),
        };

        let var_map = env.get_var_map(&rhs)?;
        let Some(typed_var_map) = var_map.as_any().downcast_ref::<Self>() else {
            debug!(
                "VarMap<{}>::read_and_set: variable {} is of type {} but expecting {}",
                self.name(),
                rhs,
                var_map.name(),
                type_name::<Self::Value>()
            );
            return Err(Error::TypeMismatch {
                varname: rhs,
                expected: self.name().to_string(),
                found: var_map.name().to_string(),
            });
        };

        stream.next();
        let value = typed_var_map
            .bindings()
            .get(&rhs)
            .ok_or_else(|| Error::Unset {
                varname: rhs.clone(),
            })?;

        debug!(
            "VarMap<{}>::read_and_set: setting variable {} to same value as rhs variable {}",
            self.name(),
            varname,
            rhs
        );
        self.bindings().set(varname, value);
        Ok(true)
    }
}

#[derive(Clone)]
pub struct ScalarMap<T> {
    bindings: Bindings<T>,
}

impl<T> ScalarMap<T>
where
    T: Initialize + Clone + FormatValue + 'static,
{
    pub fn new(name: impl Into<String>, is_primitive: bool) -> Self {
        Self {
            bindings: Bindings::new(name, is_primitive),
        }
    }

    pub fn get(&self, varname: &str) -> Option<T> {
        self.bindings.get(varname)
    }
}

impl<T> TypedVarMap for ScalarMap<T>
where
    T: Initialize + Clone + FormatValue + 'static,
{
    type Value = T;

    fn bindings(&self) -> &Bindings<T> {
        &self.bindings
    }
}

impl<T> VarMap for ScalarMap<T>
where
    T: Initialize + Clone + FormatValue + 'static,
{
    fn is_primitive(&self) -> bool {
        self.bindings.is_primitive()
    }

    fn name(&self) -> &str {
        self.bindings.name()
    }

    fn defined(&self, varname: &str) -> bool {
        self.bindings.defined(varname)
    }

    fn read_and_set(
        &self,
        varname: &str,
        stream: &mut TokenStream,
        env: &Environment,
    ) -> Result<()> {
        debug!(
            "VarMap<{}>::read_and_set: about to set varname {} of type {}; prev_token={:?}; next_token={}",
            self.name(),
            varname,
            type_name::<T>(),
            stream.peek_prev().map(|t| t.kind.to_string()),
            stream.peek().kind
        );

        if !self.read_and_set_from_existing_variable(varname, stream, env)? {
            let value = T::init(stream, env)?;
            debug!(
                "VarMap<{}>::read_and_set: set varname {} to value {}",
                self.name(),
                varname,
                value.format_value()
            );
            self.bindings.set(varname, value);
        }
        Ok(())
    }

    fn print(&self, out: &mut dyn Write) -> Result<()> {
        self.bindings.print(out)
    }

    fn copy(&self) -> Box<dyn VarMap> {
        Box::new(self.clone())
    }

    fn remove(&self, varname: &str) -> bool {
        self.bindings.remove(varname)
    }

    fn value_any(&self, varname: &str) -> Option<Box<dyn Any>> {
        self.get(varname).map(|value| Box::new(value) as Box<dyn Any>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Variables holding a vector of `T`, read as `{ e0, e1, ... }` where each
/// element is anything a scalar of the element type accepts.
#[derive(Clone)]
pub struct VectorMap<T> {
    bindings: Bindings<Vec<T>>,
    element_type: String,
}

impl<T> VectorMap<T>
where
    T: Initialize + Clone + FormatValue + 'static,
{
    pub fn new(name: impl Into<String>, element_type: impl Into<String>, is_primitive: bool) -> Self {
        Self {
            bindings: Bindings::new(name, is_primitive),
            element_type: element_type.into(),
        }
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn get(&self, varname: &str) -> Option<Vec<T>> {
        self.bindings.get(varname)
    }

    fn read_element(
        &self,
        varname: &str,
        index: usize,
        stream: &mut TokenStream,
        env: &Environment,
    ) -> Result<T> {
        // Each element is bound under a synthesized name in a throwaway copy
        // of the environment, so it can never clash with a real variable.
        let mut scope = env.copy()?;
        let element_name = format!("\u{1}{}_{}", varname, index);

        scope.read_and_set(&element_name, stream, &self.element_type)?;

        scope
            .get_var_map_for_type(&self.element_type)
            .and_then(|var_map| var_map.as_any().downcast_ref::<ScalarMap<T>>())
            .and_then(|var_map| var_map.get(&element_name))
            .ok_or_else(|| Error::ElementInit {
                index,
                varname: varname.to_string(),
            })
    }
}

impl<T> TypedVarMap for VectorMap<T>
where
    T: Initialize + Clone + FormatValue + 'static,
{
    type Value = Vec<T>;

    fn bindings(&self) -> &Bindings<Vec<T>> {
        &self.bindings
    }
}

impl<T> VarMap for VectorMap<T>
where
    T: Initialize + Clone + FormatValue + 'static,
{
    fn is_primitive(&self) -> bool {
        self.bindings.is_primitive()
    }

    fn name(&self) -> &str {
        self.bindings.name()
    }

    fn defined(&self, varname: &str) -> bool {
        self.bindings.defined(varname)
    }

    fn read_and_set(
        &self,
        varname: &str,
        stream: &mut TokenStream,
        env: &Environment,
    ) -> Result<()> {
        if self.read_and_set_from_existing_variable(varname, stream, env)? {
            return Ok(());
        }

        stream.expect(TokenKind::LeftBrace)?;

        let mut value = Vec::new();
        while stream.peek().kind != TokenKind::RightBrace {
            let element = self.read_element(varname, value.len(), stream, env)?;
            value.push(element);

            let separator = stream.peek().clone();
            match separator.kind {
                TokenKind::Comma => {
                    stream.next();
                }
                TokenKind::RightBrace => (),
                other => {
                    return syntax_error(
                        format!("expected ',' or '}}' but found \"{}\"", other),
                        separator.start,
                    )
                }
            }
        }
        stream.next();

        debug!(
            "VarMap<{}>::read_and_set: set varname {} to value {}",
            self.name(),
            varname,
            value.format_value()
        );
        self.bindings.set(varname, value);
        Ok(())
    }

    fn print(&self, out: &mut dyn Write) -> Result<()> {
        self.bindings.print(out)
    }

    fn copy(&self) -> Box<dyn VarMap> {
        Box::new(self.clone())
    }

    fn remove(&self, varname: &str) -> bool {
        self.bindings.remove(varname)
    }

    fn value_any(&self, varname: &str) -> Option<Box<dyn Any>> {
        self.get(varname).map(|value| Box::new(value) as Box<dyn Any>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_keep_insertion_order() -> Result<()> {
        let bindings = Bindings::<i32>::new("int", true);
        bindings.set("b", 2);
        bindings.set("a", 1);
        bindings.set("b", 3);
        assert_eq!(bindings.get("b"), Some(3));
        assert!(bindings.defined("a"));
        assert!(!bindings.defined("c"));

        let mut out = Vec::new();
        bindings.print(&mut out)?;
        assert_eq!(String::from_utf8_lossy(&out), "int b = 3;\nint a = 1;\n");

        assert!(bindings.remove("b"));
        assert!(!bindings.remove("b"));
        assert_eq!(bindings.get("b"), None);
        Ok(())
    }

    #[test]
    fn test_copy_duplicates_storage() -> Result<()> {
        let env = Environment::new();
        let ints = ScalarMap::<i32>::new("int", true);
        ints.read_and_set("x", &mut TokenStream::new("1")?, &env)?;

        let copy = ints.copy();
        assert_eq!(copy.name(), "int");
        assert!(copy.is_primitive());
        copy.read_and_set("x", &mut TokenStream::new("2")?, &env)?;

        assert_eq!(ints.get("x"), Some(1));
        let copied = copy.as_any().downcast_ref::<ScalarMap<i32>>();
        assert_eq!(copied.and_then(|m| m.get("x")), Some(2));
        Ok(())
    }

    #[test]
    fn test_vector_grammar() -> Result<()> {
        let env = Environment::new();
        let strings = VectorMap::<String>::new("string[]", "string", true);
        assert_eq!(strings.element_type(), "string");

        let mut stream = TokenStream::new(r#"{ "a", "b", "c" } ;"#)?;
        strings.read_and_set("xs", &mut stream, &env)?;
        assert_eq!(
            strings.get("xs"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(stream.peek().kind, TokenKind::Semicolon);

        strings.read_and_set("empty", &mut TokenStream::new("{}")?, &env)?;
        assert_eq!(strings.get("empty"), Some(Vec::new()));
        Ok(())
    }

    #[test]
    fn test_vector_syntax_errors_leave_unbound() -> Result<()> {
        let env = Environment::new();
        let ints = VectorMap::<i32>::new("int[]", "int", true);

        for source in ["1, 2 }", "{ 1 2 }", "{ 1, 2", "{ 1; }"] {
            let result = ints.read_and_set("xs", &mut TokenStream::new(source)?, &env);
            assert!(matches!(result, Err(Error::Syntax { .. })), "{}", source);
            assert!(!ints.defined("xs"));
        }
        Ok(())
    }

    #[test]
    fn test_vector_error_position() -> Result<()> {
        let env = Environment::new();
        let ints = VectorMap::<i32>::new("int[]", "int", true);
        let result = ints.read_and_set("xs", &mut TokenStream::new("{ 1 2 }")?, &env);
        assert!(matches!(result, Err(Error::Syntax { position: 4, .. })));
        Ok(())
    }

    #[test]
    fn test_unknown_element_type() -> Result<()> {
        let env = Environment::new();
        let odd = VectorMap::<i32>::new("odd[]", "odd", true);
        let result = odd.read_and_set("xs", &mut TokenStream::new("{ 1 }")?, &env);
        assert!(matches!(result, Err(Error::UnknownType { .. })));
        Ok(())
    }

    #[test]
    fn test_element_table_of_wrong_kind() -> Result<()> {
        let mut env = Environment::new();
        env.register(VectorMap::<i32>::new("odd[]", "double", true))?;

        let mut stream = TokenStream::new("{ 1 }")?;
        let result = env.read_and_set("xs", &mut stream, "odd[]");
        assert!(matches!(
            result,
            Err(Error::ElementInit { index: 0, ref varname }) if varname == "xs"
        ));
        assert!(!env.defined("xs"));
        assert!(!env.get_var_map_for_type("odd[]").map_or(true, |m| m.defined("xs")));
        Ok(())
    }
}
