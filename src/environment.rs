use indexmap::IndexMap;
use log::debug;
use std::any::type_name;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::error::{syntax_error, Error, Result};
use crate::factory::FactoryRegistry;
use crate::tokenizer::{Token, TokenKind, TokenStream};
use crate::var_map::{ScalarMap, VarMap, VectorMap};

/// Every bound variable, its type and its value, organised as one
/// [`VarMap`] per type name.
pub struct Environment {
    var_maps: IndexMap<String, Box<dyn VarMap>>,
    types: HashMap<String, String>,
    factories: Rc<FactoryRegistry>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

pub const PRIMITIVE_TYPE_NAMES: [&str; 8] = [
    "bool", "int", "double", "string", "bool[]", "int[]", "double[]", "string[]",
];

impl Environment {
    pub fn new() -> Self {
        Self::with_factories(Rc::new(FactoryRegistry::new()))
    }

    pub fn with_factories(factories: Rc<FactoryRegistry>) -> Self {
        let mut env = Self {
            var_maps: IndexMap::new(),
            types: HashMap::new(),
            factories: Rc::clone(&factories),
        };

        env.install_table(ScalarMap::<bool>::new("bool", true));
        env.install_table(ScalarMap::<i32>::new("int", true));
        env.install_table(ScalarMap::<f64>::new("double", true));
        env.install_table(ScalarMap::<String>::new("string", true));

        env.install_table(VectorMap::<bool>::new("bool[]", "bool", true));
        env.install_table(VectorMap::<i32>::new("int[]", "int", true));
        env.install_table(VectorMap::<f64>::new("double[]", "double", true));
        env.install_table(VectorMap::<String>::new("string[]", "string", true));

        factories.install(&mut env);
        env
    }

    /// Adds a table under its own name. A name that already has a table is
    /// rejected, leaving the existing table and its bindings in place.
    pub fn register(&mut self, var_map: impl VarMap) -> Result<()> {
        if self.var_maps.contains_key(var_map.name()) {
            return Err(Error::DuplicateType {
                type_name: var_map.name().to_string(),
            });
        }
        self.install_table(var_map);
        Ok(())
    }

    pub(crate) fn install_table(&mut self, var_map: impl VarMap) {
        debug!("Environment::install_table: {}", var_map.name());
        self.var_maps
            .insert(var_map.name().to_string(), Box::new(var_map));
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn defined(&self, varname: &str) -> bool {
        self.types.contains_key(varname)
    }

    pub fn get_type(&self, varname: &str) -> Result<&str> {
        self.types
            .get(varname)
            .map(String::as_str)
            .ok_or_else(|| Error::NotFound {
                varname: varname.to_string(),
            })
    }

    pub fn get_var_map(&self, varname: &str) -> Result<&dyn VarMap> {
        let type_name = self.get_type(varname)?;
        self.var_maps
            .get(type_name)
            .map(Box::as_ref)
            .ok_or_else(|| Error::NotFound {
                varname: varname.to_string(),
            })
    }

    /// The table holding variables of `type_name`. A concrete object type
    /// resolves to the table of its abstract base type.
    pub fn get_var_map_for_type(&self, type_name: &str) -> Option<&dyn VarMap> {
        let resolved = self.factories.base_type_of(type_name).unwrap_or(type_name);
        self.var_maps.get(resolved).map(Box::as_ref)
    }

    pub fn read_and_set(
        &mut self,
        varname: &str,
        stream: &mut TokenStream,
        declared_type: &str,
    ) -> Result<()> {
        let declared_type = if declared_type.is_empty() {
            self.infer_type(stream)?
        } else {
            declared_type.to_string()
        };

        let var_map =
            self.get_var_map_for_type(&declared_type)
                .ok_or_else(|| Error::UnknownType {
                    type_name: declared_type.clone(),
                })?;
        let table_name = var_map.name().to_string();

        var_map.read_and_set(varname, stream, self)?;

        if let Some(previous) = self.types.get(varname) {
            if *previous != table_name {
                debug!(
                    "Environment::read_and_set: {} changes type from {} to {}",
                    varname, previous, table_name
                );
                if let Some(old) = self.var_maps.get(previous) {
                    old.remove(varname);
                }
            }
        }
        self.types.insert(varname.to_string(), table_name);
        Ok(())
    }

    pub fn infer_type(&self, stream: &TokenStream) -> Result<String> {
        let token = stream.peek();
        if token.kind != TokenKind::LeftBrace {
            return self.infer_token_type(token);
        }

        let first = stream.peek_second();
        match first.kind {
            TokenKind::RightBrace => Err(Error::UnknownType {
                type_name: "{}".to_string(),
            }),
            TokenKind::LeftBrace => syntax_error("nested vectors are not supported", first.start),
            _ => Ok(format!("{}[]", self.infer_token_type(first)?)),
        }
    }

    fn infer_token_type(&self, token: &Token) -> Result<String> {
        let type_name = match &token.kind {
            TokenKind::String(_) => "string",
            TokenKind::True | TokenKind::False => "bool",
            TokenKind::Integer(_) => "int",
            TokenKind::Float(_) => "double",
            TokenKind::Identifier(name) if self.defined(name) => self.get_type(name)?,
            TokenKind::Identifier(name) => {
                self.factories
                    .base_type_of(name)
                    .ok_or_else(|| Error::UnknownType {
                        type_name: name.clone(),
                    })?
            }
            other => {
                return syntax_error(
                    format!("cannot infer a type from \"{}\"", other),
                    token.start,
                )
            }
        };
        Ok(type_name.to_string())
    }

    pub fn get<T: 'static>(&self, varname: &str) -> Result<T> {
        let var_map = self.get_var_map(varname)?;
        let value = var_map.value_any(varname).ok_or_else(|| Error::Unset {
            varname: varname.to_string(),
        })?;
        value
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::TypeMismatch {
                varname: varname.to_string(),
                expected: type_name::<T>().to_string(),
                found: var_map.name().to_string(),
            })
    }

    pub fn print(&self, out: &mut dyn Write) -> Result<()> {
        for var_map in self.var_maps.values() {
            var_map.print(out)?;
        }
        Ok(())
    }

    /// A structural copy: primitive values are duplicated, object handles
    /// are shared with this environment.
    pub fn copy(&self) -> Result<Environment> {
        let mut var_maps = IndexMap::with_capacity(self.var_maps.len());
        for (type_name, var_map) in &self.var_maps {
            let copy = var_map.copy();
            if copy.name() != type_name
                || copy.as_any().type_id() != var_map.as_any().type_id()
            {
                return Err(Error::BadClone {
                    type_name: type_name.clone(),
                });
            }
            var_maps.insert(type_name.clone(), copy);
        }

        Ok(Environment {
            var_maps,
            types: self.types.clone(),
            factories: Rc::clone(&self.factories),
        })
    }

    pub fn print_factories(&self, out: &mut dyn Write) -> Result<()> {
        self.factories.print(out)
    }
}
