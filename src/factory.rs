use indexmap::IndexMap;
use log::debug;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;

use crate::environment::{Environment, PRIMITIVE_TYPE_NAMES};
use crate::error::{syntax_error, Error, Result};
use crate::tokenizer::{TokenKind, TokenStream};
use crate::var_map::{ScalarMap, VectorMap};

pub type Constructor<B> = Box<dyn Fn(&Members) -> Result<Rc<B>>>;

struct Implementation<B: ?Sized> {
    members: IndexMap<String, String>,
    construct: Constructor<B>,
}

/// Builds `Rc<B>` handles from specs of the form
/// `Concrete(member(value), member(value), ...)`.
pub struct Factory<B: ?Sized> {
    base_name: String,
    implementations: IndexMap<String, Implementation<B>>,
}

impl<B: ?Sized + 'static> Factory<B> {
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            implementations: IndexMap::new(),
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn add<F>(mut self, concrete_name: &str, members: &[(&str, &str)], construct: F) -> Self
    where
        F: Fn(&Members) -> Result<Rc<B>> + 'static,
    {
        let members = members
            .iter()
            .map(|(name, type_name)| (name.to_string(), type_name.to_string()))
            .collect();
        self.implementations.insert(
            concrete_name.to_string(),
            Implementation {
                members,
                construct: Box::new(construct),
            },
        );
        self
    }

    pub fn create(&self, stream: &mut TokenStream, env: &Environment) -> Result<Rc<B>> {
        let token = stream.next();
        let Some(concrete_name) = token.identifier() else {
            return syntax_error(
                format!(
                    "expected {} implementation name but found \"{}\"",
                    self.base_name, token.kind
                ),
                token.start,
            );
        };
        let implementation =
            self.implementations
                .get(concrete_name)
                .ok_or_else(|| Error::UnknownType {
                    type_name: concrete_name.to_string(),
                })?;

        stream.expect(TokenKind::LeftParen)?;

        // Members are bound as ordinary variables in a private copy so their
        // initializers may refer to anything already in scope.
        let mut scope = env.copy()?;
        let mut initialized = HashSet::new();

        while stream.peek().kind != TokenKind::RightParen {
            let member_token = stream.next();
            let member = member_token
                .identifier()
                .and_then(|name| implementation.members.get_key_value(name));
            let Some((member, member_type)) = member else {
                return syntax_error(
                    format!("{} has no member \"{}\"", concrete_name, member_token.kind),
                    member_token.start,
                );
            };

            stream.expect(TokenKind::LeftParen)?;
            scope.read_and_set(member, stream, member_type)?;
            stream.expect(TokenKind::RightParen)?;
            initialized.insert(member.clone());

            if stream.peek().kind != TokenKind::RightParen {
                stream.expect(TokenKind::Comma)?;
            }
        }
        stream.next();

        debug!(
            "Factory<{}>::create: constructing {} with members {:?}",
            self.base_name, concrete_name, initialized
        );
        (implementation.construct)(&Members { scope, initialized })
    }
}

pub struct Members {
    scope: Environment,
    initialized: HashSet<String>,
}

impl Members {
    pub fn is_set(&self, name: &str) -> bool {
        self.initialized.contains(name)
    }

    pub fn get<T: 'static>(&self, name: &str) -> Result<T> {
        if !self.is_set(name) {
            return Err(Error::NotFound {
                varname: name.to_string(),
            });
        }
        self.scope.get(name)
    }

    pub fn get_or<T: 'static>(&self, name: &str, default: T) -> Result<T> {
        if self.is_set(name) {
            self.get(name)
        } else {
            Ok(default)
        }
    }
}

struct RegisteredBase {
    factory: Box<dyn Any>,
    implementations: Vec<String>,
    install: fn(&mut Environment, &str),
}

fn install_tables<B: ?Sized + 'static>(env: &mut Environment, base_name: &str) {
    env.install_table(ScalarMap::<Rc<B>>::new(base_name, false));
    env.install_table(VectorMap::<Rc<B>>::new(
        format!("{}[]", base_name),
        base_name,
        false,
    ));
}

#[derive(Default)]
pub struct FactoryRegistry {
    bases: IndexMap<String, RegisteredBase>,
    base_types: HashMap<String, String>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a base type and its implementations. The base name must not be a
    /// primitive type, a vector type or an already registered base.
    pub fn register<B: ?Sized + 'static>(&mut self, factory: Factory<B>) -> Result<&mut Self> {
        let base_name = factory.base_name.clone();
        if base_name.ends_with("[]")
            || PRIMITIVE_TYPE_NAMES.contains(&base_name.as_str())
            || self.bases.contains_key(&base_name)
        {
            return Err(Error::DuplicateType {
                type_name: base_name,
            });
        }

        let implementations: Vec<String> = factory.implementations.keys().cloned().collect();
        if let Some(concrete_name) = implementations
            .iter()
            .find(|name| self.base_types.contains_key(*name))
        {
            return Err(Error::DuplicateType {
                type_name: concrete_name.clone(),
            });
        }
        for concrete_name in &implementations {
            self.base_types
                .insert(concrete_name.clone(), base_name.clone());
        }

        debug!(
            "FactoryRegistry::register: {} with implementations {:?}",
            base_name, implementations
        );
        self.bases.insert(
            base_name,
            RegisteredBase {
                factory: Box::new(factory),
                implementations,
                install: install_tables::<B>,
            },
        );
        Ok(self)
    }

    pub fn base_type_of(&self, concrete_name: &str) -> Option<&str> {
        self.base_types.get(concrete_name).map(String::as_str)
    }

    pub fn factory<B: ?Sized + 'static>(&self) -> Option<&Factory<B>> {
        self.bases
            .values()
            .find_map(|base| base.factory.downcast_ref::<Factory<B>>())
    }

    pub fn base_names(&self) -> impl Iterator<Item = &str> {
        self.bases.keys().map(String::as_str)
    }

    pub(crate) fn install(&self, env: &mut Environment) {
        for (base_name, base) in &self.bases {
            (base.install)(env, base_name);
        }
    }

    pub fn print(&self, out: &mut dyn Write) -> Result<()> {
        for (base_name, base) in &self.bases {
            writeln!(out, "{}: {}", base_name, base.implementations.join(", "))?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    pub trait Shape {
        fn area(&self) -> f64;
        fn scale(&self, factor: f64);
        fn label(&self) -> String;
    }

    struct Circle {
        radius: Cell<f64>,
        label: String,
    }

    impl Shape for Circle {
        fn area(&self) -> f64 {
            3.0 * self.radius.get() * self.radius.get()
        }

        fn scale(&self, factor: f64) {
            self.radius.set(self.radius.get() * factor);
        }

        fn label(&self) -> String {
            self.label.clone()
        }
    }

    struct Group {
        parts: Vec<Rc<dyn Shape>>,
    }

    impl Shape for Group {
        fn area(&self) -> f64 {
            self.parts.iter().map(|p| p.area()).sum()
        }

        fn scale(&self, factor: f64) {
            self.parts.iter().for_each(|p| p.scale(factor));
        }

        fn label(&self) -> String {
            "group".to_string()
        }
    }

    pub fn shape_registry() -> Rc<FactoryRegistry> {
        let shapes = Factory::<dyn Shape>::new("Shape")
            .add(
                "Circle",
                &[("radius", "double"), ("label", "string")],
                |members| {
                    let circle: Rc<dyn Shape> = Rc::new(Circle {
                        radius: Cell::new(members.get("radius")?),
                        label: members.get_or("label", "circle".to_string())?,
                    });
                    Ok(circle)
                },
            )
            .add("Group", &[("parts", "Shape[]")], |members| {
                let group: Rc<dyn Shape> = Rc::new(Group {
                    parts: members.get_or("parts", Vec::new())?,
                });
                Ok(group)
            });

        let mut registry = FactoryRegistry::new();
        registry
            .register(shapes)
            .expect("Shape is not a reserved type name");
        Rc::new(registry)
    }

    fn create(source: &str) -> Result<Rc<dyn Shape>> {
        let env = Environment::with_factories(shape_registry());
        let mut stream = TokenStream::new(source)?;
        let factory = env.factories().factory::<dyn Shape>();
        factory
            .ok_or_else(|| Error::UnknownType {
                type_name: "Shape".to_string(),
            })?
            .create(&mut stream, &env)
    }

    #[test]
    fn test_create_with_members() -> Result<()> {
        let circle = create(r#"Circle(radius(2), label("c"))"#)?;
        assert_eq!(circle.area(), 12.0);
        assert_eq!(circle.label(), "c");

        let circle = create("Circle(radius(1.0))")?;
        assert_eq!(circle.label(), "circle");
        Ok(())
    }

    #[test]
    fn test_nested_specs() -> Result<()> {
        let group = create("Group(parts({Circle(radius(1)), Circle(radius(2))}))")?;
        assert_eq!(group.area(), 15.0);
        assert_eq!(create("Group()")?.area(), 0.0);
        Ok(())
    }

    #[test]
    fn test_missing_required_member() {
        assert!(matches!(
            create("Circle(label(\"x\"))"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_bad_specs() {
        assert!(matches!(
            create("Square(side(1))"),
            Err(Error::UnknownType { .. })
        ));
        assert!(matches!(
            create("Circle(diameter(1))"),
            Err(Error::Syntax { .. })
        ));
        assert!(matches!(
            create("Circle(radius(1) label(\"x\"))"),
            Err(Error::Syntax { .. })
        ));
        assert!(matches!(create("Circle radius"), Err(Error::Syntax { .. })));
        assert!(matches!(create("42"), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_registry_lookup_and_print() -> Result<()> {
        let registry = shape_registry();
        assert_eq!(registry.base_type_of("Circle"), Some("Shape"));
        assert_eq!(registry.base_type_of("Shape"), None);
        assert_eq!(registry.base_names().collect::<Vec<_>>(), vec!["Shape"]);
        assert!(registry.factory::<dyn Shape>().is_some());
        assert!(registry.factory::<dyn std::fmt::Debug>().is_none());

        let mut out = Vec::new();
        registry.print(&mut out)?;
        assert_eq!(String::from_utf8_lossy(&out), "Shape: Circle, Group\n");
        Ok(())
    }

    #[test]
    fn test_reserved_base_names() -> Result<()> {
        let unit = |_: &Members| -> Result<Rc<dyn Shape>> {
            let empty: Rc<dyn Shape> = Rc::new(Group { parts: Vec::new() });
            Ok(empty)
        };

        let mut registry = FactoryRegistry::new();
        for base_name in ["int", "string[]", "Shape[]"] {
            let factory = Factory::<dyn Shape>::new(base_name).add("Empty", &[], unit);
            assert!(matches!(
                registry.register(factory),
                Err(Error::DuplicateType { type_name }) if type_name == base_name
            ));
        }
        registry.register(Factory::<dyn Shape>::new("Shape").add("Empty", &[], unit))?;
        assert!(matches!(
            registry.register(Factory::<dyn Shape>::new("Shape").add("Other", &[], unit)),
            Err(Error::DuplicateType { .. })
        ));
        assert!(matches!(
            registry.register(Factory::<dyn std::fmt::Debug>::new("Debug").add(
                "Empty",
                &[],
                |_| Ok(Rc::new(0) as Rc<dyn std::fmt::Debug>)
            )),
            Err(Error::DuplicateType { type_name }) if type_name == "Empty"
        ));
        assert_eq!(registry.base_names().collect::<Vec<_>>(), vec!["Shape"]);

        let mut env = Environment::with_factories(Rc::new(registry));
        let mut stream = TokenStream::new("7")?;
        env.read_and_set("n", &mut stream, "int")?;
        assert_eq!(env.get::<i32>("n")?, 7);
        assert_eq!(env.get_var_map_for_type("int").map(|m| m.is_primitive()), Some(true));
        Ok(())
    }
}
