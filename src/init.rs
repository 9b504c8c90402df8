use std::any::type_name;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{syntax_error, Error, Result};
use crate::tokenizer::{TokenKind, TokenStream};

/// Parses exactly one value of `Self` from the stream: a literal for the
/// primitive types, or a construction spec for object handles.
pub trait Initialize: Sized {
    fn init(stream: &mut TokenStream, env: &Environment) -> Result<Self>;
}

impl Initialize for bool {
    fn init(stream: &mut TokenStream, _env: &Environment) -> Result<Self> {
        let token = stream.next();
        match token.kind {
            TokenKind::True => Ok(true),
            TokenKind::False => Ok(false),
            other => syntax_error(
                format!("expected boolean literal but found \"{}\"", other),
                token.start,
            ),
        }
    }
}

impl Initialize for i32 {
    fn init(stream: &mut TokenStream, _env: &Environment) -> Result<Self> {
        let token = stream.next();
        match token.kind {
            TokenKind::Integer(n) => match i32::try_from(n) {
                Ok(n) => Ok(n),
                Err(_) => syntax_error(format!("integer {} out of range", n), token.start),
            },
            other => syntax_error(
                format!("expected integer literal but found \"{}\"", other),
                token.start,
            ),
        }
    }
}

impl Initialize for f64 {
    fn init(stream: &mut TokenStream, _env: &Environment) -> Result<Self> {
        let token = stream.next();
        match token.kind {
            TokenKind::Float(n) => Ok(n),
            TokenKind::Integer(n) => Ok(n as f64),
            other => syntax_error(
                format!("expected numeric literal but found \"{}\"", other),
                token.start,
            ),
        }
    }
}

impl Initialize for String {
    fn init(stream: &mut TokenStream, _env: &Environment) -> Result<Self> {
        let token = stream.next();
        match token.kind {
            TokenKind::String(s) => Ok(s),
            other => syntax_error(
                format!("expected string literal but found \"{}\"", other),
                token.start,
            ),
        }
    }
}

impl<B: ?Sized + 'static> Initialize for Rc<B> {
    fn init(stream: &mut TokenStream, env: &Environment) -> Result<Self> {
        let factory = env
            .factories()
            .factory::<B>()
            .ok_or_else(|| Error::UnknownType {
                type_name: type_name::<B>().to_string(),
            })?;
        factory.create(stream, env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_str<T: Initialize>(source: &str) -> Result<T> {
        let env = Environment::new();
        let mut stream = TokenStream::new(source)?;
        T::init(&mut stream, &env)
    }

    #[test]
    fn test_primitive_literals() -> Result<()> {
        assert!(init_str::<bool>("true")?);
        assert_eq!(init_str::<i32>("-17")?, -17);
        assert_eq!(init_str::<f64>("2.5")?, 2.5);
        assert_eq!(init_str::<f64>("3")?, 3.0);
        assert_eq!(init_str::<String>("\"abc\"")?, "abc");
        Ok(())
    }

    #[test]
    fn test_wrong_literal_kind() {
        assert!(matches!(init_str::<bool>("1"), Err(Error::Syntax { .. })));
        assert!(matches!(init_str::<i32>("1.5"), Err(Error::Syntax { .. })));
        assert!(matches!(init_str::<i32>("3000000000"), Err(Error::Syntax { .. })));
        assert!(matches!(init_str::<String>("abc"), Err(Error::Syntax { .. })));
        assert!(matches!(init_str::<f64>(""), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_handle_without_factory() {
        assert!(matches!(
            init_str::<Rc<dyn std::fmt::Debug>>("Thing()"),
            Err(Error::UnknownType { .. })
        ));
    }
}
