use log::debug;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::{syntax_error, Result};
use crate::factory::FactoryRegistry;
use crate::tokenizer::{TokenKind, TokenStream};

/// Evaluates statements of the form `[type] name = value;`, binding each
/// variable in its [`Environment`].
#[derive(Default)]
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factories(factories: Rc<FactoryRegistry>) -> Self {
        Self {
            env: Environment::with_factories(factories),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn eval_file(&mut self, path: &Path) -> Result<()> {
        let source = fs::read_to_string(path)?;
        self.eval_str(&source)
    }

    pub fn eval_str(&mut self, source: &str) -> Result<()> {
        let mut stream = TokenStream::new(source)?;
        self.eval_tokens(&mut stream)
    }

    pub fn eval_tokens(&mut self, stream: &mut TokenStream) -> Result<()> {
        while stream.has_next() {
            self.eval_statement(stream)?;
        }
        Ok(())
    }

    fn eval_statement(&mut self, stream: &mut TokenStream) -> Result<()> {
        let declared_type = if stream.peek_second().kind == TokenKind::Equal {
            String::new()
        } else {
            parse_type(stream)?
        };

        let name_token = stream.next();
        let Some(varname) = name_token.identifier() else {
            return syntax_error(
                format!("expected variable name but found \"{}\"", name_token.kind),
                name_token.start,
            );
        };

        stream.expect(TokenKind::Equal)?;
        debug!(
            "Interpreter::eval_statement: {} {} at stream position {}",
            if declared_type.is_empty() { "<inferred>" } else { declared_type.as_str() },
            varname,
            stream.peek_token_start()
        );
        self.env.read_and_set(varname, stream, &declared_type)?;
        stream.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    pub fn get<T: 'static>(&self, varname: &str) -> Result<T> {
        self.env.get(varname)
    }

    pub fn print_env(&self, out: &mut dyn Write) -> Result<()> {
        self.env.print(out)
    }

    pub fn print_factories(&self, out: &mut dyn Write) -> Result<()> {
        self.env.print_factories(out)
    }
}

fn parse_type(stream: &mut TokenStream) -> Result<String> {
    let token = stream.next();
    let Some(name) = token.identifier() else {
        return syntax_error(
            format!("expected type name but found \"{}\"", token.kind),
            token.start,
        );
    };

    let mut type_name = name.to_string();
    if stream.peek().kind == TokenKind::LeftSquare {
        stream.next();
        stream.expect(TokenKind::RightSquare)?;
        type_name.push_str("[]");
    }
    Ok(type_name)
}
