pub mod cli;
pub mod environment;
pub mod error;
pub mod factory;
pub mod init;
pub mod interpreter;
pub mod repl;
pub mod stdlib;
pub mod tokenizer;
pub mod value;
pub mod var_map;
