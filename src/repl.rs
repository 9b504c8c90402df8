use nu_ansi_term::{Color, Style};
use reedline::{
    Highlighter, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    StyledText, ValidationResult, Validator,
};
use std::borrow::Cow;

use crate::tokenizer::{tokenize, TokenKind};

#[derive(Clone)]
pub struct REPLPrompt;

impl Prompt for REPLPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("specenv")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed("❯ ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("  ... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

/// Keeps reading lines while a brace, paren, bracket or string is open.
pub struct REPLValidator;

impl Validator for REPLValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        if line.trim_end().is_empty() {
            return ValidationResult::Complete;
        }

        let mut delimiters = Vec::new();
        let mut in_string = false;
        let mut escaped = false;

        for c in line.chars() {
            if in_string {
                match c {
                    '\\' if !escaped => escaped = true,
                    '"' if !escaped => in_string = false,
                    _ => escaped = false,
                }
                continue;
            }

            match c {
                '"' => in_string = true,
                '{' | '(' | '[' => delimiters.push(c),
                '}' | ')' | ']' => {
                    let open = match c {
                        '}' => '{',
                        ')' => '(',
                        _ => '[',
                    };
                    if delimiters.pop() != Some(open) {
                        return ValidationResult::Complete;
                    }
                }
                _ => (),
            }
        }

        if in_string || !delimiters.is_empty() {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Complete
        }
    }
}

pub static KEYWORD_COLOR: Color = Color::LightBlue;
pub static LITERAL_COLOR: Color = Color::Yellow;
pub static DEFAULT_COLOR: Color = Color::White;
pub static OPERATOR_COLOR: Color = Color::DarkGray;

pub struct SyntaxHighlighter;

impl Highlighter for SyntaxHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();

        let tokens = match tokenize(line.as_bytes()) {
            Ok(t) => t,
            Err(_) => {
                styled_text.push((Style::new().fg(DEFAULT_COLOR), line.to_string()));
                return styled_text;
            }
        };

        let mut cursor = 0;

        for token in tokens {
            if token.kind == TokenKind::EOF {
                break;
            }

            if token.start > cursor {
                styled_text.push((
                    Style::new().fg(DEFAULT_COLOR),
                    line[cursor..token.start].to_string(),
                ));
            }

            let color = match token.kind {
                TokenKind::True | TokenKind::False => KEYWORD_COLOR,
                TokenKind::String(_) | TokenKind::Integer(_) | TokenKind::Float(_) => {
                    LITERAL_COLOR
                }
                TokenKind::Identifier(_) => DEFAULT_COLOR,
                _ => OPERATOR_COLOR,
            };

            styled_text.push((
                Style::new().fg(color),
                line[token.start..token.end].to_string(),
            ));
            cursor = token.end;
        }

        if cursor < line.len() {
            styled_text.push((Style::new().fg(DEFAULT_COLOR), line[cursor..].to_string()));
        }

        styled_text
    }
}
