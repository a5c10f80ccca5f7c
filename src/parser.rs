use crate::builder::{ProgramBuilder, LABEL_CALL};
use crate::error::{AsmError, Result};
use crate::ir::{Operand, Program};

#[derive(Debug, Clone)]
pub struct Token {
    pub content: String,
    pub line: usize,
    pub col: usize,
}

impl Token {
    fn is_punct(&self, c: char) -> bool {
        self.content.len() == 1 && self.content.starts_with(c)
    }
}

/// Line-oriented assembly front-end.
///
/// ```text
/// # comments start with '#' or ';'
///         mov cx, 3
/// top:    inc ax, 2
///         dec cx
///         cmp cx, 0
///         jg top
/// label done
/// ```
///
/// Each statement is handed to [`ProgramBuilder::call`], so unknown mnemonics
/// go through the builder's permissive fallback instead of failing here.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    builder: ProgramBuilder,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            tokens: Vec::new(),
            pos: 0,
            builder: ProgramBuilder::new(),
        }
    }

    fn tokenize(source: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut start_col = 1;

        for (line_idx, text) in source.lines().enumerate() {
            let line = line_idx + 1;
            for (col_idx, c) in text.chars().enumerate() {
                let col = col_idx + 1;

                if c == '#' || c == ';' {
                    // Comment: rest of the line
                    break;
                }

                if c.is_whitespace() || c == ',' || c == ':' {
                    if !current.is_empty() {
                        tokens.push(Token {
                            content: std::mem::take(&mut current),
                            line,
                            col: start_col,
                        });
                    }
                    if !c.is_whitespace() {
                        tokens.push(Token {
                            content: c.to_string(),
                            line,
                            col,
                        });
                    }
                } else {
                    if current.is_empty() {
                        start_col = col;
                    }
                    current.push(c);
                }
            }
            if !current.is_empty() {
                tokens.push(Token {
                    content: std::mem::take(&mut current),
                    line,
                    col: start_col,
                });
            }
        }
        tokens
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Next token, but only if it sits on `line`.
    fn peek_on_line(&self, line: usize) -> Option<&Token> {
        self.peek().filter(|t| t.line == line)
    }

    fn error(token: &Token, message: impl Into<String>) -> AsmError {
        AsmError::ParseError {
            line: token.line,
            col: token.col,
            message: message.into(),
        }
    }

    fn parse_operand(token: &Token) -> Result<Operand> {
        if let Ok(num) = token.content.parse::<i64>() {
            return Ok(Operand::Imm(num));
        }
        if is_identifier(&token.content) {
            Ok(Operand::Sym(token.content.clone()))
        } else {
            Err(Self::error(
                token,
                format!("invalid operand '{}'", token.content),
            ))
        }
    }

    pub fn parse(&mut self, source: &str) -> Result<Program> {
        self.tokens = Self::tokenize(source);
        self.pos = 0;
        self.builder = ProgramBuilder::new();

        while self.peek().is_some() {
            self.parse_statement()?;
        }

        Ok(std::mem::take(&mut self.builder).build())
    }

    /// Calls the last parse dropped through the permissive fallback.
    pub fn ignored(&self) -> usize {
        self.builder.ignored()
    }

    fn parse_statement(&mut self) -> Result<()> {
        let Some(head) = self.consume() else {
            return Ok(());
        };

        if !is_identifier(&head.content) {
            return Err(Self::error(
                &head,
                format!("expected mnemonic or label, found '{}'", head.content),
            ));
        }

        // Label: `name:`
        if self.peek_on_line(head.line).is_some_and(|t| t.is_punct(':')) {
            self.consume();
            self.builder.label(&head.content);
            return Ok(());
        }

        let operands = self.parse_operands(head.line)?;
        if head.content == LABEL_CALL && operands.len() != 1 {
            return Err(Self::error(&head, "label expects exactly one name"));
        }
        self.builder.call(&head.content, operands);
        Ok(())
    }

    fn next_on_line(&mut self, line: usize) -> Option<Token> {
        self.peek_on_line(line)?;
        self.consume()
    }

    // operand {, operand} up to the end of the line
    fn parse_operands(&mut self, line: usize) -> Result<Vec<Operand>> {
        let mut operands = Vec::new();
        while let Some(t) = self.next_on_line(line) {
            // A label after operands (`jmp x  y:`) is not supported.
            if t.is_punct(',') || t.is_punct(':') {
                return Err(Self::error(&t, format!("unexpected '{}'", t.content)));
            }
            operands.push(Self::parse_operand(&t)?);

            match self.next_on_line(line) {
                None => break,
                Some(sep) if sep.is_punct(',') => {
                    if self.peek_on_line(line).is_none() {
                        return Err(Self::error(&sep, "expected operand after ','"));
                    }
                }
                Some(other) => {
                    return Err(Self::error(
                        &other,
                        format!("expected ',' before '{}'", other.content),
                    ));
                }
            }
        }
        Ok(operands)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Parses `source` into a program.
pub fn parse(source: &str) -> Result<Program> {
    Parser::new().parse(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::ir::Opcode;

    fn run_source(source: &str) -> [i64; 4] {
        let program = parse(source).expect("Parsing failed");
        Engine::new(&program).run().expect("Run failed").registers.into()
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = Parser::tokenize("  mov ax, -5 # set\nloop: inc bx");
        let got: Vec<(&str, usize, usize)> = tokens
            .iter()
            .map(|t| (t.content.as_str(), t.line, t.col))
            .collect();
        assert_eq!(
            got,
            vec![
                ("mov", 1, 3),
                ("ax", 1, 7),
                (",", 1, 9),
                ("-5", 1, 11),
                ("loop", 2, 1),
                (":", 2, 5),
                ("inc", 2, 7),
                ("bx", 2, 11),
            ]
        );
    }

    #[test]
    fn test_parse_and_run() {
        let script = "
            mov ax, 5
            mov bx, ax
            inc bx
            cmp bx, 6
        ";
        assert_eq!(run_source(script), [5, 6, 0, 0]);
    }

    #[test]
    fn test_loop_sum() {
        // ax = 10 + 9 + ... + 1
        let script = "
            mov cx, 10
        top:
            inc ax, cx
            dec cx
            cmp cx, 0
            jg top
        ";
        assert_eq!(run_source(script), [55, 0, 0, 0]);
    }

    #[test]
    fn test_label_forms() {
        let program = parse("label a\n inc ax\nb: inc bx ; trailing\nlabel c").unwrap();
        assert_eq!(program.label("a"), Some(0));
        assert_eq!(program.label("b"), Some(1));
        assert_eq!(program.label("c"), Some(2));
        assert_eq!(program.instructions()[1].op, Opcode::Inc);
    }

    #[test]
    fn test_label_and_instruction_on_one_line() {
        let program = parse("start: mov ax, 1\njmp start").unwrap();
        assert_eq!(program.label("start"), Some(0));
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_unknown_mnemonic_is_ignored() {
        let mut parser = Parser::new();
        let program = parser.parse("mov ax, 1\nmvo ax, 2\nnop\ninc ax").unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(parser.ignored(), 2);
        assert_eq!(Engine::new(&program).run().unwrap().registers.ax, 2);
    }

    #[test]
    fn test_operands_are_not_validated_at_parse_time() {
        let program = parse("mov ex, 1\ncmp ax").unwrap();
        assert_eq!(program.len(), 2);
        assert!(Engine::new(&program).run().is_err());
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            ("mov ax 5", 1, 8),
            ("mov ax,", 1, 7),
            ("mov , ax", 1, 5),
            ("\n  5 ax", 2, 3),
            ("inc ax, 1x", 1, 9),
            ("label", 1, 1),
            ("label a, b", 1, 1),
        ];
        for (source, line, col) in cases {
            match parse(source) {
                Err(AsmError::ParseError {
                    line: l, col: c, ..
                }) => assert_eq!((l, c), (line, col), "{:?}", source),
                other => panic!("expected parse error for {:?}, got {:?}", source, other),
            }
        }
    }
}
