//! Neutralising assertion statements in an entry-point script.
//!
//! Assertions written against one canonical parameter set abort runs under
//! swept parameters. Each assertion statement is replaced in place by an
//! inert statement at the same indentation; continuation lines become blank
//! so line numbers in tracebacks still match the original script.
//!
//! Only the assertion statement itself is replaced. Code after a top-level
//! `;` is kept, and lines inside strings, comments or open brackets never
//! start a statement.

/// Replace assertion statements in `source`.
///
/// Returns the patched source and the number of statements replaced.
pub fn strip_assertions(source: &str, keyword: &str, replacement: &str) -> (String, usize) {
    if keyword.is_empty() {
        return (source.to_string(), 0);
    }

    let mut patched = String::with_capacity(source.len());
    let mut replaced = 0;
    let mut lexer = Lexer::default();
    let mut in_assertion = false;
    let mut indent = String::new();

    for line in source.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        let mut pos = 0;
        let mut check_start = lexer.at_statement_start();
        let mut replaced_here = false;

        loop {
            if check_start && !in_assertion {
                let rest = &body[pos..];
                let code = rest.trim_start();
                if starts_statement(code, keyword) {
                    let ws = &rest[..rest.len() - code.len()];
                    if pos == 0 {
                        indent = ws.to_string();
                    }
                    patched.push_str(ws);
                    patched.push_str(replacement);
                    pos += ws.len();
                    replaced += 1;
                    in_assertion = true;
                    replaced_here = true;
                }
            }

            match lexer.advance(body, pos) {
                Some(semi) if in_assertion => {
                    pos = semi + 1;
                    if replaced_here {
                        patched.push(';');
                    } else {
                        // Statement ends on a continuation line; what follows keeps its indent.
                        patched.push_str(&indent);
                        pos += body[pos..].len() - body[pos..].trim_start().len();
                    }
                    in_assertion = false;
                    check_start = true;
                }
                Some(semi) => {
                    patched.push_str(&body[pos..=semi]);
                    pos = semi + 1;
                    check_start = true;
                }
                None => {
                    if in_assertion {
                        in_assertion = lexer.continues();
                    } else {
                        patched.push_str(&body[pos..]);
                    }
                    break;
                }
            }
        }

        patched.push_str(ending);
    }

    (patched, replaced)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn starts_statement(code: &str, keyword: &str) -> bool {
    let Some(rest) = code.strip_prefix(keyword) else {
        return false;
    };
    rest.chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || c == '(')
}

/// An open string literal.
#[derive(Debug, Clone, Copy)]
struct Quote {
    delim: u8,
    triple: bool,
}

/// Lexical state carried from one line to the next.
#[derive(Debug, Default)]
struct Lexer {
    depth: usize,
    quote: Option<Quote>,
    escaped: bool,
    backslash: bool,
}

impl Lexer {
    /// Whether the next line begins a new statement.
    const fn at_statement_start(&self) -> bool {
        self.depth == 0 && self.quote.is_none() && !self.backslash
    }

    /// Whether the statement being scanned runs onto the next line.
    const fn continues(&self) -> bool {
        !self.at_statement_start()
    }

    /// Scan `body[from..]`, stopping at a `;` outside strings and brackets.
    ///
    /// Returns the byte index of that `;`, or `None` once the line (or its
    /// trailing comment) is exhausted.
    fn advance(&mut self, body: &str, from: usize) -> Option<usize> {
        let bytes = body.as_bytes();
        let mut comment = false;
        let mut i = from;

        while i < bytes.len() {
            let b = bytes[i];

            if let Some(quote) = self.quote {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == quote.delim {
                    if !quote.triple {
                        self.quote = None;
                    } else if bytes[i..].starts_with(&[b, b, b]) {
                        self.quote = None;
                        i += 3;
                        continue;
                    }
                }
                i += 1;
                continue;
            }

            match b {
                b'"' | b'\'' => {
                    let triple = bytes[i..].starts_with(&[b, b, b]);
                    self.quote = Some(Quote { delim: b, triple });
                    i += if triple { 3 } else { 1 };
                    continue;
                }
                b'#' => {
                    comment = true;
                    break;
                }
                b'(' | b'[' | b'{' => self.depth += 1,
                b')' | b']' | b'}' => self.depth = self.depth.saturating_sub(1),
                b';' if self.depth == 0 => return Some(i),
                _ => {}
            }
            i += 1;
        }

        // Single-quoted strings end with the line unless the newline is escaped.
        if self.quote.is_some_and(|q| !q.triple) && !self.escaped {
            self.quote = None;
        }
        self.escaped = false;
        self.backslash = !comment && self.quote.is_none() && body.trim_end().ends_with('\\');
        None
    }
}
