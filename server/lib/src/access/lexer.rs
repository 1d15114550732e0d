//! A small cursor over ACI text shared by the target, permission and bind rule
//! decoders.

pub(crate) struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Cursor { src, pos: 0 }
    }

    pub(crate) fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub(crate) fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Consume `c` if it is next, after any whitespace.
    pub(crate) fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume `word` ignoring case if it is next, after any whitespace.
    pub(crate) fn eat_ci(&mut self, word: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        match rest.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => {
                self.pos += word.len();
                true
            }
            _ => false,
        }
    }

    /// As `eat_ci`, but the word must not be followed by another word character,
    /// so `and` does not consume the front of `andrew`.
    pub(crate) fn eat_word_ci(&mut self, word: &str) -> bool {
        let save = self.pos;
        if !self.eat_ci(word) {
            return false;
        }
        match self.peek() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-' => {
                self.pos = save;
                false
            }
            _ => true,
        }
    }

    pub(crate) fn take_while<F: Fn(char) -> bool>(&mut self, f: F) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !f(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Read a double quoted string. A backslash escapes the next character, and
    /// the escape is kept in the returned text so later decoders see it.
    pub(crate) fn read_quoted(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let mut chars = rest.char_indices();
        if chars.next()?.1 != '"' {
            return None;
        }
        let mut escaped = false;
        for (i, c) in chars {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                self.pos += i + 1;
                return Some(&rest[1..i]);
            }
        }
        None
    }

    /// Read a comparison operator, longest match first.
    pub(crate) fn read_operator(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        for op in ["!=", "<=", ">=", "=", "<", ">"] {
            if rest.starts_with(op) {
                self.pos += op.len();
                return Some(&rest[..op.len()]);
            }
        }
        None
    }

    /// Take text up to the next `stop` that is not inside double quotes. The stop
    /// character is not consumed.
    pub(crate) fn take_until_unquoted(&mut self, stop: char) -> Option<&'a str> {
        let rest = self.rest();
        let mut quoted = false;
        let mut escaped = false;
        for (i, c) in rest.char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                quoted = !quoted;
            } else if c == stop && !quoted {
                self.pos += i;
                return Some(&rest[..i]);
            }
        }
        None
    }
}
