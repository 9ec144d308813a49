//! Small helpers for emitting Python source text.

use std::collections::{BTreeMap, BTreeSet};

const INDENT: &str = "    ";
const MAX_IMPORT_LINE: usize = 88;
const STDLIB: &[&str] = &["datetime", "decimal", "typing", "uuid"];

/// Line-oriented writer that tracks indentation.
#[derive(Debug, Default)]
pub struct PythonWriter {
    out: String,
    depth: usize,
}

impl PythonWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str(INDENT);
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
        self
    }

    pub fn lines<I, S>(&mut self, lines: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.line(line);
        }
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.depth += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self
    }

    pub fn docstring(&mut self, text: &str) -> &mut Self {
        let mut parts = text.lines();
        match (parts.next(), parts.next()) {
            (Some(only), None) => self.line(format!("\"\"\"{}\"\"\"", only)),
            _ => {
                self.line("\"\"\"");
                self.lines(text.lines());
                self.line("\"\"\"")
            }
        }
    }

    /// `name(\n    arg,\n    ...\n)` with a trailing `suffix` after the closing paren.
    pub fn call(&mut self, head: &str, args: &[String], suffix: &str) -> &mut Self {
        self.line(format!("{}(", head));
        self.indent();
        for arg in args {
            self.line(format!("{},", arg));
        }
        self.dedent();
        self.line(format!("){}", suffix))
    }

    pub fn finish(self) -> String {
        let mut out = self.out;
        while out.ends_with("\n\n") {
            out.pop();
        }
        out
    }
}

/// Import statements, grouped standard library / third party / project.
#[derive(Debug, Default)]
pub struct Imports {
    modules: BTreeSet<String>,
    names: BTreeMap<String, BTreeSet<String>>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(&mut self, module: &str) -> &mut Self {
        self.modules.insert(module.to_string());
        self
    }

    pub fn from(&mut self, module: &str, name: &str) -> &mut Self {
        self.names
            .entry(module.to_string())
            .or_default()
            .insert(name.to_string());
        self
    }

    pub fn from_many(&mut self, module: &str, names: &[&str]) -> &mut Self {
        for name in names {
            self.from(module, name);
        }
        self
    }

    pub fn maybe(&mut self, import: Option<(&str, &str)>) -> &mut Self {
        if let Some((module, name)) = import {
            self.from(module, name);
        }
        self
    }

    pub fn render(&self) -> Vec<String> {
        let mut groups: [Vec<String>; 3] = Default::default();

        for module in &self.modules {
            groups[group_of(module)].push(format!("import {}", module));
        }
        for (module, names) in &self.names {
            let joined = names.iter().cloned().collect::<Vec<_>>().join(", ");
            let single = format!("from {} import {}", module, joined);
            let group = &mut groups[group_of(module)];

            if single.len() <= MAX_IMPORT_LINE {
                group.push(single);
            } else {
                group.push(format!("from {} import (", module));
                group.extend(names.iter().map(|name| format!("{}{},", INDENT, name)));
                group.push(")".to_string());
            }
        }

        let mut lines = Vec::new();
        for group in groups.into_iter().filter(|group| !group.is_empty()) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(group);
        }
        lines
    }
}

fn group_of(module: &str) -> usize {
    let root = module.split('.').next().unwrap_or(module);
    if STDLIB.contains(&root) {
        0
    } else if root == "app" || root == "tests" {
        2
    } else {
        1
    }
}

/// Double-quoted Python string literal.
pub fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
