//! KiCad-style layout for S-expression trees.
//!
//! Lists made only of atoms stay on one line, lists with list children put
//! each child on its own tab-indented line, and a few short-form tokens
//! (`stroke`, `font`, ...) are always written on a single line the way KiCad
//! writes them. `(pts ...)` keeps all its `xy` points on one indented line.

use crate::{Sexpr, SexprKind};

/// Tokens KiCad keeps on a single line regardless of nesting.
const SHORT_FORM_TOKENS: &[&str] = &[
    "font", "stroke", "fill", "teardrop", "offset", "rotate", "scale", "margins",
];

/// Format a tree into KiCad's layout. The returned string ends with a newline.
pub fn format_tree(sexpr: &Sexpr) -> String {
    let mut out = String::new();
    write_node(sexpr, 0, &mut out);
    out.push('\n');
    out
}

fn write_node(node: &Sexpr, depth: usize, out: &mut String) {
    let SexprKind::List(items) = &node.kind else {
        write_atom(node, out);
        return;
    };

    let has_list_child = items.iter().any(Sexpr::is_list);
    let short_form = node.tag().is_some_and(|tag| SHORT_FORM_TOKENS.contains(&tag));

    if !has_list_child || short_form {
        write_compact(node, out);
        return;
    }

    let head_len = items.iter().take_while(|item| !item.is_list()).count();
    out.push('(');
    for (idx, item) in items[..head_len].iter().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        write_atom(item, out);
    }

    if node.tag() == Some("pts") {
        newline(depth + 1, out);
        for (idx, item) in items[head_len..].iter().enumerate() {
            if idx > 0 {
                out.push(' ');
            }
            write_compact(item, out);
        }
    } else {
        for item in &items[head_len..] {
            newline(depth + 1, out);
            write_node(item, depth + 1, out);
        }
    }

    newline(depth, out);
    out.push(')');
}

fn newline(depth: usize, out: &mut String) {
    out.push('\n');
    out.extend(std::iter::repeat_n('\t', depth));
}

fn write_compact(node: &Sexpr, out: &mut String) {
    match &node.kind {
        SexprKind::List(items) => {
            out.push('(');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(' ');
                }
                write_compact(item, out);
            }
            out.push(')');
        }
        _ => write_atom(node, out),
    }
}

fn write_atom(node: &Sexpr, out: &mut String) {
    match &node.kind {
        SexprKind::Symbol(s) => out.push_str(s),
        SexprKind::String(s) => out.push_str(&quote_string(s)),
        SexprKind::Int(n) => match node.raw_atom.as_deref() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&n.to_string()),
        },
        SexprKind::F64(f) => match node.raw_atom.as_deref() {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&format_float(*f)),
        },
        SexprKind::List(_) => write_compact(node, out),
    }
}

/// Quote a string value, escaping special characters.
pub fn quote_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

/// Board coordinates are millimetres with nanometre resolution.
pub fn format_float(value: f64) -> String {
    let mut s = format!("{value:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" || s.is_empty() {
        return "0".to_string();
    }
    s
}
