//! Textual presentations of sets and maps.
//!
//! The notation follows the usual polyhedral style:
//!
//! ```text
//! [N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }
//! [N]    -> { S[i, j] -> [0, i, 0, j, 0] : 0 <= i < N }
//! ```
//!
//! Output tuple entries are either fresh dimension names or affine
//! expressions over the already-known names (which pin the dimension with
//! an equality). Constraints support chained comparisons (`0 <= i < N`).
//! Identifiers that were never declared are rejected.

use crate::error::{Error, Result};
use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::map::Map;
use crate::polyhedral::set::Set;
use crate::polyhedral::space::Space;

/// Split a string on a delimiter, exclusive, always producing at least
/// one token (possibly empty).
pub fn split_string(s: &str, delimiter: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = s;
    while let Some(pos) = rest.find(delimiter) {
        out.push(rest[..pos].to_string());
        rest = &rest[pos + delimiter.len()..];
    }
    out.push(rest.to_string());
    out
}

/// Split a constraint list on `and`.
pub fn split_constraints(s: &str) -> Vec<String> {
    split_string(s, "and")
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Split a dimension list on `,`, stripping leading `name=` assignments.
pub fn split_dimensions(s: &str) -> Vec<String> {
    split_string(s, ",")
        .into_iter()
        .map(|mut t| {
            if let Some(pos) = t.find('=') {
                t = t[pos + 1..].to_string();
            }
            t.trim().to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse a set presentation.
pub fn parse_set(text: &str) -> Result<Set> {
    let (params, body) = strip_params_and_braces(text)?;
    let (tuples, constraints) = split_body(&body);
    if tuples.contains("->") {
        return Err(Error::poly(format!("expected a set, got a map: `{}`", text)));
    }
    let (tuple_name, dims) = parse_tuple(&tuples)?;

    let mut dim_names = Vec::new();
    for d in &dims {
        if !is_identifier(d) {
            return Err(Error::poly(format!("set dimension `{}` is not a name", d)));
        }
        dim_names.push(Some(d.clone()));
    }

    let mut space = Space::set(dims.len())
        .with_params(params)
        .with_out_dims(dim_names);
    if let Some(name) = tuple_name {
        space = space.with_out_tuple(name);
    }

    let mut set = Set::universe(space);
    let space_ref = set.space.clone();
    let resolver = move |name: &str| -> Option<usize> {
        space_ref
            .param_index(name)
            .or_else(|| space_ref.out_index(name).map(|i| space_ref.out_col(i)))
    };
    let rows = parse_constraint_rows(&constraints, set.space.n_cols(), &resolver)?;
    for row in rows {
        set.system.add(row);
    }
    Ok(set)
}

/// Parse a map presentation.
pub fn parse_map(text: &str) -> Result<Map> {
    let (params, body) = strip_params_and_braces(text)?;
    let (tuples, constraints) = split_body(&body);
    let halves = split_string(&tuples, "->");
    if halves.len() != 2 {
        return Err(Error::poly(format!("expected a map, got `{}`", text)));
    }
    let (in_name, in_dims) = parse_tuple(&halves[0])?;
    let (out_name, out_items) = parse_tuple(&halves[1])?;

    let mut in_names = Vec::new();
    for d in &in_dims {
        if !is_identifier(d) {
            return Err(Error::poly(format!("input dimension `{}` is not a name", d)));
        }
        in_names.push(Some(d.clone()));
    }

    // First pass over the output tuple: fresh identifiers become named
    // dimensions, everything else stays anonymous and is pinned below.
    let known_in = |name: &str, params: &[String]| {
        params.iter().any(|p| p == name) || in_dims.iter().any(|d| d == name)
    };
    let mut out_names: Vec<Option<String>> = Vec::with_capacity(out_items.len());
    for item in &out_items {
        if is_identifier(item) && !known_in(item, &params) {
            out_names.push(Some(item.clone()));
        } else {
            out_names.push(None);
        }
    }

    let mut space = Space::map(in_dims.len(), out_items.len())
        .with_params(params)
        .with_in_dims(in_names)
        .with_out_dims(out_names);
    if let Some(name) = in_name {
        space = space.with_in_tuple(name);
    }
    if let Some(name) = out_name {
        space = space.with_out_tuple(name);
    }

    let mut map = Map::universe(space);
    let space_ref = map.space.clone();
    let resolver = move |name: &str| -> Option<usize> {
        space_ref
            .param_index(name)
            .or_else(|| space_ref.in_index(name).map(|i| space_ref.in_col(i)))
            .or_else(|| space_ref.out_index(name).map(|i| space_ref.out_col(i)))
    };

    // Second pass: pin expression entries with equalities.
    let n_cols = map.space.n_cols();
    for (k, item) in out_items.iter().enumerate() {
        if map.space.out_dims[k].is_some() {
            continue;
        }
        let expr = parse_affine(item, n_cols, &resolver)?;
        let lhs = AffineExpr::var(map.space.out_col(k), n_cols);
        map.system.add(Constraint::eq(lhs, expr));
    }

    let rows = parse_constraint_rows(&constraints, n_cols, &resolver)?;
    for row in rows {
        map.system.add(row);
    }
    Ok(map)
}

fn strip_params_and_braces(text: &str) -> Result<(Vec<String>, String)> {
    let trimmed = text.trim();
    let brace = trimmed
        .find('{')
        .ok_or_else(|| Error::poly(format!("missing `{{` in `{}`", text)))?;
    let head = &trimmed[..brace];
    let params = if let Some(arrow) = head.find("->") {
        let plist = head[..arrow].trim();
        if !plist.starts_with('[') || !plist.ends_with(']') {
            return Err(Error::poly(format!("malformed parameter list `{}`", plist)));
        }
        let inner = &plist[1..plist.len() - 1];
        let names = split_dimensions(inner);
        for n in &names {
            if !is_identifier(n) {
                return Err(Error::poly(format!("parameter `{}` is not a name", n)));
            }
        }
        names
    } else if head.trim().is_empty() {
        Vec::new()
    } else {
        return Err(Error::poly(format!("unexpected prefix `{}`", head)));
    };

    let rest = &trimmed[brace + 1..];
    let close = rest
        .rfind('}')
        .ok_or_else(|| Error::poly(format!("missing `}}` in `{}`", text)))?;
    Ok((params, rest[..close].to_string()))
}

fn split_body(body: &str) -> (String, String) {
    match body.find(':') {
        Some(pos) => (body[..pos].to_string(), body[pos + 1..].to_string()),
        None => (body.to_string(), String::new()),
    }
}

fn parse_tuple(text: &str) -> Result<(Option<String>, Vec<String>)> {
    let trimmed = text.trim();
    let open = trimmed
        .find('[')
        .ok_or_else(|| Error::poly(format!("missing `[` in tuple `{}`", text)))?;
    if !trimmed.ends_with(']') {
        return Err(Error::poly(format!("missing `]` in tuple `{}`", text)));
    }
    let name = trimmed[..open].trim();
    let name = if name.is_empty() {
        None
    } else if is_identifier(name) {
        Some(name.to_string())
    } else {
        return Err(Error::poly(format!("tuple name `{}` is not a name", name)));
    };
    let inner = &trimmed[open + 1..trimmed.len() - 1];
    if inner.trim().is_empty() {
        return Ok((name, Vec::new()));
    }
    Ok((name, split_dimensions(inner)))
}

fn parse_constraint_rows(
    constraints: &str,
    n_cols: usize,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> Result<Vec<Constraint>> {
    let mut rows = Vec::new();
    if constraints.trim().is_empty() {
        return Ok(rows);
    }
    for piece in split_constraints(constraints) {
        rows.extend(parse_comparison_chain(&piece, n_cols, resolve)?);
    }
    Ok(rows)
}

/// One chained comparison, e.g. `0 <= i < N` or `o = i + 1`.
fn parse_comparison_chain(
    text: &str,
    n_cols: usize,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> Result<Vec<Constraint>> {
    // Split on comparison operators, longest first, keeping the operators.
    let mut parts: Vec<String> = Vec::new();
    let mut ops: Vec<&'static str> = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let next = if i + 1 < bytes.len() { bytes[i + 1] } else { 0 };
        let op: Option<(&'static str, usize)> = match bytes[i] {
            b'<' if next == b'=' => Some(("<=", 2)),
            b'>' if next == b'=' => Some((">=", 2)),
            b'=' if next == b'=' => Some(("=", 2)),
            b'<' => Some(("<", 1)),
            b'>' => Some((">", 1)),
            b'=' => Some(("=", 1)),
            _ => None,
        };
        if let Some((op, width)) = op {
            parts.push(text[start..i].to_string());
            ops.push(op);
            i += width;
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(text[start..].to_string());

    if ops.is_empty() {
        return Err(Error::poly(format!("`{}` is not a constraint", text)));
    }

    let exprs: Vec<AffineExpr> = parts
        .iter()
        .map(|p| parse_affine(p, n_cols, resolve))
        .collect::<Result<_>>()?;

    let mut rows = Vec::new();
    for (k, op) in ops.iter().enumerate() {
        let lhs = exprs[k].clone();
        let rhs = exprs[k + 1].clone();
        let row = match *op {
            "<=" => Constraint::le(lhs, rhs),
            "<" => {
                let mut e = rhs - lhs;
                e.constant -= 1;
                Constraint::ge_zero(e)
            }
            ">=" => Constraint::ge(lhs, rhs),
            ">" => {
                let mut e = lhs - rhs;
                e.constant -= 1;
                Constraint::ge_zero(e)
            }
            "=" => Constraint::eq(lhs, rhs),
            _ => unreachable!(),
        };
        rows.push(row);
    }
    Ok(rows)
}

/// Parse an affine expression over resolvable names. Supports `+`, `-`,
/// `*`, parentheses and implicit coefficients (`4i`).
pub(crate) fn parse_affine(
    text: &str,
    n_cols: usize,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> Result<AffineExpr> {
    let tokens = lex_affine(text)?;
    let mut pos = 0;
    let expr = parse_sum(&tokens, &mut pos, n_cols, resolve)?;
    if pos != tokens.len() {
        return Err(Error::poly(format!("trailing input in `{}`", text)));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(i64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Open,
    Close,
}

fn lex_affine(text: &str) -> Result<Vec<Tok>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '+' => {
                tokens.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Tok::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Tok::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::Close);
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<i64>()
                    .map_err(|_| Error::poly(format!("bad number `{}`", text)))?;
                tokens.push(Tok::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(Error::poly(format!("unexpected character `{}`", other)));
            }
        }
    }
    Ok(tokens)
}

fn parse_sum(
    tokens: &[Tok],
    pos: &mut usize,
    n_cols: usize,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> Result<AffineExpr> {
    let mut negate = false;
    if matches!(tokens.get(*pos), Some(Tok::Minus)) {
        negate = true;
        *pos += 1;
    } else if matches!(tokens.get(*pos), Some(Tok::Plus)) {
        *pos += 1;
    }
    let mut acc = parse_product(tokens, pos, n_cols, resolve)?;
    if negate {
        acc = -acc;
    }
    while let Some(tok) = tokens.get(*pos) {
        let minus = match tok {
            Tok::Plus => false,
            Tok::Minus => true,
            _ => break,
        };
        *pos += 1;
        let term = parse_product(tokens, pos, n_cols, resolve)?;
        acc = if minus { acc - term } else { acc + term };
    }
    Ok(acc)
}

fn parse_product(
    tokens: &[Tok],
    pos: &mut usize,
    n_cols: usize,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> Result<AffineExpr> {
    let mut acc = parse_atom(tokens, pos, n_cols, resolve)?;
    loop {
        match tokens.get(*pos) {
            Some(Tok::Star) => {
                *pos += 1;
            }
            // Implicit multiplication: `4i`, `2(...)`.
            Some(Tok::Ident(_)) | Some(Tok::Num(_)) | Some(Tok::Open) => {}
            _ => break,
        }
        let rhs = parse_atom(tokens, pos, n_cols, resolve)?;
        acc = match (acc.as_constant(), rhs.as_constant()) {
            (Some(k), _) => rhs.scale(k),
            (_, Some(k)) => acc.scale(k),
            _ => {
                return Err(Error::poly(
                    "product of two non-constant terms is not affine".to_string(),
                ))
            }
        };
    }
    Ok(acc)
}

fn parse_atom(
    tokens: &[Tok],
    pos: &mut usize,
    n_cols: usize,
    resolve: &dyn Fn(&str) -> Option<usize>,
) -> Result<AffineExpr> {
    match tokens.get(*pos) {
        Some(Tok::Num(v)) => {
            *pos += 1;
            Ok(AffineExpr::constant(*v, n_cols))
        }
        Some(Tok::Ident(name)) => {
            *pos += 1;
            let col = resolve(name)
                .ok_or_else(|| Error::poly(format!("unknown identifier `{}`", name)))?;
            Ok(AffineExpr::var(col, n_cols))
        }
        Some(Tok::Minus) => {
            *pos += 1;
            Ok(-parse_atom(tokens, pos, n_cols, resolve)?)
        }
        Some(Tok::Open) => {
            *pos += 1;
            let inner = parse_sum(tokens, pos, n_cols, resolve)?;
            match tokens.get(*pos) {
                Some(Tok::Close) => {
                    *pos += 1;
                    Ok(inner)
                }
                _ => Err(Error::poly("missing `)`".to_string())),
            }
        }
        other => Err(Error::poly(format!("unexpected token {:?}", other))),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_string() {
        assert_eq!(split_string("a,b,c", ","), vec!["a", "b", "c"]);
        assert_eq!(split_string("abc", ","), vec!["abc"]);
        assert_eq!(split_string("", ","), vec![""]);
    }

    #[test]
    fn test_split_constraints() {
        let parts = split_constraints("0 <= i and i < N");
        assert_eq!(parts, vec!["0 <= i", "i < N"]);
    }

    #[test]
    fn test_split_dimensions_strips_assignments() {
        let parts = split_dimensions("i, c0=j+1, k");
        assert_eq!(parts, vec!["i", "j+1", "k"]);
    }

    #[test]
    fn test_parse_set_with_params() {
        let set = parse_set("[N, M] -> { S[i, j] : 0 <= i < N and 0 <= j < M }").unwrap();
        assert_eq!(set.space.params, vec!["N", "M"]);
        assert_eq!(set.n_dim(), 2);
        assert!(set.contains(&[2, 3], &[4, 4]));
        assert!(!set.contains(&[4, 3], &[4, 4]));
    }

    #[test]
    fn test_parse_map_with_expressions() {
        let map = parse_map("{ S[i, j] -> [0, i, 0, j, 0] }").unwrap();
        assert_eq!(map.n_in(), 2);
        assert_eq!(map.n_out(), 5);
        assert_eq!(map.out_dim_constant(0), Some(0));
        assert_eq!(map.out_dim_constant(2), Some(0));
        assert_eq!(map.out_dim_constant(4), Some(0));
        assert!(map.system.is_satisfied(&[3, 5, 0, 3, 0, 5, 0]));
    }

    #[test]
    fn test_parse_map_named_outputs() {
        let map = parse_map("{ S[i] -> [o] : o = 2i + 1 }").unwrap();
        assert!(map.system.is_satisfied(&[3, 7]));
        assert!(!map.system.is_satisfied(&[3, 6]));
    }

    #[test]
    fn test_chained_comparison() {
        let set = parse_set("{ S[i] : 0 <= i < 10 }").unwrap();
        assert!(set.contains(&[9], &[]));
        assert!(!set.contains(&[10], &[]));
    }

    #[test]
    fn test_unknown_identifier_rejected() {
        let err = parse_set("{ S[i] : 0 <= q }").unwrap_err();
        assert!(format!("{}", err).contains("q"));
    }

    #[test]
    fn test_not_a_constraint_rejected() {
        assert!(parse_set("{ S[i] : i }").is_err());
    }
}
