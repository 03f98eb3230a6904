//! Placeholder substitution for command templates
//!
//! Supported tokens:
//!
//! - `%player%` — actor display name
//! - `%uuid%` — actor stable id
//! - `%args%` — all arguments joined by a single space
//! - `%arg[N]%` — the 0-indexed argument N
//!
//! Substitution is a single left-to-right pass: substituted values are
//! never scanned again, so argument text containing `%player%` stays
//! literal. Unrecognised `%...%` sequences are kept as written.
//!
//! An index past the end of the argument list resolves to an empty string,
//! as do actor tokens when the invocation has no actor.

use crate::types::Actor;

/// Resolve every placeholder token in `template`
pub fn resolve(template: &str, actor: Option<&Actor>, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let Some(end) = after.find('%') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        match substitute(&after[..end], actor, args) {
            Some(value) => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                // The closing '%' may open the next token
                out.push('%');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn substitute(token: &str, actor: Option<&Actor>, args: &[String]) -> Option<String> {
    match token {
        "player" => Some(actor.map(|a| a.name.clone()).unwrap_or_default()),
        "uuid" => Some(actor.map(|a| a.id.to_string()).unwrap_or_default()),
        "args" => Some(args.join(" ")),
        _ => {
            let digits = token.strip_prefix("arg[")?.strip_suffix(']')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            // An index too large for usize is past the end of any argument list
            let value = digits
                .parse::<usize>()
                .ok()
                .and_then(|index| args.get(index).cloned());
            Some(value.unwrap_or_default())
        }
    }
}
