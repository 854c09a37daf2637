//! Portable placeholder substitution.
//!
//! Statements are written with `?` for every positional parameter. Before a
//! statement reaches a session, each `?` outside of quoted literals and
//! quoted identifiers is replaced with the driver's native placeholder.

use std::borrow::Cow;

use crate::driver::Driver;

/// Rewrite the `?` placeholders of `sql` using `driver`'s native syntax.
///
/// Returns the input unchanged (borrowed) when it has no placeholder or
/// when the driver's placeholder is `?` itself.
pub fn substitute_placeholders<'a>(driver: &dyn Driver, sql: &'a str) -> Cow<'a, str> {
    if !sql.contains('?') || driver.placeholder(1) == "?" {
        return Cow::Borrowed(sql);
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut quote: Option<char> = None;
    let mut index = 0;
    for ch in sql.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                out.push(ch);
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '?' => {
                    index += 1;
                    out.push_str(&driver.placeholder(index));
                }
                _ => out.push(ch),
            },
        }
    }
    Cow::Owned(out)
}
