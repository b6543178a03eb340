use super::keywords::Keyword;
use crate::config::ProviderOptions;
use crate::error::ProviderError;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Replaces a non-empty password in anything that may be logged.
pub const PASSWORD_MASK: &str = "***";

/// A fully resolved set of connection keywords, in the order they were first seen.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    entries: Vec<(Keyword, String)>,
}

impl ConnectionDescriptor {
    /// Parse `raw`, then apply every `builder:` option on top of it.
    pub fn build(raw: &str, options: &ProviderOptions<'_>) -> Result<Self, ProviderError> {
        let mut descriptor = Self::parse(raw)?;
        for (keyword, value) in options.builder_overrides() {
            descriptor.set(keyword.parse()?, value);
        }
        Ok(descriptor)
    }

    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        if raw.trim().is_empty() {
            return Err(ProviderError::configuration(
                "connection string is missing; set `connection_string` in the provider configuration",
            ));
        }

        let mut descriptor = Self {
            entries: Vec::new(),
        };
        for (key, value) in parse_pairs(raw)? {
            descriptor.set(key.parse()?, value);
        }
        Ok(descriptor)
    }

    fn set(&mut self, keyword: Keyword, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == keyword) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((keyword, value)),
        }
    }

    pub fn get(&self, keyword: Keyword) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == keyword)
            .map(|(_, v)| v.as_str())
    }

    pub fn host(&self) -> Option<&str> {
        self.get(Keyword::Host)
    }

    pub fn database(&self) -> Option<&str> {
        self.get(Keyword::Database)
    }

    pub fn username(&self) -> Option<&str> {
        self.get(Keyword::Username)
    }

    pub fn password(&self) -> Option<&str> {
        self.get(Keyword::Password)
    }

    pub fn keywords(&self) -> impl Iterator<Item = (Keyword, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Copy with the password masked; every other keyword is untouched.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if self.password().is_some_and(|p| !p.is_empty()) {
            copy.set(Keyword::Password, PASSWORD_MASK);
        }
        copy
    }

    pub fn to_connection_string(&self) -> String {
        self.entries
            .iter()
            .map(|(keyword, value)| format!("{}={}", keyword, quote_value(value)))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectionDescriptor")
            .field(&self.redacted().to_connection_string())
            .finish()
    }
}

fn quote_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value.contains([';', '=', '"', '\'']);
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split `key=value;key='quoted;value'` into raw pairs. Keys are not yet resolved.
fn parse_pairs(raw: &str) -> Result<Vec<(String, String)>, ProviderError> {
    let mut pairs = Vec::new();
    let mut chars = raw.chars().peekable();

    loop {
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            key.push(c);
            chars.next();
        }

        match chars.next() {
            Some('=') => {}
            end => {
                if !key.trim().is_empty() {
                    return Err(ProviderError::configuration(format!(
                        "connection string segment `{}` is not of the form key=value",
                        key.trim()
                    )));
                }
                if end.is_none() {
                    break;
                }
                continue;
            }
        }

        let key = key.trim();
        if key.is_empty() {
            return Err(ProviderError::configuration(
                "connection string contains a value without a keyword",
            ));
        }

        skip_whitespace(&mut chars);
        let value = match chars.peek() {
            Some(&quote) if quote == '"' || quote == '\'' => {
                chars.next();
                read_quoted(&mut chars, quote, key)?
            }
            _ => chars
                .by_ref()
                .take_while(|c| *c != ';')
                .collect::<String>()
                .trim()
                .to_string(),
        };
        pairs.push((key.to_string(), value));
    }

    Ok(pairs)
}

fn read_quoted(
    chars: &mut Peekable<Chars<'_>>,
    quote: char,
    key: &str,
) -> Result<String, ProviderError> {
    let mut value = String::new();
    loop {
        match chars.next() {
            Some(c) if c == quote => {
                if chars.peek() == Some(&quote) {
                    chars.next();
                    value.push(quote);
                } else {
                    break;
                }
            }
            Some(c) => value.push(c),
            None => {
                return Err(ProviderError::configuration(format!(
                    "unterminated quoted value for `{key}`"
                )));
            }
        }
    }

    skip_whitespace(chars);
    match chars.next() {
        None | Some(';') => Ok(value),
        Some(c) => Err(ProviderError::configuration(format!(
            "unexpected `{c}` after quoted value for `{key}`"
        ))),
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptionEntry;

    const BASE: &str = "Host=db;Database=jf;Username=u;Password=p";

    fn build(raw: &str, pairs: &[(&str, &str)]) -> Result<ConnectionDescriptor, ProviderError> {
        let entries: Vec<_> = pairs.iter().map(|(k, v)| OptionEntry::new(*k, *v)).collect();
        ConnectionDescriptor::build(raw, &ProviderOptions::new(&entries))
    }

    #[test]
    fn parses_plain_keywords() {
        let d = build(BASE, &[]).unwrap();
        assert_eq!(d.host(), Some("db"));
        assert_eq!(d.database(), Some("jf"));
        assert_eq!(d.username(), Some("u"));
        assert_eq!(d.password(), Some("p"));
        assert_eq!(d.to_connection_string(), BASE);
    }

    #[test]
    fn blank_connection_string_is_rejected() {
        for raw in ["", "   ", "\t\n"] {
            let err = build(raw, &[]).unwrap_err();
            assert!(matches!(err, ProviderError::Configuration(_)), "{raw:?}");
        }
    }

    #[test]
    fn quoted_values_and_synonyms() {
        let d = build(
            r#"server = db ; User Id='o''brien'; PWD="a;b=""c"""; db=jf;;"#,
            &[],
        )
        .unwrap();
        assert_eq!(d.host(), Some("db"));
        assert_eq!(d.username(), Some("o'brien"));
        assert_eq!(d.password(), Some(r#"a;b="c""#));
        assert_eq!(d.database(), Some("jf"));
    }

    #[test]
    fn malformed_segments_are_configuration_errors() {
        for raw in ["Host=db;oops", "=value", "Host='open", "Host='a'b", "Bogus=1"] {
            let err = build(raw, &[]).unwrap_err();
            assert!(matches!(err, ProviderError::Configuration(_)), "{raw:?}");
        }
    }

    #[test]
    fn builder_overrides_replace_and_append_in_order() {
        let d = build(
            BASE,
            &[
                ("builder:SearchPath", "public"),
                ("builder:host", "replica"),
                ("command-timeout", "60"),
                ("Builder:Search Path", "media,public"),
            ],
        )
        .unwrap();
        assert_eq!(d.host(), Some("replica"));
        assert_eq!(d.get(Keyword::SearchPath), Some("media,public"));
        assert_eq!(
            d.to_connection_string(),
            "Host=replica;Database=jf;Username=u;Password=p;Search Path=media,public"
        );
    }

    #[test]
    fn override_values_are_verbatim() {
        let d = build(BASE, &[("builder:Password", " spaced; out ")]).unwrap();
        assert_eq!(d.password(), Some(" spaced; out "));
    }

    #[test]
    fn unknown_override_keyword_fails() {
        let err = build(BASE, &[("builder:NoSuchThing", "1")]).unwrap_err();
        assert!(err.to_string().contains("NoSuchThing"));
    }

    #[test]
    fn reconstitution_is_idempotent() {
        let cases: &[(&str, &[(&str, &str)])] = &[
            (BASE, &[("builder:SearchPath", "public")]),
            ("Host=db;Password=", &[]),
            (r#"Host=db;Password='x"y;z'"#, &[("builder:Application Name", " lead")]),
            ("Server=db;Port=5433;SSL Mode=Require;Maximum Pool Size=20", &[]),
        ];
        for (raw, overrides) in cases {
            let first = build(raw, overrides).unwrap();
            let again = build(&first.to_connection_string(), &[]).unwrap();
            assert_eq!(first, again, "{raw}");
        }
    }

    #[test]
    fn redaction_only_touches_the_password() {
        let d = build(BASE, &[]).unwrap();
        let r = d.redacted();
        assert_eq!(r.host(), d.host());
        assert_eq!(r.database(), d.database());
        assert_eq!(r.username(), d.username());
        assert_eq!(r.password(), Some(PASSWORD_MASK));

        let no_password = build("Host=db;Username=u", &[]).unwrap();
        assert_eq!(no_password.redacted().password(), None);

        let empty_password = build("Host=db;Password=", &[]).unwrap();
        assert_eq!(empty_password.redacted().password(), Some(""));
    }

    #[test]
    fn debug_output_is_redacted() {
        let d = build(BASE, &[("builder:Password", "s3cret")]).unwrap();
        let out = format!("{d:?}");
        assert!(out.contains("Password=***"));
        assert!(!out.contains("s3cret"));
    }
}
