//! `importCommands` glob patterns.

/// Rewrite `a.b.c` to `a::b::c`; surrounding whitespace is dropped.
pub(crate) fn normalize(path: &str) -> String {
    path.trim()
        .split("::")
        .flat_map(|part| part.split('.'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("::")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment.
    One,
    /// `**`: any number of segments, including none.
    Any,
}

/// A parsed import pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPattern {
    segments: Vec<Segment>,
}

impl ImportPattern {
    pub fn parse(spec: &str) -> Self {
        let segments = normalize(spec)
            .split("::")
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "*" => Segment::One,
                "**" => Segment::Any,
                lit => Segment::Literal(lit.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// Does the pattern select a whole module?
    pub fn matches_module(&self, module: &str) -> bool {
        let parts: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
        glob(&self.segments, &parts)
    }

    /// Does the pattern select `module::command`?
    pub fn matches_command(&self, module: &str, command: &str) -> bool {
        let mut parts: Vec<&str> = module.split("::").filter(|s| !s.is_empty()).collect();
        parts.push(command);
        glob(&self.segments, &parts)
    }
}

fn glob(pattern: &[Segment], parts: &[&str]) -> bool {
    match pattern.split_first() {
        None => parts.is_empty(),
        Some((Segment::Any, rest)) => (0..=parts.len()).any(|skip| glob(rest, &parts[skip..])),
        Some((Segment::One, rest)) => !parts.is_empty() && glob(rest, &parts[1..]),
        Some((Segment::Literal(lit), rest)) => {
            parts.first().is_some_and(|p| *p == lit.as_str()) && glob(rest, &parts[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_accepts_both_separators() {
        assert_eq!(normalize("morphline.stdlib.fields"), "morphline::stdlib::fields");
        assert_eq!(normalize(" morphline::stdlib.* "), "morphline::stdlib::*");
    }

    #[test]
    fn test_double_star_matches_any_depth() {
        let p = ImportPattern::parse("morphline.**");
        assert!(p.matches_module("morphline"));
        assert!(p.matches_module("morphline::stdlib::fields"));
        assert!(!p.matches_module("other::stdlib"));
    }

    #[test]
    fn test_single_star_matches_one_segment() {
        let p = ImportPattern::parse("morphline.stdlib.*");
        assert!(p.matches_module("morphline::stdlib::grok"));
        assert!(!p.matches_module("morphline::stdlib"));
        assert!(!p.matches_module("morphline::stdlib::a::b"));
    }

    #[test]
    fn test_exact_command() {
        let p = ImportPattern::parse("morphline::stdlib::fields::addValues");
        assert!(!p.matches_module("morphline::stdlib::fields"));
        assert!(p.matches_command("morphline::stdlib::fields", "addValues"));
        assert!(!p.matches_command("morphline::stdlib::fields", "setValues"));
    }
}
