//! Route templates derived from file paths.

use std::collections::HashSet;
use std::fmt;

/// One path segment of a [`RouteTemplate`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Segment {
    Literal(String),
    /// A route parameter. `token` is the configured rendering (`:alphaId`),
    /// `name` is the key the parameter is looked up under (`alphaId`).
    Param { name: String, token: String },
}

/// A URI pattern made of literal and parameter segments.
///
/// Built once per discovered file and never changed afterwards. Displays in
/// the configured parameter syntax, e.g. `/alpha/:alphaId/beta/:betaId`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct RouteTemplate {
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] { &self.segments }

    /// Parameter names in path order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param { name, .. } => Some(name.as_str()),
            Segment::Literal(_)         => None,
        })
    }

    /// First parameter name that appears more than once, if any.
    pub fn duplicate_param(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.params().find(|name| !seen.insert(*name))
    }

    /// Renders the template in the router's `{name}` syntax.
    pub fn to_matchit(&self) -> String {
        self.render(|segment| match segment {
            Segment::Literal(text)     => text.clone(),
            Segment::Param { name, .. } => format!("{{{name}}}"),
        })
    }

    fn render(&self, mut part: impl FnMut(&Segment) -> String) -> String {
        if self.segments.is_empty() {
            return "/".to_owned();
        }
        self.segments.iter().fold(String::new(), |mut out, segment| {
            out.push('/');
            out.push_str(&part(segment));
            out
        })
    }
}

impl fmt::Display for RouteTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(|segment| match segment {
            Segment::Literal(text)      => text.clone(),
            Segment::Param { token, .. } => token.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> Segment {
        Segment::Param { name: format!("{name}Id"), token: format!(":{name}Id") }
    }

    fn lit(text: &str) -> Segment {
        Segment::Literal(text.to_owned())
    }

    #[test]
    fn renders_configured_tokens_and_router_syntax() {
        let route = RouteTemplate::new(vec![lit("alpha"), param("alpha"), lit("beta"), param("beta")]);

        assert_eq!(route.to_string(), "/alpha/:alphaId/beta/:betaId");
        assert_eq!(route.to_matchit(), "/alpha/{alphaId}/beta/{betaId}");
        assert_eq!(route.params().collect::<Vec<_>>(), ["alphaId", "betaId"]);
        assert_eq!(route.duplicate_param(), None);
    }

    #[test]
    fn empty_template_is_root() {
        let route = RouteTemplate::default();
        assert_eq!(route.to_string(), "/");
        assert_eq!(route.to_matchit(), "/");
    }

    #[test]
    fn reports_colliding_parameters() {
        let route = RouteTemplate::new(vec![lit("a"), param("a"), lit("a"), param("a")]);
        assert_eq!(route.duplicate_param(), Some("aId"));
    }
}
