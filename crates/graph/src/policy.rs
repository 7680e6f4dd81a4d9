use crate::error::PolicyError;
use crate::types::ProfileNode;

/// Decides whether a node survives contraction.
///
/// Implementations must be free of side effects; the engine calls `keep`
/// exactly once per node. Closures of the matching shape implement it.
pub trait KeepPolicy {
    fn keep(&self, node: &ProfileNode) -> std::result::Result<bool, PolicyError>;
}

impl<F> KeepPolicy for F
where
    F: Fn(&ProfileNode) -> std::result::Result<bool, PolicyError>,
{
    fn keep(&self, node: &ProfileNode) -> std::result::Result<bool, PolicyError> {
        self(node)
    }
}

/// Classifies frames as anonymous functions.
pub trait AnonymousClassifier {
    fn is_anonymous(&self, node: &ProfileNode) -> bool;
}

/// Classifier that never reports a frame as anonymous.
///
/// No heuristic has been settled on (an empty `functionName` is not enough:
/// the root, `(program)` and `(idle)` frames are not user closures).
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverAnonymous;

impl AnonymousClassifier for NeverAnonymous {
    fn is_anonymous(&self, _node: &ProfileNode) -> bool {
        false
    }
}

/// Removes nodes whose call-frame URL contains any of the configured
/// substrings, or which the classifier reports as anonymous.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter<C = NeverAnonymous> {
    patterns: Vec<String>,
    classifier: C,
}

impl UrlFilter<NeverAnonymous> {
    /// Case-sensitive substring patterns. Empty patterns are dropped since
    /// they would match every frame.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
            classifier: NeverAnonymous,
        }
    }
}

impl<C> UrlFilter<C> {
    pub fn with_classifier<D: AnonymousClassifier>(self, classifier: D) -> UrlFilter<D> {
        UrlFilter {
            patterns: self.patterns,
            classifier,
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches_url(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| url.contains(p.as_str()))
    }
}

impl<C: AnonymousClassifier> KeepPolicy for UrlFilter<C> {
    fn keep(&self, node: &ProfileNode) -> std::result::Result<bool, PolicyError> {
        let matches = self.matches_url(node.call_frame.url());
        let anonymous = self.classifier.is_anonymous(node);
        if matches || anonymous {
            log::debug!(
                "Removing node {} (matches: {}, anonymous: {}) {} {}",
                node.id,
                matches,
                anonymous,
                node.call_frame.function_name(),
                node.call_frame.url()
            );
        }
        Ok(!(matches || anonymous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_filter_is_case_sensitive_substring_match() {
        let filter = UrlFilter::new(["node_modules", "chrome-extension://"]);
        let keep = |url: &str| filter.keep(&ProfileNode::new(1).with_url(url)).unwrap();

        assert!(!keep("https://app.example.com/node_modules/react/index.js"));
        assert!(!keep("chrome-extension://abcdef/content.js"));
        assert!(keep("https://app.example.com/NODE_MODULES/x.js"));
        assert!(keep("https://app.example.com/main.js"));
        assert!(keep(""));
    }

    #[test]
    fn empty_patterns_are_ignored() {
        let filter = UrlFilter::new(["", "vendor"]);
        assert_eq!(filter.patterns(), ["vendor".to_string()]);
        assert!(filter.keep(&ProfileNode::new(1).with_url("app.js")).unwrap());
    }

    #[test]
    fn default_classifier_never_removes() {
        let filter = UrlFilter::new(Vec::<String>::new());
        let node = ProfileNode::new(1).with_function("");
        assert!(filter.keep(&node).unwrap());
    }

    #[test]
    fn custom_classifier_is_consulted() {
        struct EmptyName;
        impl AnonymousClassifier for EmptyName {
            fn is_anonymous(&self, node: &ProfileNode) -> bool {
                node.call_frame.function_name().is_empty()
            }
        }

        let filter = UrlFilter::new(["vendor"]).with_classifier(EmptyName);
        assert!(!filter.keep(&ProfileNode::new(1).with_function("")).unwrap());
        assert!(filter.keep(&ProfileNode::new(2).with_function("render")).unwrap());
    }

    #[test]
    fn closures_are_policies() {
        let policy = |node: &ProfileNode| -> Result<bool, PolicyError> { Ok(node.id % 2 == 0) };
        assert!(policy.keep(&ProfileNode::new(2)).unwrap());
        assert!(!policy.keep(&ProfileNode::new(3)).unwrap());
    }
}
