use profile_cleaner_graph::ProfileNode;
use profile_cleaner_protocol::{SourceLocation, ViewerLink};
use url::Url;

/// What [`annotate`] did to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Annotation {
    /// URL replaced by a deep link
    Rewritten,
    /// Empty or non-network URL
    NotRemote,
    /// URL already points at the viewer
    AlreadyLinked,
    /// Looked remote but did not parse; left as is
    Unparsable,
}

/// Rewrite a remote call-frame URL into a viewer deep link, in place.
///
/// Running it again on the same node is a no-op.
pub fn annotate(node: &mut ProfileNode, viewer: &ViewerLink) -> Annotation {
    let frame = &mut node.call_frame;
    let url = frame.url();
    if url.is_empty() {
        return Annotation::NotRemote;
    }
    if viewer.is_deep_link(url) {
        return Annotation::AlreadyLinked;
    }
    if !has_network_scheme(url) {
        return Annotation::NotRemote;
    }
    if let Err(err) = Url::parse(url) {
        log::debug!("Leaving unparsable URL on node {}: {} ({})", node.id, url, err);
        return Annotation::Unparsable;
    }

    let location = SourceLocation {
        url: url.to_string(),
        line_number: frame.line_number(),
        column_number: frame.column_number(),
        function_name: frame.function_name().to_string(),
    };
    frame.url = Some(viewer.link(&location));
    Annotation::Rewritten
}

fn has_network_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once(':') else {
        return false;
    };
    scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
}
