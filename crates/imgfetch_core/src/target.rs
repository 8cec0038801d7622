use url::Url;

/// Short, human-readable label for a request URL, used on the status line.
///
/// `https://example.test/img/cat.png` becomes `cat.png from example.test`.
/// Input that does not parse as an absolute URL is returned trimmed as-is.
pub fn describe_target(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let file = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty());
    match (file, url.host_str()) {
        (Some(file), Some(host)) => format!("{file} from {host}"),
        (None, Some(host)) => host.to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::describe_target;

    #[test]
    fn file_and_host() {
        assert_eq!(
            describe_target("https://example.test/img/cat.png"),
            "cat.png from example.test"
        );
    }

    #[test]
    fn host_only_when_path_is_empty() {
        assert_eq!(describe_target("https://example.test/"), "example.test");
    }

    #[test]
    fn unparsable_input_is_kept() {
        assert_eq!(describe_target("  not a url "), "not a url");
    }
}
