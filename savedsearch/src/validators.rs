use url::Url;

/// Returns `true` if the provided string parses as an `http` or `https` URL with a host.
pub fn is_valid_http_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Returns `true` if the provided string parses as a Redis connection URL.
pub fn is_valid_redis_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "redis" | "rediss" | "redis+unix" | "unix"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_url_validation() {
        assert!(is_valid_http_url("http://localhost:8983/solr/jobs"));
        assert!(is_valid_http_url("https://search.example.com/solr"));
        assert!(!is_valid_http_url("ftp://example.com"));
        assert!(!is_valid_http_url("not-a-url"));
        assert!(!is_valid_http_url("${SOLR_URL}"));
    }

    #[test]
    fn redis_url_validation() {
        assert!(is_valid_redis_url("redis://127.0.0.1:6379"));
        assert!(is_valid_redis_url("rediss://cache.example.com"));
        assert!(!is_valid_redis_url("http://127.0.0.1:6379"));
    }
}
