pub mod chat;
pub mod docstore;

pub use chat::{ChatClient, Health};
pub use docstore::ContextClient;

/// Join a service base URL and an endpoint path
fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}


#[cfg(test)]
mod tests {
    use super::endpoint;

    #[test]
    fn test_endpoint_joins_slashes() {
        assert_eq!(endpoint("http://h:1/", "/query"), "http://h:1/query");
        assert_eq!(endpoint("http://h:1", "chat/stream"), "http://h:1/chat/stream");
    }
}
