//! Tests for definition-time validation and configuration loading
//!
//! Invalid resource graphs must be rejected before any request is served.

mod common;

use common::*;
use scopegraph::prelude::*;
use std::io::Write;

mod validation_tests {
    use super::*;

    #[test]
    fn test_polymorphic_with_assign_rejected() {
        let err = Resource::builder("like")
            .adapter(Arc::new(InMemoryAdapter::new()))
            .sideload(subject().assign(|_, _| {}))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::PolymorphicWithScope {
                name: "subject".to_string()
            }
        );
        assert_eq!(err.error_code(), "POLYMORPHIC_WITH_SCOPE");
    }

    #[test]
    fn test_duplicate_sideload_rejected() {
        let err = post(Arc::new(InMemoryAdapter::new()))
            .sideload(has_many("comments", "comment", "post_id"))
            .build()
            .unwrap_err();

        assert_eq!(err.error_code(), "DUPLICATE_SIDELOAD");
        assert_eq!(
            err.to_string(),
            "sideload 'comments' is already registered on 'post'"
        );
    }

    #[test]
    fn test_duplicate_polymorphic_group_rejected() {
        let err = subject()
            .group("post", belongs_to("subject", "post"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSideload { .. }));
    }

    #[test]
    fn test_unregistered_group_target_rejected() {
        let adapter: Arc<dyn Adapter> = Arc::new(InMemoryAdapter::new());
        let err = Runtime::builder()
            .register(like(adapter.clone()).build().unwrap())
            .register(post(adapter.clone()).build().unwrap())
            .register(comment(adapter.clone()).build().unwrap())
            .register(user(adapter).build().unwrap())
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::UnknownTarget {
                owner: "like".to_string(),
                sideload: "subject".to_string(),
                target: "photo".to_string()
            }
        );
    }

    #[test]
    fn test_nested_child_target_validated() {
        let adapter: Arc<dyn Adapter> = Arc::new(InMemoryAdapter::new());
        let err = Runtime::builder()
            .register(
                Resource::builder("post")
                    .adapter(adapter.clone())
                    .sideload(
                        has_many("comments", "comment", "post_id")
                            .allow_sideload(belongs_to("reviewer", "moderator")),
                    )
                    .build()
                    .unwrap(),
            )
            .register(Resource::builder("comment").adapter(adapter).build().unwrap())
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UnknownTarget { ref owner, ref target, .. }
                if owner == "comments" && target == "moderator"
        ));
    }

    #[test]
    fn test_blog_graph_is_valid() {
        let (_, runtime) = blog(ResolverConfig::default());
        assert_eq!(
            runtime.registry().resource_types(),
            vec!["post", "comment", "user", "photo", "like"]
        );
    }
}

mod config_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_yaml_config_drives_runtime() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency: true\ncache: true\ncache_key_separator: \"~\"").unwrap();

        let config = ResolverConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.default_page_size, 20);

        let store = InMemoryAdapter::new();
        seed(&store);
        let recorder = Arc::new(RecordingAdapter::new(store));
        let runtime = runtime(config, blog_resources(recorder.clone()));

        let query = Query::new()
            .include("author")
            .unwrap()
            .include("comments")
            .unwrap();
        let resolved = runtime
            .all("post", query, RequestContext::new())
            .await
            .unwrap();

        assert_eq!(resolved.cache_key.unwrap().split('~').count(), 3);
        assert_eq!(recorder.close_count(), 2);
    }

    #[test]
    fn test_missing_config_file() {
        let err = ResolverConfig::from_yaml_file("/nonexistent/resolver.yaml").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_LOAD_ERROR");
    }
}
