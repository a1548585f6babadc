//! Tests for multi-tier definition resolution

use forge_registry::definition::{Definition, DefinitionKind, Source};
use forge_registry::error::{Error, ErrorKind};
use forge_registry::layout::StorageLayout;
use forge_registry::resolver::{Resolver, ResolverOptions};
use forge_test_utils::{TestRegistry, yaml};

fn resolver(registry: &TestRegistry, options: ResolverOptions) -> Resolver {
    Resolver::new(
        StorageLayout::new(registry.project_root(), registry.global_root()),
        options,
    )
}

mod tier_order_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_local_wins_over_newer_global() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "web-search", "yaml", &yaml::tool("web-search", "1.0.0", ""));
        registry.write_global("tools", "web-search", "3.0.0", "yaml", &yaml::tool("web-search", "3.0.0", ""));

        let resolved = resolver(&registry, ResolverOptions::default())
            .resolve("web-search", DefinitionKind::Tool)
            .await
            .unwrap();

        assert_eq!(resolved.source, Source::Local);
        assert_eq!(resolved.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_global_picks_highest_satisfying_version() {
        let registry = TestRegistry::new();
        for version in ["1.0.0", "1.2.0", "2.0.0"] {
            registry.write_global("tools", "fmt", version, "yaml", &yaml::tool("fmt", version, ""));
        }

        let resolver = resolver(&registry, ResolverOptions::default());
        let caret = resolver.resolve("fmt@^1.0.0", DefinitionKind::Tool).await.unwrap();
        let latest = resolver.resolve("fmt", DefinitionKind::Tool).await.unwrap();

        assert_eq!(caret.source, Source::Global);
        assert_eq!(caret.version, "1.2.0");
        assert_eq!(latest.version, "2.0.0");
    }

    #[tokio::test]
    async fn test_unsatisfied_local_falls_through_to_global() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "lint", "yaml", &yaml::tool("lint", "1.0.0", ""));
        registry.write_global("tools", "lint", "2.1.0", "yaml", &yaml::tool("lint", "2.1.0", ""));

        let resolved = resolver(&registry, ResolverOptions::default())
            .resolve("lint@^2.0.0", DefinitionKind::Tool)
            .await
            .unwrap();

        assert_eq!(resolved.source, Source::Global);
        assert_eq!(resolved.version, "2.1.0");
    }

    #[tokio::test]
    async fn test_disabled_local_tier_is_skipped() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "lint", "yaml", &yaml::tool("lint", "1.0.0", ""));
        registry.write_global("tools", "lint", "1.5.0", "yaml", &yaml::tool("lint", "1.5.0", ""));

        let options = ResolverOptions {
            local: false,
            ..ResolverOptions::default()
        };
        let resolved = resolver(&registry, options)
            .resolve("lint", DefinitionKind::Tool)
            .await
            .unwrap();

        assert_eq!(resolved.source, Source::Global);
    }
}

mod format_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_markdown_preferred_over_yaml() {
        let registry = TestRegistry::new();
        registry.write_local("agents", "writer", "yaml", &yaml::agent("writer", "1.0.0", ""));
        registry.write_local(
            "agents",
            "writer",
            "md",
            &yaml::markdown_agent("writer", "1.1.0", "You write clearly."),
        );

        let resolved = resolver(&registry, ResolverOptions::default())
            .resolve_agent("writer")
            .await
            .unwrap();

        assert_eq!(resolved.version, "1.1.0");
        assert!(resolved.path.ends_with("writer.md"));
        match resolved.definition {
            Definition::Agent(agent) => {
                assert_eq!(agent.system_prompt.as_deref(), Some("You write clearly."))
            }
            other => panic!("expected an agent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_schema_errors_propagate() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "broken", "yaml", "type: tool\nname: broken\n");

        let err = resolver(&registry, ResolverOptions::default())
            .resolve_tool("broken")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
    }
}

mod not_found_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_missing_name_reports_searched_tiers() {
        let registry = TestRegistry::new();

        let err = resolver(&registry, ResolverOptions::default())
            .resolve_tool("nope")
            .await
            .unwrap_err();

        match err {
            Error::ToolNotFound { name, searched, .. } => {
                assert_eq!(name, "nope");
                assert_eq!(searched.len(), 2);
            }
            other => panic!("expected ToolNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_lists_available_versions() {
        let registry = TestRegistry::new();
        registry.write_local("agents", "planner", "yaml", &yaml::agent("planner", "1.0.0", ""));
        registry.write_global("agents", "planner", "1.4.0", "yaml", &yaml::agent("planner", "1.4.0", ""));

        let err = resolver(&registry, ResolverOptions::default())
            .resolve_agent("planner@^2.0.0")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
        match err {
            Error::VersionNotFound { available, .. } => {
                assert_eq!(available, vec!["1.0.0".to_string(), "1.4.0".to_string()])
            }
            other => panic!("expected VersionNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exists_maps_not_found_to_false() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "here", "yaml", &yaml::tool("here", "1.0.0", ""));
        let resolver = resolver(&registry, ResolverOptions::default());

        assert!(resolver.exists("here", DefinitionKind::Tool).await.unwrap());
        assert!(!resolver.exists("gone", DefinitionKind::Tool).await.unwrap());
        assert!(!resolver.exists("here@^9", DefinitionKind::Tool).await.unwrap());
    }
}

mod listing_and_cache_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_list_by_source() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "a", "yaml", &yaml::tool("a", "1.0.0", ""));
        registry.write_global("tools", "b", "0.1.0", "yaml", &yaml::tool("b", "0.1.0", ""));
        registry.write_global("tools", "b", "0.2.0", "yaml", &yaml::tool("b", "0.2.0", ""));
        let resolver = resolver(&registry, ResolverOptions::default());

        let all = resolver.list(DefinitionKind::Tool, None).await.unwrap();
        let local = resolver
            .list(DefinitionKind::Tool, Some(Source::Local))
            .await
            .unwrap();
        let global = resolver
            .list(DefinitionKind::Tool, Some(Source::Global))
            .await
            .unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "a");
        assert!(global.iter().all(|s| s.name == "b" && s.source == Source::Global));
    }

    #[tokio::test]
    async fn test_cached_result_until_invalidated() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "t", "yaml", &yaml::tool("t", "1.0.0", ""));
        let resolver = resolver(&registry, ResolverOptions::default());

        let first = resolver.resolve_tool("t").await.unwrap();
        registry.write_local("tools", "t", "yaml", &yaml::tool("t", "1.1.0", ""));
        let cached = resolver.resolve_tool("t").await.unwrap();
        resolver.invalidate(DefinitionKind::Tool, "t");
        let fresh = resolver.resolve_tool("t").await.unwrap();

        assert_eq!(first.version, "1.0.0");
        assert_eq!(cached.version, "1.0.0");
        assert_eq!(fresh.version, "1.1.0");
    }

    #[tokio::test]
    async fn test_disabled_cache_always_reads_disk() {
        let registry = TestRegistry::new();
        registry.write_local("tools", "t", "yaml", &yaml::tool("t", "1.0.0", ""));
        let options = ResolverOptions {
            cache: false,
            ..ResolverOptions::default()
        };
        let resolver = resolver(&registry, options);

        resolver.resolve_tool("t").await.unwrap();
        registry.write_local("tools", "t", "yaml", &yaml::tool("t", "2.0.0", ""));

        assert_eq!(resolver.resolve_tool("t").await.unwrap().version, "2.0.0");
    }
}
